// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Payload decoding for the topic description a reader subscribes to.

use std::sync::Arc;

use crate::dds::content_filtered_topic::ContentFilteredTopicInner;
use crate::dds::multi_topic::{JoinCache, MultiTopicInner, MultiTopicSample};
use crate::dds::{Result, DDS};

/// Turns the changes received on one of the reader's components into
/// keyed samples of `T`.
pub(crate) trait SampleDecoder<T>: Send + Sync {
    /// Reader instances a dispose or unregister received on `component`
    /// applies to.
    fn lifecycle_keys(&self, component: usize, key: [u8; 16]) -> Vec<[u8; 16]> {
        let _ = component;
        vec![key]
    }

    /// Decode a payload into the samples it yields, each with its reader-side
    /// instance key; empty when filtered out.
    fn decode(&self, component: usize, key: [u8; 16], payload: &[u8]) -> Result<Vec<([u8; 16], T)>>;
}

/// Plain topic: every sample is delivered.
pub(crate) struct PlainDecoder;

impl<T: DDS> SampleDecoder<T> for PlainDecoder {
    fn decode(&self, _component: usize, key: [u8; 16], payload: &[u8]) -> Result<Vec<([u8; 16], T)>> {
        Ok(vec![(key, T::decode_cdr2(payload)?)])
    }
}

/// ContentFilteredTopic: the filter sees the decoded sample's fields.
pub(crate) struct FilteredDecoder {
    pub(crate) topic: Arc<ContentFilteredTopicInner>,
}

impl<T: DDS> SampleDecoder<T> for FilteredDecoder {
    fn decode(&self, _component: usize, key: [u8; 16], payload: &[u8]) -> Result<Vec<([u8; 16], T)>> {
        let sample = T::decode_cdr2(payload)?;
        if self.topic.filter.accepts(&sample.get_fields()) {
            Ok(vec![(key, sample)])
        } else {
            Ok(Vec::new())
        }
    }
}

/// MultiTopic: component `i` receives the i-th related topic. Each sample
/// is joined with the cached samples of the other topics.
pub(crate) struct MultiDecoder {
    multi: Arc<MultiTopicInner>,
    join: JoinCache,
}

impl MultiDecoder {
    pub(crate) fn new(multi: Arc<MultiTopicInner>) -> Self {
        let names = multi.topics.iter().map(|topic| topic.name.clone()).collect();
        Self {
            multi,
            join: JoinCache::new(names),
        }
    }
}

impl SampleDecoder<MultiTopicSample> for MultiDecoder {
    fn lifecycle_keys(&self, component: usize, key: [u8; 16]) -> Vec<[u8; 16]> {
        self.join
            .remove(component, key)
            .into_iter()
            .filter(|(_, joined)| self.multi.select(joined.clone()).is_some())
            .map(|(row, _)| row)
            .collect()
    }

    fn decode(
        &self,
        component: usize,
        key: [u8; 16],
        payload: &[u8],
    ) -> Result<Vec<([u8; 16], MultiTopicSample)>> {
        let Some(topic) = self.multi.topics.get(component) else {
            return Ok(Vec::new());
        };
        let fields = (topic.fields_of)(payload)?;
        let rows = self
            .join
            .update(component, key, fields)
            .into_iter()
            .filter_map(|(row, joined)| {
                let fields = self.multi.select(joined)?;
                Some((row, MultiTopicSample { key: row, fields }))
            })
            .collect();
        Ok(rows)
    }
}
