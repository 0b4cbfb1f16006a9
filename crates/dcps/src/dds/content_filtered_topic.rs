// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! ContentFilteredTopic - a topic view that only delivers matching samples.
//!
//! ```ignore
//! let hot = participant.create_contentfilteredtopic(
//!     "HotSensors",
//!     &topic,
//!     "temperature > %0",
//!     vec!["30.0".into()],
//! )?;
//! let reader = subscriber.create_datareader_filtered(&hot, QoS::default())?;
//!
//! // Applies to samples received from now on.
//! hot.set_expression_parameters(vec!["40.0".into()])?;
//! ```
//!
//! The filter runs in the reader, after decoding and before ownership,
//! ordering and resource-limit checks.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use super::filter::ContentFilter;
use super::topic::{Topic, TopicInner};
use super::{Result, DDS};

pub(crate) struct ContentFilteredTopicInner {
    pub(crate) name: String,
    pub(crate) related: Arc<TopicInner>,
    /// Shared with every reader created on this topic.
    pub(crate) filter: ContentFilter,
    refs: AtomicUsize,
    detached: AtomicBool,
}

impl ContentFilteredTopicInner {
    pub(crate) fn new(name: &str, related: Arc<TopicInner>, filter: ContentFilter) -> Self {
        related.acquire();
        Self {
            name: name.to_string(),
            related,
            filter,
            refs: AtomicUsize::new(0),
            detached: AtomicBool::new(false),
        }
    }

    pub(crate) fn acquire(&self) {
        self.refs.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn release(&self) {
        let _ = self
            .refs
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
    }

    pub(crate) fn ref_count(&self) -> usize {
        self.refs.load(Ordering::Acquire)
    }

    /// Release the related topic; runs once (delete or drop).
    pub(crate) fn detach(&self) {
        if !self.detached.swap(true, Ordering::AcqRel) {
            self.related.release();
        }
    }
}

impl Drop for ContentFilteredTopicInner {
    fn drop(&mut self) {
        self.detach();
    }
}

/// Filtered view over a related [`Topic`].
pub struct ContentFilteredTopic<T: DDS> {
    pub(crate) inner: Arc<ContentFilteredTopicInner>,
    _phantom: core::marker::PhantomData<fn() -> T>,
}

impl<T: DDS> Clone for ContentFilteredTopic<T> {
    fn clone(&self) -> Self {
        Self::from_inner(Arc::clone(&self.inner))
    }
}

impl<T: DDS> ContentFilteredTopic<T> {
    pub(crate) fn from_inner(inner: Arc<ContentFilteredTopicInner>) -> Self {
        Self {
            inner,
            _phantom: core::marker::PhantomData,
        }
    }

    pub fn get_name(&self) -> &str {
        &self.inner.name
    }

    pub fn get_type_name(&self) -> &str {
        &self.inner.related.type_name
    }

    pub fn get_filter_expression(&self) -> &str {
        self.inner.filter.expression()
    }

    pub fn get_expression_parameters(&self) -> Vec<String> {
        self.inner.filter.parameters()
    }

    /// Replace the filter parameters.
    ///
    /// # Errors
    ///
    /// `Error::Error` when the count differs from the expression's `%N`
    /// placeholders; the previous parameters stay in effect.
    pub fn set_expression_parameters(&self, parameters: Vec<String>) -> Result<()> {
        self.inner.filter.set_parameters(parameters)?;
        log::debug!(
            "[filter] '{}' parameters now {:?}",
            self.inner.name,
            self.inner.filter.parameters()
        );
        Ok(())
    }

    pub fn get_related_topic(&self) -> Topic<T> {
        Topic::from_inner(Arc::clone(&self.inner.related))
    }
}
