// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! MultiTopic - a subscription over several related topics.
//!
//! # Expression
//!
//! ```text
//! SELECT <field [AS alias], ... | *>
//!   FROM <topic> [NATURAL JOIN <topic>]*
//!   [WHERE <predicate>]
//! ```
//!
//! The predicate uses the content filter grammar, including `%N`
//! parameters. A MultiTopic reader keeps the latest sample of every source
//! instance of every related topic. Each arriving sample is joined with the
//! cached samples of the other topics on their common field names (topics
//! sharing no field are combined as a cross product). The WHERE predicate
//! then runs on the joined fields, and the projection picks the selected
//! fields out of them. Every joined row is one instance of the reader; a
//! row lacking a selected field is not delivered.
//!
//! ```ignore
//! let multi = participant.create_multitopic(
//!     "Fleet",
//!     "FleetView",
//!     "SELECT id, speed AS v FROM Cars NATURAL JOIN Trucks WHERE speed > %0",
//!     vec!["10".into()],
//! )?;
//! let reader = subscriber.create_datareader_multi(&multi, QoS::default())?;
//! for sample in reader.take(16)? {
//!     if let Some(data) = sample.data {
//!         println!("{:?}", data.fields);
//!     }
//! }
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use md5::{Digest, Md5};
use parking_lot::Mutex;

use super::filter::{ContentFilter, FieldValue};
use super::topic::TopicInner;
use super::{Error, Result, DDS};
use crate::ser::{CdrReader, CdrWriter, SerError};

// ============================================================================
// Expression parsing
// ============================================================================

/// One entry of the SELECT list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SelectedField {
    pub field: String,
    pub alias: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Selection {
    All,
    Fields(Vec<SelectedField>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SubscriptionExpression {
    pub selection: Selection,
    pub topics: Vec<String>,
    pub predicate: Option<String>,
}

fn syntax(msg: impl Into<String>) -> Error {
    Error::Error(format!("multitopic expression: {}", msg.into()))
}

/// Byte offset of `keyword` as a standalone word outside quoted strings.
fn find_keyword(text: &str, keyword: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let kw = keyword.as_bytes();
    let mut in_quote = false;
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        if c == b'\'' {
            in_quote = !in_quote;
        } else if !in_quote
            && i + kw.len() <= bytes.len()
            && bytes[i..i + kw.len()].eq_ignore_ascii_case(kw)
        {
            let before_ok = i == 0 || !is_word_byte(bytes[i - 1]);
            let after_ok = i + kw.len() == bytes.len() || !is_word_byte(bytes[i + kw.len()]);
            if before_ok && after_ok {
                return Some(i);
            }
        }
        i += 1;
    }
    None
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'.'
}

fn is_identifier(word: &str) -> bool {
    !word.is_empty()
        && word
            .split('.')
            .all(|part| {
                let mut chars = part.chars();
                matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
                    && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
            })
}

fn parse_selection(list: &str) -> Result<Selection> {
    let list = list.trim();
    if list == "*" {
        return Ok(Selection::All);
    }
    let mut fields = Vec::new();
    for item in list.split(',') {
        let words: Vec<&str> = item.split_whitespace().collect();
        let selected = match words.as_slice() {
            [field] => SelectedField {
                field: (*field).to_string(),
                alias: (*field).to_string(),
            },
            [field, as_kw, alias] if as_kw.eq_ignore_ascii_case("AS") => SelectedField {
                field: (*field).to_string(),
                alias: (*alias).to_string(),
            },
            _ => return Err(syntax(format!("bad select item '{}'", item.trim()))),
        };
        if !is_identifier(&selected.field) || !is_identifier(&selected.alias) {
            return Err(syntax(format!("bad select item '{}'", item.trim())));
        }
        fields.push(selected);
    }
    Ok(Selection::Fields(fields))
}

fn parse_from(clause: &str) -> Result<Vec<String>> {
    let words: Vec<&str> = clause.split_whitespace().collect();
    let Some((first, mut rest)) = words.split_first() else {
        return Err(syntax("missing topic after FROM"));
    };
    let mut topics = vec![(*first).to_string()];
    while !rest.is_empty() {
        rest = match rest {
            [natural, join, topic, tail @ ..]
                if natural.eq_ignore_ascii_case("NATURAL") && join.eq_ignore_ascii_case("JOIN") =>
            {
                topics.push((*topic).to_string());
                tail
            }
            [join, topic, tail @ ..] if join.eq_ignore_ascii_case("JOIN") => {
                topics.push((*topic).to_string());
                tail
            }
            _ => return Err(syntax(format!("unexpected '{}' in FROM clause", rest.join(" ")))),
        };
    }
    if let Some(bad) = topics.iter().find(|t| t.contains(',')) {
        return Err(syntax(format!("bad topic name '{}'", bad)));
    }
    Ok(topics)
}

pub(crate) fn parse_subscription_expression(expression: &str) -> Result<SubscriptionExpression> {
    let text = expression.trim();
    let select = find_keyword(text, "SELECT").filter(|&pos| pos == 0);
    let Some(select) = select else {
        return Err(syntax("must start with SELECT"));
    };
    let from = find_keyword(text, "FROM").ok_or_else(|| syntax("missing FROM"))?;
    let selection = parse_selection(&text[select + "SELECT".len()..from])?;

    let after_from = &text[from + "FROM".len()..];
    let (from_clause, predicate) = match find_keyword(after_from, "WHERE") {
        Some(pos) => {
            let predicate = after_from[pos + "WHERE".len()..].trim();
            if predicate.is_empty() {
                return Err(syntax("empty WHERE clause"));
            }
            (&after_from[..pos], Some(predicate.to_string()))
        }
        None => (after_from, None),
    };
    Ok(SubscriptionExpression {
        selection,
        topics: parse_from(from_clause)?,
        predicate,
    })
}

// ============================================================================
// MultiTopic
// ============================================================================

pub(crate) struct MultiTopicInner {
    pub(crate) name: String,
    pub(crate) type_name: String,
    expression: String,
    selection: Selection,
    pub(crate) topics: Vec<Arc<TopicInner>>,
    predicate: Option<ContentFilter>,
    refs: AtomicUsize,
    detached: AtomicBool,
}

impl MultiTopicInner {
    /// Build from a parsed expression; `topics` are the resolved FROM topics.
    pub(crate) fn new(
        name: &str,
        type_name: &str,
        expression: &str,
        parsed: SubscriptionExpression,
        topics: Vec<Arc<TopicInner>>,
        parameters: Vec<String>,
    ) -> Result<Self> {
        let predicate = match &parsed.predicate {
            Some(text) => Some(ContentFilter::with_parameters(text, parameters)?),
            None if parameters.is_empty() => None,
            None => {
                return Err(Error::Error(format!(
                    "expression takes 0 parameter(s), {} supplied",
                    parameters.len()
                )))
            }
        };
        for topic in &topics {
            topic.acquire();
        }
        Ok(Self {
            name: name.to_string(),
            type_name: type_name.to_string(),
            expression: expression.to_string(),
            selection: parsed.selection,
            topics,
            predicate,
            refs: AtomicUsize::new(0),
            detached: AtomicBool::new(false),
        })
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

    /// Release the related topics; runs once (delete or drop).
    pub(crate) fn detach(&self) {
        if !self.detached.swap(true, Ordering::AcqRel) {
            for topic in &self.topics {
                topic.release();
            }
        }
    }

    /// Apply the predicate and the projection to one joined row.
    pub(crate) fn select(&self, joined: HashMap<String, FieldValue>) -> Option<Fields> {
        if let Some(predicate) = &self.predicate {
            if !predicate.accepts(&joined) {
                return None;
            }
        }
        match &self.selection {
            Selection::All => Some(joined),
            Selection::Fields(selected) => selected
                .iter()
                .map(|item| Some((item.alias.clone(), joined.get(&item.field)?.clone())))
                .collect(),
        }
    }
}

impl Drop for MultiTopicInner {
    fn drop(&mut self) {
        self.detach();
    }
}

/// Subscription over several related topics.
#[derive(Clone)]
pub struct MultiTopic {
    pub(crate) inner: Arc<MultiTopicInner>,
}

impl MultiTopic {
    pub fn get_name(&self) -> &str {
        &self.inner.name
    }

    pub fn get_type_name(&self) -> &str {
        &self.inner.type_name
    }

    pub fn get_subscription_expression(&self) -> &str {
        &self.inner.expression
    }

    /// Names of the related topics, in FROM order.
    pub fn get_related_topic_names(&self) -> Vec<String> {
        self.inner.topics.iter().map(|t| t.name.clone()).collect()
    }

    pub fn get_expression_parameters(&self) -> Vec<String> {
        self.inner
            .predicate
            .as_ref()
            .map(ContentFilter::parameters)
            .unwrap_or_default()
    }

    /// Replace the WHERE parameters; the count must match the expression.
    pub fn set_expression_parameters(&self, parameters: Vec<String>) -> Result<()> {
        match &self.inner.predicate {
            Some(predicate) => Ok(predicate.set_parameters(parameters)?),
            None if parameters.is_empty() => Ok(()),
            None => Err(Error::Error(format!(
                "expression takes 0 parameter(s), {} supplied",
                parameters.len()
            ))),
        }
    }
}

// ============================================================================
// Natural join
// ============================================================================

pub(crate) type Fields = HashMap<String, FieldValue>;

/// Latest fields of every source instance, per related topic. Owned by one
/// MultiTopic reader.
pub(crate) struct JoinCache {
    topics: Vec<String>,
    latest: Mutex<Vec<HashMap<[u8; 16], Fields>>>,
}

/// A joined row: its reader-side key and the union of the source fields.
pub(crate) type JoinedRow = ([u8; 16], Fields);

impl JoinCache {
    /// `topics` are the related topic names in FROM order.
    pub(crate) fn new(topics: Vec<String>) -> Self {
        let latest = Mutex::new(vec![HashMap::new(); topics.len()]);
        Self { topics, latest }
    }

    /// Record `fields` as the latest sample of source `key` on topic
    /// `component` and return every joined row it now takes part in.
    pub(crate) fn update(&self, component: usize, key: [u8; 16], fields: Fields) -> Vec<JoinedRow> {
        let mut latest = self.latest.lock();
        let Some(slot) = latest.get_mut(component) else {
            return Vec::new();
        };
        slot.insert(key, fields);
        self.rows_with(&latest, component, key)
    }

    /// Forget source `key` on topic `component`; returns the rows it was
    /// part of.
    pub(crate) fn remove(&self, component: usize, key: [u8; 16]) -> Vec<JoinedRow> {
        let mut latest = self.latest.lock();
        let rows = self.rows_with(&latest, component, key);
        if let Some(slot) = latest.get_mut(component) {
            slot.remove(&key);
        }
        rows
    }

    fn rows_with(
        &self,
        latest: &[HashMap<[u8; 16], Fields>],
        component: usize,
        key: [u8; 16],
    ) -> Vec<JoinedRow> {
        if !latest.get(component).is_some_and(|slot| slot.contains_key(&key)) {
            return Vec::new();
        }
        let mut picked = vec![None; latest.len()];
        picked[component] = Some(key);
        let mut rows = Vec::new();
        self.extend(latest, 0, &mut picked, Fields::new(), &mut rows);
        rows
    }

    /// Pick a compatible source from topic `next` onwards. On a shared
    /// name the earlier topic in FROM order supplies the value.
    fn extend(
        &self,
        latest: &[HashMap<[u8; 16], Fields>],
        next: usize,
        picked: &mut [Option<[u8; 16]>],
        joined: Fields,
        rows: &mut Vec<JoinedRow>,
    ) {
        if next == latest.len() {
            rows.push((self.row_key(picked), joined));
            return;
        }
        let fixed = picked[next];
        for (key, fields) in &latest[next] {
            if fixed.is_some_and(|wanted| wanted != *key) {
                continue;
            }
            let agrees = fields
                .iter()
                .all(|(name, value)| joined.get(name).map_or(true, |seen| seen.joins(value)));
            if !agrees {
                continue;
            }
            let mut wider = joined.clone();
            for (name, value) in fields {
                wider.entry(name.clone()).or_insert_with(|| value.clone());
            }
            picked[next] = Some(*key);
            self.extend(latest, next + 1, picked, wider, rows);
        }
        picked[next] = fixed;
    }

    /// Digest of every picked source, topic name included, so equal keys
    /// on different topics stay distinct.
    fn row_key(&self, picked: &[Option<[u8; 16]>]) -> [u8; 16] {
        let mut hasher = Md5::new();
        for (topic, key) in self.topics.iter().zip(picked) {
            hasher.update(topic.as_bytes());
            hasher.update(key.unwrap_or_default());
        }
        let mut out = [0u8; 16];
        out.copy_from_slice(&hasher.finalize());
        out
    }
}

// ============================================================================
// MultiTopicSample
// ============================================================================

/// One joined row delivered by a MultiTopic reader.
#[derive(Debug, Clone, PartialEq)]
pub struct MultiTopicSample {
    /// Identity of the row: a digest of the source instances it joins.
    pub key: [u8; 16],
    /// Selected fields, by alias.
    pub fields: HashMap<String, FieldValue>,
}

impl MultiTopicSample {
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }
}

const TAG_INTEGER: u8 = 0;
const TAG_UNSIGNED: u8 = 1;
const TAG_FLOAT: u8 = 2;
const TAG_STRING: u8 = 3;
const TAG_BOOLEAN: u8 = 4;

impl DDS for MultiTopicSample {
    fn type_name() -> &'static str {
        "MultiTopicSample"
    }

    fn encode_cdr2(&self, buf: &mut Vec<u8>) -> Result<()> {
        let mut w = CdrWriter::new(buf);
        w.write_bytes(&self.key)?;
        let mut names: Vec<&String> = self.fields.keys().collect();
        names.sort();
        w.write_u32_le(names.len() as u32)?;
        for name in names {
            w.write_string(name)?;
            match &self.fields[name] {
                FieldValue::Integer(v) => {
                    w.write_u8(TAG_INTEGER)?;
                    w.write_i64_le(*v)?;
                }
                FieldValue::Unsigned(v) => {
                    w.write_u8(TAG_UNSIGNED)?;
                    w.write_u64_le(*v)?;
                }
                FieldValue::Float(v) => {
                    w.write_u8(TAG_FLOAT)?;
                    w.write_f64_le(*v)?;
                }
                FieldValue::String(v) => {
                    w.write_u8(TAG_STRING)?;
                    w.write_string(v)?;
                }
                FieldValue::Boolean(v) => {
                    w.write_u8(TAG_BOOLEAN)?;
                    w.write_bool(*v)?;
                }
            }
        }
        Ok(())
    }

    fn decode_cdr2(buf: &[u8]) -> Result<Self> {
        let mut r = CdrReader::new(buf);
        let mut key = [0u8; 16];
        key.copy_from_slice(r.read_bytes(16)?);
        let count = r.read_u32_le()? as usize;
        if count > r.remaining() {
            return Err(SerError::InvalidData {
                reason: format!("field count {} exceeds payload", count),
            }
            .into());
        }
        let mut fields = HashMap::with_capacity(count);
        for _ in 0..count {
            let name = r.read_string()?;
            let value = match r.read_u8()? {
                TAG_INTEGER => FieldValue::Integer(r.read_i64_le()?),
                TAG_UNSIGNED => FieldValue::Unsigned(r.read_u64_le()?),
                TAG_FLOAT => FieldValue::Float(r.read_f64_le()?),
                TAG_STRING => FieldValue::String(r.read_string()?),
                TAG_BOOLEAN => FieldValue::Boolean(r.read_bool()?),
                other => {
                    return Err(SerError::InvalidData {
                        reason: format!("unknown field tag {}", other),
                    }
                    .into())
                }
            };
            fields.insert(name, value);
        }
        Ok(Self { key, fields })
    }

    fn has_key() -> bool {
        true
    }

    fn compute_key(&self) -> [u8; 16] {
        self.key
    }

    fn get_fields(&self) -> HashMap<String, FieldValue> {
        self.fields.clone()
    }
}
