/// `SpanGroups` — the labelled span group container held by a `Doc`.
///
/// Maps string labels to `SpanGroup`s. One group instance may sit under
/// several labels at once; every stored group must belong to the container's
/// document.
///
/// # Wire formats
/// The encoding carries no version tag; `from_bytes` dispatches on shape:
/// - empty buffer, or the encoded empty array → no groups
/// - v1: array of group payloads, labelled by each group's own name
/// - v2: map of group payload → array of labels (what `to_bytes` writes)
use std::collections::hash_map::{Entry, HashMap};

use ciborium::Value;
use indexmap::IndexMap;
use thiserror::Error;

use crate::spans::codec::{cbor_decode, cbor_encode, value_kind, CodecError, EMPTY_BYTES};
use crate::spans::doc::{Doc, DocRef};
use crate::spans::limits::{
    check_payload_limit, PayloadLimitStatus, MAX_ENCODED_BYTES, MAX_GROUPS, MAX_LABELS_PER_GROUP,
    MAX_TOTAL_LABELS, MAX_TOTAL_SPANS,
};
use crate::spans::span_group::{GroupError, Span, SpanGroup};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Error, Debug)]
pub enum SpanGroupsError {
    #[error("Owning document is no longer available")]
    OwnerUnavailable,

    #[error("Unexpected span groups payload: expected array or map, got {0}")]
    UnexpectedShape(&'static str),

    #[error("Malformed span groups entry: {0}")]
    MalformedEntry(String),

    #[error("Payload exceeds max size ({size} > {max})")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("Too many span groups ({count} > {max})")]
    TooManyGroups { count: usize, max: usize },

    #[error("Too many span group labels ({count} > {max})")]
    TooManyLabels { count: usize, max: usize },

    #[error("Too many decoded spans ({count} > {max})")]
    TooManySpans { count: usize, max: usize },

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Span group error: {0}")]
    Group(#[from] GroupError),
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// How `to_bytes` decides that two labels share one payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GroupingPolicy {
    /// Labels whose groups encode to identical bytes share one map entry,
    /// even when the groups are distinct instances.
    #[default]
    ByContent,
    /// Labels share a map entry only when they hold the same group instance.
    /// Content-equal instances are written once each.
    ByInstance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpanGroupsConfig {
    pub grouping: GroupingPolicy,
    /// Reject encoded payloads larger than this before decoding.
    pub max_encoded_bytes: usize,
    /// Max group payloads per decoded container.
    pub max_groups: usize,
    /// Max labels attached to a single payload in the v2 format.
    pub max_labels_per_group: usize,
    /// Max labels across a whole decoded container.
    pub max_total_labels: usize,
    /// Max spans held by all decoded groups together, copies included.
    pub max_total_spans: usize,
}

impl Default for SpanGroupsConfig {
    fn default() -> Self {
        SpanGroupsConfig {
            grouping: GroupingPolicy::default(),
            max_encoded_bytes: MAX_ENCODED_BYTES,
            max_groups: MAX_GROUPS,
            max_labels_per_group: MAX_LABELS_PER_GROUP,
            max_total_labels: MAX_TOTAL_LABELS,
            max_total_spans: MAX_TOTAL_SPANS,
        }
    }
}

// ---------------------------------------------------------------------------
// Values & reports
// ---------------------------------------------------------------------------

/// What `put` accepts: an existing group, or bare spans to wrap in a new one.
#[derive(Debug, Clone)]
pub enum GroupValue {
    Group(SpanGroup),
    Spans(Vec<Span>),
}

impl From<SpanGroup> for GroupValue {
    fn from(group: SpanGroup) -> Self {
        GroupValue::Group(group)
    }
}

impl From<Vec<Span>> for GroupValue {
    fn from(spans: Vec<Span>) -> Self {
        GroupValue::Spans(spans)
    }
}

impl From<&[Span]> for GroupValue {
    fn from(spans: &[Span]) -> Self {
        GroupValue::Spans(spans.to_vec())
    }
}

/// Payload shape seen by `from_bytes`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireFormat {
    Empty,
    /// v1: array of group payloads.
    LegacyList,
    /// v2: map of group payload → labels.
    LabelMap,
}

/// Outcome of a successful decode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeReport {
    pub format: WireFormat,
    /// Names dropped from a v1 payload because an earlier group had the same name.
    pub collisions: Vec<String>,
}

impl DecodeReport {
    fn new(format: WireFormat) -> Self {
        DecodeReport {
            format,
            collisions: Vec::new(),
        }
    }
}

#[derive(PartialEq, Eq, Hash)]
enum BucketKey {
    Content(Vec<u8>),
    Instance(usize),
}

// ---------------------------------------------------------------------------
// SpanGroups
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct SpanGroups {
    doc: DocRef,
    entries: IndexMap<String, SpanGroup>,
    config: SpanGroupsConfig,
}

impl SpanGroups {
    /// Empty container bound to `doc`.
    pub fn new(doc: &Doc) -> Self {
        Self::with_config(doc, SpanGroupsConfig::default())
    }

    pub fn with_config(doc: &Doc, config: SpanGroupsConfig) -> Self {
        Self::bound_to(doc.downgrade(), config)
    }

    pub(crate) fn bound_to(doc: DocRef, config: SpanGroupsConfig) -> Self {
        SpanGroups {
            doc,
            entries: IndexMap::new(),
            config,
        }
    }

    /// Container seeded with `(label, group)` pairs.
    ///
    /// # Panics
    /// If any group belongs to a different document.
    pub fn from_groups<I, S>(doc: &Doc, groups: I) -> Self
    where
        I: IntoIterator<Item = (S, SpanGroup)>,
        S: Into<String>,
    {
        let mut container = Self::new(doc);
        for (label, group) in groups {
            container.insert_group(label.into(), group);
        }
        container
    }

    /// Weak reference to the owning document.
    pub fn doc(&self) -> &DocRef {
        &self.doc
    }

    pub fn config(&self) -> &SpanGroupsConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: SpanGroupsConfig) {
        self.config = config;
    }

    /// Resolve the owning document.
    pub fn ensure_doc(&self) -> Result<Doc, SpanGroupsError> {
        self.doc.upgrade().ok_or(SpanGroupsError::OwnerUnavailable)
    }

    // -----------------------------------------------------------------------
    // Keyed access
    // -----------------------------------------------------------------------

    /// Store `value` under `label`, replacing any existing entry.
    ///
    /// Bare spans become a new group named `label` on the owning document.
    ///
    /// # Panics
    /// If `value` is a group owned by a different document.
    pub fn put(
        &mut self,
        label: impl Into<String>,
        value: impl Into<GroupValue>,
    ) -> Result<(), SpanGroupsError> {
        let label = label.into();
        let group = match value.into() {
            GroupValue::Group(group) => group,
            GroupValue::Spans(spans) => {
                let doc = self.ensure_doc()?;
                SpanGroup::new(&doc, &label, spans)?
            }
        };
        self.insert_group(label, group);
        Ok(())
    }

    fn insert_group(&mut self, label: String, group: SpanGroup) {
        assert_eq!(
            group.owner(),
            self.doc.id(),
            "span group {:?} for label {:?} belongs to another document",
            group.name(),
            label
        );
        self.entries.insert(label, group);
    }

    pub fn get(&self, label: &str) -> Option<&SpanGroup> {
        self.entries.get(label)
    }

    pub fn contains_key(&self, label: &str) -> bool {
        self.entries.contains_key(label)
    }

    /// Remove and return the group under `label`. Order of the rest is kept.
    pub fn remove(&mut self, label: &str) -> Option<SpanGroup> {
        self.entries.shift_remove(label)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Labels in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.keys().map(String::as_str)
    }

    pub fn values(&self) -> impl Iterator<Item = &SpanGroup> + '_ {
        self.entries.values()
    }

    pub fn iter(&self) -> indexmap::map::Iter<'_, String, SpanGroup> {
        self.entries.iter()
    }

    // -----------------------------------------------------------------------
    // Copy
    // -----------------------------------------------------------------------

    /// Independent container with freshly decoded groups.
    ///
    /// Bound to `target` if given, otherwise to this container's document.
    pub fn copy(&self, target: Option<&Doc>) -> Result<SpanGroups, SpanGroupsError> {
        let doc = match target {
            Some(doc) => doc.clone(),
            None => self.ensure_doc()?,
        };
        let mut copy = SpanGroups::with_config(&doc, self.config);
        copy.from_bytes(&self.to_bytes()?)?;
        Ok(copy)
    }

    // -----------------------------------------------------------------------
    // Encode
    // -----------------------------------------------------------------------

    /// Serialize to the v2 label-map format.
    ///
    /// Each distinct payload (per `GroupingPolicy`) is written once, with the
    /// labels that map to it in iteration order.
    pub fn to_bytes(&self) -> Result<Vec<u8>, SpanGroupsError> {
        if self.entries.is_empty() {
            return Ok(EMPTY_BYTES.to_vec());
        }

        let mut index: HashMap<BucketKey, usize> = HashMap::new();
        let mut buckets: Vec<(Vec<u8>, Vec<Value>)> = Vec::new();

        for (label, group) in &self.entries {
            let key = match self.config.grouping {
                GroupingPolicy::ByContent => BucketKey::Content(group.to_bytes()?),
                GroupingPolicy::ByInstance => BucketKey::Instance(group.instance_id()),
            };
            match index.entry(key) {
                Entry::Occupied(slot) => buckets[*slot.get()].1.push(Value::Text(label.clone())),
                Entry::Vacant(slot) => {
                    let payload = match slot.key() {
                        BucketKey::Content(bytes) => bytes.clone(),
                        BucketKey::Instance(_) => group.to_bytes()?,
                    };
                    slot.insert(buckets.len());
                    buckets.push((payload, vec![Value::Text(label.clone())]));
                }
            }
        }

        log::debug!(
            "Encoding {} span group labels as {} payloads ({:?})",
            self.entries.len(),
            buckets.len(),
            self.config.grouping
        );

        let map = buckets
            .into_iter()
            .map(|(payload, labels)| (Value::Bytes(payload), Value::Array(labels)))
            .collect();
        Ok(cbor_encode(&Value::Map(map))?)
    }

    // -----------------------------------------------------------------------
    // Decode
    // -----------------------------------------------------------------------

    /// Replace the contents with groups decoded from `bytes`.
    ///
    /// Existing entries are cleared first, and stay cleared if decoding fails.
    pub fn from_bytes(&mut self, bytes: &[u8]) -> Result<&mut Self, SpanGroupsError> {
        self.from_bytes_with_report(bytes)?;
        Ok(self)
    }

    /// Like `from_bytes`, but reports the payload format and any v1 name
    /// collisions.
    pub fn from_bytes_with_report(
        &mut self,
        bytes: &[u8],
    ) -> Result<DecodeReport, SpanGroupsError> {
        self.entries.clear();
        let doc = self.ensure_doc()?;

        if bytes.is_empty() || bytes == EMPTY_BYTES.as_slice() {
            return Ok(DecodeReport::new(WireFormat::Empty));
        }

        if let PayloadLimitStatus::TooLarge =
            check_payload_limit(bytes.len(), self.config.max_encoded_bytes)
        {
            return Err(SpanGroupsError::PayloadTooLarge {
                size: bytes.len(),
                max: self.config.max_encoded_bytes,
            });
        }

        let msg: Value = cbor_decode(bytes)?;
        let (entries, report) = match msg {
            Value::Map(pairs) => self.decode_label_map(&doc, pairs)?,
            Value::Array(items) => self.decode_legacy_list(&doc, items)?,
            other => return Err(SpanGroupsError::UnexpectedShape(value_kind(&other))),
        };

        log::debug!(
            "Decoded {} span group labels ({:?}, {} collisions)",
            entries.len(),
            report.format,
            report.collisions.len()
        );
        self.entries = entries;
        Ok(report)
    }

    /// v2: `{ payload: [label, ...] }`. The first label gets the decoded
    /// group; each further label gets its own copy.
    ///
    /// Label totals are checked across the whole map before any group is
    /// decoded; span totals are checked before each group is copied.
    fn decode_label_map(
        &self,
        doc: &Doc,
        pairs: Vec<(Value, Value)>,
    ) -> Result<(IndexMap<String, SpanGroup>, DecodeReport), SpanGroupsError> {
        self.check_group_count(pairs.len())?;

        let mut parsed = Vec::with_capacity(pairs.len());
        let mut total_labels = 0usize;
        for (key, value) in pairs {
            let payload = match key {
                Value::Bytes(payload) => payload,
                other => {
                    return Err(SpanGroupsError::MalformedEntry(format!(
                        "map key must be bytes, got {}",
                        value_kind(&other)
                    )))
                }
            };
            let labels = decode_labels(value)?;
            if labels.len() > self.config.max_labels_per_group {
                return Err(SpanGroupsError::MalformedEntry(format!(
                    "{} labels for one payload exceeds max {}",
                    labels.len(),
                    self.config.max_labels_per_group
                )));
            }
            total_labels = total_labels.saturating_add(labels.len());
            parsed.push((payload, labels));
        }
        if total_labels > self.config.max_total_labels {
            return Err(SpanGroupsError::TooManyLabels {
                count: total_labels,
                max: self.config.max_total_labels,
            });
        }

        let mut entries = IndexMap::new();
        let mut total_spans = 0usize;
        for (payload, labels) in parsed {
            let mut labels = labels.into_iter();
            let Some(first) = labels.next() else {
                log::debug!("Skipping span group payload with no labels");
                continue;
            };
            let group = SpanGroup::from_bytes(doc, &payload)?;
            let materialized = group.len().saturating_mul(labels.len() + 1);
            total_spans = self.check_span_total(total_spans, materialized)?;

            entries.insert(first, group.clone());
            for label in labels {
                entries.insert(label, group.copy());
            }
        }

        Ok((entries, DecodeReport::new(WireFormat::LabelMap)))
    }

    /// v1: `[payload, ...]`, labelled by each group's name. The first group
    /// with a given name wins.
    fn decode_legacy_list(
        &self,
        doc: &Doc,
        items: Vec<Value>,
    ) -> Result<(IndexMap<String, SpanGroup>, DecodeReport), SpanGroupsError> {
        self.check_group_count(items.len())?;

        let mut entries: IndexMap<String, SpanGroup> = IndexMap::new();
        let mut report = DecodeReport::new(WireFormat::LegacyList);
        let mut total_spans = 0usize;
        for item in items {
            let payload = match item {
                Value::Bytes(payload) => payload,
                other => {
                    return Err(SpanGroupsError::MalformedEntry(format!(
                        "list item must be bytes, got {}",
                        value_kind(&other)
                    )))
                }
            };
            let group = SpanGroup::from_bytes(doc, &payload)?;
            total_spans = self.check_span_total(total_spans, group.len())?;
            let name = group.name();
            if let Some(kept) = entries.get(&name) {
                log::warn!(
                    "Span groups payload has more than one group named {:?}; keeping the first ({} spans), dropping one with {} spans",
                    name,
                    kept.len(),
                    group.len()
                );
                report.collisions.push(name);
                continue;
            }
            entries.insert(name, group);
        }

        Ok((entries, report))
    }

    /// Add `more` materialized spans to `total`, failing past the configured max.
    fn check_span_total(&self, total: usize, more: usize) -> Result<usize, SpanGroupsError> {
        let total = total.saturating_add(more);
        if total > self.config.max_total_spans {
            return Err(SpanGroupsError::TooManySpans {
                count: total,
                max: self.config.max_total_spans,
            });
        }
        Ok(total)
    }

    fn check_group_count(&self, count: usize) -> Result<(), SpanGroupsError> {
        if count > self.config.max_groups {
            return Err(SpanGroupsError::TooManyGroups {
                count,
                max: self.config.max_groups,
            });
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a SpanGroups {
    type Item = (&'a String, &'a SpanGroup);
    type IntoIter = indexmap::map::Iter<'a, String, SpanGroup>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

fn decode_labels(value: Value) -> Result<Vec<String>, SpanGroupsError> {
    let items = match value {
        Value::Array(items) => items,
        other => {
            return Err(SpanGroupsError::MalformedEntry(format!(
                "labels must be an array, got {}",
                value_kind(&other)
            )))
        }
    };
    items
        .into_iter()
        .map(|item| match item {
            Value::Text(label) => Ok(label),
            other => Err(SpanGroupsError::MalformedEntry(format!(
                "label must be text, got {}",
                value_kind(&other)
            ))),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
