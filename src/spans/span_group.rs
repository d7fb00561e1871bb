/// Spans and span groups.
///
/// A `SpanGroup` is a named, ordered collection of token spans bound to one
/// `Doc`. The handle is shared: cloning it aliases the same group (edits are
/// visible through every clone), while `copy()` produces an independent group
/// with equal content.
///
/// Wire form: CBOR map `{ name, attrs, spans }` via ciborium.
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::spans::codec::{cbor_decode, cbor_encode, CodecError};
use crate::spans::doc::{Doc, DocRef};
use crate::spans::ids::DocId;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Error, Debug)]
pub enum GroupError {
    #[error("Span [{start}, {end}) out of bounds for document of length {len}")]
    SpanOutOfBounds { start: usize, end: usize, len: usize },

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),
}

// ---------------------------------------------------------------------------
// Span
// ---------------------------------------------------------------------------

/// Token range `[start, end)` with an optional label (empty string if none).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    #[serde(default)]
    pub label: String,
}

impl Span {
    pub fn new(start: usize, end: usize, label: &str) -> Self {
        Span {
            start,
            end,
            label: label.to_string(),
        }
    }

    /// Number of tokens covered.
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True if the span is well-formed and ends within `doc_len` tokens.
    pub fn fits(&self, doc_len: usize) -> bool {
        self.start <= self.end && self.end <= doc_len
    }
}

// ---------------------------------------------------------------------------
// SpanGroup
// ---------------------------------------------------------------------------

struct GroupData {
    doc: DocRef,
    /// Token count of the owning doc; tokens never change after creation.
    doc_len: usize,
    name: String,
    attrs: BTreeMap<String, String>,
    spans: Vec<Span>,
}

#[derive(Serialize)]
struct GroupRecordRef<'a> {
    name: &'a str,
    attrs: &'a BTreeMap<String, String>,
    spans: &'a [Span],
}

#[derive(Deserialize)]
struct GroupRecord {
    name: String,
    #[serde(default)]
    attrs: BTreeMap<String, String>,
    spans: Vec<Span>,
}

/// Shared handle to a named group of spans owned by one `Doc`.
#[derive(Clone)]
pub struct SpanGroup {
    inner: Rc<RefCell<GroupData>>,
}

impl SpanGroup {
    /// Create a group on `doc`. Every span must lie within the document.
    pub fn new<I>(doc: &Doc, name: &str, spans: I) -> Result<Self, GroupError>
    where
        I: IntoIterator<Item = Span>,
    {
        let group = Self::empty(doc, name);
        group.extend(spans)?;
        Ok(group)
    }

    /// Create a group with no spans.
    pub fn empty(doc: &Doc, name: &str) -> Self {
        Self::from_parts(doc.downgrade(), doc.len(), name.to_string(), BTreeMap::new(), Vec::new())
    }

    fn from_parts(
        doc: DocRef,
        doc_len: usize,
        name: String,
        attrs: BTreeMap<String, String>,
        spans: Vec<Span>,
    ) -> Self {
        SpanGroup {
            inner: Rc::new(RefCell::new(GroupData {
                doc,
                doc_len,
                name,
                attrs,
                spans,
            })),
        }
    }

    pub fn name(&self) -> String {
        self.inner.borrow().name.clone()
    }

    pub fn set_name(&self, name: &str) {
        self.inner.borrow_mut().name = name.to_string();
    }

    pub fn attr(&self, key: &str) -> Option<String> {
        self.inner.borrow().attrs.get(key).cloned()
    }

    pub fn set_attr(&self, key: &str, value: &str) {
        self.inner
            .borrow_mut()
            .attrs
            .insert(key.to_string(), value.to_string());
    }

    pub fn attrs(&self) -> BTreeMap<String, String> {
        self.inner.borrow().attrs.clone()
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.borrow().spans.is_empty()
    }

    /// Snapshot of the spans, in order.
    pub fn spans(&self) -> Vec<Span> {
        self.inner.borrow().spans.clone()
    }

    pub fn span(&self, i: usize) -> Option<Span> {
        self.inner.borrow().spans.get(i).cloned()
    }

    /// Append a span. Rejected if it does not fit the owning document.
    pub fn push(&self, span: Span) -> Result<(), GroupError> {
        let mut data = self.inner.borrow_mut();
        if !span.fits(data.doc_len) {
            return Err(GroupError::SpanOutOfBounds {
                start: span.start,
                end: span.end,
                len: data.doc_len,
            });
        }
        data.spans.push(span);
        Ok(())
    }

    /// Append spans in order, stopping at the first that does not fit.
    pub fn extend<I>(&self, spans: I) -> Result<(), GroupError>
    where
        I: IntoIterator<Item = Span>,
    {
        for span in spans {
            self.push(span)?;
        }
        Ok(())
    }

    /// Identity of the owning document.
    pub fn owner(&self) -> DocId {
        self.inner.borrow().doc.id()
    }

    /// Weak reference to the owning document.
    pub fn doc_ref(&self) -> DocRef {
        self.inner.borrow().doc.clone()
    }

    /// The owning document, if it is still alive.
    pub fn doc(&self) -> Option<Doc> {
        self.inner.borrow().doc.upgrade()
    }

    /// True if both handles are the same group instance.
    pub fn ptr_eq(&self, other: &SpanGroup) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Address of the shared group data; equal for aliased handles only.
    /// Valid as a key only while the group is alive.
    pub(crate) fn instance_id(&self) -> usize {
        Rc::as_ptr(&self.inner) as usize
    }

    /// True if both groups have equal name, attrs, and spans.
    pub fn same_content(&self, other: &SpanGroup) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        let a = self.inner.borrow();
        let b = other.inner.borrow();
        a.name == b.name && a.attrs == b.attrs && a.spans == b.spans
    }

    /// Independent group with the same owner and content.
    pub fn copy(&self) -> SpanGroup {
        let data = self.inner.borrow();
        Self::from_parts(
            data.doc.clone(),
            data.doc_len,
            data.name.clone(),
            data.attrs.clone(),
            data.spans.clone(),
        )
    }

    // -----------------------------------------------------------------------
    // Serialization
    // -----------------------------------------------------------------------

    /// Serialize name, attrs, and spans. The owner is not part of the payload.
    pub fn to_bytes(&self) -> Result<Vec<u8>, GroupError> {
        let data = self.inner.borrow();
        let record = GroupRecordRef {
            name: &data.name,
            attrs: &data.attrs,
            spans: &data.spans,
        };
        Ok(cbor_encode(&record)?)
    }

    /// Decode a group and bind it to `doc`.
    pub fn from_bytes(doc: &Doc, bytes: &[u8]) -> Result<SpanGroup, GroupError> {
        let record: GroupRecord = cbor_decode(bytes)?;
        let group = Self::from_parts(
            doc.downgrade(),
            doc.len(),
            record.name,
            record.attrs,
            Vec::with_capacity(record.spans.len()),
        );
        group.extend(record.spans)?;
        Ok(group)
    }
}

impl fmt::Debug for SpanGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.inner.borrow();
        f.debug_struct("SpanGroup")
            .field("name", &data.name)
            .field("doc", &data.doc.id())
            .field("spans", &data.spans.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
