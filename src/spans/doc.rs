/// Owning document for span groups.
///
/// A `Doc` is a cheap handle over shared, immutable tokens plus the document's
/// own `SpanGroups`. Groups and containers refer back to it through `DocRef`,
/// which observes the document without keeping it alive.
use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::{Rc, Weak};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::spans::codec::{cbor_decode, cbor_encode, CodecError};
use crate::spans::groups::{SpanGroups, SpanGroupsConfig, SpanGroupsError};
use crate::spans::ids::DocId;
use crate::spans::span_group::Span;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Error, Debug)]
pub enum DocError {
    #[error("Span [{start}, {end}) out of bounds for document of length {len}")]
    SpanOutOfBounds { start: usize, end: usize, len: usize },

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Span groups error: {0}")]
    SpanGroups(#[from] SpanGroupsError),
}

// ---------------------------------------------------------------------------
// Doc
// ---------------------------------------------------------------------------

pub(crate) struct DocInner {
    id: DocId,
    tokens: Vec<String>,
    spans: RefCell<SpanGroups>,
}

/// A tokenized document that owns a set of span groups.
///
/// `Clone` shares the same document (same `DocId`).
#[derive(Clone)]
pub struct Doc {
    inner: Rc<DocInner>,
}

/// Serialized document form: tokens plus the `SpanGroups` payload.
#[derive(Serialize, Deserialize)]
struct DocRecord {
    tokens: Vec<String>,
    #[serde(with = "serde_bytes")]
    spans: Vec<u8>,
}

impl Doc {
    /// Create a document from its tokens, with default span group config.
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_config(tokens, SpanGroupsConfig::default())
    }

    /// Create a document whose span groups use `config`.
    pub fn with_config<I, S>(tokens: I, config: SpanGroupsConfig) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let id = DocId::next();
        let tokens: Vec<String> = tokens.into_iter().map(Into::into).collect();
        let inner = Rc::new_cyclic(|weak| DocInner {
            id,
            tokens,
            spans: RefCell::new(SpanGroups::bound_to(
                DocRef {
                    id,
                    inner: weak.clone(),
                },
                config,
            )),
        });
        Doc { inner }
    }

    pub fn id(&self) -> DocId {
        self.inner.id
    }

    /// Number of tokens.
    pub fn len(&self) -> usize {
        self.inner.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.tokens.is_empty()
    }

    pub fn tokens(&self) -> &[String] {
        &self.inner.tokens
    }

    pub fn token(&self, i: usize) -> Option<&str> {
        self.inner.tokens.get(i).map(String::as_str)
    }

    /// Non-owning reference to this document.
    pub fn downgrade(&self) -> DocRef {
        DocRef {
            id: self.inner.id,
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// True if both handles point at the same document.
    pub fn ptr_eq(&self, other: &Doc) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Build a bounds-checked span over tokens `[start, end)`.
    pub fn span(&self, start: usize, end: usize, label: &str) -> Result<Span, DocError> {
        let span = Span::new(start, end, label);
        self.check_span(&span)?;
        Ok(span)
    }

    /// Verify that `span` lies within this document.
    pub fn check_span(&self, span: &Span) -> Result<(), DocError> {
        if !span.fits(self.len()) {
            return Err(DocError::SpanOutOfBounds {
                start: span.start,
                end: span.end,
                len: self.len(),
            });
        }
        Ok(())
    }

    /// Text covered by `span`, tokens joined by single spaces.
    pub fn span_text(&self, span: &Span) -> Option<String> {
        self.inner
            .tokens
            .get(span.start..span.end)
            .map(|tokens| tokens.join(" "))
    }

    /// The document's span groups.
    ///
    /// # Panics
    /// If `spans_mut()` is currently borrowed.
    pub fn spans(&self) -> Ref<'_, SpanGroups> {
        self.inner.spans.borrow()
    }

    /// Mutable access to the document's span groups.
    ///
    /// # Panics
    /// If `spans()` or `spans_mut()` is currently borrowed.
    pub fn spans_mut(&self) -> RefMut<'_, SpanGroups> {
        self.inner.spans.borrow_mut()
    }

    // -----------------------------------------------------------------------
    // Serialization
    // -----------------------------------------------------------------------

    /// Serialize tokens and span groups.
    pub fn to_bytes(&self) -> Result<Vec<u8>, DocError> {
        let record = DocRecord {
            tokens: self.inner.tokens.clone(),
            spans: self.spans().to_bytes()?,
        };
        Ok(cbor_encode(&record)?)
    }

    /// Restore a document from `to_bytes` output, with default span group
    /// config.
    ///
    /// The result is a new document with a new `DocId`; its span groups are
    /// bound to it. The config is not part of the record, so a document built
    /// with `with_config` needs `from_bytes_with_config` to keep it.
    pub fn from_bytes(bytes: &[u8]) -> Result<Doc, DocError> {
        Self::from_bytes_with_config(bytes, SpanGroupsConfig::default())
    }

    /// Restore a document whose span groups use `config`. Its decode limits
    /// apply to the stored span groups.
    pub fn from_bytes_with_config(bytes: &[u8], config: SpanGroupsConfig) -> Result<Doc, DocError> {
        let record: DocRecord = cbor_decode(bytes)?;
        let doc = Doc::with_config(record.tokens, config);
        doc.spans_mut().from_bytes(&record.spans)?;
        Ok(doc)
    }
}

impl fmt::Debug for Doc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Doc")
            .field("id", &self.inner.id)
            .field("tokens", &self.inner.tokens.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// DocRef
// ---------------------------------------------------------------------------

/// Weak back-reference to a `Doc`.
///
/// The `DocId` is kept alongside the weak pointer so ownership can still be
/// compared after the document is gone.
#[derive(Clone)]
pub struct DocRef {
    id: DocId,
    inner: Weak<DocInner>,
}

impl DocRef {
    pub fn id(&self) -> DocId {
        self.id
    }

    /// Resolve to a live document, or `None` if it has been dropped.
    pub fn upgrade(&self) -> Option<Doc> {
        self.inner.upgrade().map(|inner| Doc { inner })
    }

    pub fn is_alive(&self) -> bool {
        self.inner.strong_count() > 0
    }

    /// True if `doc` is the document this reference points at.
    pub fn refers_to(&self, doc: &Doc) -> bool {
        self.id == doc.id()
    }
}

impl fmt::Debug for DocRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DocRef({}, alive={})", self.id, self.is_alive())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spans::groups::GroupingPolicy;
    use crate::spans::span_group::SpanGroup;

    fn blend() -> Doc {
        Doc::new(["Will", "it", "blend", "?"])
    }

    #[test]
    fn test_doc_basics() {
        let doc = blend();
        assert_eq!(doc.len(), 4);
        assert!(!doc.is_empty());
        assert_eq!(doc.token(2), Some("blend"));
        assert_eq!(doc.token(4), None);
        assert!(doc.spans().is_empty());
    }

    #[test]
    fn test_clone_shares_identity() {
        let doc = blend();
        let other = doc.clone();
        assert!(doc.ptr_eq(&other));
        assert_eq!(doc.id(), other.id());

        let fresh = blend();
        assert!(!doc.ptr_eq(&fresh));
        assert_ne!(doc.id(), fresh.id());
    }

    #[test]
    fn test_doc_ref_does_not_keep_doc_alive() {
        let doc = blend();
        let weak = doc.downgrade();
        assert!(weak.is_alive());
        assert!(weak.upgrade().unwrap().ptr_eq(&doc));
        assert!(weak.refers_to(&doc));

        let id = doc.id();
        drop(doc);
        assert!(!weak.is_alive());
        assert!(weak.upgrade().is_none());
        assert_eq!(weak.id(), id);
    }

    #[test]
    fn test_span_bounds_checked() {
        let doc = blend();
        let span = doc.span(1, 3, "").unwrap();
        assert_eq!(doc.span_text(&span).as_deref(), Some("it blend"));
        assert!(doc.span(0, 4, "").is_ok());

        match doc.span(2, 5, "") {
            Err(DocError::SpanOutOfBounds { start, end, len }) => {
                assert_eq!((start, end, len), (2, 5, 4));
            }
            other => panic!("Expected SpanOutOfBounds, got: {:?}", other),
        }
        assert!(doc.span(3, 2, "").is_err());
    }

    #[test]
    fn test_doc_spans_bound_to_doc() {
        let doc = blend();
        let spans = vec![doc.span(0, 1, "").unwrap()];
        doc.spans_mut().put("test", spans).unwrap();

        let group = doc.spans().get("test").cloned().unwrap();
        assert_eq!(group.owner(), doc.id());
        assert_eq!(group.name(), "test");
        assert!(doc.spans().doc().refers_to(&doc));
    }

    #[test]
    fn test_doc_bytes_roundtrip() {
        let doc = blend();
        let g1 = SpanGroup::new(&doc, "test", vec![doc.span(0, 1, "").unwrap()]).unwrap();
        let g2 = SpanGroup::new(&doc, "test", vec![doc.span(1, 2, "").unwrap()]).unwrap();
        doc.spans_mut().put("test", g1).unwrap();
        doc.spans_mut().put("test2", g2).unwrap();

        let bytes = doc.to_bytes().unwrap();
        let restored = Doc::from_bytes(&bytes).unwrap();

        assert_ne!(restored.id(), doc.id());
        assert_eq!(restored.tokens(), doc.tokens());
        let spans = restored.spans();
        assert_eq!(spans.len(), 2);
        assert_eq!(spans.get("test").unwrap().name(), "test");
        assert_eq!(spans.get("test2").unwrap().name(), "test");
        assert_eq!(spans.get("test").unwrap().spans(), vec![Span::new(0, 1, "")]);
        assert_eq!(spans.get("test2").unwrap().spans(), vec![Span::new(1, 2, "")]);
        assert_eq!(spans.get("test").unwrap().owner(), restored.id());
    }

    #[test]
    fn test_doc_from_bytes_with_config_keeps_config() {
        let config = SpanGroupsConfig {
            grouping: GroupingPolicy::ByInstance,
            ..SpanGroupsConfig::default()
        };
        let doc = Doc::with_config(["Will", "it", "blend", "?"], config);
        doc.spans_mut().put("a", vec![Span::new(0, 1, "")]).unwrap();
        let bytes = doc.to_bytes().unwrap();

        let restored = Doc::from_bytes_with_config(&bytes, config).unwrap();
        assert_eq!(restored.spans().config().grouping, GroupingPolicy::ByInstance);
        assert_eq!(restored.spans().len(), 1);

        let defaulted = Doc::from_bytes(&bytes).unwrap();
        assert_eq!(defaulted.spans().config().grouping, GroupingPolicy::ByContent);
    }

    #[test]
    fn test_doc_from_bytes_with_config_applies_limits() {
        let doc = blend();
        doc.spans_mut().put("a", vec![Span::new(0, 1, "")]).unwrap();
        doc.spans_mut().put("b", vec![Span::new(1, 2, "")]).unwrap();
        let bytes = doc.to_bytes().unwrap();

        let config = SpanGroupsConfig {
            max_groups: 1,
            ..SpanGroupsConfig::default()
        };
        assert!(matches!(
            Doc::from_bytes_with_config(&bytes, config),
            Err(DocError::SpanGroups(SpanGroupsError::TooManyGroups { count: 2, max: 1 }))
        ));
    }

    #[test]
    fn test_doc_from_bytes_garbage_fails() {
        assert!(matches!(
            Doc::from_bytes(&[0xFF, 0x00, 0x13]),
            Err(DocError::Codec(_))
        ));
    }
}
