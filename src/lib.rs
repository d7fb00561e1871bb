//! # Span Groups
//!
//! **Labelled span annotations for tokenized documents, with a versioned,
//! dedup-aware binary format.**
//!
//! A [`Doc`] owns a [`SpanGroups`] container that maps string labels to
//! [`SpanGroup`]s. One group may be stored under several labels; the
//! container writes each shared payload once and reads back both the current
//! label-map encoding and the older list encoding.
//!
//! ## Quick Start
//!
//! ```rust
//! use span_groups::{Doc, Span, SpanGroups};
//!
//! let doc = Doc::new(["Will", "it", "blend", "?"]);
//! doc.spans_mut().put("verbs", vec![Span::new(2, 3, "VERB")]).unwrap();
//!
//! let bytes = doc.spans().to_bytes().unwrap();
//! let mut restored = SpanGroups::new(&doc);
//! restored.from_bytes(&bytes).unwrap();
//! assert_eq!(restored.get("verbs").unwrap().len(), 1);
//! ```
//!
//! ## Architecture
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`spans`] | Documents, span groups, the labelled container, CBOR codec, limits |

// Crate-level lint configuration — suppress stylistic warnings that don't affect correctness.
#![allow(
    clippy::empty_line_after_doc_comments,
    clippy::doc_lazy_continuation,
    clippy::wrong_self_convention
)]

// ── Public modules ──────────────────────────────────────────────────────────

/// Documents, span groups, and the versioned span group container.
pub mod spans;

// ── Re-exports for convenience ──────────────────────────────────────────────

pub use spans::{
    DecodeReport, Doc, DocError, DocId, DocRef, GroupError, GroupValue, GroupingPolicy, Span,
    SpanGroup, SpanGroups, SpanGroupsConfig, SpanGroupsError, WireFormat,
};

// ── Library metadata ────────────────────────────────────────────────────────

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Returns the crate version string.
pub fn version() -> &'static str {
    VERSION
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
        assert!(version().contains('.'));
    }

    #[test]
    fn test_doc_spans_roundtrip_via_reexports() {
        let doc = Doc::new(["Will", "it", "blend", "?"]);
        doc.spans_mut()
            .put("test", vec![Span::new(0, 1, "")])
            .expect("put");

        let bytes = doc.spans().to_bytes().expect("encode");
        let copy = doc.spans().copy(None).expect("copy");
        assert_eq!(copy.len(), 1);

        doc.spans_mut().from_bytes(&bytes).expect("decode");
        assert_eq!(doc.spans().len(), 1);
        assert_eq!(doc.spans().get("test").unwrap().name(), "test");
    }
}
