/// Identity types for documents and their span groups.
///
/// - `DocId`: process-unique document identity, stable for the document's
///   whole lifetime and still comparable after it is dropped

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_DOC_ID: AtomicU64 = AtomicU64::new(1);

// ---------------------------------------------------------------------------
// DocId
// ---------------------------------------------------------------------------

/// Stable document identity.
///
/// Ownership checks compare `DocId`s, never document contents: two documents
/// with identical tokens are still different owners.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DocId(u64);

impl DocId {
    /// Allocate a fresh identity. Never returns the same value twice.
    pub(crate) fn next() -> Self {
        DocId(NEXT_DOC_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Return the raw value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Debug for DocId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DocId({})", self.0)
    }
}

impl fmt::Display for DocId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "doc#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doc_ids_unique() {
        let a = DocId::next();
        let b = DocId::next();
        assert_ne!(a, b);
        assert!(b > a);
    }

    #[test]
    fn test_doc_id_display() {
        let id = DocId(7);
        assert_eq!(id.to_string(), "doc#7");
        assert_eq!(format!("{:?}", id), "DocId(7)");
    }
}
