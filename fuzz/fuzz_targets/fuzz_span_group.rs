#![no_main]
use libfuzzer_sys::fuzz_target;
use span_groups::{Doc, SpanGroup};

fuzz_target!(|data: &[u8]| {
    let doc = Doc::new(["a", "b", "c", "d", "e", "f", "g", "h"]);

    // Try decoding arbitrary data — must not panic
    if let Ok(group) = SpanGroup::from_bytes(&doc, data) {
        assert_eq!(group.owner(), doc.id());
        assert!(group.spans().iter().all(|span| span.fits(doc.len())));

        let bytes = group.to_bytes().expect("Decoded group must encode");
        let restored = SpanGroup::from_bytes(&doc, &bytes).expect("Valid encoding must decode");
        assert!(restored.same_content(&group), "Round-trip mismatch");
    }
});
