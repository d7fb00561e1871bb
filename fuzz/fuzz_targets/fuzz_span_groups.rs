#![no_main]
use libfuzzer_sys::fuzz_target;
use span_groups::{Doc, SpanGroups};

fuzz_target!(|data: &[u8]| {
    let doc = Doc::new(["Will", "it", "blend", "?"]);
    let mut spans = SpanGroups::new(&doc);

    // Decoding arbitrary data — must not panic
    if spans.from_bytes(data).is_err() {
        assert!(spans.is_empty(), "Failed decode must leave the container empty");
        return;
    }

    // Anything that decoded must re-encode and decode to the same labels
    let bytes = spans.to_bytes().expect("Decoded container must encode");
    let mut again = SpanGroups::new(&doc);
    again.from_bytes(&bytes).expect("Valid encoding must decode");
    assert_eq!(again.len(), spans.len());
    for (label, group) in &spans {
        let restored = again.get(label).expect("Label lost in round-trip");
        assert!(restored.same_content(group), "Round-trip mismatch");
    }
});
