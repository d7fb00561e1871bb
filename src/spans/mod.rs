/// Span group system — labelled span annotations owned by a document.
///
/// A `Doc` owns one `SpanGroups` container mapping labels to `SpanGroup`s.
/// The container persists itself through a CBOR wire format that dedups
/// shared payloads and still reads the older list-shaped encoding.
///
/// # Module structure
/// - `ids` — DocId identity type
/// - `doc` — Doc and its weak back-reference DocRef
/// - `span_group` — Span, SpanGroup and the group payload codec
/// - `groups` — SpanGroups container, grouping policy, versioned encode/decode
/// - `codec` — CBOR helpers and the empty-payload sentinel
/// - `limits` — Decode guardrail constants
pub mod codec;
pub mod doc;
pub mod groups;
pub mod ids;
pub mod limits;
pub mod span_group;

// Re-export core types for convenience
pub use codec::{cbor_decode, cbor_encode, CodecError, EMPTY_BYTES};
pub use doc::{Doc, DocError, DocRef};
pub use groups::{
    DecodeReport, GroupValue, GroupingPolicy, SpanGroups, SpanGroupsConfig, SpanGroupsError,
    WireFormat,
};
pub use ids::DocId;
pub use limits::{check_payload_limit, PayloadLimitStatus};
pub use span_group::{GroupError, Span, SpanGroup};
