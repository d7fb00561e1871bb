/// Span group decode guardrails.
///
/// These constants seed `SpanGroupsConfig::default()`. Together they bound
/// what one `from_bytes` call will build from untrusted input: the payload
/// size, the number of payloads, the number of labels (each v2 label beyond
/// the first is a full copy), and the spans held across all of them.

/// Max size of a serialized `SpanGroups` payload.
pub const MAX_ENCODED_BYTES: usize = 64 * 1024 * 1024; // 64 MB

/// Max number of distinct group payloads in one serialized container.
pub const MAX_GROUPS: usize = 100_000;

/// Max number of labels attached to one group payload (v2 format).
pub const MAX_LABELS_PER_GROUP: usize = 10_000;

/// Max number of labels across one serialized container.
pub const MAX_TOTAL_LABELS: usize = 100_000;

/// Max spans materialized by one decode, counting every per-label copy.
pub const MAX_TOTAL_SPANS: usize = 10_000_000;

/// Payload size check result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadLimitStatus {
    /// Within limits.
    Ok,
    /// Payload exceeds the configured maximum; reject without decoding.
    TooLarge,
}

/// Check a payload length against a maximum.
pub fn check_payload_limit(len: usize, max: usize) -> PayloadLimitStatus {
    if len > max {
        PayloadLimitStatus::TooLarge
    } else {
        PayloadLimitStatus::Ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_limit_ok() {
        assert_eq!(check_payload_limit(0, MAX_ENCODED_BYTES), PayloadLimitStatus::Ok);
        assert_eq!(
            check_payload_limit(MAX_ENCODED_BYTES, MAX_ENCODED_BYTES),
            PayloadLimitStatus::Ok
        );
    }

    #[test]
    fn test_payload_limit_too_large() {
        assert_eq!(
            check_payload_limit(MAX_ENCODED_BYTES + 1, MAX_ENCODED_BYTES),
            PayloadLimitStatus::TooLarge
        );
        assert_eq!(check_payload_limit(10, 9), PayloadLimitStatus::TooLarge);
    }
}
