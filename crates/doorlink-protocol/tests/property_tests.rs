//! Property-based tests for decoder and normalizer totality.
//!
//! Whatever arrives over the wire, decoding must produce a message and
//! normalization must produce a status, without panicking.

use doorlink_core::CanonicalStatus;
use doorlink_protocol::{InboundMessage, classify, decode_datagram, decode_line, normalize};
use proptest::prelude::*;

/// Strategy for generating single wire tokens (no whitespace).
fn wire_token() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Za-z0-9_,=]{1,12}").expect("Failed to create token regex strategy")
}

proptest! {
    /// Property: decoding arbitrary text never panics and keeps the trimmed line.
    #[test]
    fn prop_decode_is_total(line in ".{0,200}") {
        let msg = decode_line(&line);
        prop_assert_eq!(msg.raw(), line.trim());
    }

    /// Property: payloads that are not valid UTF-8 only ever decode as RAW.
    #[test]
    fn prop_non_utf8_is_raw(bytes in prop::collection::vec(any::<u8>(), 0..200)) {
        let msg = decode_datagram(&bytes);
        if std::str::from_utf8(&bytes).is_err() {
            prop_assert!(matches!(msg, InboundMessage::Raw { .. }), "expected Raw, got {:?}", msg);
        }
    }

    /// Property: a well-formed FEEDBACK always decodes with its correlation id.
    #[test]
    fn prop_feedback_roundtrip(
        module in wire_token(),
        id in 1u64..=u64::MAX,
        target in wire_token(),
        action in wire_token(),
    ) {
        let line = format!("{module} FEEDBACK {id} {target} {action}\n");
        match decode_line(&line) {
            InboundMessage::Feedback { module: m, correlation_id, target: t, raw_action, .. } => {
                prop_assert_eq!(m.as_str(), module.as_str());
                prop_assert_eq!(correlation_id.as_u64(), id);
                prop_assert_eq!(t.as_str(), target.as_str());
                prop_assert_eq!(raw_action, action);
            }
            other => prop_assert!(false, "expected feedback, got {:?}", other),
        }
    }

    /// Property: the normalizer is case-insensitive and whitespace-insensitive.
    #[test]
    fn prop_normalize_ignores_case_and_padding(raw in "[A-Za-z_, ]{0,30}") {
        let padded = format!("  {}  ", raw.to_lowercase());
        prop_assert_eq!(normalize(&padded), normalize(&raw.to_uppercase()));
    }

    /// Property: text without any known token never resolves to a lock state.
    #[test]
    fn prop_unrelated_text_is_unknown(raw in "[0-9xyz ]{0,30}") {
        prop_assert_eq!(classify(&raw).status, CanonicalStatus::Unknown);
    }
}
