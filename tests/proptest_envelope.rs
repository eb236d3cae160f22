//! Property-based tests for envelope framing and payload shapes.

use proptest::prelude::*;
use rendezvous_core::channel::{Envelope, LocationFix, Payload};

/// Strategy for in-range location payloads.
fn location_strategy() -> impl Strategy<Value = Payload> {
    (-90.0f64..=90.0, -180.0f64..=180.0)
        .prop_map(|(lat, lon)| Payload::Location(LocationFix { lat, lon }))
}

/// Strategy for identity payloads with plausible display names.
fn identity_strategy() -> impl Strategy<Value = Payload> {
    "[a-zA-Z0-9_ ]{1,40}".prop_map(|name| Payload::Identity { name })
}

/// Strategy for message payloads, unicode included.
fn message_strategy() -> impl Strategy<Value = Payload> {
    ".{0,200}".prop_map(|text| Payload::Message { text })
}

fn payload_strategy() -> impl Strategy<Value = Payload> {
    prop_oneof![location_strategy(), identity_strategy(), message_strategy()]
}

proptest! {
    /// Property: every payload survives serialization to the
    /// presentation-layer JSON shape and back.
    #[test]
    fn payload_json_roundtrip(payload in payload_strategy()) {
        let json = serde_json::to_string(&payload).expect("serialization should succeed");
        let back: Payload = serde_json::from_str(&json).expect("deserialization should succeed");
        prop_assert_eq!(back, payload);
    }

    /// Property: the serialized form always carries the kind tag the
    /// channel dispatches on.
    #[test]
    fn payload_json_carries_kind_tag(payload in payload_strategy()) {
        let json = serde_json::to_string(&payload).expect("serialization should succeed");
        let tag = format!(r#""kind":"{}""#, payload.kind());
        prop_assert!(json.contains(&tag));
    }

    /// Property: arbitrary junk frames never panic the parser; they
    /// either parse as an envelope or fail as malformed.
    #[test]
    fn arbitrary_frames_never_panic(frame in ".{0,500}") {
        let _ = Envelope::from_frame(&frame);
    }

    /// Property: an envelope frame round-trips losslessly.
    #[test]
    fn envelope_frame_roundtrip(
        iv in "[A-Za-z0-9+/]{16}",
        ciphertext in "[A-Za-z0-9+/]{24,64}",
    ) {
        let frame = format!(
            r#"{{"type":"message","iv":"{iv}","ciphertext":"{ciphertext}"}}"#
        );
        let envelope = Envelope::from_frame(&frame).expect("frame should parse");
        let reframed = envelope.to_frame().expect("frame should serialize");
        let reparsed = Envelope::from_frame(&reframed).expect("reframed should parse");
        prop_assert_eq!(reparsed, envelope);
    }

    /// Property: clamping construction always yields an in-range fix.
    #[test]
    fn location_fix_construction_is_always_in_range(
        lat in prop::num::f64::ANY,
        lon in prop::num::f64::ANY,
    ) {
        let fix = LocationFix::new(lat, lon);
        prop_assert!(fix.is_in_range());
    }
}
