//! # Digest and Canonical-Bytes Test Vectors
//!
//! Training request hashes are recomputed by clients and by the verifier, so
//! the canonical payload bytes and their SHA-256 must stay stable across
//! releases. These vectors pin both.

use chaintrain_core::{sha256_digest, CanonicalBytes, ContentDigest, DatasetId};
use proptest::prelude::*;

// ---------------------------------------------------------------------------
// Fixed vectors
// ---------------------------------------------------------------------------

#[test]
fn training_payload_canonical_form() {
    let root = ContentDigest::of(b"abc");
    let payload = serde_json::json!({ "input_data": root });
    let cb = CanonicalBytes::new(&payload).unwrap();
    assert_eq!(
        std::str::from_utf8(cb.as_bytes()).unwrap(),
        r#"{"input_data":"ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"}"#
    );
}

#[test]
fn empty_object_digest() {
    let cb = CanonicalBytes::new(&serde_json::json!({})).unwrap();
    assert_eq!(
        sha256_digest(&cb).to_hex(),
        "44136fa355b3678a1146ad16f7e8649e94fb4fc21fe77e8310c060f61caaff8a"
    );
}

#[test]
fn unicode_strings_are_not_escaped() {
    let cb = CanonicalBytes::new(&serde_json::json!({"name": "données"})).unwrap();
    assert_eq!(
        std::str::from_utf8(cb.as_bytes()).unwrap(),
        "{\"name\":\"données\"}"
    );
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn digest_hex_roundtrips(bytes in proptest::array::uniform32(any::<u8>())) {
        let d = ContentDigest::from_bytes(bytes);
        prop_assert_eq!(ContentDigest::from_hex(&d.to_hex()).unwrap(), d);
    }

    #[test]
    fn canonical_bytes_ignore_key_order(a in 0i64..1000, b in "[a-z]{0,12}") {
        let x = CanonicalBytes::new(&serde_json::json!({"a": a, "b": b})).unwrap();
        let y = CanonicalBytes::new(&serde_json::json!({"b": b, "a": a})).unwrap();
        prop_assert_eq!(x, y);
    }

    #[test]
    fn url_safe_ids_are_accepted(s in "[A-Za-z0-9_-]{1,128}") {
        prop_assert!(DatasetId::new(s).is_ok());
    }
}
