//! # Ed25519 Signing and Verification
//!
//! The registry signs every training record with its service key so that a
//! record's weights, request hash and timestamp cannot be altered after the
//! fact.
//!
//! ## Invariants
//!
//! - Signing input is `&CanonicalBytes`; raw bytes cannot be signed.
//! - Private keys are never serialized or logged. [`Ed25519KeyPair`] does not
//!   implement `Serialize`, and its seed is zeroized on drop.
//! - Public keys and signatures serialize as lowercase hex strings.

use chaintrain_core::{from_hex, to_hex, CanonicalBytes};
use ed25519_dalek::{Signer, Verifier};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use zeroize::Zeroize;

use crate::error::CryptoError;

/// The service signing key.
pub struct Ed25519KeyPair {
    signing_key: ed25519_dalek::SigningKey,
}

fn decode_fixed<const N: usize>(hex: &str, what: &str) -> Result<[u8; N], CryptoError> {
    let hex = hex.trim();
    if hex.len() != N * 2 {
        return Err(CryptoError::HexDecode(format!(
            "{what} hex must be {} chars, got {}",
            N * 2,
            hex.len()
        )));
    }
    let bytes = from_hex(hex).map_err(|e| CryptoError::HexDecode(e.to_string()))?;
    bytes
        .try_into()
        .map_err(|_| CryptoError::HexDecode(format!("{what} decoded to the wrong length")))
}

/// Fixed-width byte newtypes that travel as lowercase hex: serde, `Display`,
/// and a `Debug` that shows only the first four bytes.
macro_rules! hex_newtype {
    ($(#[$meta:meta])* $name:ident, $len:literal, $what:literal) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Hash)]
        pub struct $name(pub [u8; $len]);

        impl $name {
            /// Render as lowercase hex.
            pub fn to_hex(&self) -> String {
                to_hex(&self.0)
            }

            #[doc = concat!("Parse from ", stringify!($len), " bytes of hex.")]
            pub fn from_hex(hex: &str) -> Result<Self, CryptoError> {
                decode_fixed::<$len>(hex, $what).map(Self)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let text = <std::borrow::Cow<'de, str>>::deserialize(deserializer)?;
                Self::from_hex(&text).map_err(serde::de::Error::custom)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.to_hex())
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}({}..)", stringify!($name), to_hex(&self.0[..4]))
            }
        }
    };
}

hex_newtype!(
    /// Verifying half of the service key, as embedded in training records.
    Ed25519PublicKey,
    32,
    "public key"
);

hex_newtype!(
    /// Detached signature over a canonical training intent.
    Ed25519Signature,
    64,
    "signature"
);

impl Ed25519PublicKey {
    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Decompress into a dalek verifying key; fails for points off the curve.
    pub fn to_verifying_key(&self) -> Result<ed25519_dalek::VerifyingKey, CryptoError> {
        ed25519_dalek::VerifyingKey::from_bytes(&self.0)
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))
    }
}

impl Ed25519KeyPair {
    /// Fresh key from the OS RNG.
    pub fn generate() -> Self {
        Self {
            signing_key: ed25519_dalek::SigningKey::generate(&mut rand_core::OsRng),
        }
    }

    /// Deterministic key from a 32-byte seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing_key: ed25519_dalek::SigningKey::from_bytes(seed),
        }
    }

    /// Build from a 64-char hex seed (as supplied in `SIGNING_KEY_HEX`).
    pub fn from_seed_hex(hex: &str) -> Result<Self, CryptoError> {
        let mut seed = decode_fixed::<32>(hex, "signing key")?;
        let kp = Self::from_seed(&seed);
        seed.zeroize();
        Ok(kp)
    }

    /// Verifying half, as recorded next to each signature.
    pub fn public_key(&self) -> Ed25519PublicKey {
        Ed25519PublicKey(self.signing_key.verifying_key().to_bytes())
    }

    /// Sign a canonical payload. There is no way to sign raw bytes.
    pub fn sign(&self, data: &CanonicalBytes) -> Ed25519Signature {
        Ed25519Signature(self.signing_key.sign(data.as_bytes()).to_bytes())
    }
}

impl std::fmt::Debug for Ed25519KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ed25519KeyPair")
            .field("public_key", &self.public_key())
            .finish_non_exhaustive()
    }
}

/// Check `signature` over `data` against a public key taken from a record.
pub fn verify_with_public_key(
    data: &CanonicalBytes,
    signature: &Ed25519Signature,
    public_key: &Ed25519PublicKey,
) -> Result<(), CryptoError> {
    public_key
        .to_verifying_key()?
        .verify(
            data.as_bytes(),
            &ed25519_dalek::Signature::from_bytes(&signature.0),
        )
        .map_err(|e| CryptoError::VerificationFailed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canonical(v: serde_json::Value) -> CanonicalBytes {
        CanonicalBytes::new(&v).unwrap()
    }

    #[test]
    fn sign_and_verify() {
        let kp = Ed25519KeyPair::generate();
        let msg = canonical(serde_json::json!({"request_hash": "ab", "weights_bp": [1, 2]}));
        let sig = kp.sign(&msg);
        verify_with_public_key(&msg, &sig, &kp.public_key()).unwrap();
    }

    #[test]
    fn tampered_message_fails() {
        let kp = Ed25519KeyPair::generate();
        let sig = kp.sign(&canonical(serde_json::json!({"w": 1})));
        let err = verify_with_public_key(&canonical(serde_json::json!({"w": 2})), &sig, &kp.public_key());
        assert!(matches!(err, Err(CryptoError::VerificationFailed(_))));
    }

    #[test]
    fn wrong_key_fails() {
        let a = Ed25519KeyPair::generate();
        let b = Ed25519KeyPair::generate();
        let msg = canonical(serde_json::json!({"x": true}));
        assert!(verify_with_public_key(&msg, &a.sign(&msg), &b.public_key()).is_err());
    }

    #[test]
    fn seed_hex_is_deterministic() {
        let hex = "2a".repeat(32);
        let a = Ed25519KeyPair::from_seed_hex(&hex).unwrap();
        let b = Ed25519KeyPair::from_seed(&[0x2a; 32]);
        assert_eq!(a.public_key(), b.public_key());
    }

    #[test]
    fn bad_seed_hex_rejected() {
        assert!(Ed25519KeyPair::from_seed_hex("abcd").is_err());
        assert!(Ed25519KeyPair::from_seed_hex(&"zz".repeat(32)).is_err());
    }

    #[test]
    fn signature_and_key_hex_roundtrip() {
        let kp = Ed25519KeyPair::from_seed(&[7; 32]);
        let sig = kp.sign(&canonical(serde_json::json!({})));
        assert_eq!(Ed25519Signature::from_hex(&sig.to_hex()).unwrap(), sig);
        let pk = kp.public_key();
        let json = serde_json::to_string(&pk).unwrap();
        assert_eq!(json.len(), 66);
        assert_eq!(serde_json::from_str::<Ed25519PublicKey>(&json).unwrap(), pk);
    }

    #[test]
    fn debug_shows_only_public_prefix() {
        let kp = Ed25519KeyPair::from_seed(&[9; 32]);
        let shown = format!("{kp:?}");
        assert!(shown.starts_with("Ed25519KeyPair { public_key: Ed25519PublicKey("));
        assert!(!shown.contains(&"09".repeat(8)));
        assert!(!shown.contains(&kp.public_key().to_hex()));
    }
}
