//! Long-lived party identity: an Ed25519 signing keypair plus an X25519
//! exchange keypair.
//!
//! # Export format
//!
//! ```json
//! {
//!   "version": 1,
//!   "sign_public_key": "<b64>",
//!   "sign_private_key": "<b64 32-byte seed>",
//!   "exchange_public_key": "<b64>",
//!   "exchange_private_key": "<b64>"
//! }
//! ```
//!
//! Import re-derives both public keys from the private halves and rejects
//! a document whose stated public keys disagree.

use serde::{Deserialize, Serialize};
use tradeseal_crypto::ecdh::{X25519PublicKey, X25519StaticSecret};
use tradeseal_crypto::encoding::{b64_decode_fixed, b64_encode};
use tradeseal_crypto::hash::sha256;
use tradeseal_crypto::provider::CryptoProvider;
use tradeseal_crypto::signing::{Keypair, PublicKey};
use tradeseal_types::{Result, TradesealError};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// Current export document version.
pub const EXPORT_VERSION: u32 = 1;

/// Number of digest bytes shown in a fingerprint.
const FINGERPRINT_BYTES: usize = 8;

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// The local party's keys. Owned exclusively by the local user context.
pub struct Identity {
    signing: Keypair,
    exchange: X25519StaticSecret,
}

// Identity does not implement Clone/Debug to prevent leakage.

impl Identity {
    /// Draws a fresh signing keypair and a fresh exchange keypair.
    pub fn generate(provider: &dyn CryptoProvider) -> Self {
        Self {
            signing: provider.signing_keygen(),
            exchange: provider.exchange_keygen(),
        }
    }

    pub fn from_parts(signing: Keypair, exchange: X25519StaticSecret) -> Self {
        Self { signing, exchange }
    }

    pub fn signing(&self) -> &Keypair {
        &self.signing
    }

    pub fn exchange(&self) -> &X25519StaticSecret {
        &self.exchange
    }

    pub fn sign_public_key(&self) -> PublicKey {
        self.signing.public_key()
    }

    pub fn exchange_public_key(&self) -> X25519PublicKey {
        self.exchange.public_key()
    }

    /// Fingerprint of the signing public key.
    pub fn fingerprint(&self) -> String {
        fingerprint(self.signing.public_key().as_bytes())
    }

    /// Serializes the identity, private halves included.
    pub fn export_to_text(&self) -> Result<Zeroizing<String>> {
        let doc = ExportDocument {
            version: EXPORT_VERSION,
            sign_public_key: self.signing.public_key().to_base64(),
            sign_private_key: b64_encode(self.signing.seed_bytes().as_ref()),
            exchange_public_key: self.exchange.public_key().to_base64(),
            exchange_private_key: b64_encode(self.exchange.to_bytes().as_ref()),
        };
        serde_json::to_string_pretty(&doc)
            .map(Zeroizing::new)
            .map_err(|e| TradesealError::Validation {
                reason: format!("identity export failed: {e}"),
            })
    }

    /// Parses an exported document.
    ///
    /// # Errors
    ///
    /// [`TradesealError::Validation`] if the text is not a valid export
    /// document, a key is malformed, or a public key does not match its
    /// private key.
    pub fn import_from_text(text: &str) -> Result<Self> {
        let doc: ExportDocument =
            serde_json::from_str(text).map_err(|e| TradesealError::Validation {
                reason: format!("identity document is malformed: {e}"),
            })?;

        if doc.version != EXPORT_VERSION {
            return Err(TradesealError::Validation {
                reason: format!("unsupported identity version {}", doc.version),
            });
        }

        let seed = Zeroizing::new(b64_decode_fixed::<32>(
            &doc.sign_private_key,
            "sign_private_key",
        )?);
        let signing = Keypair::from_seed(&seed);
        let stated_sign = PublicKey::from_base64(&doc.sign_public_key)?;
        if signing.public_key() != stated_sign {
            return Err(TradesealError::Validation {
                reason: "sign_public_key does not match sign_private_key".into(),
            });
        }

        let raw = Zeroizing::new(b64_decode_fixed::<32>(
            &doc.exchange_private_key,
            "exchange_private_key",
        )?);
        let exchange = X25519StaticSecret::from_raw(*raw);
        let stated_exchange = X25519PublicKey::from_base64(&doc.exchange_public_key)?;
        if exchange.public_key() != stated_exchange {
            return Err(TradesealError::Validation {
                reason: "exchange_public_key does not match exchange_private_key".into(),
            });
        }

        Ok(Self { signing, exchange })
    }
}

#[derive(Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
struct ExportDocument {
    version: u32,
    sign_public_key: String,
    sign_private_key: String,
    exchange_public_key: String,
    exchange_private_key: String,
}

// ---------------------------------------------------------------------------
// Fingerprint
// ---------------------------------------------------------------------------

/// First 8 bytes of SHA-256 over a raw public key, as lowercase
/// colon-separated hex (`3f:a1:...`).
pub fn fingerprint(public_key: &[u8; 32]) -> String {
    sha256(public_key)[..FINGERPRINT_BYTES]
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(":")
}

/// Fingerprint of a base64 public key, or `None` if it does not decode
/// to 32 bytes.
pub fn fingerprint_b64(public_key_b64: &str) -> Option<String> {
    b64_decode_fixed::<32>(public_key_b64, "public key")
        .ok()
        .map(|bytes| fingerprint(&bytes))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tradeseal_crypto::provider::RustCryptoProvider;

    fn fixed() -> Identity {
        Identity::from_parts(
            Keypair::from_seed(&[0x42; 32]),
            X25519StaticSecret::from_raw([0x24; 32]),
        )
    }

    #[test]
    fn export_import_preserves_keys() -> std::result::Result<(), TradesealError> {
        let id = Identity::generate(&RustCryptoProvider);
        let text = id.export_to_text()?;
        let back = Identity::import_from_text(&text)?;
        assert_eq!(back.sign_public_key(), id.sign_public_key());
        assert_eq!(back.exchange_public_key(), id.exchange_public_key());
        assert_eq!(*back.signing().seed_bytes(), *id.signing().seed_bytes());
        Ok(())
    }

    #[test]
    fn missing_field_is_validation_error() {
        let result = Identity::import_from_text(r#"{"version":1,"sign_public_key":"AAAA"}"#);
        assert!(matches!(result, Err(TradesealError::Validation { .. })));
    }

    #[test]
    fn mismatched_public_key_rejected() -> std::result::Result<(), TradesealError> {
        let text = fixed().export_to_text()?;
        let mut value: serde_json::Value = serde_json::from_str(&text)
            .map_err(|e| TradesealError::Validation { reason: e.to_string() })?;
        value["sign_public_key"] =
            serde_json::Value::String(Keypair::from_seed(&[1; 32]).public_key().to_base64());

        let result = Identity::import_from_text(&value.to_string());
        assert!(matches!(result, Err(TradesealError::Validation { .. })));
        Ok(())
    }

    #[test]
    fn mismatched_exchange_key_rejected() -> std::result::Result<(), TradesealError> {
        let text = fixed().export_to_text()?;
        let mut value: serde_json::Value = serde_json::from_str(&text)
            .map_err(|e| TradesealError::Validation { reason: e.to_string() })?;
        let foreign = X25519StaticSecret::from_raw([9; 32]).public_key().to_base64();
        value["exchange_public_key"] = serde_json::Value::String(foreign);

        let result = Identity::import_from_text(&value.to_string());
        assert!(matches!(result, Err(TradesealError::Validation { .. })));
        Ok(())
    }

    #[test]
    fn wrong_version_rejected() -> std::result::Result<(), TradesealError> {
        let text = fixed().export_to_text()?;
        let patched = text.replacen("\"version\": 1", "\"version\": 2", 1);
        assert!(matches!(
            Identity::import_from_text(&patched),
            Err(TradesealError::Validation { .. })
        ));
        Ok(())
    }

    #[test]
    fn fingerprint_format() {
        let fp = fingerprint(&[0u8; 32]);
        // SHA-256 of 32 zero bytes starts with 66687aadf862bd77.
        assert_eq!(fp, "66:68:7a:ad:f8:62:bd:77");
        assert_eq!(fp.split(':').count(), FINGERPRINT_BYTES);
    }

    #[test]
    fn fingerprint_b64_rejects_garbage() {
        assert_eq!(fingerprint_b64("!!"), None);
        assert_eq!(
            fingerprint_b64(&b64_encode(&[0u8; 32])).as_deref(),
            Some("66:68:7a:ad:f8:62:bd:77")
        );
    }
}
