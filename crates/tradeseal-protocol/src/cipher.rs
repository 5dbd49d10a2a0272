//! Value-level authenticated encryption for chat payloads.
//!
//! A value is serialized to canonical JSON, sealed under the chat key
//! with a provider-drawn nonce, and shipped as a [`Sealed`] box whose
//! wire form is itself a small JSON document:
//!
//! ```json
//! {"ciphertext":"<base64>","nonce":"<base64>"}
//! ```
//!
//! Every failure on the way back (bad wire text, bad base64, tag
//! mismatch, undecodable plaintext) is an `Authentication` error so
//! callers can treat them uniformly as "drop this message".

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tradeseal_crypto::aead::{AeadNonce, SealedBox};
use tradeseal_crypto::encoding::{b64_decode, b64_decode_fixed, b64_encode};
use tradeseal_crypto::provider::CryptoProvider;
use tradeseal_types::{Result, TradesealError};

use crate::canonical::canonical_string;
use crate::session::ChatKey;

/// Nonce and ciphertext in their base64 transport form.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Sealed {
    pub nonce: String,
    pub ciphertext: String,
}

impl Sealed {
    /// Compact JSON text carried in a `CHAT` frame's `ciphertext` field.
    pub fn to_wire(&self) -> Result<String> {
        canonical_string(self)
    }

    /// Parses the wire text. Any malformation is an authentication
    /// failure.
    pub fn from_wire(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| TradesealError::Authentication {
            reason: format!("malformed sealed payload: {e}"),
        })
    }

    fn to_box(&self) -> Result<SealedBox> {
        let nonce: [u8; AeadNonce::LEN] =
            b64_decode_fixed(&self.nonce, "nonce").map_err(as_authentication)?;
        let ciphertext = b64_decode(&self.ciphertext, "ciphertext").map_err(as_authentication)?;
        Ok(SealedBox {
            nonce: AeadNonce::from_bytes(nonce),
            ciphertext,
        })
    }
}

/// Serializes and seals `value`.
pub fn encrypt<T: Serialize + ?Sized>(
    provider: &dyn CryptoProvider,
    key: &ChatKey,
    value: &T,
) -> Result<Sealed> {
    let plaintext = canonical_string(value)?;
    let sealed = provider.aead_encrypt(key.aead_key(), plaintext.as_bytes())?;
    Ok(Sealed {
        nonce: b64_encode(sealed.nonce.as_bytes()),
        ciphertext: b64_encode(&sealed.ciphertext),
    })
}

/// Opens and deserializes a sealed value.
///
/// # Errors
///
/// [`TradesealError::Authentication`] for any failure.
pub fn decrypt<T: DeserializeOwned>(
    provider: &dyn CryptoProvider,
    key: &ChatKey,
    sealed: &Sealed,
) -> Result<T> {
    let sealed_box = sealed.to_box()?;
    let plaintext = provider
        .aead_decrypt(key.aead_key(), &sealed_box)
        .map_err(as_authentication)?;
    serde_json::from_slice(&plaintext).map_err(|e| TradesealError::Authentication {
        reason: format!("plaintext is not a valid payload: {e}"),
    })
}

fn as_authentication(err: TradesealError) -> TradesealError {
    match err {
        TradesealError::Authentication { .. } => err,
        other => TradesealError::Authentication {
            reason: other.to_string(),
        },
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::derive_chat_key;
    use serde_json::{json, Value};
    use tradeseal_crypto::ecdh::X25519StaticSecret;
    use tradeseal_crypto::provider::RustCryptoProvider;
    use tradeseal_types::TradeId;

    fn key(seed_a: u8, seed_b: u8, trade: &str) -> Result<ChatKey> {
        let a = X25519StaticSecret::from_raw([seed_a; 32]);
        let b = X25519StaticSecret::from_raw([seed_b; 32]);
        derive_chat_key(&RustCryptoProvider, &a, &b.public_key(), &TradeId::new(trade)?)
    }

    #[test]
    fn roundtrip_structured_value() -> std::result::Result<(), TradesealError> {
        let p = RustCryptoProvider;
        let k = key(1, 2, "t")?;
        let value = json!({"content": "hello", "n": [1, 2, 3], "nested": {"ok": true}});

        let sealed = encrypt(&p, &k, &value)?;
        let back: Value = decrypt(&p, &k, &sealed)?;
        assert_eq!(back, value);
        Ok(())
    }

    #[test]
    fn wire_form_roundtrip() -> std::result::Result<(), TradesealError> {
        let p = RustCryptoProvider;
        let k = key(1, 2, "t")?;
        let sealed = encrypt(&p, &k, "plain string")?;
        let wire = sealed.to_wire()?;
        assert!(wire.starts_with("{\"ciphertext\":"));
        let parsed = Sealed::from_wire(&wire)?;
        let back: String = decrypt(&p, &k, &parsed)?;
        assert_eq!(back, "plain string");
        Ok(())
    }

    #[test]
    fn wrong_key_is_authentication_error() -> std::result::Result<(), TradesealError> {
        let p = RustCryptoProvider;
        let sealed = encrypt(&p, &key(1, 2, "t")?, &json!({"x": 1}))?;
        let result: Result<Value> = decrypt(&p, &key(1, 3, "t")?, &sealed);
        assert!(matches!(result, Err(TradesealError::Authentication { .. })));
        Ok(())
    }

    #[test]
    fn key_from_other_trade_fails() -> std::result::Result<(), TradesealError> {
        let p = RustCryptoProvider;
        let sealed = encrypt(&p, &key(1, 2, "trade-a")?, &json!({"x": 1}))?;
        let result: Result<Value> = decrypt(&p, &key(1, 2, "trade-b")?, &sealed);
        assert!(matches!(result, Err(TradesealError::Authentication { .. })));
        Ok(())
    }

    #[test]
    fn tampered_ciphertext_and_nonce_fail() -> std::result::Result<(), TradesealError> {
        let p = RustCryptoProvider;
        let k = key(1, 2, "t")?;
        let sealed = encrypt(&p, &k, &json!({"x": 1}))?;

        let mut bad_ct = sealed.clone();
        bad_ct.ciphertext = b64_encode(b"definitely not the ciphertext");
        let r1: Result<Value> = decrypt(&p, &k, &bad_ct);
        assert!(matches!(r1, Err(TradesealError::Authentication { .. })));

        let mut bad_nonce = sealed.clone();
        bad_nonce.nonce = b64_encode(&[0u8; 12]);
        let r2: Result<Value> = decrypt(&p, &k, &bad_nonce);
        assert!(matches!(r2, Err(TradesealError::Authentication { .. })));

        let mut short_nonce = sealed;
        short_nonce.nonce = b64_encode(&[0u8; 4]);
        let r3: Result<Value> = decrypt(&p, &k, &short_nonce);
        assert!(matches!(r3, Err(TradesealError::Authentication { .. })));
        Ok(())
    }

    #[test]
    fn malformed_wire_text_is_authentication_error() {
        let result = Sealed::from_wire("not json");
        assert!(matches!(result, Err(TradesealError::Authentication { .. })));
    }

    #[test]
    fn same_value_encrypts_differently_each_time() -> std::result::Result<(), TradesealError> {
        let p = RustCryptoProvider;
        let k = key(1, 2, "t")?;
        let a = encrypt(&p, &k, "same")?;
        let b = encrypt(&p, &k, "same")?;
        assert_ne!(a.nonce, b.nonce);
        assert_ne!(a.ciphertext, b.ciphertext);
        Ok(())
    }
}
