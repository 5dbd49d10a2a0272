//! Per-trade chat key derivation.
//!
//! A [`ChatKey`] is derived via HKDF-SHA256 from the X25519 shared
//! secret of the two parties' exchange keys. The trade id is the HKDF
//! salt, so the same pair of parties gets an unrelated key for every
//! trade.
//!
//! # Key derivation parameters
//!
//! - **IKM**: X25519 shared secret (32 bytes).
//! - **Salt**: UTF-8 bytes of the trade id.
//! - **Info**: [`CHAT_KEY_INFO`].
//! - **Output**: 32 bytes (one ChaCha20-Poly1305 key).

use tradeseal_crypto::aead::AeadKey;
use tradeseal_crypto::ecdh::{X25519PublicKey, X25519StaticSecret};
use tradeseal_crypto::provider::CryptoProvider;
use tradeseal_types::{Result, TradeId, TradesealError};

/// Protocol-wide HKDF context label for chat keys.
pub const CHAT_KEY_INFO: &[u8] = b"tradeseal/chat/v1";

/// Symmetric key shared by the two parties of one trade.
///
/// Zeroized on drop through the inner [`AeadKey`].
pub struct ChatKey {
    key: AeadKey,
}

impl ChatKey {
    pub(crate) fn aead_key(&self) -> &AeadKey {
        &self.key
    }

    /// Raw key bytes. Exposed for equality checks in tests and audits.
    pub fn as_bytes(&self) -> &[u8; 32] {
        self.key.as_bytes()
    }
}

// ChatKey does not implement Clone/Debug to prevent leakage.

/// Derives the chat key for `trade_id` between our exchange secret and
/// the peer's exchange public key.
///
/// ```text
/// chat_key = HKDF-SHA256(
///     IKM  = X25519(my_secret, peer_public),
///     salt = UTF8(trade_id),
///     info = "tradeseal/chat/v1",
///     L    = 32
/// )
/// ```
///
/// # Errors
///
/// [`TradesealError::KeyDerivation`] wrapping the underlying cause for
/// any agreement or expansion failure.
pub fn derive_chat_key(
    provider: &dyn CryptoProvider,
    my_secret: &X25519StaticSecret,
    peer_public: &X25519PublicKey,
    trade_id: &TradeId,
) -> Result<ChatKey> {
    let shared = provider
        .agree(my_secret, peer_public)
        .map_err(as_key_derivation)?;
    let key = provider
        .derive_key(shared.as_bytes(), trade_id.as_bytes(), CHAT_KEY_INFO)
        .map_err(as_key_derivation)?;
    Ok(ChatKey { key })
}

/// Same as [`derive_chat_key`] but imports the peer key from its base64
/// text form; an import failure is also a `KeyDerivation` error.
pub fn derive_chat_key_from_text(
    provider: &dyn CryptoProvider,
    my_secret: &X25519StaticSecret,
    peer_public_b64: &str,
    trade_id: &TradeId,
) -> Result<ChatKey> {
    let peer = X25519PublicKey::from_base64(peer_public_b64).map_err(as_key_derivation)?;
    derive_chat_key(provider, my_secret, &peer, trade_id)
}

fn as_key_derivation(err: TradesealError) -> TradesealError {
    match err {
        TradesealError::KeyDerivation { .. } => err,
        other => TradesealError::KeyDerivation {
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
    use tradeseal_crypto::provider::RustCryptoProvider;

    fn trade(id: &str) -> Result<TradeId> {
        TradeId::new(id)
    }

    #[test]
    fn both_sides_derive_identical_key() -> std::result::Result<(), TradesealError> {
        let p = RustCryptoProvider;
        let a = X25519StaticSecret::from_raw([0x11; 32]);
        let b = X25519StaticSecret::from_raw([0x22; 32]);
        let t = trade("trade-1")?;

        let ka = derive_chat_key(&p, &a, &b.public_key(), &t)?;
        let kb = derive_chat_key(&p, &b, &a.public_key(), &t)?;
        assert_eq!(ka.as_bytes(), kb.as_bytes());
        Ok(())
    }

    #[test]
    fn different_trade_different_key() -> std::result::Result<(), TradesealError> {
        let p = RustCryptoProvider;
        let a = X25519StaticSecret::from_raw([0x11; 32]);
        let b = X25519StaticSecret::from_raw([0x22; 32]);

        let k1 = derive_chat_key(&p, &a, &b.public_key(), &trade("trade-1")?)?;
        let k2 = derive_chat_key(&p, &a, &b.public_key(), &trade("trade-2")?)?;
        assert_ne!(k1.as_bytes(), k2.as_bytes());
        Ok(())
    }

    #[test]
    fn key_differs_from_raw_shared_secret() -> std::result::Result<(), TradesealError> {
        let p = RustCryptoProvider;
        let a = X25519StaticSecret::from_raw([0x11; 32]);
        let b = X25519StaticSecret::from_raw([0x22; 32]);
        let shared = p.agree(&a, &b.public_key())?;
        let key = derive_chat_key(&p, &a, &b.public_key(), &trade("t")?)?;
        assert_ne!(key.as_bytes(), shared.as_bytes());
        Ok(())
    }

    #[test]
    fn malformed_peer_text_is_key_derivation_error() -> std::result::Result<(), TradesealError> {
        let p = RustCryptoProvider;
        let a = X25519StaticSecret::generate();
        let result = derive_chat_key_from_text(&p, &a, "AAAA", &trade("t")?);
        assert!(matches!(result, Err(TradesealError::KeyDerivation { .. })));
        Ok(())
    }

    #[test]
    fn low_order_peer_is_key_derivation_error() -> std::result::Result<(), TradesealError> {
        let p = RustCryptoProvider;
        let a = X25519StaticSecret::generate();
        let zero = X25519PublicKey::from_bytes([0; 32]);
        let result = derive_chat_key(&p, &a, &zero, &trade("t")?);
        assert!(matches!(result, Err(TradesealError::KeyDerivation { .. })));
        Ok(())
    }
}
