//! ChaCha20-Poly1305 authenticated encryption (RFC 8439).
//!
//! Sealing always draws a fresh 96-bit nonce from OS entropy. No public
//! entry point accepts a caller-supplied nonce for encryption.

use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use rand::rngs::OsRng;
use rand::RngCore;
use tradeseal_types::{Result, TradesealError};
use zeroize::{Zeroize, ZeroizeOnDrop};

// ---------------------------------------------------------------------------
// AeadKey
// ---------------------------------------------------------------------------

/// 256-bit symmetric key.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct AeadKey([u8; 32]);

impl AeadKey {
    pub const LEN: usize = 32;

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

// AeadKey does not implement Clone/Debug to prevent leakage.

// ---------------------------------------------------------------------------
// AeadNonce
// ---------------------------------------------------------------------------

/// 96-bit nonce, unique per sealing operation.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct AeadNonce([u8; 12]);

impl AeadNonce {
    /// Fixed byte length of a ChaCha20-Poly1305 nonce.
    pub const LEN: usize = 12;

    /// Wraps nonce bytes received alongside a ciphertext.
    pub fn from_bytes(bytes: [u8; 12]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 12] {
        &self.0
    }

    fn generate() -> Self {
        let mut bytes = [0u8; 12];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }
}

// ---------------------------------------------------------------------------
// SealedBox
// ---------------------------------------------------------------------------

/// Nonce plus ciphertext (with the 16-byte Poly1305 tag appended).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SealedBox {
    pub nonce: AeadNonce,
    pub ciphertext: Vec<u8>,
}

// ---------------------------------------------------------------------------
// Seal / Open
// ---------------------------------------------------------------------------

/// Encrypts `plaintext` under `key` with a freshly generated nonce.
pub fn seal(key: &AeadKey, plaintext: &[u8]) -> Result<SealedBox> {
    seal_with_nonce(key, AeadNonce::generate(), plaintext)
}

fn seal_with_nonce(key: &AeadKey, nonce: AeadNonce, plaintext: &[u8]) -> Result<SealedBox> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(&key.0));
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce.0), plaintext)
        .map_err(|e| TradesealError::Crypto {
            reason: format!("ChaCha20-Poly1305 encryption failed: {e}"),
        })?;
    Ok(SealedBox { nonce, ciphertext })
}

/// Decrypts and authenticates a [`SealedBox`].
///
/// # Errors
///
/// [`TradesealError::Authentication`] on tag mismatch (wrong key,
/// tampered nonce or ciphertext).
pub fn open(key: &AeadKey, sealed: &SealedBox) -> Result<Vec<u8>> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(&key.0));
    cipher
        .decrypt(Nonce::from_slice(&sealed.nonce.0), sealed.ciphertext.as_slice())
        .map_err(|_| TradesealError::Authentication {
            reason: "ciphertext failed authentication".into(),
        })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_open_roundtrip() -> std::result::Result<(), TradesealError> {
        let key = AeadKey::from_bytes([0x42; 32]);
        let sealed = seal(&key, b"hello tradeseal")?;
        assert_eq!(sealed.ciphertext.len(), b"hello tradeseal".len() + 16);
        assert_eq!(open(&key, &sealed)?, b"hello tradeseal");
        Ok(())
    }

    #[test]
    fn wrong_key_is_authentication_error() -> std::result::Result<(), TradesealError> {
        let sealed = seal(&AeadKey::from_bytes([0x42; 32]), b"secret")?;
        let result = open(&AeadKey::from_bytes([0x43; 32]), &sealed);
        assert!(matches!(result, Err(TradesealError::Authentication { .. })));
        Ok(())
    }

    #[test]
    fn tampered_nonce_fails() -> std::result::Result<(), TradesealError> {
        let key = AeadKey::from_bytes([0x42; 32]);
        let mut sealed = seal(&key, b"secret")?;
        let mut nonce = *sealed.nonce.as_bytes();
        nonce[0] ^= 0x01;
        sealed.nonce = AeadNonce::from_bytes(nonce);
        assert!(open(&key, &sealed).is_err());
        Ok(())
    }

    #[test]
    fn tampered_ciphertext_fails() -> std::result::Result<(), TradesealError> {
        let key = AeadKey::from_bytes([0x42; 32]);
        let mut sealed = seal(&key, b"secret")?;
        if let Some(byte) = sealed.ciphertext.first_mut() {
            *byte ^= 0xFF;
        }
        assert!(open(&key, &sealed).is_err());
        Ok(())
    }

    #[test]
    fn fixed_nonce_is_deterministic() -> std::result::Result<(), TradesealError> {
        let key = AeadKey::from_bytes([0xAA; 32]);
        let nonce = AeadNonce::from_bytes([0xBB; 12]);
        let a = seal_with_nonce(&key, nonce, b"determinism")?;
        let b = seal_with_nonce(&key, nonce, b"determinism")?;
        assert_eq!(a.ciphertext, b.ciphertext);
        Ok(())
    }

    #[test]
    fn every_seal_uses_a_new_nonce() -> std::result::Result<(), TradesealError> {
        let key = AeadKey::from_bytes([0x01; 32]);
        let a = seal(&key, b"same")?;
        let b = seal(&key, b"same")?;
        assert_ne!(a.nonce, b.nonce);
        assert_ne!(a.ciphertext, b.ciphertext);
        Ok(())
    }
}
