//! X25519 Elliptic-Curve Diffie-Hellman key agreement.
//!
//! Exchange keys are independent of signing keys: every identity holds
//! one of each, and only the exchange half is used to scope chat
//! sessions.

use std::fmt;

use rand::rngs::OsRng;
use tradeseal_types::{Result, TradesealError};
use zeroize::{Zeroize, Zeroizing};

use crate::encoding::{b64_decode_fixed, b64_encode};

// ---------------------------------------------------------------------------
// X25519PublicKey
// ---------------------------------------------------------------------------

/// X25519 public key (32 bytes).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct X25519PublicKey(x25519_dalek::PublicKey);

impl X25519PublicKey {
    /// Creates an [`X25519PublicKey`] from its raw Montgomery-form bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(x25519_dalek::PublicKey::from(bytes))
    }

    /// Returns the raw 32-byte representation.
    pub fn as_bytes(&self) -> &[u8; 32] {
        self.0.as_bytes()
    }

    pub fn to_base64(&self) -> String {
        b64_encode(self.0.as_bytes())
    }

    pub fn from_base64(text: &str) -> Result<Self> {
        Ok(Self::from_bytes(b64_decode_fixed(text, "exchange public key")?))
    }
}

impl fmt::Display for X25519PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base64())
    }
}

// ---------------------------------------------------------------------------
// X25519StaticSecret
// ---------------------------------------------------------------------------

/// Long-lived X25519 secret key.
///
/// The underlying `x25519-dalek` secret zeroizes its memory on drop.
pub struct X25519StaticSecret(x25519_dalek::StaticSecret);

impl X25519StaticSecret {
    /// Generates a fresh secret from OS entropy.
    pub fn generate() -> Self {
        Self(x25519_dalek::StaticSecret::random_from_rng(OsRng))
    }

    /// Creates a secret from raw 32-byte key material.
    ///
    /// Clamping happens inside `x25519-dalek` during scalar
    /// multiplication, so the bytes are stored as-is.
    pub fn from_raw(bytes: [u8; 32]) -> Self {
        Self(x25519_dalek::StaticSecret::from(bytes))
    }

    /// Derives the corresponding public key.
    pub fn public_key(&self) -> X25519PublicKey {
        X25519PublicKey(x25519_dalek::PublicKey::from(&self.0))
    }

    /// Raw secret bytes for export, wiped when the wrapper drops.
    pub fn to_bytes(&self) -> Zeroizing<[u8; 32]> {
        Zeroizing::new(self.0.to_bytes())
    }
}

// X25519StaticSecret does not implement Clone/Debug to prevent leakage.

// ---------------------------------------------------------------------------
// SharedSecret
// ---------------------------------------------------------------------------

/// Raw X25519 shared secret (32 bytes).
///
/// Never used directly as a symmetric key; feed it to HKDF.
#[derive(Zeroize)]
#[zeroize(drop)]
pub struct SharedSecret([u8; 32]);

impl SharedSecret {
    /// Returns the raw 32-byte shared secret.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// Agreement
// ---------------------------------------------------------------------------

/// Performs X25519 agreement between our secret and a peer's public key.
///
/// Both parties running this with the other's public key obtain the
/// same secret.
///
/// # Errors
///
/// [`TradesealError::KeyDerivation`] if the peer key is a low-order
/// point, which yields a non-contributory (all-zero) secret.
pub fn ecdh_derive_shared(
    our_secret: &X25519StaticSecret,
    their_public: &X25519PublicKey,
) -> Result<SharedSecret> {
    let raw = our_secret.0.diffie_hellman(&their_public.0);
    if !raw.was_contributory() {
        return Err(TradesealError::KeyDerivation {
            reason: "peer exchange key produced a non-contributory shared secret".into(),
        });
    }
    Ok(SharedSecret(*raw.as_bytes()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
