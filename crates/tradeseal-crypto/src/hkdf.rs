//! HKDF-SHA256 key derivation (RFC 5869).
//!
//! Turns an X25519 shared secret into a symmetric key. The output is
//! zeroized on drop.

use hkdf::Hkdf;
use sha2::Sha256;
use tradeseal_types::{Result, TradesealError};
use zeroize::{Zeroize, ZeroizeOnDrop};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Maximum output length in bytes.
///
/// HKDF-SHA256 can produce up to 8160 bytes; nothing here needs more
/// than one 256-bit key, so the cap is kept small.
const MAX_OUTPUT_LEN: usize = 64;

// ---------------------------------------------------------------------------
// HkdfOutput
// ---------------------------------------------------------------------------

/// Variable-length key material derived by HKDF-SHA256.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct HkdfOutput {
    bytes: Vec<u8>,
}

impl HkdfOutput {
    /// Returns the derived key material as a byte slice.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Returns the length of the derived key material.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns `true` if the output is empty.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

// HkdfOutput does not implement Clone/Debug to prevent leakage.

// ---------------------------------------------------------------------------
// Key derivation
// ---------------------------------------------------------------------------

/// Derives key material from input keying material using HKDF-SHA256.
///
/// # Parameters
///
/// - `ikm`: input keying material (e.g. an X25519 shared secret).
/// - `salt`: salt value; empty means the RFC 5869 zero salt.
/// - `info`: context label binding the output to its purpose.
/// - `output_len`: desired length, `1..=64`.
///
/// # Errors
///
/// [`TradesealError::KeyDerivation`] if `output_len` is out of range or
/// expansion fails.
pub fn hkdf_sha256(ikm: &[u8], salt: &[u8], info: &[u8], output_len: usize) -> Result<HkdfOutput> {
    if output_len == 0 || output_len > MAX_OUTPUT_LEN {
        return Err(TradesealError::KeyDerivation {
            reason: format!("HKDF output length {output_len} outside 1..={MAX_OUTPUT_LEN}"),
        });
    }

    let salt_opt: Option<&[u8]> = if salt.is_empty() { None } else { Some(salt) };
    let hk = Hkdf::<Sha256>::new(salt_opt, ikm);

    let mut okm = vec![0u8; output_len];
    hk.expand(info, &mut okm)
        .map_err(|e| TradesealError::KeyDerivation {
            reason: format!("HKDF-SHA256 expansion failed: {e}"),
        })?;

    Ok(HkdfOutput { bytes: okm })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
