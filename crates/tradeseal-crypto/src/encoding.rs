//! Text encodings for key material.
//!
//! Public keys and signatures travel as standard base64; digests travel
//! as lowercase hex.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use tradeseal_types::{Result, TradesealError};

/// Encodes bytes as standard (padded) base64.
pub fn b64_encode(bytes: &[u8]) -> String {
    BASE64.encode(bytes)
}

/// Decodes standard base64.
///
/// # Errors
///
/// [`TradesealError::Validation`] naming `field` if the input is not
/// valid base64.
pub fn b64_decode(text: &str, field: &str) -> Result<Vec<u8>> {
    BASE64
        .decode(text.trim())
        .map_err(|e| TradesealError::Validation {
            reason: format!("invalid {field} base64: {e}"),
        })
}

/// Decodes standard base64 into exactly `N` bytes.
pub fn b64_decode_fixed<const N: usize>(text: &str, field: &str) -> Result<[u8; N]> {
    let bytes = b64_decode(text, field)?;
    to_fixed(&bytes, field)
}

/// Decodes lowercase or uppercase hex into exactly `N` bytes.
pub fn hex_decode_fixed<const N: usize>(text: &str, field: &str) -> Result<[u8; N]> {
    let bytes = hex::decode(text).map_err(|e| TradesealError::Validation {
        reason: format!("invalid {field} hex: {e}"),
    })?;
    to_fixed(&bytes, field)
}

fn to_fixed<const N: usize>(bytes: &[u8], field: &str) -> Result<[u8; N]> {
    if bytes.len() != N {
        return Err(TradesealError::Validation {
            reason: format!("{field} must be {N} bytes, got {}", bytes.len()),
        });
    }
    let mut arr = [0u8; N];
    arr.copy_from_slice(bytes);
    Ok(arr)
}

/// Returns `true` if every character belongs to the standard base64
/// alphabet (`A-Z a-z 0-9 + / =`) and the string is non-empty.
///
/// This is a cheap shape check for untrusted key claims; it does not
/// guarantee the string decodes.
pub fn is_base64_alphabet(text: &str) -> bool {
    !text.is_empty()
        && text
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '/' || c == '=')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn b64_roundtrip_fixed() -> std::result::Result<(), TradesealError> {
        let raw = [7u8; 32];
        let text = b64_encode(&raw);
        let back: [u8; 32] = b64_decode_fixed(&text, "key")?;
        assert_eq!(back, raw);
        Ok(())
    }

    #[test]
    fn wrong_length_rejected() {
        let text = b64_encode(&[1u8; 31]);
        let result: Result<[u8; 32]> = b64_decode_fixed(&text, "key");
        assert!(matches!(result, Err(TradesealError::Validation { .. })));
    }

    #[test]
    fn hex_fixed_rejects_garbage() {
        let result: Result<[u8; 4]> = hex_decode_fixed("zzzzzzzz", "digest");
        assert!(result.is_err());
        let ok: Result<[u8; 2]> = hex_decode_fixed("beef", "digest");
        assert!(ok.is_ok());
    }

    #[test]
    fn base64_alphabet_check() {
        assert!(is_base64_alphabet("AbC+/09="));
        assert!(!is_base64_alphabet(""));
        assert!(!is_base64_alphabet("abc def"));
        assert!(!is_base64_alphabet("abc-_"));
        assert!(!is_base64_alphabet("<script>"));
    }
}
