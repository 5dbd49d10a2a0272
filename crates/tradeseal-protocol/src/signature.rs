//! Signatures over content digests.
//!
//! The signed message is always the 32 raw bytes behind a hex digest.
//! Verification is boolean: malformed input and bad signatures both
//! yield `false`.

use tradeseal_crypto::provider::CryptoProvider;
use tradeseal_crypto::signing::{Keypair, PublicKey, Signature};
use tradeseal_types::Result;

use crate::digest::Digest;

/// Signs the bytes decoded from `digest_hex`.
///
/// # Errors
///
/// `Validation` if `digest_hex` is not 64 hex characters.
pub fn sign(
    provider: &dyn CryptoProvider,
    digest_hex: &str,
    keypair: &Keypair,
) -> Result<Signature> {
    let digest = Digest::from_hex(digest_hex)?;
    Ok(sign_digest(provider, &digest, keypair))
}

/// Signs an already-parsed digest.
pub fn sign_digest(provider: &dyn CryptoProvider, digest: &Digest, keypair: &Keypair) -> Signature {
    provider.sign(keypair, digest.as_bytes())
}

/// Verifies a base64 signature by a base64 public key over a hex digest.
pub fn verify(
    provider: &dyn CryptoProvider,
    digest_hex: &str,
    signature_b64: &str,
    public_key_b64: &str,
) -> bool {
    let (Ok(digest), Ok(signature), Ok(public_key)) = (
        Digest::from_hex(digest_hex),
        Signature::from_base64(signature_b64),
        PublicKey::from_base64(public_key_b64),
    ) else {
        return false;
    };
    verify_digest(provider, &digest, &signature, &public_key)
}

pub fn verify_digest(
    provider: &dyn CryptoProvider,
    digest: &Digest,
    signature: &Signature,
    public_key: &PublicKey,
) -> bool {
    provider.verify(public_key, digest.as_bytes(), signature)
}
