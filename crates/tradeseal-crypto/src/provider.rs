//! The `CryptoProvider` capability.
//!
//! Protocol code depends only on this trait. [`RustCryptoProvider`] is
//! the native implementation backed by the dalek and RustCrypto crates;
//! tests wrap it to count or fail individual operations.

use tradeseal_types::Result;

use crate::aead::{self, AeadKey, SealedBox};
use crate::ecdh::{ecdh_derive_shared, SharedSecret, X25519PublicKey, X25519StaticSecret};
use crate::hash::sha256;
use crate::hkdf::hkdf_sha256;
use crate::signing::{self, Keypair, PublicKey, Signature};

/// Every primitive the protocol needs, behind one object-safe trait.
pub trait CryptoProvider: Send + Sync {
    /// Fresh Ed25519 signing keypair.
    fn signing_keygen(&self) -> Keypair;

    /// Fresh X25519 exchange secret.
    fn exchange_keygen(&self) -> X25519StaticSecret;

    fn sign(&self, keypair: &Keypair, message: &[u8]) -> Signature;

    /// Returns `false` for any verification failure, never an error.
    fn verify(&self, public_key: &PublicKey, message: &[u8], signature: &Signature) -> bool;

    /// X25519 agreement. Fails with `KeyDerivation` on a
    /// non-contributory result.
    fn agree(&self, secret: &X25519StaticSecret, peer: &X25519PublicKey) -> Result<SharedSecret>;

    /// HKDF-SHA256 to a 256-bit AEAD key.
    fn derive_key(&self, ikm: &[u8], salt: &[u8], info: &[u8]) -> Result<AeadKey>;

    /// Seals `plaintext` under a nonce the provider draws itself.
    fn aead_encrypt(&self, key: &AeadKey, plaintext: &[u8]) -> Result<SealedBox>;

    /// Opens a sealed box; `Authentication` on any tag failure.
    fn aead_decrypt(&self, key: &AeadKey, sealed: &SealedBox) -> Result<Vec<u8>>;

    /// SHA-256.
    fn digest(&self, data: &[u8]) -> [u8; 32];
}

/// Native provider: Ed25519, X25519, HKDF-SHA256, ChaCha20-Poly1305, SHA-256.
#[derive(Clone, Copy, Debug, Default)]
pub struct RustCryptoProvider;

impl CryptoProvider for RustCryptoProvider {
    fn signing_keygen(&self) -> Keypair {
        Keypair::generate()
    }

    fn exchange_keygen(&self) -> X25519StaticSecret {
        X25519StaticSecret::generate()
    }

    fn sign(&self, keypair: &Keypair, message: &[u8]) -> Signature {
        keypair.sign(message)
    }

    fn verify(&self, public_key: &PublicKey, message: &[u8], signature: &Signature) -> bool {
        signing::verify(public_key, message, signature).is_ok()
    }

    fn agree(&self, secret: &X25519StaticSecret, peer: &X25519PublicKey) -> Result<SharedSecret> {
        ecdh_derive_shared(secret, peer)
    }

    fn derive_key(&self, ikm: &[u8], salt: &[u8], info: &[u8]) -> Result<AeadKey> {
        let okm = hkdf_sha256(ikm, salt, info, AeadKey::LEN)?;
        let mut key = [0u8; AeadKey::LEN];
        key.copy_from_slice(okm.as_bytes());
        Ok(AeadKey::from_bytes(key))
    }

    fn aead_encrypt(&self, key: &AeadKey, plaintext: &[u8]) -> Result<SealedBox> {
        aead::seal(key, plaintext)
    }

    fn aead_decrypt(&self, key: &AeadKey, sealed: &SealedBox) -> Result<Vec<u8>> {
        aead::open(key, sealed)
    }

    fn digest(&self, data: &[u8]) -> [u8; 32] {
        sha256(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tradeseal_types::TradesealError;

    #[test]
    fn provider_is_object_safe() -> std::result::Result<(), TradesealError> {
        let provider: &dyn CryptoProvider = &RustCryptoProvider;
        let kp = provider.signing_keygen();
        let sig = provider.sign(&kp, b"digest");
        assert!(provider.verify(&kp.public_key(), b"digest", &sig));
        assert!(!provider.verify(&kp.public_key(), b"other", &sig));
        Ok(())
    }

    #[test]
    fn agree_then_derive_matches_on_both_sides() -> std::result::Result<(), TradesealError> {
        let p = RustCryptoProvider;
        let a = p.exchange_keygen();
        let b = p.exchange_keygen();
        let ka = p.derive_key(p.agree(&a, &b.public_key())?.as_bytes(), b"t", b"label")?;
        let kb = p.derive_key(p.agree(&b, &a.public_key())?.as_bytes(), b"t", b"label")?;
        assert_eq!(ka.as_bytes(), kb.as_bytes());

        let sealed = p.aead_encrypt(&ka, b"hi")?;
        assert_eq!(p.aead_decrypt(&kb, &sealed)?, b"hi");
        Ok(())
    }

    #[test]
    fn digest_is_sha256() {
        let p = RustCryptoProvider;
        assert_eq!(hex::encode(p.digest(b"abc")), crate::hash::sha256_hex(b"abc"));
    }
}
