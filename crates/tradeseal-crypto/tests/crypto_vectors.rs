//! Known-vector tests for cryptographic primitives.
//!
//! Test vectors sourced from:
//! - Ed25519: RFC 8032 §7.1, TEST 1 and TEST 2
//! - SHA-256: FIPS 180-2 examples
//! - X25519:  RFC 7748 §6.1
//! - AEAD:    RFC 8439 §2.8.2 (ChaCha20-Poly1305)

use tradeseal_crypto::aead::{open, AeadKey, AeadNonce, SealedBox};
use tradeseal_crypto::ecdh::{ecdh_derive_shared, X25519PublicKey, X25519StaticSecret};
use tradeseal_crypto::hash::sha256_hex;
use tradeseal_crypto::provider::{CryptoProvider, RustCryptoProvider};
use tradeseal_crypto::signing::{verify, Keypair, Signature};
use tradeseal_types::TradesealError;

fn unhex(s: &str) -> Vec<u8> {
    hex::decode(s).unwrap_or_default()
}

fn unhex32(s: &str) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&unhex(s));
    out
}

// ===================================================================
// Ed25519: RFC 8032 §7.1
// ===================================================================

#[test]
fn ed25519_rfc8032_test1() -> std::result::Result<(), TradesealError> {
    let kp = Keypair::from_seed(&unhex32(
        "9d61b19deffd5a60ba844af492ec2cc44449c5697b326919703bac031cae7f60",
    ));
    let pk = kp.public_key();
    assert_eq!(
        hex::encode(pk.as_bytes()),
        "d75a980182b10ab7d54bfed3c964073a0ee172f3daa62325af021a68f707511a"
    );

    let sig = kp.sign(b"");
    assert_eq!(
        hex::encode(sig.as_bytes()),
        "e5564300c360ac729086e2cc806e828a84877f1eb8e5d974d873e065224901555fb8821590a33bacc61e39701cf9b46bd25bf5f0595bbe24655141438e7a100b"
    );
    verify(&pk, b"", &sig)
}

#[test]
fn ed25519_rfc8032_test2() -> std::result::Result<(), TradesealError> {
    let kp = Keypair::from_seed(&unhex32(
        "4ccd089b28ff96da9db6c346ec114e0f5b8a319f35aba624da8cf6ed4fb8a6fb",
    ));
    let sig = kp.sign(&[0x72]);
    assert_eq!(
        hex::encode(sig.as_bytes()),
        "92a009a9f0d4cab8720e820b5f642540a2b27b5416503f8fb3762223ebdb69da085ac1e43e15996e458f3613d0f11d8c387b2eaeb4302aeeb00d291612bb0c00"
    );
    verify(&kp.public_key(), &[0x72], &sig)
}

#[test]
fn ed25519_flipped_signature_bit_rejects() {
    let kp = Keypair::from_seed(&[0x01; 32]);
    let sig = kp.sign(b"payload");
    let mut raw = *sig.as_bytes();
    raw[10] ^= 0x01;
    assert!(verify(&kp.public_key(), b"payload", &Signature::from_bytes(raw)).is_err());
}

// ===================================================================
// SHA-256
// ===================================================================

#[test]
fn sha256_two_block_message() {
    assert_eq!(
        sha256_hex(b"abcdbcdecdefdefgefghfghighijhijkijkljklmklmnlmnomnopnopq"),
        "248d6a61d20638b8e5c026930c3e6039a33ce45964ff2167f6ecedd419db06c1"
    );
}

// ===================================================================
// X25519: RFC 7748 §6.1
// ===================================================================

#[test]
fn x25519_rfc7748_both_directions() -> std::result::Result<(), TradesealError> {
    let alice = X25519StaticSecret::from_raw(unhex32(
        "77076d0a7318a57d3c16c17251b26645df4c2f87ebc0992ab177fba51db92c2a",
    ));
    let bob = X25519StaticSecret::from_raw(unhex32(
        "5dab087e624a8a4b79e17f8b83800ee66f3bb1292618b6fd1c2f8b27ff88e0eb",
    ));

    assert_eq!(
        alice.public_key(),
        X25519PublicKey::from_bytes(unhex32(
            "8520f0098930a754748b7ddcb43ef75a0dbf3a0d26381af4eba4a98eaa9b4e6a"
        ))
    );

    let expected = "4a5d9d5ba4ce2de1728e3bf480350f25e07e21c947d19e3376f09b3c1e161742";
    let ab = ecdh_derive_shared(&alice, &bob.public_key())?;
    let ba = ecdh_derive_shared(&bob, &alice.public_key())?;
    assert_eq!(hex::encode(ab.as_bytes()), expected);
    assert_eq!(hex::encode(ba.as_bytes()), expected);
    Ok(())
}

// ===================================================================
// ChaCha20-Poly1305: RFC 8439 §2.8.2
// ===================================================================

#[test]
fn chacha20poly1305_rfc8439_open_without_aad_fails() {
    // The RFC vector authenticates AAD; this crate never uses AAD, so the
    // published ciphertext must be rejected rather than silently accepted.
    let key = AeadKey::from_bytes(unhex32(
        "808182838485868788898a8b8c8d8e8f909192939495969798999a9b9c9d9e9f",
    ));
    let mut nonce = [0u8; 12];
    nonce.copy_from_slice(&unhex("070000004041424344454647"));
    let sealed = SealedBox {
        nonce: AeadNonce::from_bytes(nonce),
        ciphertext: unhex(
            "d31a8d34648e60db7b86afbc53ef7ec2a4aded51296e08fea9e2b5a736ee62d63dbea45e8ca9671282fafb69da92728b1a71de0a9e060b2905d6a5b67ecd3b3692ddbd7f2d778b8c9803aee328091b58fab324e4fad675945585808b4831d7bc3ff4def08e4b7a9de576d26586cec64b61161ae10b594f09e26a7e902ecbd0600691",
        ),
    };
    let result = open(&key, &sealed);
    assert!(matches!(result, Err(TradesealError::Authentication { .. })));
}

// ===================================================================
// Provider
// ===================================================================

#[test]
fn provider_full_pipeline() -> std::result::Result<(), TradesealError> {
    let provider: Box<dyn CryptoProvider> = Box::new(RustCryptoProvider);

    let seller = provider.exchange_keygen();
    let buyer = provider.exchange_keygen();

    let s_secret = provider.agree(&seller, &buyer.public_key())?;
    let b_secret = provider.agree(&buyer, &seller.public_key())?;

    let s_key = provider.derive_key(s_secret.as_bytes(), b"trade", b"ctx")?;
    let b_key = provider.derive_key(b_secret.as_bytes(), b"trade", b"ctx")?;

    let sealed = provider.aead_encrypt(&s_key, b"offer accepted")?;
    assert_eq!(provider.aead_decrypt(&b_key, &sealed)?, b"offer accepted");
    Ok(())
}
