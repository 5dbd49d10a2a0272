//! Cryptographic primitives for the Tradeseal trade and chat protocol.
//!
//! This crate is the only place that names a primitive crate. Protocol
//! code above it talks to [`provider::CryptoProvider`] and the value
//! types re-exported from the modules below.
//!
//! # Modules
//!
//! - [`signing`]: Ed25519 keypairs, signatures and verification
//! - [`ecdh`]: X25519 key agreement
//! - [`hkdf`]: HKDF-SHA256 key derivation
//! - [`aead`]: ChaCha20-Poly1305 sealing with internally drawn nonces
//! - [`hash`]: SHA-256 digests
//! - [`encoding`]: base64 / hex helpers for fixed-size key material
//! - [`provider`]: the `CryptoProvider` capability and its default impl

pub mod aead;
pub mod ecdh;
pub mod encoding;
pub mod hash;
pub mod hkdf;
pub mod provider;
pub mod signing;
