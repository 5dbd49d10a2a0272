//! Trade and chat protocol for Tradeseal.
//!
//! Everything here is transport-agnostic: canonical content addressing,
//! digest signatures, per-trade chat keys, the message cipher, the trade
//! and settlement data model, wire frames, and the contract a relay must
//! fulfil.
//!
//! # Modules
//!
//! - [`canonical`]: deterministic JSON and `hash(value)`
//! - [`digest`]: hex SHA-256 content address
//! - [`signature`]: sign / verify over hex digests
//! - [`session`]: X25519 + HKDF chat key derivation
//! - [`cipher`]: value-level AEAD with wire-form sealed boxes
//! - [`trade`]: `TradeBody`, `SettlementBody`, `SignatureInfo`
//! - [`envelope`]: versioned plaintext chat envelopes
//! - [`wire`]: relay frames (`auth`, `JOIN`, `CHAT`, ...)
//! - [`relay`]: async ports for the relay/store

pub mod canonical;
pub mod cipher;
pub mod digest;
pub mod envelope;
pub mod relay;
pub mod session;
pub mod signature;
pub mod trade;
pub mod wire;
