//! Identity lifecycle for Tradeseal.
//!
//! - **Generate** a signing keypair and an exchange keypair
//! - **Export / import** the pair as a JSON text document
//! - **Persist / load** through an [`store::IdentityStore`]
//! - **Fingerprint** public keys for display and logging

pub mod identity;
pub mod store;

pub use identity::{fingerprint, fingerprint_b64, Identity};
pub use store::{FileIdentityStore, IdentityStore, MemoryIdentityStore};
