//! Relay-side state for Tradeseal.
//!
//! [`relay::MemoryRelay`] plays the relay's role in-process: it holds
//! trade records, verifies every signed state change, appends accepted
//! changes to a hash-chained [`ledger::Ledger`], stores chat ciphertext,
//! and runs per-trade rooms that fan frames out to connected channels.
//! It never sees plaintext or private keys.

pub mod ledger;
pub mod relay;
pub mod room;

pub use ledger::Ledger;
pub use relay::MemoryRelay;
pub use room::MemoryChannel;
