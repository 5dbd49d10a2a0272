//! Tradeseal participant runtime.
//!
//! - [`chat`]: the chat session manager, one per open trade view
//! - [`sessions`]: per-peer sessions with memoized key derivation
//! - [`context`]: the explicit per-trade chat context
//! - [`connect`]: the relay handshake
//! - [`settlement`]: publish, join, dual-signed completion and cancel
//!
//! Everything talks to the relay through the ports in
//! `tradeseal_protocol::relay`.

pub mod chat;
pub mod connect;
pub mod context;
pub mod sessions;
pub mod settlement;

pub use chat::{ChatSessionManager, DropReason, Inbound};
pub use sessions::{ChatMessage, SessionState};
pub use settlement::{ContentHashLog, PublishedTrade, TradeSettlement};
