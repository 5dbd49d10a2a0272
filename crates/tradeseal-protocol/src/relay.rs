//! Relay/store contract.
//!
//! The node talks to the relay only through these ports, so the same
//! settlement and chat logic runs against the in-memory relay in tests
//! and against any networked adapter.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use tradeseal_types::{Result, TradeId, TradeStatus, UnixTimestamp};

use crate::digest::Digest;
use crate::trade::{SettlementBody, TradeBody};
use crate::wire::Frame;

// ---------------------------------------------------------------------------
// Trade records and requests
// ---------------------------------------------------------------------------

/// Relay-held trade aggregate.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub trade_id: TradeId,
    pub seller_pubkey: String,
    pub buyer_pubkey: Option<String>,
    pub status: TradeStatus,
    pub content_hash: Digest,
    pub description: String,
    pub price: Number,
    pub seller_chat_pubkey: Option<String>,
    pub buyer_chat_pubkey: Option<String>,
    pub created_at: UnixTimestamp,
}

/// Publish request: the body with its trade id filled in, and the
/// seller's signature over that id.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTrade {
    pub trade_id: TradeId,
    pub body: TradeBody,
    pub signature: String,
}

/// Dual-signed completion.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompleteTrade {
    pub trade_id: TradeId,
    pub hash: Digest,
    pub sig_seller: String,
    pub sig_buyer: String,
}

/// Single-signer cancellation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelTrade {
    pub trade_id: TradeId,
    pub hash: Digest,
    pub signature: String,
    pub signer_pubkey: String,
    pub body: SettlementBody,
}

// ---------------------------------------------------------------------------
// Ledger export
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BlockKind {
    Create,
    Complete,
    Cancel,
}

/// One block of the relay's hash-chained ledger.
///
/// `signatures` maps a role (`seller`, `buyer`) to the base64 signature
/// that authorized the block.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerBlock {
    pub index: u64,
    pub prev_hash: String,
    pub hash: String,
    pub timestamp: UnixTimestamp,
    #[serde(rename = "type")]
    pub kind: BlockKind,
    pub trade_id: TradeId,
    pub payload: Value,
    pub signatures: BTreeMap<String, String>,
}

// ---------------------------------------------------------------------------
// Chat records
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredChatMessage {
    pub id: u64,
    pub trade_id: TradeId,
    pub sender_chat_pubkey: String,
    pub ciphertext: String,
    pub timestamp: UnixTimestamp,
}

/// What the relay knows about a trade's chat participants.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeChatInfo {
    pub trade_id: TradeId,
    pub seller_pubkey: String,
    pub buyer_pubkey: Option<String>,
    pub seller_chat_pubkey: Option<String>,
    pub buyer_chat_pubkey: Option<String>,
    pub status: TradeStatus,
}

/// A participant currently connected to a trade room.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomParticipant {
    pub identity_pubkey: String,
    pub chat_pubkey: String,
    pub joined_at: UnixTimestamp,
}

// ---------------------------------------------------------------------------
// Ports
// ---------------------------------------------------------------------------

#[async_trait]
pub trait TradeStore: Send + Sync {
    async fn create(&self, request: CreateTrade) -> Result<TradeRecord>;

    async fn get(&self, trade_id: &TradeId) -> Result<Option<TradeRecord>>;

    /// Newest first, at most `limit` records.
    async fn list(&self, limit: usize) -> Result<Vec<TradeRecord>>;

    /// Records `buyer_pubkey` as the trade's buyer.
    async fn join(&self, trade_id: &TradeId, buyer_pubkey: &str) -> Result<TradeRecord>;

    async fn complete(&self, request: CompleteTrade) -> Result<TradeRecord>;

    async fn cancel(&self, request: CancelTrade) -> Result<TradeRecord>;

    async fn export_ledger(&self) -> Result<Vec<LedgerBlock>>;
}

#[async_trait]
pub trait ChatStore: Send + Sync {
    /// Oldest first: the last `limit` stored messages of the trade.
    async fn history(&self, trade_id: &TradeId, limit: usize) -> Result<Vec<StoredChatMessage>>;

    /// Records a participant's chat key. Non-participants are rejected.
    async fn update_chat_pubkey(
        &self,
        trade_id: &TradeId,
        identity_pubkey: &str,
        chat_pubkey: &str,
    ) -> Result<()>;

    async fn trade_chat_info(&self, trade_id: &TradeId) -> Result<TradeChatInfo>;

    /// The counterpart's chat key as seen from `identity_pubkey`.
    async fn peer_chat_pubkey(
        &self,
        trade_id: &TradeId,
        identity_pubkey: &str,
    ) -> Result<Option<String>>;
}

/// A bidirectional frame channel bound to one trade room.
#[async_trait]
pub trait ChatChannel: Send + Sync {
    async fn send(&self, frame: Frame) -> Result<()>;

    /// Next frame, or `None` once the channel is closed.
    async fn recv(&self) -> Result<Option<Frame>>;
}

#[async_trait]
pub trait ChatConnector: Send + Sync {
    async fn open(&self, trade_id: &TradeId) -> Result<Arc<dyn ChatChannel>>;
}
