//! In-process relay/store.
//!
//! Every signed state change is re-verified here before it is applied:
//! the relay trusts no client-side check. Accepted changes are appended
//! to the ledger before the trade record moves.
//!
//! # Thread Safety
//!
//! All state sits behind one `std::sync::Mutex`. No lock is held across
//! an `.await`; every port method completes synchronously.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::json;
use tradeseal_crypto::provider::{CryptoProvider, RustCryptoProvider};
use tradeseal_crypto::signing::PublicKey;
use tradeseal_protocol::relay::{
    BlockKind, CancelTrade, ChatChannel, ChatConnector, ChatStore, CompleteTrade, CreateTrade,
    LedgerBlock, RoomParticipant, StoredChatMessage, TradeChatInfo, TradeRecord, TradeStore,
};
use tradeseal_protocol::signature;
use tradeseal_protocol::trade::content_hash;
use tradeseal_types::{
    Result, SettlementResult, TradeId, TradeStatus, TradesealError, UnixTimestamp,
};

use crate::ledger::Ledger;
use crate::room::{MemoryChannel, RoomRegistry};

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Default)]
pub(crate) struct RelayState {
    trades: HashMap<TradeId, TradeRecord>,
    /// Creation order, oldest first.
    order: Vec<TradeId>,
    ledger: Ledger,
    chats: HashMap<TradeId, Vec<StoredChatMessage>>,
    next_message_id: u64,
    pub(crate) rooms: RoomRegistry,
}

impl RelayState {
    fn trade(&self, trade_id: &TradeId) -> Result<&TradeRecord> {
        self.trades.get(trade_id).ok_or_else(|| not_found(trade_id))
    }

    fn trade_mut(&mut self, trade_id: &TradeId) -> Result<&mut TradeRecord> {
        self.trades.get_mut(trade_id).ok_or_else(|| not_found(trade_id))
    }

    pub(crate) fn contains(&self, trade_id: &TradeId) -> bool {
        self.trades.contains_key(trade_id)
    }

    /// Stores a participant's chat key on the trade record.
    pub(crate) fn set_chat_pubkey(
        &mut self,
        trade_id: &TradeId,
        identity_pubkey: &str,
        chat_pubkey: &str,
    ) -> Result<()> {
        let record = self.trade_mut(trade_id)?;
        if record.seller_pubkey == identity_pubkey {
            record.seller_chat_pubkey = Some(chat_pubkey.to_owned());
        } else if record.buyer_pubkey.as_deref() == Some(identity_pubkey) {
            record.buyer_chat_pubkey = Some(chat_pubkey.to_owned());
        } else {
            return Err(TradesealError::InvalidState {
                reason: format!("{identity_pubkey} is not a participant of trade {trade_id}"),
            });
        }
        Ok(())
    }

    /// Appends a ciphertext to the trade's history.
    pub(crate) fn record_chat(
        &mut self,
        trade_id: &TradeId,
        sender_chat_pubkey: &str,
        ciphertext: &str,
    ) -> StoredChatMessage {
        self.next_message_id += 1;
        let message = StoredChatMessage {
            id: self.next_message_id,
            trade_id: trade_id.clone(),
            sender_chat_pubkey: sender_chat_pubkey.to_owned(),
            ciphertext: ciphertext.to_owned(),
            timestamp: UnixTimestamp::now(),
        };
        self.chats
            .entry(trade_id.clone())
            .or_default()
            .push(message.clone());
        message
    }
}

pub(crate) struct RelayInner {
    provider: Arc<dyn CryptoProvider>,
    state: Mutex<RelayState>,
    next_connection: AtomicU64,
}

impl RelayInner {
    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, RelayState>> {
        self.state.lock().map_err(|_| TradesealError::Storage {
            reason: "relay state lock poisoned".into(),
        })
    }
}

// ---------------------------------------------------------------------------
// MemoryRelay
// ---------------------------------------------------------------------------

/// Cheaply cloneable handle to one in-memory relay.
#[derive(Clone)]
pub struct MemoryRelay {
    inner: Arc<RelayInner>,
}

impl Default for MemoryRelay {
    fn default() -> Self {
        Self::new(Arc::new(RustCryptoProvider))
    }
}

impl MemoryRelay {
    pub fn new(provider: Arc<dyn CryptoProvider>) -> Self {
        Self {
            inner: Arc::new(RelayInner {
                provider,
                state: Mutex::new(RelayState::default()),
                next_connection: AtomicU64::new(1),
            }),
        }
    }

    /// Opens a room channel and returns the concrete type.
    pub fn connect(&self, trade_id: &TradeId) -> Result<Arc<MemoryChannel>> {
        if !self.inner.lock()?.contains(trade_id) {
            return Err(not_found(trade_id));
        }
        let connection = self.inner.next_connection.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(trade_id = %trade_id, connection, "room channel opened");
        Ok(Arc::new(MemoryChannel::new(
            Arc::clone(&self.inner),
            trade_id.clone(),
            connection,
        )))
    }

    /// Participants currently connected to the trade's room.
    pub fn room_participants(&self, trade_id: &TradeId) -> Result<Vec<RoomParticipant>> {
        Ok(self.inner.lock()?.rooms.participants(trade_id))
    }

    fn verify(&self, digest_hex: &str, signature_b64: &str, public_key_b64: &str) -> bool {
        signature::verify(
            self.inner.provider.as_ref(),
            digest_hex,
            signature_b64,
            public_key_b64,
        )
    }
}

// ---------------------------------------------------------------------------
// TradeStore
// ---------------------------------------------------------------------------

#[async_trait]
impl TradeStore for MemoryRelay {
    async fn create(&self, request: CreateTrade) -> Result<TradeRecord> {
        let CreateTrade {
            trade_id,
            body,
            signature,
        } = request;

        if body.trade_id.as_ref() != Some(&trade_id) {
            return Err(TradesealError::Validation {
                reason: "body trade_id does not match the request".into(),
            });
        }
        if body.compute_trade_id()?.to_hex() != trade_id.as_str() {
            return Err(TradesealError::SignatureMismatch {
                reason: "trade id is not the hash of the body".into(),
            });
        }
        if content_hash(&body.description, &body.price)? != body.content_hash {
            return Err(TradesealError::Validation {
                reason: "content_hash does not match description and price".into(),
            });
        }
        if !self.verify(trade_id.as_str(), &signature, &body.seller_pubkey) {
            return Err(TradesealError::SignatureMismatch {
                reason: "invalid seller signature".into(),
            });
        }

        let mut guard = self.inner.lock()?;
        let state = &mut *guard;
        if state.contains(&trade_id) {
            return Err(TradesealError::InvalidState {
                reason: format!("trade {trade_id} already exists"),
            });
        }

        state.ledger.append(
            BlockKind::Create,
            &trade_id,
            json!({
                "content_hash": body.content_hash,
                "seller_pubkey": body.seller_pubkey,
                "description": body.description,
                "price": body.price,
                "timestamp": body.timestamp,
            }),
            BTreeMap::from([("seller".to_owned(), signature)]),
        )?;

        let record = TradeRecord {
            trade_id: trade_id.clone(),
            seller_pubkey: body.seller_pubkey,
            buyer_pubkey: None,
            status: TradeStatus::Open,
            content_hash: body.content_hash,
            description: body.description,
            price: body.price,
            seller_chat_pubkey: None,
            buyer_chat_pubkey: None,
            created_at: body.timestamp,
        };
        state.trades.insert(trade_id.clone(), record.clone());
        state.order.push(trade_id.clone());

        tracing::info!(trade_id = %trade_id, "trade created");
        Ok(record)
    }

    async fn get(&self, trade_id: &TradeId) -> Result<Option<TradeRecord>> {
        Ok(self.inner.lock()?.trades.get(trade_id).cloned())
    }

    async fn list(&self, limit: usize) -> Result<Vec<TradeRecord>> {
        let state = self.inner.lock()?;
        Ok(state
            .order
            .iter()
            .rev()
            .filter_map(|id| state.trades.get(id).cloned())
            .take(limit)
            .collect())
    }

    async fn join(&self, trade_id: &TradeId, buyer_pubkey: &str) -> Result<TradeRecord> {
        PublicKey::from_base64(buyer_pubkey)?;

        let mut state = self.inner.lock()?;
        let record = state.trade_mut(trade_id)?;
        if record.seller_pubkey == buyer_pubkey {
            return Err(TradesealError::InvalidState {
                reason: "seller cannot join their own trade".into(),
            });
        }
        match (record.status, record.buyer_pubkey.as_deref()) {
            (TradeStatus::Joined, Some(existing)) if existing == buyer_pubkey => {
                return Ok(record.clone());
            }
            (TradeStatus::Open, _) => {}
            (status, _) => {
                return Err(TradesealError::InvalidState {
                    reason: format!("trade {trade_id} is {status} and cannot be joined"),
                });
            }
        }

        record.buyer_pubkey = Some(buyer_pubkey.to_owned());
        record.status = TradeStatus::Joined;
        tracing::info!(trade_id = %trade_id, "buyer joined trade");
        Ok(record.clone())
    }

    async fn complete(&self, request: CompleteTrade) -> Result<TradeRecord> {
        let mut guard = self.inner.lock()?;
        let state = &mut *guard;
        let record = state.trade(&request.trade_id)?;

        if record.status != TradeStatus::Joined {
            return Err(TradesealError::InvalidState {
                reason: format!("trade {} is {}, expected JOINED", record.trade_id, record.status),
            });
        }
        let buyer = record
            .buyer_pubkey
            .clone()
            .ok_or_else(|| TradesealError::InvalidState {
                reason: "buyer pubkey not set".into(),
            })?;
        let seller = record.seller_pubkey.clone();

        let hash_hex = request.hash.to_hex();
        if !self.verify(&hash_hex, &request.sig_seller, &seller) {
            return Err(TradesealError::SignatureMismatch {
                reason: "invalid seller signature".into(),
            });
        }
        if !self.verify(&hash_hex, &request.sig_buyer, &buyer) {
            return Err(TradesealError::SignatureMismatch {
                reason: "invalid buyer signature".into(),
            });
        }

        state.ledger.append(
            BlockKind::Complete,
            &request.trade_id,
            json!({
                "trade_id": request.trade_id,
                "result": SettlementResult::Completed,
                "hash": request.hash,
                "seller_pubkey": seller,
                "buyer_pubkey": buyer,
            }),
            BTreeMap::from([
                ("seller".to_owned(), request.sig_seller),
                ("buyer".to_owned(), request.sig_buyer),
            ]),
        )?;

        let record = state.trade_mut(&request.trade_id)?;
        record.status = TradeStatus::Completed;
        tracing::info!(trade_id = %request.trade_id, "trade completed");
        Ok(record.clone())
    }

    async fn cancel(&self, request: CancelTrade) -> Result<TradeRecord> {
        let mut guard = self.inner.lock()?;
        let state = &mut *guard;
        let record = state.trade(&request.trade_id)?;

        if !matches!(record.status, TradeStatus::Open | TradeStatus::Joined) {
            return Err(TradesealError::InvalidState {
                reason: format!(
                    "trade {} is {} and cannot be cancelled",
                    record.trade_id, record.status
                ),
            });
        }
        let role = if request.signer_pubkey == record.seller_pubkey {
            "seller"
        } else if record.buyer_pubkey.as_deref() == Some(request.signer_pubkey.as_str()) {
            "buyer"
        } else {
            return Err(TradesealError::SignatureMismatch {
                reason: "cancel signer is not a participant".into(),
            });
        };

        if request.body.trade_id != request.trade_id {
            return Err(TradesealError::Validation {
                reason: "cancel body names a different trade".into(),
            });
        }
        if request.body.result != SettlementResult::Cancelled {
            return Err(TradesealError::Validation {
                reason: format!("cancel body result is {}", request.body.result),
            });
        }
        if request.body.hash()? != request.hash {
            return Err(TradesealError::SignatureMismatch {
                reason: "cancel hash does not match body".into(),
            });
        }
        if !self.verify(&request.hash.to_hex(), &request.signature, &request.signer_pubkey) {
            return Err(TradesealError::SignatureMismatch {
                reason: format!("invalid {role} signature"),
            });
        }

        state.ledger.append(
            BlockKind::Cancel,
            &request.trade_id,
            json!({
                "body": request.body,
                "hash": request.hash,
                "signer_pubkey": request.signer_pubkey,
            }),
            BTreeMap::from([(role.to_owned(), request.signature)]),
        )?;

        let record = state.trade_mut(&request.trade_id)?;
        record.status = TradeStatus::Cancelled;
        tracing::info!(trade_id = %request.trade_id, role, "trade cancelled");
        Ok(record.clone())
    }

    async fn export_ledger(&self) -> Result<Vec<LedgerBlock>> {
        Ok(self.inner.lock()?.ledger.blocks().to_vec())
    }
}

// ---------------------------------------------------------------------------
// ChatStore
// ---------------------------------------------------------------------------

#[async_trait]
impl ChatStore for MemoryRelay {
    async fn history(&self, trade_id: &TradeId, limit: usize) -> Result<Vec<StoredChatMessage>> {
        let state = self.inner.lock()?;
        let messages = state.chats.get(trade_id).map(Vec::as_slice).unwrap_or(&[]);
        let skip = messages.len().saturating_sub(limit);
        Ok(messages[skip..].to_vec())
    }

    async fn update_chat_pubkey(
        &self,
        trade_id: &TradeId,
        identity_pubkey: &str,
        chat_pubkey: &str,
    ) -> Result<()> {
        self.inner
            .lock()?
            .set_chat_pubkey(trade_id, identity_pubkey, chat_pubkey)
    }

    async fn trade_chat_info(&self, trade_id: &TradeId) -> Result<TradeChatInfo> {
        let state = self.inner.lock()?;
        let record = state.trade(trade_id)?;
        Ok(TradeChatInfo {
            trade_id: record.trade_id.clone(),
            seller_pubkey: record.seller_pubkey.clone(),
            buyer_pubkey: record.buyer_pubkey.clone(),
            seller_chat_pubkey: record.seller_chat_pubkey.clone(),
            buyer_chat_pubkey: record.buyer_chat_pubkey.clone(),
            status: record.status,
        })
    }

    async fn peer_chat_pubkey(
        &self,
        trade_id: &TradeId,
        identity_pubkey: &str,
    ) -> Result<Option<String>> {
        let state = self.inner.lock()?;
        let record = state.trade(trade_id)?;
        if record.seller_pubkey == identity_pubkey {
            Ok(record.buyer_chat_pubkey.clone())
        } else if record.buyer_pubkey.as_deref() == Some(identity_pubkey) {
            Ok(record.seller_chat_pubkey.clone())
        } else {
            Ok(None)
        }
    }
}

// ---------------------------------------------------------------------------
// ChatConnector
// ---------------------------------------------------------------------------

#[async_trait]
impl ChatConnector for MemoryRelay {
    async fn open(&self, trade_id: &TradeId) -> Result<Arc<dyn ChatChannel>> {
        let channel: Arc<dyn ChatChannel> = self.connect(trade_id)?;
        Ok(channel)
    }
}

fn not_found(trade_id: &TradeId) -> TradesealError {
    TradesealError::NotFound {
        reason: format!("trade {trade_id}"),
    }
}
