//! Per-peer chat sessions and their memoized creation.
//!
//! A session is keyed by the peer's base64 exchange public key within one
//! trade. Creation goes through a `tokio::sync::OnceCell` per peer, so a
//! JOIN and a CHAT racing for the same new peer share one key derivation.
//! The map lock is a `std::sync::Mutex` held only to fetch or insert the
//! cell, never across an `.await`.
//!
//! State per peer:
//!
//! ```text
//! Uninitialized --(first creation)--> Pending --(derivation ok)--> Active
//!                                        |
//!                                        +--(derivation failed)--> Uninitialized
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tokio::sync::OnceCell;
use tradeseal_crypto::ecdh::X25519StaticSecret;
use tradeseal_crypto::provider::CryptoProvider;
use tradeseal_protocol::session::{derive_chat_key_from_text, ChatKey};
use tradeseal_types::{Direction, Result, TradeId, TradesealError, UnixTimestamp};
use tradeseal_wallet::fingerprint_b64;

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// One displayed chat line.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub trade_id: TradeId,
    pub sender_key: String,
    pub content: String,
    pub timestamp: UnixTimestamp,
    pub direction: Direction,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    /// Key derivation in flight.
    Pending,
    Active,
}

// ---------------------------------------------------------------------------
// ChatSession
// ---------------------------------------------------------------------------

#[derive(Default)]
struct SessionLog {
    messages: Vec<ChatMessage>,
    unread: usize,
    /// Wire ciphertexts already accepted; history replay re-delivers
    /// frames seen live.
    seen: HashSet<String>,
}

/// Established chat session with one peer.
pub struct ChatSession {
    peer: String,
    key: ChatKey,
    log: Mutex<SessionLog>,
}

// ChatSession does not implement Clone/Debug to prevent leakage of the key.

impl ChatSession {
    fn new(peer: String, key: ChatKey) -> Self {
        Self {
            peer,
            key,
            log: Mutex::new(SessionLog::default()),
        }
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    pub fn key(&self) -> &ChatKey {
        &self.key
    }

    fn log(&self) -> Result<MutexGuard<'_, SessionLog>> {
        self.log.lock().map_err(|_| TradesealError::InvalidState {
            reason: "session log lock poisoned".into(),
        })
    }

    /// Appends an inbound message unless `ciphertext` was already
    /// accepted. Returns `false` for a duplicate.
    pub(crate) fn record_inbound(
        &self,
        ciphertext: &str,
        message: ChatMessage,
        unread: bool,
    ) -> Result<bool> {
        let mut log = self.log()?;
        if !log.seen.insert(ciphertext.to_owned()) {
            return Ok(false);
        }
        log.messages.push(message);
        if unread {
            log.unread += 1;
        }
        Ok(true)
    }

    pub(crate) fn record_outbound(&self, ciphertext: String, message: ChatMessage) -> Result<()> {
        let mut log = self.log()?;
        log.seen.insert(ciphertext);
        log.messages.push(message);
        Ok(())
    }

    pub(crate) fn mark_read(&self) -> Result<()> {
        self.log()?.unread = 0;
        Ok(())
    }

    pub fn messages(&self) -> Result<Vec<ChatMessage>> {
        Ok(self.log()?.messages.clone())
    }

    pub fn unread_count(&self) -> Result<usize> {
        Ok(self.log()?.unread)
    }
}

// ---------------------------------------------------------------------------
// SessionRegistry
// ---------------------------------------------------------------------------

type SessionCell = Arc<OnceCell<Arc<ChatSession>>>;

pub struct SessionRegistry {
    provider: Arc<dyn CryptoProvider>,
    cells: Mutex<HashMap<String, SessionCell>>,
}

impl SessionRegistry {
    pub fn new(provider: Arc<dyn CryptoProvider>) -> Self {
        Self {
            provider,
            cells: Mutex::new(HashMap::new()),
        }
    }

    fn cells(&self) -> Result<MutexGuard<'_, HashMap<String, SessionCell>>> {
        self.cells.lock().map_err(|_| TradesealError::InvalidState {
            reason: "session registry lock poisoned".into(),
        })
    }

    /// Returns the session for `peer`, deriving its key on first use.
    ///
    /// Concurrent callers for the same peer await one derivation. If the
    /// derivation fails the peer goes back to `Uninitialized` and the
    /// next call retries.
    ///
    /// # Errors
    ///
    /// [`TradesealError::KeyDerivation`] if the peer key does not import
    /// or the agreement fails.
    pub async fn get_or_create(
        &self,
        my_secret: &X25519StaticSecret,
        peer: &str,
        trade_id: &TradeId,
    ) -> Result<Arc<ChatSession>> {
        let cell = {
            let mut cells = self.cells()?;
            Arc::clone(
                cells
                    .entry(peer.to_owned())
                    .or_insert_with(|| Arc::new(OnceCell::new())),
            )
        };

        let created = cell
            .get_or_try_init(|| async {
                let key =
                    derive_chat_key_from_text(self.provider.as_ref(), my_secret, peer, trade_id)?;
                tracing::debug!(
                    trade_id = %trade_id,
                    peer = %peer_label(peer),
                    "chat session established"
                );
                Ok::<_, TradesealError>(Arc::new(ChatSession::new(peer.to_owned(), key)))
            })
            .await;

        match created {
            Ok(session) => Ok(Arc::clone(session)),
            Err(e) => {
                self.forget_failed(peer, &cell)?;
                Err(e)
            }
        }
    }

    /// Removes `cell` if it is still the registered, uninitialized cell
    /// for `peer`.
    fn forget_failed(&self, peer: &str, cell: &SessionCell) -> Result<()> {
        let mut cells = self.cells()?;
        let stale = cells
            .get(peer)
            .is_some_and(|current| Arc::ptr_eq(current, cell) && !current.initialized());
        if stale {
            cells.remove(peer);
        }
        Ok(())
    }

    /// The active session for `peer`, if one exists.
    pub fn get(&self, peer: &str) -> Result<Option<Arc<ChatSession>>> {
        Ok(self
            .cells()?
            .get(peer)
            .and_then(|cell| cell.get())
            .map(Arc::clone))
    }

    pub fn state(&self, peer: &str) -> Result<SessionState> {
        Ok(match self.cells()?.get(peer) {
            None => SessionState::Uninitialized,
            Some(cell) if cell.initialized() => SessionState::Active,
            Some(_) => SessionState::Pending,
        })
    }

    /// Peers with an active session, sorted.
    pub fn peers(&self) -> Result<Vec<String>> {
        let mut peers: Vec<String> = self
            .cells()?
            .iter()
            .filter(|(_, cell)| cell.initialized())
            .map(|(peer, _)| peer.clone())
            .collect();
        peers.sort();
        Ok(peers)
    }

    pub fn clear(&self) -> Result<()> {
        self.cells()?.clear();
        Ok(())
    }
}

/// Log label for a peer key: its fingerprint, never the key itself.
pub(crate) fn peer_label(peer: &str) -> String {
    fingerprint_b64(peer).unwrap_or_else(|| "<malformed>".into())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
