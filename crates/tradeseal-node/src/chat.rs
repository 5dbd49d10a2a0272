//! Chat session manager.
//!
//! Owns the [`ChatContext`] of one open trade and every session under it.
//! Inbound frames never fail: each one resolves to an [`Inbound`]
//! outcome, and rejected frames are logged at `debug` as
//! [`Inbound::Dropped`].
//!
//! Role bootstrap on [`ChatSessionManager::open`]:
//!
//! - **Seller** (our signing key is the trade's seller key): waits for a
//!   JOIN, or creates the session at once if the relay already knows the
//!   buyer's exchange key.
//! - **Buyer** (anyone else): pins the relay-reported seller exchange key
//!   and creates that session eagerly. Traffic from any other exchange key
//!   is dropped for the life of the context.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tradeseal_crypto::provider::CryptoProvider;
use tradeseal_protocol::cipher::{self, Sealed};
use tradeseal_protocol::envelope::PlainEnvelope;
use tradeseal_protocol::relay::{ChatConnector, ChatStore};
use tradeseal_protocol::trade::SignatureInfo;
use tradeseal_protocol::wire::{ChatKeyClaim, Frame};
use tradeseal_types::config::AppConfig;
use tradeseal_types::{Direction, Result, Role, TradeId, TradesealError, UnixTimestamp};
use tradeseal_wallet::Identity;

use crate::connect;
use crate::context::{ChatContext, ContextView};
use crate::sessions::{peer_label, ChatMessage, ChatSession, SessionRegistry, SessionState};

// ---------------------------------------------------------------------------
// Inbound outcomes
// ---------------------------------------------------------------------------

/// Why an inbound frame was not acted on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DropReason {
    /// No trade is open, or the context was reset.
    NoContext,
    WrongTrade,
    /// Missing, empty or non-base64 exchange key.
    MalformedKey,
    /// Our own key, echoed back by the relay.
    OwnKey,
    /// Sender is not the pinned peer.
    NotPinned,
    KeyDerivation(String),
    Undecryptable(String),
    /// Already accepted, typically a replayed live frame.
    Duplicate,
    UnexpectedFrame(&'static str),
    LocalState(String),
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoContext => write!(f, "no active trade context"),
            Self::WrongTrade => write!(f, "frame belongs to another trade"),
            Self::MalformedKey => write!(f, "malformed exchange key"),
            Self::OwnKey => write!(f, "own exchange key"),
            Self::NotPinned => write!(f, "sender is not the pinned peer"),
            Self::KeyDerivation(cause) => write!(f, "key derivation failed: {cause}"),
            Self::Undecryptable(cause) => write!(f, "undecryptable: {cause}"),
            Self::Duplicate => write!(f, "duplicate message"),
            Self::UnexpectedFrame(kind) => write!(f, "unexpected {kind} frame"),
            Self::LocalState(cause) => write!(f, "local state error: {cause}"),
        }
    }
}

/// What handling one inbound frame did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Inbound {
    /// A JOIN created or confirmed the session with `peer`.
    Joined { peer: String },
    /// A text message was appended to `peer`'s session.
    Message { peer: String, message: ChatMessage },
    /// A completion request was stored as `peer`'s pending proposal.
    Proposal { peer: String, proposal: SignatureInfo },
    /// Handshake leftovers (`auth_response`, `PONG`, `PING`).
    Ignored,
    Dropped(DropReason),
}

impl Inbound {
    pub fn is_dropped(&self) -> bool {
        matches!(self, Self::Dropped(_))
    }
}

fn local(err: TradesealError) -> DropReason {
    DropReason::LocalState(err.to_string())
}

// ---------------------------------------------------------------------------
// ChatSessionManager
// ---------------------------------------------------------------------------

pub struct ChatSessionManager {
    provider: Arc<dyn CryptoProvider>,
    chat_store: Arc<dyn ChatStore>,
    history_limit: usize,
    sessions: SessionRegistry,
    context: Mutex<Option<ChatContext>>,
    proposals: Mutex<HashMap<String, SignatureInfo>>,
}

impl ChatSessionManager {
    /// Opens the chat view of `trade_id`.
    ///
    /// 1. Fetch the trade's chat info and decide our role.
    /// 2. Buyers resolve the seller's exchange key before connecting.
    /// 3. Run the relay handshake under `config.connect_timeout()`.
    /// 4. Create the bootstrap session, if the peer is already known.
    /// 5. Feed frames received during the handshake through the normal
    ///    inbound path.
    ///
    /// # Errors
    ///
    /// - [`TradesealError::Validation`] if we are the buyer and the relay
    ///   reports no usable seller exchange key.
    /// - Handshake errors from [`connect::establish`].
    /// - [`TradesealError::KeyDerivation`] if the buyer cannot derive the
    ///   seller session.
    pub async fn open(
        provider: Arc<dyn CryptoProvider>,
        identity: Arc<Identity>,
        chat_store: Arc<dyn ChatStore>,
        connector: &dyn ChatConnector,
        trade_id: &TradeId,
        config: &AppConfig,
    ) -> Result<Self> {
        let info = chat_store.trade_chat_info(trade_id).await?;
        let role = if info.seller_pubkey == identity.sign_public_key().to_base64() {
            Role::Seller
        } else {
            Role::Buyer
        };

        let seller_key = match role {
            Role::Buyer => Some(normalized(info.seller_chat_pubkey.as_deref()).ok_or_else(
                || TradesealError::Validation {
                    reason: format!("seller of trade {trade_id} has no exchange key on record"),
                },
            )?),
            Role::Seller => None,
        };

        let connection =
            connect::establish(connector, trade_id, &identity, config.connect_timeout()).await?;

        let mut context = ChatContext::new(
            trade_id.clone(),
            role,
            Arc::clone(&identity),
            connection.channel,
        );
        if let Some(seller) = &seller_key {
            context.pin(seller.clone());
        }

        let manager = Self {
            sessions: SessionRegistry::new(Arc::clone(&provider)),
            provider,
            chat_store,
            history_limit: config.history_limit,
            context: Mutex::new(Some(context)),
            proposals: Mutex::new(HashMap::new()),
        };

        match (role, seller_key) {
            (Role::Buyer, Some(seller)) => {
                manager
                    .sessions
                    .get_or_create(identity.exchange(), &seller, trade_id)
                    .await?;
                manager.set_current_peer(&seller)?;
            }
            _ => {
                if let Some(buyer) = normalized(info.buyer_chat_pubkey.as_deref()) {
                    match manager
                        .sessions
                        .get_or_create(identity.exchange(), &buyer, trade_id)
                        .await
                    {
                        Ok(_) => manager.set_current_peer(&buyer)?,
                        Err(e) => tracing::warn!(
                            trade_id = %trade_id,
                            peer = %peer_label(&buyer),
                            error = %e,
                            "recorded buyer key unusable, waiting for JOIN"
                        ),
                    }
                }
            }
        }

        for frame in connection.backlog {
            manager.handle_frame(frame).await;
        }

        tracing::info!(trade_id = %trade_id, %role, "chat opened");
        Ok(manager)
    }

    fn context(&self) -> Result<MutexGuard<'_, Option<ChatContext>>> {
        self.context.lock().map_err(|_| TradesealError::InvalidState {
            reason: "chat context lock poisoned".into(),
        })
    }

    fn proposals(&self) -> Result<MutexGuard<'_, HashMap<String, SignatureInfo>>> {
        self.proposals.lock().map_err(|_| TradesealError::InvalidState {
            reason: "proposal lock poisoned".into(),
        })
    }

    fn view(&self) -> Result<Option<ContextView>> {
        Ok(self.context()?.as_ref().map(ChatContext::view))
    }

    fn require_view(&self) -> Result<ContextView> {
        self.view()?.ok_or_else(|| TradesealError::Validation {
            reason: "no active trade context".into(),
        })
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn trade_id(&self) -> Result<TradeId> {
        Ok(self.require_view()?.trade_id)
    }

    pub fn role(&self) -> Result<Role> {
        self.context()?
            .as_ref()
            .map(ChatContext::role)
            .ok_or_else(|| TradesealError::Validation {
                reason: "no active trade context".into(),
            })
    }

    pub fn own_chat_key(&self) -> Result<String> {
        Ok(self.require_view()?.own_chat_key)
    }

    pub fn current_peer(&self) -> Result<Option<String>> {
        Ok(self.view()?.and_then(|v| v.current_peer))
    }

    pub fn session_state(&self, peer: &str) -> Result<SessionState> {
        self.sessions.state(peer)
    }

    /// Peers with an active session.
    pub fn peers(&self) -> Result<Vec<String>> {
        self.sessions.peers()
    }

    pub fn messages(&self, peer: &str) -> Result<Vec<ChatMessage>> {
        match self.sessions.get(peer)? {
            Some(session) => session.messages(),
            None => Ok(Vec::new()),
        }
    }

    pub fn unread_count(&self, peer: &str) -> Result<usize> {
        match self.sessions.get(peer)? {
            Some(session) => session.unread_count(),
            None => Ok(0),
        }
    }

    /// The completion request `peer` sent last, if any.
    pub fn pending_proposal(&self, peer: &str) -> Result<Option<SignatureInfo>> {
        Ok(self.proposals()?.get(peer).cloned())
    }

    pub fn take_proposal(&self, peer: &str) -> Result<Option<SignatureInfo>> {
        Ok(self.proposals()?.remove(peer))
    }

    /// Selects the displayed session and clears its unread count.
    pub fn set_current_peer(&self, peer: &str) -> Result<()> {
        {
            let mut context = self.context()?;
            let context = context.as_mut().ok_or_else(|| TradesealError::Validation {
                reason: "no active trade context".into(),
            })?;
            context.set_current_peer(peer.to_owned());
        }
        if let Some(session) = self.sessions.get(peer)? {
            session.mark_read()?;
        }
        Ok(())
    }

    /// Drops the context: sessions, pin, current peer, pending proposals
    /// and the relay channel.
    pub fn reset(&self) -> Result<()> {
        let previous = self.context()?.take();
        self.sessions.clear()?;
        self.proposals()?.clear();
        if let Some(context) = previous {
            tracing::info!(trade_id = %context.trade_id(), "chat context reset");
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Inbound
    // -----------------------------------------------------------------------

    /// Handles one relay frame.
    pub async fn handle_frame(&self, frame: Frame) -> Inbound {
        let outcome = match frame {
            Frame::Join {
                trade_id,
                chat_pubkey,
                ..
            } => self.on_join(&trade_id, chat_pubkey.as_ref()).await,
            Frame::Chat {
                trade_id,
                sender_chat_pubkey,
                ciphertext,
                ..
            } => {
                self.on_chat(&trade_id, sender_chat_pubkey.as_deref(), &ciphertext)
                    .await
            }
            Frame::AuthResponse { .. } | Frame::Pong | Frame::Ping { .. } => Ok(Inbound::Ignored),
            other => Err(DropReason::UnexpectedFrame(other.kind())),
        };

        match outcome {
            Ok(inbound) => inbound,
            Err(reason) => {
                tracing::debug!(reason = %reason, "inbound frame dropped");
                Inbound::Dropped(reason)
            }
        }
    }

    async fn on_join(
        &self,
        trade_id: &TradeId,
        claim: Option<&ChatKeyClaim>,
    ) -> std::result::Result<Inbound, DropReason> {
        let view = self.view().map_err(local)?.ok_or(DropReason::NoContext)?;
        if *trade_id != view.trade_id {
            return Err(DropReason::WrongTrade);
        }
        let peer = claim
            .and_then(ChatKeyClaim::normalize)
            .ok_or(DropReason::MalformedKey)?;
        if peer == view.own_chat_key {
            return Err(DropReason::OwnKey);
        }
        if !view.admits(&peer) {
            return Err(DropReason::NotPinned);
        }

        self.session_for(&view, &peer).await?;
        if view.current_peer.is_none() {
            self.set_current_peer(&peer).map_err(local)?;
        }
        tracing::debug!(trade_id = %trade_id, peer = %peer_label(&peer), "peer joined");
        Ok(Inbound::Joined { peer })
    }

    async fn on_chat(
        &self,
        trade_id: &TradeId,
        sender: Option<&str>,
        ciphertext: &str,
    ) -> std::result::Result<Inbound, DropReason> {
        let view = self.view().map_err(local)?.ok_or(DropReason::NoContext)?;
        let peer = sender
            .and_then(|s| ChatKeyClaim::Raw(s.to_owned()).normalize())
            .ok_or(DropReason::MalformedKey)?;
        if peer == view.own_chat_key {
            return Err(DropReason::OwnKey);
        }
        if *trade_id != view.trade_id {
            return Err(DropReason::WrongTrade);
        }
        if !view.admits(&peer) {
            return Err(DropReason::NotPinned);
        }

        let session = self.session_for(&view, &peer).await?;
        let sealed =
            Sealed::from_wire(ciphertext).map_err(|e| DropReason::Undecryptable(e.to_string()))?;
        let envelope: PlainEnvelope =
            cipher::decrypt(self.provider.as_ref(), session.key(), &sealed)
                .map_err(|e| DropReason::Undecryptable(e.to_string()))?;
        if *envelope.trade_id() != view.trade_id {
            return Err(DropReason::WrongTrade);
        }

        match envelope {
            PlainEnvelope::Chat {
                content, timestamp, ..
            } => {
                let message = ChatMessage {
                    trade_id: view.trade_id.clone(),
                    sender_key: peer.clone(),
                    content,
                    timestamp,
                    direction: Direction::Inbound,
                };
                let unread = view.current_peer.as_deref() != Some(peer.as_str());
                let fresh = session
                    .record_inbound(ciphertext, message.clone(), unread)
                    .map_err(local)?;
                if !fresh {
                    return Err(DropReason::Duplicate);
                }
                Ok(Inbound::Message { peer, message })
            }
            PlainEnvelope::CompletionRequest { signature_info, .. } => {
                self.proposals()
                    .map_err(local)?
                    .insert(peer.clone(), signature_info.clone());
                tracing::info!(
                    trade_id = %view.trade_id,
                    peer = %peer_label(&peer),
                    "completion request received"
                );
                Ok(Inbound::Proposal {
                    peer,
                    proposal: signature_info,
                })
            }
        }
    }

    async fn session_for(
        &self,
        view: &ContextView,
        peer: &str,
    ) -> std::result::Result<Arc<ChatSession>, DropReason> {
        self.sessions
            .get_or_create(view.identity.exchange(), peer, &view.trade_id)
            .await
            .map_err(|e| match e {
                TradesealError::KeyDerivation { reason } => DropReason::KeyDerivation(reason),
                other => local(other),
            })
    }

    /// Runs stored history through the inbound CHAT path, oldest first.
    /// Our own stored messages are skipped; they were recorded when sent.
    pub async fn replay_history(&self) -> Result<Vec<Inbound>> {
        let view = self.require_view()?;
        let stored = self
            .chat_store
            .history(&view.trade_id, self.history_limit)
            .await?;

        let mut outcomes = Vec::with_capacity(stored.len());
        for item in stored {
            if item.sender_chat_pubkey == view.own_chat_key {
                continue;
            }
            let outcome = self
                .handle_frame(Frame::Chat {
                    trade_id: item.trade_id,
                    sender_chat_pubkey: Some(item.sender_chat_pubkey),
                    ciphertext: item.ciphertext,
                    timestamp: Some(item.timestamp),
                })
                .await;
            outcomes.push(outcome);
        }
        tracing::debug!(
            trade_id = %view.trade_id,
            replayed = outcomes.len(),
            "chat history replayed"
        );
        Ok(outcomes)
    }

    /// Receives and handles frames until none arrives for `idle`, or the
    /// channel closes.
    pub async fn pump(&self, idle: Duration) -> Result<Vec<Inbound>> {
        let channel = self.require_view()?.channel;
        let mut outcomes = Vec::new();
        loop {
            match tokio::time::timeout(idle, channel.recv()).await {
                Ok(Ok(Some(frame))) => outcomes.push(self.handle_frame(frame).await),
                Ok(Ok(None)) | Err(_) => break,
                Ok(Err(e)) => return Err(e),
            }
        }
        Ok(outcomes)
    }

    // -----------------------------------------------------------------------
    // Outbound
    // -----------------------------------------------------------------------

    /// Encrypts `text` to the current peer and sends it.
    ///
    /// # Errors
    ///
    /// - [`TradesealError::Validation`] without a trade context, a current
    ///   peer, or an active session for that peer.
    /// - Transport errors from the channel.
    pub async fn try_send_message(&self, text: &str) -> Result<ChatMessage> {
        let view = self.require_view()?;
        let session = self.current_session(&view)?;

        let envelope = PlainEnvelope::chat(view.trade_id.clone(), view.own_chat_key.clone(), text);
        let timestamp = envelope.timestamp();
        let wire = self.send_sealed(&view, &session, &envelope).await?;

        let message = ChatMessage {
            trade_id: view.trade_id.clone(),
            sender_key: view.own_chat_key.clone(),
            content: text.to_owned(),
            timestamp,
            direction: Direction::Outbound,
        };
        session.record_outbound(wire, message.clone())?;
        Ok(message)
    }

    /// [`try_send_message`](Self::try_send_message) reduced to success or
    /// failure; failures are logged at `warn`.
    pub async fn send_message(&self, text: &str) -> bool {
        match self.try_send_message(text).await {
            Ok(_) => true,
            Err(e @ TradesealError::Validation { .. }) => {
                tracing::warn!(error = %e, "message not sent, chat not ready");
                false
            }
            Err(e) => {
                tracing::warn!(error = %e, "message not sent");
                false
            }
        }
    }

    /// Delivers a completion request to the current peer.
    pub async fn send_completion_request(&self, info: SignatureInfo) -> Result<()> {
        let view = self.require_view()?;
        let session = self.current_session(&view)?;
        let envelope = PlainEnvelope::completion_request(
            view.trade_id.clone(),
            view.own_chat_key.clone(),
            info,
        );
        self.send_sealed(&view, &session, &envelope).await?;
        tracing::info!(
            trade_id = %view.trade_id,
            peer = %peer_label(session.peer()),
            "completion request sent"
        );
        Ok(())
    }

    fn current_session(&self, view: &ContextView) -> Result<Arc<ChatSession>> {
        let peer = view
            .current_peer
            .as_deref()
            .ok_or_else(|| TradesealError::Validation {
                reason: "no current chat peer".into(),
            })?;
        self.sessions
            .get(peer)?
            .ok_or_else(|| TradesealError::Validation {
                reason: format!("no active session with {}", peer_label(peer)),
            })
    }

    /// Seals `envelope` under the session key and sends it as a CHAT
    /// frame. Returns the wire ciphertext.
    async fn send_sealed(
        &self,
        view: &ContextView,
        session: &ChatSession,
        envelope: &PlainEnvelope,
    ) -> Result<String> {
        let sealed = cipher::encrypt(self.provider.as_ref(), session.key(), envelope)?;
        let wire = sealed.to_wire()?;
        view.channel
            .send(Frame::Chat {
                trade_id: view.trade_id.clone(),
                sender_chat_pubkey: Some(view.own_chat_key.clone()),
                ciphertext: wire.clone(),
                timestamp: Some(UnixTimestamp::now()),
            })
            .await?;
        Ok(wire)
    }
}

fn normalized(key: Option<&str>) -> Option<String> {
    key.and_then(|k| ChatKeyClaim::Raw(k.to_owned()).normalize())
}
