//! Explicit per-trade chat context.
//!
//! Everything a chat view needs lives here rather than in globals: the
//! trade, our role in it, our keys, the pinned peer (buyers only), the
//! currently displayed peer and the relay channel.

use std::sync::Arc;

use tradeseal_protocol::relay::ChatChannel;
use tradeseal_types::{Role, TradeId};
use tradeseal_wallet::Identity;

pub struct ChatContext {
    trade_id: TradeId,
    role: Role,
    identity: Arc<Identity>,
    /// Our exchange public key, base64.
    own_chat_key: String,
    /// Buyers accept traffic from this exchange key only.
    pinned_peer: Option<String>,
    current_peer: Option<String>,
    channel: Arc<dyn ChatChannel>,
}

/// Cheap copy of the routing fields, taken so no lock is held while a
/// frame is being processed.
#[derive(Clone)]
pub(crate) struct ContextView {
    pub trade_id: TradeId,
    pub identity: Arc<Identity>,
    pub channel: Arc<dyn ChatChannel>,
    pub own_chat_key: String,
    pub pinned_peer: Option<String>,
    pub current_peer: Option<String>,
}

impl ChatContext {
    pub fn new(
        trade_id: TradeId,
        role: Role,
        identity: Arc<Identity>,
        channel: Arc<dyn ChatChannel>,
    ) -> Self {
        let own_chat_key = identity.exchange_public_key().to_base64();
        Self {
            trade_id,
            role,
            identity,
            own_chat_key,
            pinned_peer: None,
            current_peer: None,
            channel,
        }
    }

    pub fn trade_id(&self) -> &TradeId {
        &self.trade_id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn identity(&self) -> &Arc<Identity> {
        &self.identity
    }

    pub fn own_chat_key(&self) -> &str {
        &self.own_chat_key
    }

    pub fn pinned_peer(&self) -> Option<&str> {
        self.pinned_peer.as_deref()
    }

    pub fn current_peer(&self) -> Option<&str> {
        self.current_peer.as_deref()
    }

    pub fn channel(&self) -> &Arc<dyn ChatChannel> {
        &self.channel
    }

    pub fn pin(&mut self, peer: String) {
        self.pinned_peer = Some(peer);
    }

    pub fn set_current_peer(&mut self, peer: String) {
        self.current_peer = Some(peer);
    }

    pub(crate) fn view(&self) -> ContextView {
        ContextView {
            trade_id: self.trade_id.clone(),
            identity: Arc::clone(&self.identity),
            channel: Arc::clone(&self.channel),
            own_chat_key: self.own_chat_key.clone(),
            pinned_peer: self.pinned_peer.clone(),
            current_peer: self.current_peer.clone(),
        }
    }
}

impl ContextView {
    /// `true` if the pin, when set, admits `peer`.
    pub fn admits(&self, peer: &str) -> bool {
        self.pinned_peer.as_deref().map_or(true, |pin| pin == peer)
    }
}
