//! Per-trade rooms and the in-memory frame channel.
//!
//! A [`MemoryChannel`] is one connection to a trade room. Frames sent on
//! it are handled by the relay synchronously; frames addressed to it are
//! queued on an unbounded tokio channel and drained with
//! [`ChatChannel::recv`].
//!
//! Protocol per connection:
//!
//! 1. The first frame must be `auth`. Anything else is answered with
//!    `auth_response{success:false}` and ignored.
//! 2. On `auth` the relay replies `auth_response{success:true}`, records
//!    the chat key on the trade (best effort), enters the room and
//!    broadcasts `JOIN` to everyone in it, the new member included.
//! 3. `CHAT` is persisted and broadcast with the authenticated sender key.
//!    `JOIN` re-broadcasts. `PING` is answered with `PONG`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tradeseal_protocol::relay::{ChatChannel, RoomParticipant};
use tradeseal_protocol::wire::{ChatKeyClaim, Frame};
use tradeseal_types::{Result, TradeId, TradesealError, UnixTimestamp};

use crate::relay::RelayInner;

// ---------------------------------------------------------------------------
// Rooms
// ---------------------------------------------------------------------------

struct Member {
    connection: u64,
    identity_pubkey: String,
    chat_pubkey: String,
    joined_at: UnixTimestamp,
    outbox: UnboundedSender<Frame>,
}

#[derive(Default)]
pub(crate) struct RoomRegistry {
    rooms: HashMap<TradeId, Vec<Member>>,
}

impl RoomRegistry {
    /// Adds a member, replacing any earlier entry for the same connection.
    fn enter(&mut self, trade_id: &TradeId, member: Member) {
        let members = self.rooms.entry(trade_id.clone()).or_default();
        members.retain(|m| m.connection != member.connection);
        members.push(member);
    }

    fn leave(&mut self, trade_id: &TradeId, connection: u64) {
        if let Some(members) = self.rooms.get_mut(trade_id) {
            members.retain(|m| m.connection != connection);
            if members.is_empty() {
                self.rooms.remove(trade_id);
            }
        }
    }

    /// Sends `frame` to every member; members whose receiver is gone are
    /// removed. Returns the number of deliveries.
    fn broadcast(&mut self, trade_id: &TradeId, frame: &Frame) -> usize {
        let Some(members) = self.rooms.get_mut(trade_id) else {
            return 0;
        };
        members.retain(|m| m.outbox.send(frame.clone()).is_ok());
        members.len()
    }

    pub(crate) fn participants(&self, trade_id: &TradeId) -> Vec<RoomParticipant> {
        self.rooms
            .get(trade_id)
            .map(|members| {
                members
                    .iter()
                    .map(|m| RoomParticipant {
                        identity_pubkey: m.identity_pubkey.clone(),
                        chat_pubkey: m.chat_pubkey.clone(),
                        joined_at: m.joined_at,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// MemoryChannel
// ---------------------------------------------------------------------------

#[derive(Clone)]
struct Authenticated {
    identity_pubkey: String,
    chat_pubkey: String,
}

pub struct MemoryChannel {
    relay: Arc<RelayInner>,
    trade_id: TradeId,
    connection: u64,
    outbox: Mutex<Option<UnboundedSender<Frame>>>,
    inbox: tokio::sync::Mutex<UnboundedReceiver<Frame>>,
    session: Mutex<Option<Authenticated>>,
}

impl MemoryChannel {
    pub(crate) fn new(relay: Arc<RelayInner>, trade_id: TradeId, connection: u64) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            relay,
            trade_id,
            connection,
            outbox: Mutex::new(Some(tx)),
            inbox: tokio::sync::Mutex::new(rx),
            session: Mutex::new(None),
        }
    }

    pub fn trade_id(&self) -> &TradeId {
        &self.trade_id
    }

    /// Next queued frame without waiting, if any.
    pub fn try_recv(&self) -> Option<Frame> {
        self.inbox.try_lock().ok()?.try_recv().ok()
    }

    /// Drains every queued frame.
    pub fn drain(&self) -> Vec<Frame> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }

    /// Leaves the room and closes the inbox. Later sends fail with
    /// `Network`; `recv` returns `None` once the queue is empty.
    pub fn close(&self) {
        if let Ok(mut outbox) = self.outbox.lock() {
            outbox.take();
        }
        if let Ok(mut state) = self.relay.lock() {
            state.rooms.leave(&self.trade_id, self.connection);
        }
        tracing::debug!(
            trade_id = %self.trade_id,
            connection = self.connection,
            "room channel closed"
        );
    }

    fn outbox(&self) -> Result<UnboundedSender<Frame>> {
        self.outbox
            .lock()
            .map_err(|_| poisoned())?
            .clone()
            .ok_or_else(|| TradesealError::Network {
                reason: "channel closed".into(),
            })
    }

    fn authenticated(&self) -> Result<Option<Authenticated>> {
        Ok(self.session.lock().map_err(|_| poisoned())?.clone())
    }

    fn handle(&self, frame: Frame) -> Result<()> {
        let outbox = self.outbox()?;
        let session = self.authenticated()?;

        match (frame, session) {
            (
                Frame::Auth {
                    identity_pubkey,
                    chat_pubkey,
                },
                _,
            ) => self.authenticate(&outbox, identity_pubkey, chat_pubkey),
            (other, None) => {
                tracing::debug!(kind = other.kind(), "frame before auth rejected");
                reply(&outbox, auth_response(false, None))
            }
            (Frame::Join { .. }, Some(me)) => {
                self.relay
                    .lock()?
                    .rooms
                    .broadcast(&self.trade_id, &self.join_frame(&me));
                Ok(())
            }
            (Frame::Chat { ciphertext, .. }, Some(me)) => {
                if ciphertext.is_empty() {
                    tracing::debug!(trade_id = %self.trade_id, "CHAT without ciphertext ignored");
                    return Ok(());
                }
                let mut state = self.relay.lock()?;
                let stored = state.record_chat(&self.trade_id, &me.chat_pubkey, &ciphertext);
                let frame = Frame::Chat {
                    trade_id: self.trade_id.clone(),
                    sender_chat_pubkey: Some(me.chat_pubkey),
                    ciphertext,
                    timestamp: Some(stored.timestamp),
                };
                state.rooms.broadcast(&self.trade_id, &frame);
                Ok(())
            }
            (Frame::Ping { .. }, Some(_)) => reply(&outbox, Frame::Pong),
            (other, Some(_)) => {
                tracing::debug!(kind = other.kind(), "frame ignored by relay");
                Ok(())
            }
        }
    }

    fn authenticate(
        &self,
        outbox: &UnboundedSender<Frame>,
        identity_pubkey: String,
        chat_pubkey: String,
    ) -> Result<()> {
        if identity_pubkey.is_empty() || chat_pubkey.is_empty() {
            return reply(outbox, auth_response(false, None));
        }
        reply(outbox, auth_response(true, Some(self.trade_id.clone())))?;

        let me = Authenticated {
            identity_pubkey,
            chat_pubkey,
        };
        *self.session.lock().map_err(|_| poisoned())? = Some(me.clone());

        let mut state = self.relay.lock()?;
        if let Err(e) =
            state.set_chat_pubkey(&self.trade_id, &me.identity_pubkey, &me.chat_pubkey)
        {
            tracing::debug!(trade_id = %self.trade_id, error = %e, "chat key not recorded");
        }
        state.rooms.enter(
            &self.trade_id,
            Member {
                connection: self.connection,
                identity_pubkey: me.identity_pubkey.clone(),
                chat_pubkey: me.chat_pubkey.clone(),
                joined_at: UnixTimestamp::now(),
                outbox: outbox.clone(),
            },
        );
        let delivered = state.rooms.broadcast(&self.trade_id, &self.join_frame(&me));
        tracing::info!(
            trade_id = %self.trade_id,
            connection = self.connection,
            room_size = delivered,
            "participant joined room"
        );
        Ok(())
    }

    fn join_frame(&self, me: &Authenticated) -> Frame {
        Frame::Join {
            trade_id: self.trade_id.clone(),
            identity_pubkey: me.identity_pubkey.clone(),
            chat_pubkey: Some(ChatKeyClaim::Raw(me.chat_pubkey.clone())),
            timestamp: Some(UnixTimestamp::now()),
        }
    }
}

#[async_trait]
impl ChatChannel for MemoryChannel {
    async fn send(&self, frame: Frame) -> Result<()> {
        self.handle(frame)
    }

    async fn recv(&self) -> Result<Option<Frame>> {
        let mut inbox = self.inbox.lock().await;
        Ok(inbox.recv().await)
    }
}

impl Drop for MemoryChannel {
    fn drop(&mut self) {
        if let Ok(mut state) = self.relay.lock() {
            state.rooms.leave(&self.trade_id, self.connection);
        }
    }
}

fn auth_response(success: bool, trade_id: Option<TradeId>) -> Frame {
    Frame::AuthResponse {
        success,
        trade_id,
        timestamp: Some(UnixTimestamp::now()),
    }
}

fn reply(outbox: &UnboundedSender<Frame>, frame: Frame) -> Result<()> {
    outbox.send(frame).map_err(|_| TradesealError::Network {
        reason: "channel closed".into(),
    })
}

fn poisoned() -> TradesealError {
    TradesealError::Storage {
        reason: "room channel lock poisoned".into(),
    }
}
