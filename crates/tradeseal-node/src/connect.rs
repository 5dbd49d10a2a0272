//! Relay handshake.
//!
//! 1. Open a channel to the trade room.
//! 2. Send `auth{identity_pubkey, chat_pubkey}`.
//! 3. Await `auth_response{success: true}`. Room frames that arrive first
//!    are kept as a backlog for the chat manager.
//! 4. Announce our exchange key with a `JOIN`.
//!
//! The whole sequence runs under one `connect_timeout`.

use std::sync::Arc;
use std::time::Duration;

use tradeseal_protocol::relay::{ChatChannel, ChatConnector};
use tradeseal_protocol::wire::{ChatKeyClaim, Frame};
use tradeseal_types::{Result, TradeId, TradesealError, UnixTimestamp};
use tradeseal_wallet::Identity;

/// An authenticated room channel plus any frames received before the
/// handshake finished.
pub struct Connection {
    pub channel: Arc<dyn ChatChannel>,
    pub backlog: Vec<Frame>,
}

/// Runs the handshake for `trade_id`.
///
/// # Errors
///
/// - [`TradesealError::Timeout`] if it does not finish within `timeout`.
/// - [`TradesealError::Network`] if the relay rejects the auth or closes
///   the channel.
/// - Whatever the connector reports for opening the room (for example
///   `NotFound` for an unknown trade).
pub async fn establish(
    connector: &dyn ChatConnector,
    trade_id: &TradeId,
    identity: &Identity,
    timeout: Duration,
) -> Result<Connection> {
    match tokio::time::timeout(timeout, handshake(connector, trade_id, identity)).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(trade_id = %trade_id, ?timeout, "relay handshake timed out");
            Err(TradesealError::Timeout {
                reason: format!("relay handshake for trade {trade_id} exceeded {timeout:?}"),
            })
        }
    }
}

async fn handshake(
    connector: &dyn ChatConnector,
    trade_id: &TradeId,
    identity: &Identity,
) -> Result<Connection> {
    let identity_pubkey = identity.sign_public_key().to_base64();
    let chat_pubkey = identity.exchange_public_key().to_base64();

    let channel = connector.open(trade_id).await?;
    channel
        .send(Frame::Auth {
            identity_pubkey: identity_pubkey.clone(),
            chat_pubkey: chat_pubkey.clone(),
        })
        .await?;

    let mut backlog = Vec::new();
    loop {
        match channel.recv().await? {
            None => {
                return Err(TradesealError::Network {
                    reason: "relay closed the channel during handshake".into(),
                })
            }
            Some(Frame::AuthResponse { success: true, .. }) => break,
            Some(Frame::AuthResponse { success: false, .. }) => {
                return Err(TradesealError::Network {
                    reason: "relay rejected authentication".into(),
                })
            }
            Some(other) => backlog.push(other),
        }
    }

    channel
        .send(Frame::Join {
            trade_id: trade_id.clone(),
            identity_pubkey,
            chat_pubkey: Some(ChatKeyClaim::Raw(chat_pubkey)),
            timestamp: Some(UnixTimestamp::now()),
        })
        .await?;

    tracing::info!(
        trade_id = %trade_id,
        identity = %identity.fingerprint(),
        backlog = backlog.len(),
        "connected to trade room"
    );
    Ok(Connection { channel, backlog })
}
