//! Transport frames exchanged with the relay.
//!
//! Frames are JSON objects tagged by `type`. The casing of the tag values
//! follows the relay's historical wire format: handshake frames are
//! lowercase, room frames uppercase.

use serde::{Deserialize, Serialize};
use tradeseal_crypto::encoding::is_base64_alphabet;
use tradeseal_types::{Result, TradeId, TradesealError, UnixTimestamp};

/// One transport frame.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Frame {
    #[serde(rename = "auth")]
    Auth {
        identity_pubkey: String,
        chat_pubkey: String,
    },

    #[serde(rename = "auth_response")]
    AuthResponse {
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        trade_id: Option<TradeId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<UnixTimestamp>,
    },

    #[serde(rename = "JOIN")]
    Join {
        trade_id: TradeId,
        identity_pubkey: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        chat_pubkey: Option<ChatKeyClaim>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<UnixTimestamp>,
    },

    #[serde(rename = "CHAT")]
    Chat {
        trade_id: TradeId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sender_chat_pubkey: Option<String>,
        ciphertext: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<UnixTimestamp>,
    },

    #[serde(rename = "PING")]
    Ping {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<UnixTimestamp>,
    },

    #[serde(rename = "PONG")]
    Pong,

    /// Any tag this build does not know.
    #[serde(other)]
    Unknown,
}

impl Frame {
    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| TradesealError::Protocol {
            reason: format!("frame encode failed: {e}"),
        })
    }

    pub fn decode(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| TradesealError::Protocol {
            reason: format!("frame decode failed: {e}"),
        })
    }

    /// Short tag name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Auth { .. } => "auth",
            Self::AuthResponse { .. } => "auth_response",
            Self::Join { .. } => "JOIN",
            Self::Chat { .. } => "CHAT",
            Self::Ping { .. } => "PING",
            Self::Pong => "PONG",
            Self::Unknown => "unknown",
        }
    }
}

/// The `chat_pubkey` field of a JOIN: either the bare base64 key or an
/// object wrapping it as `{"pubkey": ..}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChatKeyClaim {
    Raw(String),
    Wrapped { pubkey: String },
}

impl ChatKeyClaim {
    /// The claimed key, if non-empty and drawn from the base64 alphabet.
    pub fn normalize(&self) -> Option<String> {
        let text = match self {
            Self::Raw(s) | Self::Wrapped { pubkey: s } => s.trim(),
        };
        if text.is_empty() || !is_base64_alphabet(text) {
            return None;
        }
        Some(text.to_owned())
    }
}

impl From<String> for ChatKeyClaim {
    fn from(s: String) -> Self {
        Self::Raw(s)
    }
}
