//! Plaintext chat envelopes (what goes inside a sealed `CHAT` frame).
//!
//! Two shapes exist on the wire:
//!
//! ```text
//! {"type":"chat","trade_id":..,"sender_key":..,"content":..,"timestamp":..}
//! {"type":"completion_request","trade_id":..,"sender_key":..,"signature_info":{..},"timestamp":..}
//! ```
//!
//! Older peers send the chat text under `message` instead of `content`
//! and may omit `type`. Decoding normalizes both into [`PlainEnvelope`];
//! encoding always emits the current form.

use serde::{Deserialize, Serialize};
use tradeseal_types::{TradeId, TradesealError, UnixTimestamp};

use crate::trade::SignatureInfo;

/// Decrypted chat payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", try_from = "RawEnvelope")]
pub enum PlainEnvelope {
    Chat {
        trade_id: TradeId,
        sender_key: String,
        content: String,
        timestamp: UnixTimestamp,
    },
    CompletionRequest {
        trade_id: TradeId,
        sender_key: String,
        signature_info: SignatureInfo,
        timestamp: UnixTimestamp,
    },
}

impl PlainEnvelope {
    pub fn chat(trade_id: TradeId, sender_key: String, content: impl Into<String>) -> Self {
        Self::Chat {
            trade_id,
            sender_key,
            content: content.into(),
            timestamp: UnixTimestamp::now(),
        }
    }

    pub fn completion_request(
        trade_id: TradeId,
        sender_key: String,
        signature_info: SignatureInfo,
    ) -> Self {
        Self::CompletionRequest {
            trade_id,
            sender_key,
            signature_info,
            timestamp: UnixTimestamp::now(),
        }
    }

    pub fn trade_id(&self) -> &TradeId {
        match self {
            Self::Chat { trade_id, .. } | Self::CompletionRequest { trade_id, .. } => trade_id,
        }
    }

    pub fn timestamp(&self) -> UnixTimestamp {
        match self {
            Self::Chat { timestamp, .. } | Self::CompletionRequest { timestamp, .. } => *timestamp,
        }
    }
}

/// Lenient decode shape covering every envelope version seen in the wild.
#[derive(Deserialize)]
struct RawEnvelope {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    trade_id: TradeId,
    #[serde(default)]
    sender_key: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    signature_info: Option<SignatureInfo>,
    #[serde(default)]
    timestamp: Option<UnixTimestamp>,
}

impl TryFrom<RawEnvelope> for PlainEnvelope {
    type Error = TradesealError;

    fn try_from(raw: RawEnvelope) -> std::result::Result<Self, Self::Error> {
        let timestamp = raw.timestamp.unwrap_or_else(|| UnixTimestamp::from_secs(0));
        match raw.kind.as_deref().unwrap_or("chat") {
            "chat" => {
                let content = raw.content.or(raw.message).ok_or_else(|| {
                    TradesealError::Protocol {
                        reason: "chat envelope has neither content nor message".into(),
                    }
                })?;
                Ok(Self::Chat {
                    trade_id: raw.trade_id,
                    sender_key: raw.sender_key,
                    content,
                    timestamp,
                })
            }
            "completion_request" => {
                let signature_info = raw.signature_info.ok_or_else(|| TradesealError::Protocol {
                    reason: "completion request without signature_info".into(),
                })?;
                Ok(Self::CompletionRequest {
                    trade_id: raw.trade_id,
                    sender_key: raw.sender_key,
                    signature_info,
                    timestamp,
                })
            }
            other => Err(TradesealError::Protocol {
                reason: format!("unknown envelope type {other:?}"),
            }),
        }
    }
}
