//! Core shared types for the Tradeseal trade and chat protocol.
//!
//! Every crate in the workspace reports failures through
//! [`TradesealError`] and shares the identifiers and small enums
//! defined here.

pub mod config;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// TradeId
// ---------------------------------------------------------------------------

/// Content-addressed trade identifier.
///
/// In practice this is the lowercase hex SHA-256 of the canonical trade
/// body, but any non-empty string is accepted so relays may echo ids
/// they did not compute themselves.
#[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TradeId(String);

impl TradeId {
    /// Creates a `TradeId`, rejecting empty or whitespace-only input.
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(TradesealError::Validation {
                reason: "trade id must not be empty".into(),
            });
        }
        Ok(Self(value))
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the UTF-8 bytes of the identifier.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl TryFrom<String> for TradeId {
    type Error = TradesealError;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TradeId> for String {
    fn from(id: TradeId) -> Self {
        id.0
    }
}

impl FromStr for TradeId {
    type Err = TradesealError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Display for TradeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// UnixTimestamp
// ---------------------------------------------------------------------------

/// Seconds since the Unix epoch, UTC.
///
/// Serialized as a bare integer so it hashes identically on every
/// platform that speaks the wire format.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnixTimestamp(i64);

impl UnixTimestamp {
    /// Current wall-clock time, truncated to whole seconds.
    pub fn now() -> Self {
        Self(Utc::now().timestamp())
    }

    /// Wraps a raw seconds value.
    pub fn from_secs(secs: i64) -> Self {
        Self(secs)
    }

    /// Returns the raw seconds value.
    pub fn as_secs(&self) -> i64 {
        self.0
    }

    /// Converts to a `DateTime<Utc>`, if the value is in chrono's range.
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.0, 0)
    }
}

impl fmt::Display for UnixTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_datetime() {
            Some(dt) => write!(f, "{}", dt.to_rfc3339()),
            None => write!(f, "{}", self.0),
        }
    }
}

// ---------------------------------------------------------------------------
// TradeStatus
// ---------------------------------------------------------------------------

/// Lifecycle of a trade as held by the relay.
///
/// Transitions are monotonic: `Open → Joined → Completed | Cancelled`,
/// and an `Open` trade may also be cancelled before anyone joins.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeStatus {
    Open,
    Joined,
    Completed,
    Cancelled,
}

impl TradeStatus {
    /// Returns `true` if moving from `self` to `next` is permitted.
    pub fn can_transition_to(self, next: TradeStatus) -> bool {
        matches!(
            (self, next),
            (Self::Open, Self::Joined)
                | (Self::Open, Self::Cancelled)
                | (Self::Joined, Self::Completed)
                | (Self::Joined, Self::Cancelled)
        )
    }

    /// `Completed` and `Cancelled` accept no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

impl fmt::Display for TradeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "OPEN"),
            Self::Joined => write!(f, "JOINED"),
            Self::Completed => write!(f, "COMPLETED"),
            Self::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

// ---------------------------------------------------------------------------
// SettlementResult
// ---------------------------------------------------------------------------

/// Outcome carried inside a signed settlement body.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SettlementResult {
    Completed,
    Cancelled,
}

impl fmt::Display for SettlementResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => write!(f, "COMPLETED"),
            Self::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

// ---------------------------------------------------------------------------
// Role / Direction
// ---------------------------------------------------------------------------

/// Which side of a trade the local party is on.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Seller,
    Buyer,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Seller => write!(f, "seller"),
            Self::Buyer => write!(f, "buyer"),
        }
    }
}

/// Whether a chat message was received or sent by the local party.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Inbound,
    Outbound,
}

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Workspace-wide error type.
///
/// Inbound-frame failures never surface as this type past the chat
/// handler; they are folded into a dropped outcome there. Everything
/// else propagates with `?`.
#[derive(Debug, Error)]
pub enum TradesealError {
    /// Missing identity, missing trade id, malformed import, bad encoding.
    #[error("validation error: {reason}")]
    Validation { reason: String },

    /// Key agreement or key derivation failed.
    #[error("key derivation error: {reason}")]
    KeyDerivation { reason: String },

    /// AEAD tag mismatch or malformed ciphertext/plaintext.
    #[error("authentication error: {reason}")]
    Authentication { reason: String },

    /// Settlement attestations disagree or fail verification.
    #[error("signature mismatch: {reason}")]
    SignatureMismatch { reason: String },

    /// Other primitive failure (bad key bytes, signing failure).
    #[error("crypto error: {reason}")]
    Crypto { reason: String },

    /// Serialization failure or malformed relay reply.
    #[error("protocol error: {reason}")]
    Protocol { reason: String },

    /// Transport or handshake failure.
    #[error("network error: {reason}")]
    Network { reason: String },

    /// An operation exceeded its deadline.
    #[error("timed out: {reason}")]
    Timeout { reason: String },

    /// Local persistence failure.
    #[error("storage error: {reason}")]
    Storage { reason: String },

    /// The referenced trade does not exist.
    #[error("not found: {reason}")]
    NotFound { reason: String },

    /// The relay rejected a state transition.
    #[error("invalid state: {reason}")]
    InvalidState { reason: String },

    #[error("configuration error: {reason}")]
    Config { reason: String },
}

/// Convenience alias used across all Tradeseal crates.
pub type Result<T> = std::result::Result<T, TradesealError>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trade_id_rejects_empty() {
        assert!(TradeId::new("").is_err());
        assert!(TradeId::new("   ").is_err());
        assert!(TradeId::new("abc").is_ok());
    }

    #[test]
    fn trade_id_serde_rejects_empty() {
        let parsed: std::result::Result<TradeId, _> = serde_json::from_str("\"\"");
        assert!(parsed.is_err());
    }

    #[test]
    fn trade_id_serializes_as_plain_string(
    ) -> std::result::Result<(), Box<dyn std::error::Error>> {
        let id = TradeId::new("deadbeef")?;
        assert_eq!(serde_json::to_string(&id)?, "\"deadbeef\"");
        let back: TradeId = serde_json::from_str("\"deadbeef\"")?;
        assert_eq!(back, id);
        Ok(())
    }

    #[test]
    fn timestamp_serializes_as_integer() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let ts = UnixTimestamp::from_secs(1_700_000_000);
        assert_eq!(serde_json::to_string(&ts)?, "1700000000");
        Ok(())
    }

    #[test]
    fn status_wire_names() -> std::result::Result<(), Box<dyn std::error::Error>> {
        assert_eq!(serde_json::to_string(&TradeStatus::Open)?, "\"OPEN\"");
        assert_eq!(serde_json::to_string(&TradeStatus::Cancelled)?, "\"CANCELLED\"");
        assert_eq!(
            serde_json::to_string(&SettlementResult::Completed)?,
            "\"COMPLETED\""
        );
        Ok(())
    }

    #[test]
    fn status_transitions_are_monotonic() {
        use TradeStatus::*;
        assert!(Open.can_transition_to(Joined));
        assert!(Open.can_transition_to(Cancelled));
        assert!(Joined.can_transition_to(Completed));
        assert!(Joined.can_transition_to(Cancelled));

        assert!(!Open.can_transition_to(Completed));
        assert!(!Joined.can_transition_to(Open));
        assert!(!Completed.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Joined));
        assert!(Completed.is_terminal());
        assert!(!Joined.is_terminal());
    }

    #[test]
    fn error_display_includes_reason() {
        let err = TradesealError::SignatureMismatch {
            reason: "hashes differ".into(),
        };
        assert_eq!(err.to_string(), "signature mismatch: hashes differ");
    }
}
