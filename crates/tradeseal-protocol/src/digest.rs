//! Content address: SHA-256 rendered as lowercase hex.
//!
//! A [`Digest`] is both an identifier (trade ids, content hashes) and
//! the message that gets signed. Signatures always cover the 32 raw
//! bytes, never the hex text.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tradeseal_crypto::encoding::hex_decode_fixed;
use tradeseal_crypto::hash::sha256;
use tradeseal_types::{Result, TradeId, TradesealError};

/// SHA-256 digest. Display and serde form is 64 lowercase hex chars.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Digest([u8; 32]);

impl Digest {
    pub const LEN: usize = 32;

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Hashes raw bytes.
    pub fn of(data: &[u8]) -> Self {
        Self(sha256(data))
    }

    /// Parses 64 hex characters.
    ///
    /// # Errors
    ///
    /// [`TradesealError::Validation`] on bad hex or wrong length.
    pub fn from_hex(s: &str) -> Result<Self> {
        Ok(Self(hex_decode_fixed(s, "digest")?))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// The trade id form of this digest.
    pub fn to_trade_id(&self) -> Result<TradeId> {
        TradeId::new(self.to_hex())
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Digest {
    type Err = TradesealError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl TryFrom<String> for Digest {
    type Error = TradesealError;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        Self::from_hex(&value)
    }
}

impl From<Digest> for String {
    fn from(d: Digest) -> Self {
        d.to_hex()
    }
}
