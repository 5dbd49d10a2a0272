//! Application configuration with sensible defaults.
//!
//! Operational limits used by the chat manager, the settlement layer
//! and the CLI live here. Every value has a documented default.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Result, TradesealError};

/// Upper bound accepted for any list/backlog limit.
const MAX_LIMIT: usize = 1000;

/// Log levels accepted by `log_level`.
const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Global application configuration.
///
/// Loaded from an optional JSON file; missing fields fall back to the
/// defaults below.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Bound on the relay handshake (open + auth + auth_response), in
    /// seconds. A connection that has not completed by then is a hard
    /// failure.
    pub connect_timeout_secs: u64,

    /// Maximum number of stored chat messages fetched for history replay.
    pub history_limit: usize,

    /// Maximum number of trades returned by a trade listing.
    pub trade_list_limit: usize,

    /// Default log filter when `RUST_LOG` is unset.
    pub log_level: String,

    /// File name of the persisted identity, relative to the data dir.
    pub identity_file: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 5,
            history_limit: 100,
            trade_list_limit: 50,
            log_level: "info".into(),
            identity_file: "identity.json".into(),
        }
    }
}

impl AppConfig {
    /// Returns the handshake bound as a [`Duration`].
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Validates all configuration values.
    pub fn validate(&self) -> Result<()> {
        if self.connect_timeout_secs == 0 {
            return Err(TradesealError::Config {
                reason: "connect_timeout_secs must be greater than 0".into(),
            });
        }

        if self.history_limit == 0 || self.history_limit > MAX_LIMIT {
            return Err(TradesealError::Config {
                reason: format!("history_limit must be 1..={MAX_LIMIT}"),
            });
        }

        if self.trade_list_limit == 0 || self.trade_list_limit > MAX_LIMIT {
            return Err(TradesealError::Config {
                reason: format!("trade_list_limit must be 1..={MAX_LIMIT}"),
            });
        }

        let level = self.log_level.to_ascii_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(TradesealError::Config {
                reason: format!("unknown log_level '{}'", self.log_level),
            });
        }

        if self.identity_file.trim().is_empty() {
            return Err(TradesealError::Config {
                reason: "identity_file must not be empty".into(),
            });
        }

        Ok(())
    }
}
