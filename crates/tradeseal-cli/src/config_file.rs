//! Config file loading.

use std::path::Path;

use tradeseal_types::config::AppConfig;
use tradeseal_types::{Result, TradesealError};

/// Reads and validates `path`. No path, or a path that does not exist,
/// yields the defaults.
pub async fn load(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        None => AppConfig::default(),
        Some(path) => match tokio::fs::read_to_string(path).await {
            Ok(text) => parse(&text, path)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => AppConfig::default(),
            Err(e) => {
                return Err(TradesealError::Config {
                    reason: format!("cannot read {}: {e}", path.display()),
                })
            }
        },
    };
    config.validate()?;
    Ok(config)
}

fn parse(text: &str, path: &Path) -> Result<AppConfig> {
    serde_json::from_str(text).map_err(|e| TradesealError::Config {
        reason: format!("{} is not a valid config: {e}", path.display()),
    })
}
