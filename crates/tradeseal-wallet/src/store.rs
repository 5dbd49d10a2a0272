//! Identity persistence.
//!
//! Last write wins; there is no cross-process locking. The file store
//! writes `<path>.tmp` (created 0600) and renames it over the target so
//! a crash never leaves a half-written identity behind. The temp file is
//! removed on any failure after it is created.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tradeseal_types::{Result, TradesealError};
use zeroize::Zeroizing;

use crate::identity::Identity;

#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Replaces whatever identity is stored.
    async fn persist(&self, identity: &Identity) -> Result<()>;

    /// `None` when nothing has been stored yet.
    async fn load(&self) -> Result<Option<Identity>>;
}

// ---------------------------------------------------------------------------
// File store
// ---------------------------------------------------------------------------

/// Stores the export document as a single JSON file.
pub struct FileIdentityStore {
    path: PathBuf,
}

impl FileIdentityStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".tmp");
        PathBuf::from(name)
    }
}

#[async_trait]
impl IdentityStore for FileIdentityStore {
    async fn persist(&self, identity: &Identity) -> Result<()> {
        let text = identity.export_to_text()?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| storage_error("create identity directory", &e))?;
        }

        let tmp = self.tmp_path();
        let _ = tokio::fs::remove_file(&tmp).await;
        if let Err(e) = write_private(&tmp, text.as_bytes()).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e);
        }

        if let Err(e) = tokio::fs::rename(&tmp, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(storage_error("replace identity file", &e));
        }

        tracing::info!(
            path = %self.path.display(),
            fingerprint = %identity.fingerprint(),
            "identity persisted"
        );
        Ok(())
    }

    async fn load(&self) -> Result<Option<Identity>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => Zeroizing::new(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "no stored identity");
                return Ok(None);
            }
            Err(e) => return Err(storage_error("read identity file", &e)),
        };
        let text = std::str::from_utf8(&bytes).map_err(|e| TradesealError::Validation {
            reason: format!("identity file is not UTF-8: {e}"),
        })?;
        let identity = Identity::import_from_text(text)?;
        tracing::debug!(fingerprint = %identity.fingerprint(), "identity loaded");
        Ok(Some(identity))
    }
}

/// Creates `path` owner-only (0600 on unix) and writes `bytes` to it.
/// The file never exists with wider permissions.
async fn write_private(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options
        .open(path)
        .await
        .map_err(|e| storage_error("create identity file", &e))?;
    file.write_all(bytes)
        .await
        .map_err(|e| storage_error("write identity file", &e))?;
    file.sync_all()
        .await
        .map_err(|e| storage_error("sync identity file", &e))
}

fn storage_error(action: &str, err: &std::io::Error) -> TradesealError {
    TradesealError::Storage {
        reason: format!("failed to {action}: {err}"),
    }
}

// ---------------------------------------------------------------------------
// Memory store
// ---------------------------------------------------------------------------

/// Process-local store. Keeps the export text, not live key objects.
#[derive(Default)]
pub struct MemoryIdentityStore {
    slot: Mutex<Option<Zeroizing<String>>>,
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IdentityStore for MemoryIdentityStore {
    async fn persist(&self, identity: &Identity) -> Result<()> {
        let text = identity.export_to_text()?;
        let mut slot = self.slot.lock().map_err(|_| TradesealError::Storage {
            reason: "identity store lock poisoned".into(),
        })?;
        *slot = Some(text);
        Ok(())
    }

    async fn load(&self) -> Result<Option<Identity>> {
        let slot = self.slot.lock().map_err(|_| TradesealError::Storage {
            reason: "identity store lock poisoned".into(),
        })?;
        slot.as_deref()
            .map(|text| Identity::import_from_text(text))
            .transpose()
    }
}
