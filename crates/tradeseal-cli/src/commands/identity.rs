//! Identity commands.
//!
//! All of these operate on the identity file under the data directory.
//! Nothing is sent anywhere.

use std::path::{Path, PathBuf};

use clap::Subcommand;
use tradeseal_crypto::provider::RustCryptoProvider;
use tradeseal_types::{Result, TradesealError};
use tradeseal_wallet::{FileIdentityStore, Identity, IdentityStore};

use crate::output;
use crate::GlobalOpts;

#[derive(Subcommand)]
pub enum IdentityAction {
    /// Generate a fresh identity and store it.
    Generate {
        /// Replace an existing identity.
        #[arg(long)]
        force: bool,
    },
    /// Show the stored identity's public keys and fingerprint.
    Show,
    /// Print the stored identity's fingerprint only.
    Fingerprint,
    /// Write the identity document, private keys included.
    Export {
        /// Destination file. Stdout when omitted.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Store an identity from an exported document.
    Import {
        /// Exported identity document.
        file: PathBuf,
        /// Replace an existing identity.
        #[arg(long)]
        force: bool,
    },
}

pub async fn run(action: IdentityAction, opts: &GlobalOpts) -> Result<()> {
    let store = FileIdentityStore::new(opts.identity_path());
    match action {
        IdentityAction::Generate { force } => generate(&store, force, opts).await,
        IdentityAction::Show => show(&store, opts).await,
        IdentityAction::Fingerprint => {
            let identity = require(&store).await?;
            if opts.json {
                output::print_fields(
                    &[("fingerprint", "Fingerprint", identity.fingerprint())],
                    true,
                );
            } else {
                println!("{}", identity.fingerprint());
            }
            Ok(())
        }
        IdentityAction::Export { out } => export(&store, out.as_deref(), opts).await,
        IdentityAction::Import { file, force } => import(&store, &file, force, opts).await,
    }
}

async fn generate(store: &FileIdentityStore, force: bool, opts: &GlobalOpts) -> Result<()> {
    refuse_overwrite(store, force).await?;
    let identity = Identity::generate(&RustCryptoProvider);
    store.persist(&identity).await?;
    output::print_success(
        &format!("identity {} written to {}", identity.fingerprint(), store.path().display()),
        opts.json,
    );
    Ok(())
}

async fn show(store: &FileIdentityStore, opts: &GlobalOpts) -> Result<()> {
    let identity = require(store).await?;
    output::print_fields(
        &[
            ("fingerprint", "Fingerprint", identity.fingerprint()),
            ("sign_pubkey", "Signing key", identity.sign_public_key().to_base64()),
            ("chat_pubkey", "Chat key", identity.exchange_public_key().to_base64()),
            ("path", "Path", store.path().display().to_string()),
        ],
        opts.json,
    );
    Ok(())
}

async fn export(store: &FileIdentityStore, out: Option<&Path>, opts: &GlobalOpts) -> Result<()> {
    let identity = require(store).await?;
    let text = identity.export_to_text()?;
    match out {
        None => println!("{}", text.as_str()),
        Some(path) => {
            tokio::fs::write(path, text.as_bytes())
                .await
                .map_err(|e| TradesealError::Storage {
                    reason: format!("failed to write {}: {e}", path.display()),
                })?;
            output::print_success(&format!("identity exported to {}", path.display()), opts.json);
        }
    }
    Ok(())
}

async fn import(
    store: &FileIdentityStore,
    file: &Path,
    force: bool,
    opts: &GlobalOpts,
) -> Result<()> {
    refuse_overwrite(store, force).await?;
    let text = tokio::fs::read_to_string(file)
        .await
        .map_err(|e| TradesealError::Storage {
            reason: format!("failed to read {}: {e}", file.display()),
        })?;
    let identity = Identity::import_from_text(&text)?;
    store.persist(&identity).await?;
    output::print_success(&format!("identity {} imported", identity.fingerprint()), opts.json);
    Ok(())
}

async fn require(store: &FileIdentityStore) -> Result<Identity> {
    store.load().await?.ok_or_else(|| TradesealError::NotFound {
        reason: format!(
            "no identity at {}; run 'tradeseal identity generate'",
            store.path().display()
        ),
    })
}

async fn refuse_overwrite(store: &FileIdentityStore, force: bool) -> Result<()> {
    if force {
        return Ok(());
    }
    if let Some(existing) = store.load().await? {
        return Err(TradesealError::Validation {
            reason: format!(
                "identity {} already exists at {}; pass --force to replace it",
                existing.fingerprint(),
                store.path().display()
            ),
        });
    }
    Ok(())
}
