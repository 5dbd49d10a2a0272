//! Shared fixtures for the node integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tradeseal_crypto::aead::{AeadKey, SealedBox};
use tradeseal_crypto::ecdh::{SharedSecret, X25519PublicKey, X25519StaticSecret};
use tradeseal_crypto::provider::{CryptoProvider, RustCryptoProvider};
use tradeseal_crypto::signing::{Keypair, PublicKey, Signature};
use tradeseal_node::ChatSessionManager;
use tradeseal_protocol::relay::{
    CancelTrade, ChatStore, CompleteTrade, CreateTrade, LedgerBlock, TradeRecord, TradeStore,
};
use tradeseal_storage::MemoryRelay;
use tradeseal_types::config::AppConfig;
use tradeseal_types::{Result, TradeId};
use tradeseal_wallet::Identity;

/// Long enough for the in-memory relay to deliver everything queued.
pub const IDLE: Duration = Duration::from_millis(50);

pub fn identity(seed: u8) -> Arc<Identity> {
    Arc::new(Identity::from_parts(
        Keypair::from_seed(&[seed; 32]),
        X25519StaticSecret::from_raw([seed.wrapping_add(0x80); 32]),
    ))
}

pub fn chat_key(identity: &Identity) -> String {
    identity.exchange_public_key().to_base64()
}

pub fn sign_key(identity: &Identity) -> String {
    identity.sign_public_key().to_base64()
}

pub async fn open_chat(
    provider: Arc<dyn CryptoProvider>,
    relay: &Arc<MemoryRelay>,
    who: &Arc<Identity>,
    trade_id: &TradeId,
) -> Result<ChatSessionManager> {
    let store: Arc<dyn ChatStore> = relay.clone();
    ChatSessionManager::open(
        provider,
        Arc::clone(who),
        store,
        relay.as_ref(),
        trade_id,
        &AppConfig::default(),
    )
    .await
}

// ---------------------------------------------------------------------------
// Counting provider
// ---------------------------------------------------------------------------

/// Native provider that counts key agreements.
#[derive(Default)]
pub struct CountingProvider {
    inner: RustCryptoProvider,
    agreements: AtomicUsize,
}

impl CountingProvider {
    pub fn agreements(&self) -> usize {
        self.agreements.load(Ordering::SeqCst)
    }
}

impl CryptoProvider for CountingProvider {
    fn signing_keygen(&self) -> Keypair {
        self.inner.signing_keygen()
    }

    fn exchange_keygen(&self) -> X25519StaticSecret {
        self.inner.exchange_keygen()
    }

    fn sign(&self, keypair: &Keypair, message: &[u8]) -> Signature {
        self.inner.sign(keypair, message)
    }

    fn verify(&self, public_key: &PublicKey, message: &[u8], signature: &Signature) -> bool {
        self.inner.verify(public_key, message, signature)
    }

    fn agree(&self, secret: &X25519StaticSecret, peer: &X25519PublicKey) -> Result<SharedSecret> {
        self.agreements.fetch_add(1, Ordering::SeqCst);
        self.inner.agree(secret, peer)
    }

    fn derive_key(&self, ikm: &[u8], salt: &[u8], info: &[u8]) -> Result<AeadKey> {
        self.inner.derive_key(ikm, salt, info)
    }

    fn aead_encrypt(&self, key: &AeadKey, plaintext: &[u8]) -> Result<SealedBox> {
        self.inner.aead_encrypt(key, plaintext)
    }

    fn aead_decrypt(&self, key: &AeadKey, sealed: &SealedBox) -> Result<Vec<u8>> {
        self.inner.aead_decrypt(key, sealed)
    }

    fn digest(&self, data: &[u8]) -> [u8; 32] {
        self.inner.digest(data)
    }
}

// ---------------------------------------------------------------------------
// Counting store
// ---------------------------------------------------------------------------

/// Delegates to a [`MemoryRelay`] and counts `complete` calls.
pub struct CountingStore {
    pub inner: Arc<MemoryRelay>,
    completes: AtomicUsize,
}

impl CountingStore {
    pub fn new(inner: Arc<MemoryRelay>) -> Self {
        Self {
            inner,
            completes: AtomicUsize::new(0),
        }
    }

    pub fn completes(&self) -> usize {
        self.completes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TradeStore for CountingStore {
    async fn create(&self, request: CreateTrade) -> Result<TradeRecord> {
        self.inner.create(request).await
    }

    async fn get(&self, trade_id: &TradeId) -> Result<Option<TradeRecord>> {
        self.inner.get(trade_id).await
    }

    async fn list(&self, limit: usize) -> Result<Vec<TradeRecord>> {
        self.inner.list(limit).await
    }

    async fn join(&self, trade_id: &TradeId, buyer_pubkey: &str) -> Result<TradeRecord> {
        self.inner.join(trade_id, buyer_pubkey).await
    }

    async fn complete(&self, request: CompleteTrade) -> Result<TradeRecord> {
        self.completes.fetch_add(1, Ordering::SeqCst);
        self.inner.complete(request).await
    }

    async fn cancel(&self, request: CancelTrade) -> Result<TradeRecord> {
        self.inner.cancel(request).await
    }

    async fn export_ledger(&self) -> Result<Vec<LedgerBlock>> {
        self.inner.export_ledger().await
    }
}
