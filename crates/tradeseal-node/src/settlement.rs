//! Trade settlement: publish, join, dual-signed completion, cancellation.
//!
//! Completion needs both parties' signatures over one identical
//! [`SettlementBody`]. One side builds and signs it, ships the
//! [`SignatureInfo`] over the encrypted chat as a `completion_request`,
//! and the other side countersigns that same body. Either side may then
//! submit the pair. Every check runs locally first; a pair that fails
//! any check never reaches the store.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::Number;
use tradeseal_crypto::provider::CryptoProvider;
use tradeseal_protocol::digest::Digest;
use tradeseal_protocol::relay::{CancelTrade, CompleteTrade, CreateTrade, TradeRecord, TradeStore};
use tradeseal_protocol::signature;
use tradeseal_protocol::trade::{SettlementBody, SignatureInfo, TradeBody};
use tradeseal_types::{Result, SettlementResult, TradeId, TradesealError, UnixTimestamp};
use tradeseal_wallet::Identity;

use crate::chat::ChatSessionManager;

// ---------------------------------------------------------------------------
// ContentHashLog
// ---------------------------------------------------------------------------

/// Content hashes of trades we published. Kept locally, never sent.
#[derive(Default)]
pub struct ContentHashLog {
    entries: Mutex<HashMap<TradeId, Digest>>,
}

impl ContentHashLog {
    fn entries(&self) -> Result<MutexGuard<'_, HashMap<TradeId, Digest>>> {
        self.entries.lock().map_err(|_| TradesealError::InvalidState {
            reason: "content hash log lock poisoned".into(),
        })
    }

    pub fn record(&self, trade_id: TradeId, content_hash: Digest) -> Result<()> {
        self.entries()?.insert(trade_id, content_hash);
        Ok(())
    }

    pub fn get(&self, trade_id: &TradeId) -> Result<Option<Digest>> {
        Ok(self.entries()?.get(trade_id).copied())
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.entries()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.entries()?.is_empty())
    }
}

// ---------------------------------------------------------------------------
// TradeSettlement
// ---------------------------------------------------------------------------

/// Result of [`TradeSettlement::publish`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublishedTrade {
    pub trade_id: TradeId,
    pub content_hash: Digest,
    pub body: TradeBody,
    /// Seller signature over the trade id digest, base64.
    pub signature: String,
}

pub struct TradeSettlement {
    provider: Arc<dyn CryptoProvider>,
    identity: Arc<Identity>,
    store: Arc<dyn TradeStore>,
    content_log: ContentHashLog,
}

impl TradeSettlement {
    pub fn new(
        provider: Arc<dyn CryptoProvider>,
        identity: Arc<Identity>,
        store: Arc<dyn TradeStore>,
    ) -> Self {
        Self {
            provider,
            identity,
            store,
            content_log: ContentHashLog::default(),
        }
    }

    pub fn content_log(&self) -> &ContentHashLog {
        &self.content_log
    }

    /// Publishes a listing as the seller.
    ///
    /// 1. `content_hash = hash({description, price})`.
    /// 2. Build the body with no trade id, stamped now.
    /// 3. `trade_id = hash(body)`, written back into the body.
    /// 4. Sign the trade id digest.
    /// 5. Submit through [`TradeStore::create`].
    /// 6. Remember the content hash locally.
    pub async fn publish(&self, description: &str, price: Number) -> Result<PublishedTrade> {
        if description.trim().is_empty() {
            return Err(TradesealError::Validation {
                reason: "description must not be empty".into(),
            });
        }

        let mut body = TradeBody::new(
            &self.identity.sign_public_key(),
            description,
            price,
            UnixTimestamp::now(),
        )?;
        let content_hash = body.content_hash;
        let trade_id = body.assign_trade_id()?;
        let signature =
            signature::sign(self.provider.as_ref(), trade_id.as_str(), self.identity.signing())?
                .to_base64();

        self.store
            .create(CreateTrade {
                trade_id: trade_id.clone(),
                body: body.clone(),
                signature: signature.clone(),
            })
            .await?;
        self.content_log.record(trade_id.clone(), content_hash)?;

        tracing::info!(trade_id = %trade_id, content_hash = %content_hash, "trade published");
        Ok(PublishedTrade {
            trade_id,
            content_hash,
            body,
            signature,
        })
    }

    /// Registers us as the trade's buyer.
    pub async fn join(&self, trade_id: &TradeId) -> Result<TradeRecord> {
        let record = self
            .store
            .join(trade_id, &self.identity.sign_public_key().to_base64())
            .await?;
        tracing::info!(trade_id = %trade_id, status = %record.status, "trade joined");
        Ok(record)
    }

    /// Builds and signs a fresh `COMPLETED` settlement body.
    pub fn initiate_completion(&self, trade_id: &TradeId) -> Result<SignatureInfo> {
        let body = SettlementBody::new(trade_id.clone(), SettlementResult::Completed);
        SignatureInfo::create(self.provider.as_ref(), self.identity.signing(), body)
    }

    /// Signs a completion body for the chat's trade and sends it to the
    /// current peer as a `completion_request`.
    pub async fn propose_completion(&self, chat: &ChatSessionManager) -> Result<SignatureInfo> {
        let info = self.initiate_completion(&chat.trade_id()?)?;
        chat.send_completion_request(info.clone()).await?;
        Ok(info)
    }

    /// Re-signs the body of a received completion request. The body, and
    /// with it the hash and timestamp, is carried over unchanged.
    ///
    /// # Errors
    ///
    /// [`TradesealError::SignatureMismatch`] if `received` does not verify
    /// or is not a completion.
    pub fn countersign(&self, received: &SignatureInfo) -> Result<SignatureInfo> {
        if received.body.result != SettlementResult::Completed {
            return Err(TradesealError::SignatureMismatch {
                reason: format!("refusing to countersign a {} body", received.body.result),
            });
        }
        received.countersign(self.provider.as_ref(), self.identity.signing())
    }

    /// Verifies both attestations, assigns seller and buyer slots, and
    /// submits the completion.
    ///
    /// # Errors
    ///
    /// [`TradesealError::SignatureMismatch`] for any verification failure,
    /// raised before [`TradeStore::complete`] is called.
    pub async fn submit_completion(
        &self,
        trade_id: &TradeId,
        a: &SignatureInfo,
        b: &SignatureInfo,
    ) -> Result<TradeRecord> {
        for info in [a, b] {
            info.verify(self.provider.as_ref()).map_err(as_mismatch)?;
            if info.body.trade_id != *trade_id {
                return Err(mismatch(format!(
                    "attestation is for trade {}, not {trade_id}",
                    info.body.trade_id
                )));
            }
            if info.body.result != SettlementResult::Completed {
                return Err(mismatch(format!("result is {}, not COMPLETED", info.body.result)));
            }
        }
        if a.hash != b.hash {
            return Err(mismatch("the two attestations cover different bodies".into()));
        }

        let record = self
            .store
            .get(trade_id)
            .await?
            .ok_or_else(|| TradesealError::NotFound {
                reason: format!("trade {trade_id}"),
            })?;
        let (seller, buyer) = match (
            a.signer_pubkey == record.seller_pubkey,
            b.signer_pubkey == record.seller_pubkey,
        ) {
            (true, false) => (a, b),
            (false, true) => (b, a),
            (true, true) => return Err(mismatch("both attestations are from the seller".into())),
            (false, false) => return Err(mismatch("neither attestation is from the seller".into())),
        };

        let record = self
            .store
            .complete(CompleteTrade {
                trade_id: trade_id.clone(),
                hash: a.hash,
                sig_seller: seller.signature.clone(),
                sig_buyer: buyer.signature.clone(),
            })
            .await?;
        tracing::info!(trade_id = %trade_id, hash = %a.hash, "trade completed");
        Ok(record)
    }

    /// Countersigns `proposal` and submits the pair.
    pub async fn accept_completion(
        &self,
        chat: &ChatSessionManager,
        proposal: &SignatureInfo,
    ) -> Result<TradeRecord> {
        let trade_id = chat.trade_id()?;
        let counter = self.countersign(proposal)?;
        self.submit_completion(&trade_id, proposal, &counter).await
    }

    /// Signs a `CANCELLED` body alone and submits it.
    pub async fn cancel(&self, trade_id: &TradeId) -> Result<TradeRecord> {
        let body = SettlementBody::new(trade_id.clone(), SettlementResult::Cancelled);
        let info = SignatureInfo::create(self.provider.as_ref(), self.identity.signing(), body)?;
        let record = self
            .store
            .cancel(CancelTrade {
                trade_id: trade_id.clone(),
                hash: info.hash,
                signature: info.signature,
                signer_pubkey: info.signer_pubkey,
                body: info.body,
            })
            .await?;
        tracing::info!(trade_id = %trade_id, "trade cancelled");
        Ok(record)
    }
}

fn mismatch(reason: String) -> TradesealError {
    TradesealError::SignatureMismatch { reason }
}

fn as_mismatch(err: TradesealError) -> TradesealError {
    match err {
        TradesealError::SignatureMismatch { .. } => err,
        other => mismatch(other.to_string()),
    }
}
