//! Append-only, hash-chained record of accepted trade state changes.
//!
//! # Block hash
//!
//! ```text
//! hash = hex(SHA-256(
//!     str(index) || prev_hash || canonical(full_payload) || str(timestamp)
//! ))
//! full_payload = {"type", "trade_id", "payload", "signatures"}
//! ```
//!
//! The first block has index 0 and a `prev_hash` of 64 `'0'` characters.

use std::collections::{BTreeMap, HashMap};

use serde_json::{json, Value};
use tradeseal_crypto::hash::sha256_hex;
use tradeseal_protocol::canonical;
use tradeseal_protocol::relay::{BlockKind, LedgerBlock};
use tradeseal_types::{Result, TradeId, TradeStatus, TradesealError, UnixTimestamp};

/// `prev_hash` of the genesis block.
pub const GENESIS_PREV_HASH: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct Ledger {
    blocks: Vec<LedgerBlock>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a block stamped with the current time.
    pub fn append(
        &mut self,
        kind: BlockKind,
        trade_id: &TradeId,
        payload: Value,
        signatures: BTreeMap<String, String>,
    ) -> Result<&LedgerBlock> {
        self.append_at(kind, trade_id, payload, signatures, UnixTimestamp::now())
    }

    pub fn append_at(
        &mut self,
        kind: BlockKind,
        trade_id: &TradeId,
        payload: Value,
        signatures: BTreeMap<String, String>,
        timestamp: UnixTimestamp,
    ) -> Result<&LedgerBlock> {
        let (index, prev_hash) = match self.blocks.last() {
            Some(last) => (last.index + 1, last.hash.clone()),
            None => (0, GENESIS_PREV_HASH.to_owned()),
        };
        let hash = block_hash(index, &prev_hash, kind, trade_id, &payload, &signatures, timestamp);
        self.blocks.push(LedgerBlock {
            index,
            prev_hash,
            hash,
            timestamp,
            kind,
            trade_id: trade_id.clone(),
            payload,
            signatures,
        });
        let last = self.blocks.len() - 1;
        Ok(&self.blocks[last])
    }

    pub fn blocks(&self) -> &[LedgerBlock] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn verify_chain(&self) -> Result<()> {
        verify_blocks(&self.blocks)
    }
}

/// Computes a block hash from its parts.
pub fn block_hash(
    index: u64,
    prev_hash: &str,
    kind: BlockKind,
    trade_id: &TradeId,
    payload: &Value,
    signatures: &BTreeMap<String, String>,
    timestamp: UnixTimestamp,
) -> String {
    let full_payload = json!({
        "type": kind,
        "trade_id": trade_id,
        "payload": payload,
        "signatures": signatures,
    });
    let text = format!(
        "{index}{prev_hash}{}{}",
        canonical::canonicalize(&full_payload),
        timestamp.as_secs()
    );
    sha256_hex(text.as_bytes())
}

/// Checks index sequence, linkage and every block hash.
///
/// # Errors
///
/// [`TradesealError::Storage`] naming the first broken block.
pub fn verify_blocks(blocks: &[LedgerBlock]) -> Result<()> {
    let mut expected_prev = GENESIS_PREV_HASH;
    for (position, block) in blocks.iter().enumerate() {
        if block.index != position as u64 {
            return Err(broken(block.index, "index out of sequence"));
        }
        if block.prev_hash != expected_prev {
            return Err(broken(block.index, "prev_hash does not link"));
        }
        let recomputed = block_hash(
            block.index,
            &block.prev_hash,
            block.kind,
            &block.trade_id,
            &block.payload,
            &block.signatures,
            block.timestamp,
        );
        if recomputed != block.hash {
            return Err(broken(block.index, "hash does not match contents"));
        }
        expected_prev = block.hash.as_str();
    }
    Ok(())
}

fn broken(index: u64, what: &str) -> TradesealError {
    TradesealError::Storage {
        reason: format!("ledger broken at block {index}: {what}"),
    }
}

// ---------------------------------------------------------------------------
// Replay
// ---------------------------------------------------------------------------

/// Trade state reconstructed from ledger blocks alone.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TradeSnapshot {
    pub status: TradeStatus,
    pub seller_pubkey: Option<String>,
    pub buyer_pubkey: Option<String>,
}

/// Rebuilds the status snapshot of every trade in a verified chain.
///
/// Joins are not recorded, so live trades replay as `Open`.
pub fn replay(blocks: &[LedgerBlock]) -> Result<HashMap<TradeId, TradeSnapshot>> {
    verify_blocks(blocks)?;
    let mut trades: HashMap<TradeId, TradeSnapshot> = HashMap::new();

    for block in blocks {
        match block.kind {
            BlockKind::Create => {
                if trades.contains_key(&block.trade_id) {
                    return Err(broken(block.index, "duplicate CREATE"));
                }
                let seller = block
                    .payload
                    .get("seller_pubkey")
                    .and_then(Value::as_str)
                    .map(str::to_owned);
                trades.insert(
                    block.trade_id.clone(),
                    TradeSnapshot {
                        status: TradeStatus::Open,
                        seller_pubkey: seller,
                        buyer_pubkey: None,
                    },
                );
            }
            BlockKind::Complete | BlockKind::Cancel => {
                let snapshot = trades
                    .get_mut(&block.trade_id)
                    .ok_or_else(|| broken(block.index, "settlement for unknown trade"))?;
                if snapshot.status.is_terminal() {
                    return Err(broken(block.index, "settlement of a settled trade"));
                }
                if block.kind == BlockKind::Complete {
                    snapshot.status = TradeStatus::Completed;
                    snapshot.buyer_pubkey = block
                        .payload
                        .get("buyer_pubkey")
                        .and_then(Value::as_str)
                        .map(str::to_owned);
                } else {
                    snapshot.status = TradeStatus::Cancelled;
                }
            }
        }
    }
    Ok(trades)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
