//! Trade bodies and settlement attestations.
//!
//! A [`TradeBody`] is hashed with `trade_id = null`; that digest becomes
//! the trade id and is written back into the body. Settlement outcomes
//! are [`SignatureInfo`] attestations over a [`SettlementBody`].

use serde::{Deserialize, Serialize};
use serde_json::Number;
use tradeseal_crypto::provider::CryptoProvider;
use tradeseal_crypto::signing::{Keypair, PublicKey, Signature};
use tradeseal_types::{Result, SettlementResult, TradeId, TradesealError, UnixTimestamp};

use crate::canonical;
use crate::digest::Digest;
use crate::signature;

// ---------------------------------------------------------------------------
// Trade body
// ---------------------------------------------------------------------------

/// Hashed content of a trade listing: `{description, price}`.
#[derive(Serialize)]
struct ContentFields<'a> {
    description: &'a str,
    price: &'a Number,
}

/// `hash({description, price})`.
pub fn content_hash(description: &str, price: &Number) -> Result<Digest> {
    canonical::hash(&ContentFields { description, price })
}

/// The seller-signed body of a published trade.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeBody {
    /// `None` while hashing; serialized as `null`.
    pub trade_id: Option<TradeId>,
    pub seller_pubkey: String,
    pub content_hash: Digest,
    pub description: String,
    pub price: Number,
    pub timestamp: UnixTimestamp,
}

impl TradeBody {
    /// Builds an unhashed body for `seller` with content hash computed
    /// from `description` and `price`.
    pub fn new(
        seller: &PublicKey,
        description: impl Into<String>,
        price: Number,
        timestamp: UnixTimestamp,
    ) -> Result<Self> {
        let description = description.into();
        let content_hash = content_hash(&description, &price)?;
        Ok(Self {
            trade_id: None,
            seller_pubkey: seller.to_base64(),
            content_hash,
            description,
            price,
            timestamp,
        })
    }

    /// Hash of this body with `trade_id` cleared.
    pub fn compute_trade_id(&self) -> Result<Digest> {
        let mut unhashed = self.clone();
        unhashed.trade_id = None;
        canonical::hash(&unhashed)
    }

    /// Computes the trade id and writes it back into the body.
    pub fn assign_trade_id(&mut self) -> Result<TradeId> {
        let id = self.compute_trade_id()?.to_trade_id()?;
        self.trade_id = Some(id.clone());
        Ok(id)
    }

    /// True when the stored trade id is the hash of the rest of the body
    /// and the content hash matches the description and price.
    pub fn is_consistent(&self) -> bool {
        let Some(stored) = &self.trade_id else {
            return false;
        };
        let id_ok = matches!(self.compute_trade_id(), Ok(d) if d.to_hex() == stored.as_str());
        let content_ok =
            matches!(content_hash(&self.description, &self.price), Ok(d) if d == self.content_hash);
        id_ok && content_ok
    }
}

// ---------------------------------------------------------------------------
// Settlement attestations
// ---------------------------------------------------------------------------

/// `{trade_id, result, timestamp}`: the body both parties sign.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementBody {
    pub trade_id: TradeId,
    pub result: SettlementResult,
    pub timestamp: UnixTimestamp,
}

impl SettlementBody {
    pub fn new(trade_id: TradeId, result: SettlementResult) -> Self {
        Self {
            trade_id,
            result,
            timestamp: UnixTimestamp::now(),
        }
    }

    pub fn hash(&self) -> Result<Digest> {
        canonical::hash(self)
    }
}

/// A signed settlement body.
///
/// Valid iff `hash == canonical::hash(body)` and `signature` verifies
/// against `signer_pubkey` over the raw digest bytes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureInfo {
    pub hash: Digest,
    pub signature: String,
    pub signer_pubkey: String,
    pub body: SettlementBody,
}

impl SignatureInfo {
    /// Hashes and signs `body`.
    pub fn create(
        provider: &dyn CryptoProvider,
        keypair: &Keypair,
        body: SettlementBody,
    ) -> Result<Self> {
        let hash = body.hash()?;
        let sig = signature::sign_digest(provider, &hash, keypair);
        Ok(Self {
            hash,
            signature: sig.to_base64(),
            signer_pubkey: keypair.public_key().to_base64(),
            body,
        })
    }

    /// Re-signs the identical body under `keypair`. The hash and
    /// timestamp are carried over unchanged.
    pub fn countersign(&self, provider: &dyn CryptoProvider, keypair: &Keypair) -> Result<Self> {
        self.verify(provider)?;
        Self::create(provider, keypair, self.body.clone())
    }

    /// Checks the body hash and the signature.
    ///
    /// # Errors
    ///
    /// [`TradesealError::SignatureMismatch`] on any failure.
    pub fn verify(&self, provider: &dyn CryptoProvider) -> Result<()> {
        let rehashed = self.body.hash()?;
        if rehashed != self.hash {
            return Err(TradesealError::SignatureMismatch {
                reason: format!(
                    "body hashes to {rehashed}, attestation carries {}",
                    self.hash
                ),
            });
        }
        let (Ok(sig), Ok(pk)) = (
            Signature::from_base64(&self.signature),
            PublicKey::from_base64(&self.signer_pubkey),
        ) else {
            return Err(TradesealError::SignatureMismatch {
                reason: "malformed signature or signer key".into(),
            });
        };
        if !signature::verify_digest(provider, &self.hash, &sig, &pk) {
            return Err(TradesealError::SignatureMismatch {
                reason: format!("signature does not verify for {}", self.signer_pubkey),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tradeseal_crypto::provider::RustCryptoProvider;

    fn seller() -> Keypair {
        Keypair::from_seed(&[0x51; 32])
    }

    #[test]
    fn content_hash_is_deterministic() -> std::result::Result<(), TradesealError> {
        let a = content_hash("Intro to Algorithms", &Number::from(20))?;
        let b = content_hash("Intro to Algorithms", &Number::from(20))?;
        assert_eq!(a, b);
        let expected = Digest::of(br#"{"description":"Intro to Algorithms","price":20}"#);
        assert_eq!(a, expected);
        Ok(())
    }

    #[test]
    fn trade_id_changes_with_content() -> std::result::Result<(), TradesealError> {
        let ts = UnixTimestamp::from_secs(1_700_000_000);
        let pk = seller().public_key();
        let mut a = TradeBody::new(&pk, "Intro to Algorithms", Number::from(20), ts)?;
        let mut b = TradeBody::new(&pk, "Intro to Algorithms", Number::from(21), ts)?;
        let mut c = TradeBody::new(&pk, "Intro to Algorithm", Number::from(20), ts)?;
        let ida = a.assign_trade_id()?;
        assert_ne!(ida, b.assign_trade_id()?);
        assert_ne!(ida, c.assign_trade_id()?);
        Ok(())
    }

    #[test]
    fn trade_id_hashes_body_with_null_id() -> std::result::Result<(), TradesealError> {
        let ts = UnixTimestamp::from_secs(1_700_000_000);
        let mut body = TradeBody::new(&seller().public_key(), "Book", Number::from(30), ts)?;
        let unhashed = canonical::canonical_string(&body)?;
        assert!(unhashed.contains("\"trade_id\":null"));

        let id = body.assign_trade_id()?;
        assert_eq!(id.as_str(), Digest::of(unhashed.as_bytes()).to_hex());
        assert!(body.is_consistent());

        body.description.push('!');
        assert!(!body.is_consistent());
        Ok(())
    }

    #[test]
    fn body_hash_matches_hand_ordered_literal() -> std::result::Result<(), TradesealError> {
        let ts = UnixTimestamp::from_secs(1_700_000_000);
        let pk = seller().public_key();
        let body = TradeBody::new(&pk, "Book", Number::from(30), ts)?;

        let literal = serde_json::json!({
            "timestamp": 1_700_000_000,
            "price": 30,
            "trade_id": null,
            "description": "Book",
            "seller_pubkey": pk.to_base64(),
            "content_hash": body.content_hash.to_hex(),
        });
        assert_eq!(canonical::hash(&body)?, canonical::hash(&literal)?);

        let text = format!(
            r#"{{"content_hash":"{}","description":"Book","price":30,"seller_pubkey":"{}","timestamp":1700000000,"trade_id":null}}"#,
            body.content_hash.to_hex(),
            pk.to_base64()
        );
        assert_eq!(canonical::hash(&body)?, Digest::of(text.as_bytes()));
        Ok(())
    }

    #[test]
    fn attestation_verifies_and_detects_tamper() -> std::result::Result<(), TradesealError> {
        let p = RustCryptoProvider;
        let body = SettlementBody::new(TradeId::new("t1")?, SettlementResult::Completed);
        let info = SignatureInfo::create(&p, &seller(), body)?;
        info.verify(&p)?;

        let mut tampered = info.clone();
        tampered.body.result = SettlementResult::Cancelled;
        assert!(matches!(
            tampered.verify(&p),
            Err(TradesealError::SignatureMismatch { .. })
        ));

        let mut wrong_signer = info;
        wrong_signer.signer_pubkey = Keypair::from_seed(&[9; 32]).public_key().to_base64();
        assert!(matches!(
            wrong_signer.verify(&p),
            Err(TradesealError::SignatureMismatch { .. })
        ));
        Ok(())
    }

    #[test]
    fn countersign_keeps_hash_and_timestamp() -> std::result::Result<(), TradesealError> {
        let p = RustCryptoProvider;
        let buyer = Keypair::from_seed(&[0x52; 32]);
        let body = SettlementBody {
            trade_id: TradeId::new("t1")?,
            result: SettlementResult::Completed,
            timestamp: UnixTimestamp::from_secs(42),
        };
        let proposal = SignatureInfo::create(&p, &seller(), body)?;
        let counter = proposal.countersign(&p, &buyer)?;

        assert_eq!(counter.hash, proposal.hash);
        assert_eq!(counter.body, proposal.body);
        assert_eq!(counter.signer_pubkey, buyer.public_key().to_base64());
        counter.verify(&p)?;
        Ok(())
    }

    #[test]
    fn settlement_wire_form() -> std::result::Result<(), TradesealError> {
        let body = SettlementBody {
            trade_id: TradeId::new("abc")?,
            result: SettlementResult::Completed,
            timestamp: UnixTimestamp::from_secs(7),
        };
        assert_eq!(
            canonical::canonical_string(&body)?,
            r#"{"result":"COMPLETED","timestamp":7,"trade_id":"abc"}"#
        );
        Ok(())
    }
}
