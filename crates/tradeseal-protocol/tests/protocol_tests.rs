//! Integration tests for tradeseal-protocol.
//!
//! Keys come from fixed seeds and bodies from fixed timestamps, so the
//! only randomness is the AEAD nonce, which no assertion depends on.

use serde_json::Number;
use tradeseal_crypto::ecdh::X25519StaticSecret;
use tradeseal_crypto::provider::{CryptoProvider, RustCryptoProvider};
use tradeseal_crypto::signing::Keypair;
use tradeseal_types::{SettlementResult, TradeId, TradesealError, UnixTimestamp};

use tradeseal_protocol::canonical;
use tradeseal_protocol::cipher::{self, Sealed};
use tradeseal_protocol::envelope::PlainEnvelope;
use tradeseal_protocol::session::derive_chat_key;
use tradeseal_protocol::signature;
use tradeseal_protocol::trade::{SettlementBody, SignatureInfo, TradeBody};
use tradeseal_protocol::wire::{ChatKeyClaim, Frame};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct Party {
    signing: Keypair,
    exchange: X25519StaticSecret,
}

fn party(seed: u8) -> Party {
    Party {
        signing: Keypair::from_seed(&[seed; 32]),
        exchange: X25519StaticSecret::from_raw([seed.wrapping_add(0x80); 32]),
    }
}

fn published_body(seller: &Party) -> Result<TradeBody, TradesealError> {
    let mut body = TradeBody::new(
        &seller.signing.public_key(),
        "Book",
        Number::from(30),
        UnixTimestamp::from_secs(1_718_452_800),
    )?;
    body.assign_trade_id()?;
    Ok(body)
}

// ---------------------------------------------------------------------------
// Publishing
// ---------------------------------------------------------------------------

#[test]
fn published_trade_id_is_signed_by_seller() -> Result<(), TradesealError> {
    let p = RustCryptoProvider;
    let seller = party(1);
    let body = published_body(&seller)?;
    let trade_id = body
        .trade_id
        .clone()
        .ok_or_else(|| TradesealError::Validation { reason: "no id".into() })?;

    let sig = signature::sign(&p, trade_id.as_str(), &seller.signing)?;
    assert!(signature::verify(
        &p,
        trade_id.as_str(),
        &sig.to_base64(),
        &seller.signing.public_key().to_base64()
    ));
    assert!(body.is_consistent());
    Ok(())
}

#[test]
fn trade_body_wire_keys() -> Result<(), TradesealError> {
    let body = published_body(&party(1))?;
    let value = canonical::to_value(&body)?;
    let mut keys: Vec<&str> = value
        .as_object()
        .map(|m| m.keys().map(String::as_str).collect())
        .unwrap_or_default();
    keys.sort_unstable();
    assert_eq!(
        keys,
        ["content_hash", "description", "price", "seller_pubkey", "timestamp", "trade_id"]
    );
    Ok(())
}

#[test]
fn float_price_keeps_float_form() -> Result<(), TradesealError> {
    let price = Number::from_f64(12.5).ok_or_else(|| TradesealError::Validation {
        reason: "non-finite".into(),
    })?;
    let body = TradeBody::new(
        &party(1).signing.public_key(),
        "Lamp",
        price,
        UnixTimestamp::from_secs(1),
    )?;
    assert!(canonical::canonical_string(&body)?.contains("\"price\":12.5"));
    Ok(())
}

// ---------------------------------------------------------------------------
// Chat
// ---------------------------------------------------------------------------

#[test]
fn sealed_envelope_travels_in_chat_frame() -> Result<(), TradesealError> {
    let p = RustCryptoProvider;
    let seller = party(1);
    let buyer = party(2);
    let trade_id = TradeId::new("trade-xyz")?;

    let seller_key =
        derive_chat_key(&p, &seller.exchange, &buyer.exchange.public_key(), &trade_id)?;
    let buyer_key =
        derive_chat_key(&p, &buyer.exchange, &seller.exchange.public_key(), &trade_id)?;

    let envelope = PlainEnvelope::chat(
        trade_id.clone(),
        seller.exchange.public_key().to_base64(),
        "hello",
    );
    let frame = Frame::Chat {
        trade_id: trade_id.clone(),
        sender_chat_pubkey: Some(seller.exchange.public_key().to_base64()),
        ciphertext: cipher::encrypt(&p, &seller_key, &envelope)?.to_wire()?,
        timestamp: None,
    };

    let received = Frame::decode(&frame.encode()?)?;
    let Frame::Chat { ciphertext, .. } = received else {
        return Err(TradesealError::Protocol { reason: "expected CHAT".into() });
    };
    let opened: PlainEnvelope = cipher::decrypt(&p, &buyer_key, &Sealed::from_wire(&ciphertext)?)?;
    assert_eq!(opened, envelope);
    Ok(())
}

#[test]
fn third_party_cannot_open_chat() -> Result<(), TradesealError> {
    let p = RustCryptoProvider;
    let (seller, buyer, eve) = (party(1), party(2), party(3));
    let trade_id = TradeId::new("trade-xyz")?;

    let key = derive_chat_key(&p, &seller.exchange, &buyer.exchange.public_key(), &trade_id)?;
    let eve_key = derive_chat_key(&p, &eve.exchange, &seller.exchange.public_key(), &trade_id)?;
    let sealed = cipher::encrypt(&p, &key, "secret")?;

    let result: Result<String, _> = cipher::decrypt(&p, &eve_key, &sealed);
    assert!(matches!(result, Err(TradesealError::Authentication { .. })));
    Ok(())
}

#[test]
fn join_frame_with_wrapped_key() -> Result<(), TradesealError> {
    let key = party(2).exchange.public_key().to_base64();
    let frame = Frame::Join {
        trade_id: TradeId::new("t")?,
        identity_pubkey: party(2).signing.public_key().to_base64(),
        chat_pubkey: Some(ChatKeyClaim::Wrapped { pubkey: key.clone() }),
        timestamp: Some(UnixTimestamp::from_secs(3)),
    };
    let Frame::Join { chat_pubkey: Some(claim), .. } = Frame::decode(&frame.encode()?)? else {
        return Err(TradesealError::Protocol { reason: "expected JOIN".into() });
    };
    assert_eq!(claim.normalize(), Some(key));
    Ok(())
}

// ---------------------------------------------------------------------------
// Settlement attestations
// ---------------------------------------------------------------------------

#[test]
fn completion_request_envelope_carries_attestation() -> Result<(), TradesealError> {
    let p = RustCryptoProvider;
    let (seller, buyer) = (party(1), party(2));
    let trade_id = TradeId::new("t-complete")?;

    let proposal = SignatureInfo::create(
        &p,
        &seller.signing,
        SettlementBody::new(trade_id.clone(), SettlementResult::Completed),
    )?;
    let envelope = PlainEnvelope::completion_request(
        trade_id,
        seller.exchange.public_key().to_base64(),
        proposal.clone(),
    );
    let text = canonical::canonical_string(&envelope)?;
    assert!(text.contains("\"type\":\"completion_request\""));

    let decoded: PlainEnvelope = serde_json::from_str(&text)
        .map_err(|e| TradesealError::Protocol { reason: e.to_string() })?;
    let PlainEnvelope::CompletionRequest { signature_info, .. } = decoded else {
        return Err(TradesealError::Protocol { reason: "expected completion".into() });
    };
    let counter = signature_info.countersign(&p, &buyer.signing)?;
    assert_eq!(counter.hash, proposal.hash);
    counter.verify(&p)?;
    Ok(())
}

#[test]
fn digest_signature_matches_provider_sign() -> Result<(), TradesealError> {
    let p = RustCryptoProvider;
    let kp = party(7).signing;
    let digest = canonical::hash(&serde_json::json!({"a": 1}))?;
    let sig = signature::sign(&p, &digest.to_hex(), &kp)?;
    assert_eq!(sig, p.sign(&kp, digest.as_bytes()));
    Ok(())
}
