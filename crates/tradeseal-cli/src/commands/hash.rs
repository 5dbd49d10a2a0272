//! Canonical hashing commands.
//!
//! These print exactly what the protocol signs, so two parties can
//! compare digests out of band.

use serde_json::{Number, Value};
use tradeseal_protocol::{canonical, trade};
use tradeseal_types::{Result, TradesealError};

use crate::output;
use crate::GlobalOpts;

/// `tradeseal hash <json>`
pub fn canonical(json: &str, opts: &GlobalOpts) -> Result<()> {
    let value: Value = serde_json::from_str(json).map_err(|e| TradesealError::Validation {
        reason: format!("input is not valid JSON: {e}"),
    })?;
    let text = canonical::canonicalize(&value);
    let digest = canonical::hash(&value)?;
    output::print_fields(
        &[
            ("hash", "Hash", digest.to_hex()),
            ("canonical", "Canonical", text),
        ],
        opts.json,
    );
    Ok(())
}

/// `tradeseal content-hash --description <d> --price <p>`
pub fn content(description: &str, price: &str, opts: &GlobalOpts) -> Result<()> {
    let price = parse_price(price)?;
    let digest = trade::content_hash(description, &price)?;
    output::print_fields(
        &[
            ("content_hash", "Content hash", digest.to_hex()),
            ("price", "Price", price.to_string()),
        ],
        opts.json,
    );
    Ok(())
}

fn parse_price(text: &str) -> Result<Number> {
    match serde_json::from_str::<Value>(text.trim()) {
        Ok(Value::Number(n)) => Ok(n),
        _ => Err(TradesealError::Validation {
            reason: format!("price must be a JSON number, got '{text}'"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn price_accepts_integers_and_decimals() -> std::result::Result<(), TradesealError> {
        assert_eq!(parse_price("30")?, Number::from(30));
        assert_eq!(parse_price(" 19.5 ")?.as_f64(), Some(19.5));
        Ok(())
    }

    #[test]
    fn price_rejects_non_numbers() {
        assert!(parse_price("thirty").is_err());
        assert!(parse_price("\"30\"").is_err());
    }
}
