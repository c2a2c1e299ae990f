//! Provider movement model
//!
//! Typed view of one money-movement record as reported by the provider's
//! listing endpoint. Amounts arrive as decimal strings and are converted to
//! exact integer minor units per the currency exponent; floating point is
//! never used for money.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::Deserialize;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MovementParseError {
    #[error("Invalid amount format: {0}")]
    InvalidAmount(String),

    #[error("Amount {amount} has more precision than {currency} allows")]
    ExcessPrecision { amount: String, currency: String },

    #[error("Amount must be positive: {0}")]
    NonPositiveAmount(String),
}

/// One movement as reported by the provider
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderMovement {
    pub external_id: String,
    pub status: String,
    pub amount: String,
    pub currency: String,
    pub account_reference: String,
    pub occurred_at: DateTime<Utc>,
}

impl ProviderMovement {
    /// Convert the decimal amount string to integer minor units.
    pub fn amount_minor(&self) -> Result<i64, MovementParseError> {
        amount_to_minor(&self.amount, &self.currency)
    }
}

/// Convert a decimal amount string to exact integer minor units.
///
/// "10.50" EUR -> 1050; "250" JPY -> 250. Rejects amounts with more
/// fractional digits than the currency exponent and non-positive amounts.
pub fn amount_to_minor(amount: &str, currency: &str) -> Result<i64, MovementParseError> {
    let parsed = Decimal::from_str(amount.trim())
        .map_err(|_| MovementParseError::InvalidAmount(amount.to_string()))?;

    if parsed <= Decimal::ZERO {
        return Err(MovementParseError::NonPositiveAmount(amount.to_string()));
    }

    let exponent = currency_exponent(currency);
    let scaled = parsed * Decimal::from(10u64.pow(exponent));

    if scaled.fract() != Decimal::ZERO {
        return Err(MovementParseError::ExcessPrecision {
            amount: amount.to_string(),
            currency: currency.to_string(),
        });
    }

    scaled
        .trunc()
        .to_i64()
        .ok_or_else(|| MovementParseError::InvalidAmount(amount.to_string()))
}

/// Minor-unit exponent per ISO 4217; 2 for everything not listed
fn currency_exponent(currency: &str) -> u32 {
    match currency.to_uppercase().as_str() {
        "JPY" | "KRW" | "VND" | "CLP" | "ISK" => 0,
        "BHD" | "KWD" | "OMR" | "JOD" | "TND" => 3,
        _ => 2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn movement(amount: &str, currency: &str) -> ProviderMovement {
        ProviderMovement {
            external_id: "mv_001".to_string(),
            status: "approved".to_string(),
            amount: amount.to_string(),
            currency: currency.to_string(),
            account_reference: "acct_42".to_string(),
            occurred_at: Utc::now(),
        }
    }

    #[test]
    fn test_amount_minor_two_decimals() {
        assert_eq!(movement("10.50", "EUR").amount_minor().unwrap(), 1050);
        assert_eq!(movement("0.01", "USD").amount_minor().unwrap(), 1);
        assert_eq!(movement("100", "USD").amount_minor().unwrap(), 10_000);
    }

    #[test]
    fn test_amount_minor_zero_decimal_currency() {
        assert_eq!(movement("250", "JPY").amount_minor().unwrap(), 250);
    }

    #[test]
    fn test_amount_minor_three_decimal_currency() {
        assert_eq!(movement("1.250", "KWD").amount_minor().unwrap(), 1250);
    }

    #[test]
    fn test_amount_minor_rejects_excess_precision() {
        let err = movement("10.505", "EUR").amount_minor().unwrap_err();
        assert!(matches!(err, MovementParseError::ExcessPrecision { .. }));

        let err = movement("1.5", "JPY").amount_minor().unwrap_err();
        assert!(matches!(err, MovementParseError::ExcessPrecision { .. }));
    }

    #[test]
    fn test_amount_minor_rejects_garbage_and_non_positive() {
        assert!(matches!(
            movement("ten euros", "EUR").amount_minor().unwrap_err(),
            MovementParseError::InvalidAmount(_)
        ));
        assert!(matches!(
            movement("0", "EUR").amount_minor().unwrap_err(),
            MovementParseError::NonPositiveAmount(_)
        ));
        assert!(matches!(
            movement("-5.00", "EUR").amount_minor().unwrap_err(),
            MovementParseError::NonPositiveAmount(_)
        ));
    }

    #[test]
    fn test_movement_deserialize() {
        let json = r#"{
            "external_id": "mv_9f2",
            "status": "approved",
            "amount": "12.34",
            "currency": "EUR",
            "account_reference": "acct_7",
            "occurred_at": "2026-08-01T10:00:00Z"
        }"#;

        let mv: ProviderMovement = serde_json::from_str(json).unwrap();
        assert_eq!(mv.external_id, "mv_9f2");
        assert_eq!(mv.amount_minor().unwrap(), 1234);
    }
}
