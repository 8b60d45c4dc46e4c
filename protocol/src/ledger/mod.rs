//! # Balance Ledger
//!
//! Owns the `balances` projection. Every change goes through
//! [`Ledger::credit`] or [`Ledger::debit`] ([`Ledger::transfer`] is a debit
//! followed by a credit), and each one commits three rows at once: the
//! updated balance, an immutable credit/debit record and a message-log
//! entry.
//!
//! Quantities are `u64` bounded by [`MAX_INT`](crate::config::MAX_INT).
//! Negative and fractional amounts cannot be expressed in the API; values
//! arriving as JSON go through [`parse_quantity`] first.

pub mod balance;
pub mod block_ledger;

use serde_json::Value;
use thiserror::Error;

use crate::activation::ScheduleError;
use crate::config::MAX_INT;
use crate::messages::MessageError;
use crate::storage::StoreError;

pub use balance::Ledger;
pub use block_ledger::{BlockLedger, LedgerEntry};

/// Errors raised by ledger mutations.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Negative, fractional, or above `MAX_INT`.
    #[error("invalid quantity: {0}")]
    InvalidQuantity(String),

    #[error("insufficient funds: {address} holds {available} {asset}, needs {requested}")]
    InsufficientFunds {
        address: String,
        asset: String,
        available: u64,
        requested: u64,
    },

    /// Asset/address combination the ledger may not touch.
    #[error("unsupported asset: {0}")]
    UnsupportedAsset(String),

    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Message(#[from] MessageError),
}

pub type LedgerResult<T> = Result<T, LedgerError>;

/// Reads a quantity from a decoded JSON value.
///
/// # Errors
///
/// [`LedgerError::InvalidQuantity`] for non-numbers, negatives, fractions
/// and values above `MAX_INT`.
pub fn parse_quantity(value: &Value) -> LedgerResult<u64> {
    let Value::Number(number) = value else {
        return Err(LedgerError::InvalidQuantity(format!(
            "quantity must be an integer, got {value}"
        )));
    };
    if let Some(quantity) = number.as_u64() {
        if quantity > MAX_INT {
            return Err(LedgerError::InvalidQuantity(format!(
                "quantity {quantity} exceeds MAX_INT"
            )));
        }
        return Ok(quantity);
    }
    if number.as_i64().is_some() {
        return Err(LedgerError::InvalidQuantity(format!("negative quantity {number}")));
    }
    Err(LedgerError::InvalidQuantity(format!(
        "quantity must be an integer, got {number}"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn integral_quantities_parse() {
        assert_eq!(parse_quantity(&json!(0)).unwrap(), 0);
        assert_eq!(parse_quantity(&json!(MAX_INT)).unwrap(), MAX_INT);
    }

    #[test]
    fn bad_quantities_are_rejected() {
        for value in [json!(-1), json!(1.5), json!("5"), json!(null), json!(MAX_INT + 1)] {
            assert!(
                matches!(parse_quantity(&value), Err(LedgerError::InvalidQuantity(_))),
                "{value} should be rejected"
            );
        }
    }
}
