//! Exact-decimal monetary amounts.
//!
//! Monetary values never pass through binary floating point on the write
//! path. Strings parse directly into [`Decimal`]; JSON numbers arriving at
//! primitive boundaries are normalized through their textual form, so the
//! digits the transport delivered are the digits that get parsed. Values
//! with more than two decimal places are not truncated here - the journal
//! validator rejects them.

use rust_decimal::Decimal;
use serde_json::Value;

/// Error raised when a value cannot be read as a monetary amount.
#[derive(Debug, thiserror::Error)]
pub enum AmountError {
    /// The text form did not parse as a decimal.
    #[error("parsing amount {text:?}: {source}")]
    Parse {
        /// The offending text.
        text: String,
        /// The underlying decimal parse error.
        source: rust_decimal::Error,
    },

    /// The JSON value was not a string, number, or null.
    #[error("cannot convert JSON {kind} to an amount")]
    UnsupportedType {
        /// JSON type name of the offending value.
        kind: &'static str,
    },
}

/// Parse a decimal string like `"4.00"` or `"-12.5"`.
///
/// # Errors
///
/// Returns [`AmountError::Parse`] if the text is not a valid decimal.
pub fn parse_amount(text: &str) -> Result<Decimal, AmountError> {
    text.parse().map_err(|source| AmountError::Parse {
        text: text.to_string(),
        source,
    })
}

/// Read an amount from a JSON value at a primitive boundary.
///
/// Strings parse directly. Numbers are converted through their textual
/// representation - never through float arithmetic - so a transport that
/// delivers `4.5` yields exactly `4.5`, and a float artifact such as
/// `0.30000000000000004` keeps every digit for the validator to reject.
/// `null` reads as zero.
///
/// # Errors
///
/// Returns an error for non-scalar values or unparseable text.
pub fn amount_from_json(value: &Value) -> Result<Decimal, AmountError> {
    match value {
        Value::Null => Ok(Decimal::ZERO),
        Value::String(s) => parse_amount(s),
        Value::Number(n) => parse_amount(&n.to_string()),
        Value::Bool(_) => Err(AmountError::UnsupportedType { kind: "boolean" }),
        Value::Array(_) => Err(AmountError::UnsupportedType { kind: "array" }),
        Value::Object(_) => Err(AmountError::UnsupportedType { kind: "object" }),
    }
}

/// Format an amount fixed to two decimal places, preserving trailing zeros.
///
/// `4` formats as `"4.00"`, `0.3` as `"0.30"`.
#[must_use]
pub fn format_amount(value: Decimal) -> String {
    format!("{value:.2}")
}

/// Whether `value * 100` is an integer, i.e. the amount fits in whole cents.
#[must_use]
pub fn has_cent_precision(value: Decimal) -> bool {
    let cents = value * Decimal::ONE_HUNDRED;
    cents == cents.floor()
}
