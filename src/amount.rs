//! Client amount → integer cents.
//!
//! The checkout front-ends send the price as `"64,73"`, `"64.73"`, `64.73`,
//! `65` (reais) or `6473` (cents). Rules, in order:
//!
//! 1. absent or empty: parse the configured fallback as decimal reais;
//! 2. string with `,` or `.`: decimal reais;
//! 3. anything else is coerced to a number, non-finite gives `0`;
//! 4. non-integer: reais, rounded to cents;
//! 5. integer `<= 1000`: whole reais;
//! 6. larger integer: already cents.
//!
//! Known limitation: an integer `1000` is read as R$1000,00, never as 1000
//! cents. Callers reject anything outside [`MIN_AMOUNT_CENTS`]..=
//! [`MAX_AMOUNT_CENTS`]; huge inputs saturate and land above the ceiling.

use bigdecimal::{BigDecimal, RoundingMode, ToPrimitive};
use serde_json::Value;
use std::str::FromStr;

pub const MIN_AMOUNT_CENTS: i64 = 100;

/// `leads.amount_cents` is a Postgres `INTEGER`.
pub const MAX_AMOUNT_CENTS: i64 = i32::MAX as i64;

/// Integers up to this value are whole reais.
const REAIS_THRESHOLD: i64 = 1000;

pub fn normalize_to_cents(raw: Option<&Value>, fallback: &str) -> i64 {
    match raw {
        None | Some(Value::Null) => decimal_to_cents(fallback),
        Some(Value::String(s)) if s.is_empty() => decimal_to_cents(fallback),
        Some(Value::String(s)) if s.contains([',', '.']) => decimal_to_cents(s),
        Some(Value::String(s)) => coerce_text(s),
        Some(Value::Number(n)) => match n.as_i64() {
            Some(int) => integer_to_cents(int),
            None => n.as_f64().map(float_to_cents).unwrap_or(0),
        },
        Some(Value::Bool(b)) => integer_to_cents(i64::from(*b)),
        Some(_) => 0,
    }
}

pub fn is_valid_amount(cents: i64) -> bool {
    (MIN_AMOUNT_CENTS..=MAX_AMOUNT_CENTS).contains(&cents)
}

/// Decimal reais with `,` or `.` separator, rounded half-up to cents.
pub fn decimal_to_cents(text: &str) -> i64 {
    let normalized = text.trim().replacen(',', ".", 1);
    BigDecimal::from_str(&normalized)
        .ok()
        .map(|reais| (reais * BigDecimal::from(100)).with_scale_round(0, RoundingMode::HalfUp))
        .and_then(|cents| cents.to_i64())
        .unwrap_or(0)
}

fn coerce_text(text: &str) -> i64 {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return 0;
    }
    trimmed.parse::<f64>().map(float_to_cents).unwrap_or(0)
}

fn float_to_cents(value: f64) -> i64 {
    if !value.is_finite() {
        return 0;
    }
    if value.fract() != 0.0 {
        return (value * 100.0).round() as i64;
    }
    integer_to_cents(value as i64)
}

fn integer_to_cents(value: i64) -> i64 {
    if value <= REAIS_THRESHOLD {
        value.saturating_mul(100)
    } else {
        value
    }
}
