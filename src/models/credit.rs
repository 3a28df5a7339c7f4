use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Number, Value};
use std::fmt;

// Largest integer an f64 represents exactly (2^53).
const MAX_EXACT_FLOAT_INT: f64 = 9_007_199_254_740_992.0;

/// A credit balance or amount.
///
/// Integers stay integers so `5 + 7` is stored and rendered as `12`; any
/// fractional operand turns the sum into a float. Floats without a fractional
/// part are folded back into integers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Credit(Number);

impl Credit {
    pub fn from_number(number: Number) -> Self {
        if number.is_f64() {
            if let Some(f) = number.as_f64() {
                if f.fract() == 0.0 && f.abs() <= MAX_EXACT_FLOAT_INT {
                    return Self(Number::from(f as i64));
                }
            }
        }
        Self(number)
    }

    /// Only JSON numbers qualify; strings such as `"5"` are rejected.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => Some(Self::from_number(n.clone())),
            _ => None,
        }
    }

    pub fn is_positive(&self) -> bool {
        self.0.as_f64().map_or(false, |f| f > 0.0)
    }

    /// Returns `None` when the sum is not a finite number.
    pub fn checked_add(&self, other: &Credit) -> Option<Credit> {
        if let (Some(a), Some(b)) = (self.0.as_i64(), other.0.as_i64()) {
            if let Some(sum) = a.checked_add(b) {
                return Some(Self(Number::from(sum)));
            }
        }
        let sum = self.0.as_f64()? + other.0.as_f64()?;
        Number::from_f64(sum).map(Self::from_number)
    }

    pub fn as_number(&self) -> &Number {
        &self.0
    }
}

impl Default for Credit {
    fn default() -> Self {
        Self(Number::from(0))
    }
}

impl From<i64> for Credit {
    fn from(value: i64) -> Self {
        Self(Number::from(value))
    }
}

impl<'de> Deserialize<'de> for Credit {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Number::deserialize(deserializer).map(Self::from_number)
    }
}

/// For `#[serde(deserialize_with)]`: a stored `null` balance reads as zero.
pub fn null_as_zero<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Credit, D::Error> {
    Option::<Credit>::deserialize(deserializer).map(Option::unwrap_or_default)
}

impl fmt::Display for Credit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}
