//! Setting values and input coercion.

use serde::{Deserialize, Serialize};
use serde_json::Number;
use std::fmt;
use thiserror::Error;

/// A single setting value.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Number(Number),
    Text(String),
}

/// Type tag of a [`Scalar`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    Bool,
    Number,
    Text,
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarKind::Bool => write!(f, "boolean"),
            ScalarKind::Number => write!(f, "number"),
            ScalarKind::Text => write!(f, "text"),
        }
    }
}

/// Input that cannot be stored under the type of the existing value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot use {input:?} as a {expected} value")]
pub struct CoercionError {
    pub expected: ScalarKind,
    pub input: String,
}

impl Scalar {
    pub fn kind(&self) -> ScalarKind {
        match self {
            Scalar::Bool(_) => ScalarKind::Bool,
            Scalar::Number(_) => ScalarKind::Number,
            Scalar::Text(_) => ScalarKind::Text,
        }
    }

    /// Convert `self` into the type of `existing`.
    ///
    /// Booleans stay booleans (text `"true"`/`"false"` accepted), numeric
    /// settings parse text as an integer first and a float second, and text
    /// settings take the display form of any scalar.
    pub fn coerce_like(self, existing: &Scalar) -> Result<Scalar, CoercionError> {
        let expected = existing.kind();
        match (expected, self) {
            (ScalarKind::Bool, v @ Scalar::Bool(_)) => Ok(v),
            (ScalarKind::Bool, Scalar::Text(text)) => match text.trim().to_ascii_lowercase().as_str() {
                "true" => Ok(Scalar::Bool(true)),
                "false" => Ok(Scalar::Bool(false)),
                _ => Err(CoercionError { expected, input: text }),
            },
            (ScalarKind::Number, v @ Scalar::Number(_)) => Ok(v),
            (ScalarKind::Number, Scalar::Text(text)) => match parse_number(&text) {
                Some(n) => Ok(Scalar::Number(n)),
                None => Err(CoercionError { expected, input: text }),
            },
            (ScalarKind::Text, Scalar::Text(text)) => Ok(Scalar::Text(text)),
            (ScalarKind::Text, other) => Ok(Scalar::Text(other.to_string())),
            (expected, other) => Err(CoercionError {
                expected,
                input: other.to_string(),
            }),
        }
    }
}

fn parse_number(text: &str) -> Option<Number> {
    let trimmed = text.trim();
    if let Ok(i) = trimmed.parse::<i64>() {
        return Some(Number::from(i));
    }
    trimmed.parse::<f64>().ok().and_then(Number::from_f64)
}

impl PartialEq for Scalar {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Scalar::Bool(a), Scalar::Bool(b)) => a == b,
            (Scalar::Text(a), Scalar::Text(b)) => a == b,
            (Scalar::Number(a), Scalar::Number(b)) => {
                if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
                    return x == y;
                }
                if let (Some(x), Some(y)) = (a.as_u64(), b.as_u64()) {
                    return x == y;
                }
                a.as_f64() == b.as_f64()
            }
            _ => false,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Bool(b) => write!(f, "{}", b),
            Scalar::Number(n) => write!(f, "{}", n),
            Scalar::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<bool> for Scalar {
    fn from(v: bool) -> Self {
        Scalar::Bool(v)
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Scalar::Number(Number::from(v))
    }
}

impl From<i32> for Scalar {
    fn from(v: i32) -> Self {
        Scalar::Number(Number::from(v))
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Number::from_f64(v).map_or_else(|| Scalar::Text(v.to_string()), Scalar::Number)
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Scalar::Text(v.to_string())
    }
}

impl From<String> for Scalar {
    fn from(v: String) -> Self {
        Scalar::Text(v)
    }
}
