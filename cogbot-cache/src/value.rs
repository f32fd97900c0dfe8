use std::fmt::{Display, Formatter, Result as FmtResult};

use serde_json::Value as JsonValue;

use crate::error::CacheError;

/// A value as it is held by a backend.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Str(_) => ValueKind::Str,
            Self::Int(_) => ValueKind::Int,
            Self::Float(_) => ValueKind::Float,
            Self::Bool(_) => ValueKind::Bool,
        }
    }

    /// Equality as observed through the store, i.e. `NaN` equals `NaN`.
    pub(crate) fn same_as(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Float(a), Self::Float(b)) => a == b || (a.is_nan() && b.is_nan()),
            _ => self == other,
        }
    }
}

impl TryFrom<JsonValue> for Value {
    type Error = CacheError;

    fn try_from(value: JsonValue) -> Result<Self, Self::Error> {
        let found = match value {
            JsonValue::String(s) => return Ok(Self::Str(s)),
            JsonValue::Bool(b) => return Ok(Self::Bool(b)),
            JsonValue::Number(n) => {
                if let Some(n) = n.as_i64() {
                    return Ok(Self::Int(n));
                } else if n.is_u64() {
                    "integer exceeding i64"
                } else if let Some(n) = n.as_f64() {
                    return Ok(Self::Float(n));
                } else {
                    "number"
                }
            }
            JsonValue::Null => "null",
            JsonValue::Array(_) => "array",
            JsonValue::Object(_) => "object",
        };

        Err(CacheError::UnsupportedType { found })
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Str,
    Int,
    Float,
    Bool,
}

impl ValueKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Str => "string",
            Self::Int => "integer",
            Self::Float => "float",
            Self::Bool => "boolean",
        }
    }

    pub(crate) fn article_name(self) -> &'static str {
        match self {
            Self::Str => "a string",
            Self::Int => "an integer",
            Self::Float => "a float",
            Self::Bool => "a boolean",
        }
    }
}

impl Display for ValueKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.name())
    }
}

/// Types a [`NamespacedCache`](crate::NamespacedCache) can be parameterized with.
pub trait CacheValue: Sized + Send + Sync + 'static {
    const KIND: ValueKind;

    fn into_value(self) -> Value;

    /// Hands the value back if it's of a different kind.
    fn from_value(value: Value) -> Result<Self, Value>;
}

macro_rules! cache_value {
    ($($ty:ty: $variant:ident,)*) => {
        $(
            impl CacheValue for $ty {
                const KIND: ValueKind = ValueKind::$variant;

                fn into_value(self) -> Value {
                    Value::$variant(self)
                }

                fn from_value(value: Value) -> Result<Self, Value> {
                    match value {
                        Value::$variant(inner) => Ok(inner),
                        other => Err(other),
                    }
                }
            }
        )*
    };
}

cache_value! {
    String: Str,
    i64: Int,
    f64: Float,
    bool: Bool,
}

/// Operand of an increment.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    pub fn kind(self) -> ValueKind {
        match self {
            Self::Int(_) => ValueKind::Int,
            Self::Float(_) => ValueKind::Float,
        }
    }
}

impl From<Number> for Value {
    fn from(number: Number) -> Self {
        match number {
            Number::Int(n) => Self::Int(n),
            Number::Float(n) => Self::Float(n),
        }
    }
}

/// Value types that support `increment` and `decrement`.
pub trait Numeric: CacheValue + Copy {
    fn into_number(self) -> Number;

    fn from_number(number: Number) -> Option<Self>;
}

impl Numeric for i64 {
    fn into_number(self) -> Number {
        Number::Int(self)
    }

    fn from_number(number: Number) -> Option<Self> {
        match number {
            Number::Int(n) => Some(n),
            Number::Float(_) => None,
        }
    }
}

impl Numeric for f64 {
    fn into_number(self) -> Number {
        Number::Float(self)
    }

    fn from_number(number: Number) -> Option<Self> {
        match number {
            Number::Float(n) => Some(n),
            Number::Int(_) => None,
        }
    }
}
