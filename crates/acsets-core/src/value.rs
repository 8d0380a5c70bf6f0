//! Attribute values.

use std::fmt;

use acsets_schema::ValueKind;
use serde::{Deserialize, Serialize};

/// A runtime attribute value.
///
/// Encoded kinds (`json`, `xml`, `sympy`) are stored as `Text`; the engine
/// never looks inside them.
///
/// Serialized untagged: text as a string, finite floats as a number. JSON has
/// no number for NaN or the infinities, so those are written as
/// `{"float": "NaN" | "inf" | "-inf"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "ValueRepr", into = "ValueRepr")]
pub enum Value {
    Text(String),
    Float(f64),
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum ValueRepr {
    Text(String),
    Float(f64),
    NonFinite { float: NonFinite },
}

#[derive(Clone, Copy, Serialize, Deserialize)]
enum NonFinite {
    #[serde(rename = "NaN")]
    Nan,
    #[serde(rename = "inf")]
    Inf,
    #[serde(rename = "-inf")]
    NegInf,
}

impl From<ValueRepr> for Value {
    fn from(repr: ValueRepr) -> Self {
        match repr {
            ValueRepr::Text(s) => Value::Text(s),
            ValueRepr::Float(x) => Value::Float(x),
            ValueRepr::NonFinite { float } => Value::Float(match float {
                NonFinite::Nan => f64::NAN,
                NonFinite::Inf => f64::INFINITY,
                NonFinite::NegInf => f64::NEG_INFINITY,
            }),
        }
    }
}

impl From<Value> for ValueRepr {
    fn from(value: Value) -> Self {
        match value {
            Value::Text(s) => ValueRepr::Text(s),
            Value::Float(x) if x.is_nan() => ValueRepr::NonFinite {
                float: NonFinite::Nan,
            },
            Value::Float(x) if x == f64::INFINITY => ValueRepr::NonFinite {
                float: NonFinite::Inf,
            },
            Value::Float(x) if x == f64::NEG_INFINITY => ValueRepr::NonFinite {
                float: NonFinite::NegInf,
            },
            Value::Float(x) => ValueRepr::Float(x),
        }
    }
}

impl Value {
    /// Short name of the runtime kind, used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Text(_) => "text",
            Value::Float(_) => "float",
        }
    }

    /// Whether this value may be stored in an attribute of `kind`.
    pub fn conforms_to(&self, kind: ValueKind) -> bool {
        match self {
            Value::Text(_) => kind.is_text(),
            Value::Float(_) => !kind.is_text(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            Value::Float(_) => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(x) => Some(*x),
            Value::Text(_) => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(s) => f.write_str(s),
            Value::Float(x) => write!(f, "{x}"),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

/// Hashable key for attribute indexes.
///
/// Floats are keyed by bit pattern after normalizing `-0.0` to `0.0` and every
/// NaN to a single canonical NaN, so equal-looking floats share a posting.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IndexKey {
    Text(String),
    Float(u64),
}

impl From<&Value> for IndexKey {
    fn from(value: &Value) -> Self {
        match value {
            Value::Text(s) => IndexKey::Text(s.clone()),
            Value::Float(x) => {
                let x = if x.is_nan() {
                    f64::NAN
                } else if *x == 0.0 {
                    0.0
                } else {
                    *x
                };
                IndexKey::Float(x.to_bits())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conformance_follows_value_kind() {
        let text = Value::from("S1");
        let float = Value::from(2.5);
        assert!(text.conforms_to(ValueKind::Text));
        assert!(text.conforms_to(ValueKind::Json));
        assert!(!text.conforms_to(ValueKind::Float));
        assert!(float.conforms_to(ValueKind::Float));
        assert!(!float.conforms_to(ValueKind::SymPy));
    }

    #[test]
    fn float_keys_are_normalized() {
        assert_eq!(
            IndexKey::from(&Value::Float(-0.0)),
            IndexKey::from(&Value::Float(0.0))
        );
        assert_eq!(
            IndexKey::from(&Value::Float(f64::NAN)),
            IndexKey::from(&Value::Float(-f64::NAN))
        );
        assert_ne!(
            IndexKey::from(&Value::Float(1.0)),
            IndexKey::from(&Value::Text("1".to_string()))
        );
    }

    #[test]
    fn untagged_json_shape() {
        let v: Value = serde_json::from_str("\"beta*S*I\"").unwrap();
        assert_eq!(v, Value::Text("beta*S*I".to_string()));
        let v: Value = serde_json::from_str("2").unwrap();
        assert_eq!(v, Value::Float(2.0));
    }

    #[test]
    fn non_finite_floats_survive_json() {
        for x in [f64::INFINITY, f64::NEG_INFINITY] {
            let json = serde_json::to_string(&Value::Float(x)).unwrap();
            assert_eq!(serde_json::from_str::<Value>(&json).unwrap(), Value::Float(x));
        }
        let json = serde_json::to_string(&Value::Float(f64::NAN)).unwrap();
        assert_eq!(json, r#"{"float":"NaN"}"#);
        let back: Value = serde_json::from_str(&json).unwrap();
        assert!(back.as_float().is_some_and(f64::is_nan));

        let text: Value = serde_json::from_str("\"NaN\"").unwrap();
        assert_eq!(text, Value::Text("NaN".to_string()));
    }
}
