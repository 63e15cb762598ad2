//! The JSON-like value carried by node data, formula results, and relation
//! activation-condition targets.
//!
//! `Value` is deliberately a strict subset of `serde_json::Value` — no
//! distinction between integers and floats beyond what `f64` already gives
//! us — because every consumer (node evaluators, the expression
//! interpreter, the facade's JSON export) treats numbers uniformly.

use std::{
    cmp::Ordering,
    collections::BTreeMap,
    fmt::{self, Display},
    hash::{Hash, Hasher},
};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    Array(Vec<Value>),
    Object(BTreeMap<String, Value>),
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.canonical_string() == other.canonical_string()
    }
}
impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical_string().hash(state);
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::Text(s) => write!(f, "{s}"),
            Value::Array(_) | Value::Object(_) => write!(f, "{}", self.canonical_string()),
        }
    }
}

impl Value {
    pub fn number(n: f64) -> Self {
        Value::Number(n)
    }

    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    /// Used by the scheduler's "changed?" check: primitive
    /// equality for scalars, canonical-JSON comparison for composites.
    pub fn canonical_string(&self) -> String {
        serde_json::to_string(&self.to_json()).unwrap_or_default()
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => serde_json::Number::from_f64(*n)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
            Value::Text(s) => serde_json::Value::String(s.clone()),
            Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Object(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect()),
        }
    }

    pub fn from_json(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::Text(s.clone()),
            serde_json::Value::Array(items) => {
                Value::Array(items.iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(map) => Value::Object(
                map.iter()
                .map(|(k, v)| (k.clone(), Value::from_json(v)))
                .collect()),
        }
    }

    /// Truthiness used by condition/action gating.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0,
            Value::Text(s) => !s.is_empty(),
            Value::Array(a) => !a.is_empty(),
            Value::Object(o) => !o.is_empty(),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Text(s) => s.parse::<f64>().ok(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Number(n) => Some(*n != 0.0),
            _ => None,
        }
    }

    /// Ordering used by relation activation-condition comparisons
    /// (`gt`/`lt`/`gte`/`lte`); `None` when the two values are not
    /// comparable (type mismatch other than a numeric coercion).
    pub fn partial_cmp_value(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
            (Value::Text(a), Value::Text(b)) => a.partial_cmp(b),
            _ => match (self.as_number(), other.as_number()) {
                (Some(a), Some(b)) => a.partial_cmp(&b),
                _ => None,
            },
        }
    }

    pub fn default_for_type(node_type: crate::NodeType) -> Value {
        use crate::NodeType::*;
        match node_type {
            Concept => Value::Number(0.0),
            Condition => Value::Bool(false),
            Action => Value::Bool(false),
            Event => Value::Bool(false),
            Formula => Value::Null,
            Custom => Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn canonical_equality_ignores_key_order() {
        let mut a = BTreeMap::new();
        a.insert("x".to_string(), Value::Number(1.0));
        a.insert("y".to_string(), Value::Number(2.0));
        let mut b = BTreeMap::new();
        b.insert("y".to_string(), Value::Number(2.0));
        b.insert("x".to_string(), Value::Number(1.0));
        assert_eq!(Value::Object(a), Value::Object(b));
    }

    #[test]
    fn truthiness_matches_spec_rules() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::Number(0.0).is_truthy());
        assert!(Value::Number(-1.0).is_truthy());
        assert!(!Value::Text(String::new()).is_truthy());
        assert!(Value::Text("x".into()).is_truthy());
    }

    #[test]
    fn json_roundtrip_preserves_shape() {
        let v = Value::Array(vec![Value::Number(1.0), Value::Text("a".into())]);
        let json = v.to_json();
        let back = Value::from_json(&json);
        assert_eq!(v, back);
    }

    proptest! {
        #[test]
        fn scalar_json_roundtrip(n in -1e12f64..1e12f64, s in ".*", b: bool) {
            let values = [Value::Number(n), Value::Text(s), Value::Bool(b)];
            for v in values {
                let back = Value::from_json(&v.to_json());
                prop_assert_eq!(&v, &back);
            }
        }

        #[test]
        fn equal_values_hash_equal(n in -1e12f64..1e12f64, s in ".*") {
            use std::collections::hash_map::DefaultHasher;

            fn hash_of(v: &Value) -> u64 {
                let mut hasher = DefaultHasher::new();
                v.hash(&mut hasher);
                hasher.finish()
            }

            let a = Value::Number(n);
            let b = Value::Number(n);
            prop_assert_eq!(a == b, hash_of(&a) == hash_of(&b));

            let a = Value::Text(s.clone());
            let b = Value::Text(s);
            prop_assert_eq!(a == b, hash_of(&a) == hash_of(&b));
        }
    }
}
