use serde_json::{Map, Number, Value};
use std::collections::HashSet;
use std::fmt;

/// Name of a request input, e.g. `http.client_ip`.
pub type Address = String;

/// Structured request data published into a context.
///
/// Map entries keep insertion order and carry their key alongside the value,
/// so inspectors can read keys without relying on position.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Parameter {
    /// Uninitialized or unrepresentable value.
    #[default]
    Invalid,
    Null,
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    String(String),
    Array(Vec<Parameter>),
    Map(Vec<(String, Parameter)>),
}

impl Parameter {
    /// Create an empty map.
    pub fn map() -> Self {
        Parameter::Map(Vec::new())
    }

    /// Create an empty array.
    pub fn array() -> Self {
        Parameter::Array(Vec::new())
    }

    pub fn string(value: impl Into<String>) -> Self {
        Parameter::String(value.into())
    }

    /// Add a keyed entry to a map.
    ///
    /// Returns false, leaving the value untouched, if this is not a map.
    pub fn add(&mut self, key: impl Into<String>, value: Parameter) -> bool {
        match self {
            Parameter::Map(entries) => {
                entries.push((key.into(), value));
                true
            }
            _ => false,
        }
    }

    /// Append an element to an array.
    ///
    /// Returns false if this is not an array.
    pub fn push(&mut self, value: Parameter) -> bool {
        match self {
            Parameter::Array(items) => {
                items.push(value);
                true
            }
            _ => false,
        }
    }

    #[inline]
    pub fn is_map(&self) -> bool {
        matches!(self, Parameter::Map(_))
    }

    #[inline]
    pub fn is_container(&self) -> bool {
        matches!(self, Parameter::Map(_) | Parameter::Array(_))
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        !matches!(self, Parameter::Invalid)
    }

    /// Number of children for containers, byte length for strings.
    pub fn len(&self) -> usize {
        match self {
            Parameter::Map(entries) => entries.len(),
            Parameter::Array(items) => items.len(),
            Parameter::String(s) => s.len(),
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look up the last entry with the given key in a map.
    pub fn get(&self, key: &str) -> Option<&Parameter> {
        match self {
            Parameter::Map(entries) => entries
                .iter()
                .rev()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Parameter::String(s) => Some(s),
            _ => None,
        }
    }

    /// Map entries, empty for anything else.
    pub fn entries(&self) -> &[(String, Parameter)] {
        match self {
            Parameter::Map(entries) => entries,
            _ => &[],
        }
    }

    /// Render a scalar the way matchers see it; containers yield `None`.
    pub fn scalar_string(&self) -> Option<String> {
        match self {
            Parameter::String(s) => Some(s.clone()),
            Parameter::Bool(b) => Some(b.to_string()),
            Parameter::Int(i) => Some(i.to_string()),
            Parameter::Uint(u) => Some(u.to_string()),
            Parameter::Float(f) => Some(f.to_string()),
            Parameter::Null => Some(String::new()),
            _ => None,
        }
    }

    /// Convert into a JSON value. Invalid values become `null`.
    pub fn to_json(&self) -> Value {
        match self {
            Parameter::Invalid | Parameter::Null => Value::Null,
            Parameter::Bool(b) => Value::Bool(*b),
            Parameter::Int(i) => Value::from(*i),
            Parameter::Uint(u) => Value::from(*u),
            Parameter::Float(f) => Number::from_f64(*f).map(Value::Number).unwrap_or(Value::Null),
            Parameter::String(s) => Value::String(s.clone()),
            Parameter::Array(items) => Value::Array(items.iter().map(Parameter::to_json).collect()),
            Parameter::Map(entries) => {
                let mut map = Map::with_capacity(entries.len());
                for (k, v) in entries {
                    map.insert(k.clone(), v.to_json());
                }
                Value::Object(map)
            }
        }
    }

    /// Parse JSON text into a parameter tree.
    pub fn from_json_str(text: &str) -> crate::Result<Self> {
        let value: Value = serde_json::from_str(text)?;
        Ok(Parameter::from(value))
    }
}

impl From<Value> for Parameter {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Parameter::Null,
            Value::Bool(b) => Parameter::Bool(b),
            Value::Number(n) => {
                if let Some(u) = n.as_u64() {
                    Parameter::Uint(u)
                } else if let Some(i) = n.as_i64() {
                    Parameter::Int(i)
                } else {
                    n.as_f64().map(Parameter::Float).unwrap_or(Parameter::Invalid)
                }
            }
            Value::String(s) => Parameter::String(s),
            Value::Array(items) => Parameter::Array(items.into_iter().map(Parameter::from).collect()),
            Value::Object(map) => {
                Parameter::Map(map.into_iter().map(|(k, v)| (k, Parameter::from(v))).collect())
            }
        }
    }
}

impl From<&str> for Parameter {
    fn from(s: &str) -> Self {
        Parameter::String(s.to_string())
    }
}

impl From<String> for Parameter {
    fn from(s: String) -> Self {
        Parameter::String(s)
    }
}

impl From<bool> for Parameter {
    fn from(b: bool) -> Self {
        Parameter::Bool(b)
    }
}

impl From<i64> for Parameter {
    fn from(i: i64) -> Self {
        Parameter::Int(i)
    }
}

impl From<u64> for Parameter {
    fn from(u: u64) -> Self {
        Parameter::Uint(u)
    }
}

impl From<f64> for Parameter {
    fn from(f: f64) -> Self {
        Parameter::Float(f)
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

/// Read-only handle over published data.
///
/// A view either wraps a single parameter or layers several published
/// batches, in which case lookups resolve against the most recent batch that
/// carries the key.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParameterView<'a> {
    repr: Repr<'a>,
}

#[derive(Debug, Clone, Copy, Default)]
enum Repr<'a> {
    #[default]
    Empty,
    Single(&'a Parameter),
    Layered(&'a [Parameter]),
}

impl<'a> ParameterView<'a> {
    pub fn new(param: &'a Parameter) -> Self {
        ParameterView {
            repr: Repr::Single(param),
        }
    }

    /// View the union of batches, later batches shadowing earlier ones.
    pub fn layered(batches: &'a [Parameter]) -> Self {
        ParameterView {
            repr: Repr::Layered(batches),
        }
    }

    /// True when every underlying value is a map.
    pub fn is_map(&self) -> bool {
        match self.repr {
            Repr::Empty => false,
            Repr::Single(p) => p.is_map(),
            Repr::Layered(batches) => !batches.is_empty() && batches.iter().all(Parameter::is_map),
        }
    }

    /// Resolve a top-level key.
    pub fn get(&self, key: &str) -> Option<&'a Parameter> {
        match self.repr {
            Repr::Empty => None,
            Repr::Single(p) => p.get(key),
            Repr::Layered(batches) => batches.iter().rev().find_map(|b| b.get(key)),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Distinct top-level keys in first-seen order.
    pub fn keys(&self) -> Vec<&'a str> {
        let mut seen = HashSet::new();
        let batches: &[Parameter] = match self.repr {
            Repr::Empty => &[],
            Repr::Single(p) => std::slice::from_ref(p),
            Repr::Layered(batches) => batches,
        };
        batches
            .iter()
            .flat_map(Parameter::entries)
            .map(|(k, _)| k.as_str())
            .filter(|k| seen.insert(*k))
            .collect()
    }
}

impl<'a> From<&'a Parameter> for ParameterView<'a> {
    fn from(param: &'a Parameter) -> Self {
        ParameterView::new(param)
    }
}
