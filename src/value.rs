//! Prop values.
//!
//! Props carry plain data (the JSON-like variants) and the handful of live
//! things the renderer knows how to turn into client code: signals, client
//! handlers, ref handles, nested nodes and component references.

use std::fmt;

use indexmap::IndexMap;
use serde::{Serialize, Serializer};

use crate::component::ComponentRef;
use crate::node::Node;
use crate::scope::RefHandle;
use crate::signal::{ClientFn, Signal};

/// A prop value.
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// `null`/`undefined`.
    #[default]
    Null,
    /// A boolean.
    Bool(bool),
    /// A number. Integral values print without a fractional part.
    Number(f64),
    /// A string.
    String(String),
    /// An ordered list of values.
    Array(Vec<Value>),
    /// An insertion-ordered map of values.
    Object(IndexMap<String, Value>),
    /// A render-time snapshot of a scope-bound value.
    Signal(Signal),
    /// A client-executable function (event handler, ref callback, form action).
    Handler(ClientFn),
    /// A handle to a DOM element registered in a scope's ref table.
    Ref(RefHandle),
    /// A nested node, e.g. a `placeholder` prop.
    Node(Box<Node>),
    /// A component reference, e.g. `<component is={...}>`.
    Component(ComponentRef),
}

impl Value {
    /// Build an object value from key/value pairs.
    pub fn object<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        entries.into_iter().collect()
    }

    /// JavaScript truthiness. Signals are judged by their snapshot.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::Signal(signal) => signal.value().is_truthy(),
            _ => true,
        }
    }

    /// Returns true for arrays and objects.
    pub fn is_object_shaped(&self) -> bool {
        matches!(self, Value::Array(_) | Value::Object(_))
    }

    /// Returns true for strings, numbers, booleans and null.
    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_)
        )
    }

    /// Returns true if a signal is nested anywhere inside this value.
    pub fn contains_signal(&self) -> bool {
        match self {
            Value::Signal(_) => true,
            Value::Array(items) => items.iter().any(Value::contains_signal),
            Value::Object(map) => map.values().any(Value::contains_signal),
            _ => false,
        }
    }

    /// Borrow the string if this is a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// The numeric value, if this is a number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// The boolean value, if this is a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The signal, if this is one.
    pub fn as_signal(&self) -> Option<&Signal> {
        match self {
            Value::Signal(signal) => Some(signal),
            _ => None,
        }
    }

    /// Replace every signal by its snapshot, recursively.
    pub fn resolved(&self) -> Value {
        match self {
            Value::Signal(signal) => signal.value().resolved(),
            Value::Array(items) => Value::Array(items.iter().map(Value::resolved).collect()),
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.resolved()))
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    /// Convert to JSON. Signals serialize as their snapshot; handlers, refs,
    /// nodes and components have no data representation and become `null`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => number_to_json(*n),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Object(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
            Value::Signal(signal) => signal.value().to_json(),
            Value::Ref(handle) => serde_json::Value::String(handle.to_string()),
            Value::Handler(_) | Value::Node(_) | Value::Component(_) => serde_json::Value::Null,
        }
    }

    /// Stringify the way an attribute value is stringified on the client.
    pub fn stringify(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::String(s) => s.clone(),
            Value::Array(items) => items
                .iter()
                .map(Value::stringify)
                .collect::<Vec<_>>()
                .join(","),
            Value::Signal(signal) => signal.value().stringify(),
            Value::Ref(handle) => handle.to_string(),
            other => other.to_json().to_string(),
        }
    }
}

fn number_to_json(n: f64) -> serde_json::Value {
    if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        serde_json::Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null)
    }
}

/// Format a number the way JavaScript prints it for the common cases:
/// integral values without a fractional part, `NaN` and `Infinity` spelled out.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        let sign = if n > 0.0 { "" } else { "-" };
        format!("{sign}Infinity")
    } else if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        (n as i64).to_string()
    } else {
        n.to_string()
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            (Value::Signal(a), Value::Signal(b)) => a == b,
            (Value::Handler(a), Value::Handler(b)) => a == b,
            (Value::Ref(a), Value::Ref(b)) => a == b,
            (Value::Component(a), Value::Component(b)) => a.ptr_eq(b),
            // Nodes have no structural equality.
            _ => false,
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.stringify())
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                Value::Object(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Value {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Value::Object(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Null
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&String> for Value {
    fn from(s: &String) -> Self {
        Value::String(s.clone())
    }
}

macro_rules! impl_from_number {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(n: $ty) -> Self {
                    Value::Number(n as f64)
                }
            }
        )*
    };
}

impl_from_number!(i8, i16, i32, i64, u8, u16, u32, u64, usize, isize, f32, f64);

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::Array(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

impl From<IndexMap<String, Value>> for Value {
    fn from(map: IndexMap<String, Value>) -> Self {
        Value::Object(map)
    }
}

impl From<Signal> for Value {
    fn from(signal: Signal) -> Self {
        Value::Signal(signal)
    }
}

impl From<ClientFn> for Value {
    fn from(f: ClientFn) -> Self {
        Value::Handler(f)
    }
}

impl From<RefHandle> for Value {
    fn from(handle: RefHandle) -> Self {
        Value::Ref(handle)
    }
}

impl From<Node> for Value {
    fn from(node: Node) -> Self {
        Value::Node(Box::new(node))
    }
}

impl From<ComponentRef> for Value {
    fn from(component: ComponentRef) -> Self {
        Value::Component(component)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(1.0), "1");
        assert_eq!(format_number(-42.0), "-42");
        assert_eq!(format_number(1.5), "1.5");
        assert_eq!(format_number(f64::NAN), "NaN");
        assert_eq!(format_number(f64::NEG_INFINITY), "-Infinity");
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::from(0).is_truthy());
        assert!(!Value::from("").is_truthy());
        assert!(Value::from("0").is_truthy());
        assert!(Value::Array(vec![]).is_truthy());
        assert!(Value::Object(IndexMap::new()).is_truthy());
    }

    #[test]
    fn test_json_conversion_keeps_integers() {
        let value = Value::object([("a", Value::from(1)), ("b", Value::from(2.5))]);
        assert_eq!(value.to_json().to_string(), r#"{"a":1,"b":2.5}"#);
        assert_eq!(Value::from(value.to_json()), value);
    }

    #[test]
    fn test_stringify() {
        assert_eq!(Value::from(vec![1, 2, 3]).stringify(), "1,2,3");
        assert_eq!(Value::from(true).stringify(), "true");
        assert_eq!(Value::Null.stringify(), "");
    }
}
