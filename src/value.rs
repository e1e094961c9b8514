//! The settled-payload type.
//!
//! `Value` is the closed set of payloads a promise can settle with. Keeping
//! the set tagged (rather than duck-typing a `then` member everywhere) means
//! the resolution procedure dispatches with an exhaustive `match`; the only
//! open-ended escape hatch is [`Thenable`], the trait for externally-defined
//! deferred values.

use crate::error::JSError;
use crate::promise::{Promise, SettleFn};
use indexmap::IndexMap;
use std::rc::Rc;

/// An externally-defined deferred value: anything exposing a callable
/// `then`-shaped member.
///
/// The resolution procedure calls `then` with two settlement functions and
/// guards the pair with a single-invocation latch, so implementations may
/// call either function (or fail) without breaking the at-most-once
/// settlement contract. Returning an error counts as a fault raised while
/// invoking `then` and rejects the adopting promise if neither settlement
/// function has fired yet.
pub trait Thenable {
    fn then(&self, on_fulfilled: SettleFn, on_rejected: SettleFn) -> Result<(), JSError>;
}

#[derive(Clone)]
pub enum Value {
    Undefined,
    Null,
    Boolean(bool),
    Number(f64),
    String(String),
    Array(Vec<Value>),
    /// Insertion-ordered property map, matching JS object iteration order.
    Object(IndexMap<String, Value>),
    Promise(Promise),
    Thenable(Rc<dyn Thenable>),
}

/// Capability check used at the resolution-procedure boundary: does this
/// value carry a callable `then`?
pub fn is_thenable(value: &Value) -> bool {
    matches!(value, Value::Promise(_) | Value::Thenable(_))
}

/// Builds an insertion-ordered object value from key/value entries.
pub fn object<K, I>(entries: I) -> Value
where
    K: Into<String>,
    I: IntoIterator<Item = (K, Value)>,
{
    Value::Object(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
}

impl Value {
    /// Property lookup on object values; `Undefined` for anything else,
    /// like a missing property access in JS.
    pub fn get(&self, key: &str) -> Value {
        match self {
            Value::Object(map) => map.get(key).cloned().unwrap_or(Value::Undefined),
            _ => Value::Undefined,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            // Cells and thenables compare by identity, not structure.
            (Value::Promise(a), Value::Promise(b)) => a.ptr_eq(b),
            (Value::Thenable(a), Value::Thenable(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl std::fmt::Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::String(s) => write!(f, "{s:?}"),
            Value::Array(items) => f.debug_list().entries(items).finish(),
            Value::Object(map) => f.debug_map().entries(map.iter()).finish(),
            Value::Promise(p) => write!(f, "{p:?}"),
            Value::Thenable(_) => write!(f, "Thenable {{ ... }}"),
        }
    }
}
