//! Value shapes stored in and returned from containers.

use std::sync::Arc;

/// A value as seen through a container or a cursor.
///
/// Boxed values are shared: cloning a `Value::Boxed` bumps the reference
/// count and never copies the payload, and dropping it never frees the
/// container's own copy.
#[derive(Debug)]
pub enum Value<V> {
    /// Presence flag of a `Bitset` entry.
    Bool(bool),
    /// Payload of an `IntToInt` or `StringToInt` entry.
    Int(i64),
    /// Payload of an `IntToValue` or `StringToValue` entry.
    Boxed(Arc<V>),
}

impl<V> Value<V> {
    /// Wrap a payload for a `*ToValue` container.
    pub fn boxed(value: V) -> Self {
        Value::Boxed(Arc::new(value))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_boxed(&self) -> Option<&Arc<V>> {
        match self {
            Value::Boxed(v) => Some(v),
            _ => None,
        }
    }

    pub(crate) fn shape(&self) -> &'static str {
        match self {
            Value::Bool(_) => "boolean value",
            Value::Int(_) => "integer value",
            Value::Boxed(_) => "boxed value",
        }
    }
}

// No `V: Clone` bound: clones share the `Arc`.
impl<V> Clone for Value<V> {
    fn clone(&self) -> Self {
        match self {
            Value::Bool(b) => Value::Bool(*b),
            Value::Int(v) => Value::Int(*v),
            Value::Boxed(v) => Value::Boxed(Arc::clone(v)),
        }
    }
}

impl<V: PartialEq> PartialEq for Value<V> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Boxed(a), Value::Boxed(b)) => Arc::ptr_eq(a, b) || **a == **b,
            _ => false,
        }
    }
}

impl<V: Eq> Eq for Value<V> {}

impl<V> From<bool> for Value<V> {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl<V> From<i64> for Value<V> {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl<V> From<Arc<V>> for Value<V> {
    fn from(v: Arc<V>) -> Self {
        Value::Boxed(v)
    }
}
