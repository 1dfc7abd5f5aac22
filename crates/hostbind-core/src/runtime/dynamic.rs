//! Runtime value type exchanged with the host.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use super::HostError;

/// A dynamic value as seen by the host.
///
/// Host calls pass and return `Dynamic` values. Author types travel as
/// `Native` between conversions and never reach the host once binding has
/// finished.
///
/// `Native` values are reference counted so a `Dynamic` is always cheap to
/// clone (the cache and the async table both keep copies).
#[derive(Clone)]
pub enum Dynamic {
    /// No value (result of a void function).
    Void,
    /// Argument not supplied by the caller.
    Missing,
    /// Argument supplied but empty.
    Empty,
    /// Boolean value
    Bool(bool),
    /// Integer value
    Int(i64),
    /// Floating point value
    Float(f64),
    /// String value (owned)
    String(String),
    /// Host error value
    Error(HostError),
    /// Array of values
    Array(Vec<Dynamic>),
    /// Author-defined value
    Native(Arc<dyn Any + Send + Sync>),
}

impl Dynamic {
    /// Wrap an author value.
    pub fn native<T: Any + Send + Sync>(value: T) -> Self {
        Dynamic::Native(Arc::new(value))
    }

    /// Get a human-readable name for this value's kind.
    pub fn type_name(&self) -> &'static str {
        match self {
            Dynamic::Void => "void",
            Dynamic::Missing => "missing",
            Dynamic::Empty => "empty",
            Dynamic::Bool(_) => "bool",
            Dynamic::Int(_) => "int",
            Dynamic::Float(_) => "double",
            Dynamic::String(_) => "string",
            Dynamic::Error(_) => "error",
            Dynamic::Array(_) => "array",
            Dynamic::Native(_) => "native",
        }
    }

    /// Check if this value is void.
    pub fn is_void(&self) -> bool {
        matches!(self, Dynamic::Void)
    }

    /// Check if this argument was not supplied.
    pub fn is_missing(&self) -> bool {
        matches!(self, Dynamic::Missing)
    }

    /// Check if this argument is empty.
    pub fn is_empty(&self) -> bool {
        matches!(self, Dynamic::Empty)
    }

    /// The host error carried by this value, if any.
    pub fn as_error(&self) -> Option<HostError> {
        match self {
            Dynamic::Error(e) => Some(*e),
            _ => None,
        }
    }

    /// Borrow an author value of type `T`.
    pub fn downcast_native<T: Any>(&self) -> Option<&T> {
        match self {
            Dynamic::Native(value) => value.downcast_ref::<T>(),
            _ => None,
        }
    }
}

impl fmt::Debug for Dynamic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dynamic::Void => write!(f, "Void"),
            Dynamic::Missing => write!(f, "Missing"),
            Dynamic::Empty => write!(f, "Empty"),
            Dynamic::Bool(v) => write!(f, "Bool({})", v),
            Dynamic::Int(v) => write!(f, "Int({})", v),
            Dynamic::Float(v) => write!(f, "Float({})", v),
            Dynamic::String(s) => write!(f, "String({:?})", s),
            Dynamic::Error(e) => write!(f, "Error({})", e),
            Dynamic::Array(items) => f.debug_tuple("Array").field(items).finish(),
            Dynamic::Native(_) => write!(f, "Native(...)"),
        }
    }
}

impl PartialEq for Dynamic {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Dynamic::Void, Dynamic::Void) => true,
            (Dynamic::Missing, Dynamic::Missing) => true,
            (Dynamic::Empty, Dynamic::Empty) => true,
            (Dynamic::Bool(a), Dynamic::Bool(b)) => a == b,
            (Dynamic::Int(a), Dynamic::Int(b)) => a == b,
            (Dynamic::Float(a), Dynamic::Float(b)) => a == b,
            (Dynamic::String(a), Dynamic::String(b)) => a == b,
            (Dynamic::Error(a), Dynamic::Error(b)) => a == b,
            (Dynamic::Array(a), Dynamic::Array(b)) => a == b,
            // Author values only compare equal to themselves
            (Dynamic::Native(a), Dynamic::Native(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}
