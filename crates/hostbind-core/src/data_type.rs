//! DataType - the type vocabulary shared by descriptors, rules and hosts.
//!
//! A [`DataType`] describes the declared type of a parameter or return value
//! at some point in the binding pipeline. Functions start out with their
//! natural Rust-side types (`Named`, `Optional`, `Task`, typed arrays) and
//! the pipeline rewrites them until only host-native types remain.
//!
//! # Example
//!
//! ```
//! use hostbind_core::DataType;
//!
//! let names = DataType::array(DataType::String);
//! assert!(!names.is_host_native());
//! assert_eq!(names.to_string(), "string[]");
//!
//! assert!(DataType::array(DataType::Object).is_host_native());
//! ```

use std::fmt::{self, Display, Formatter};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::TypeHash;

/// An author-defined type, identified by the hash of its name.
#[derive(Debug, Clone)]
pub struct NamedType {
    hash: TypeHash,
    name: Arc<str>,
}

impl NamedType {
    /// Create a named type.
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        let name = name.into();
        Self {
            hash: TypeHash::from_name(&name),
            name,
        }
    }

    /// The type's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The type's identity hash.
    pub fn type_hash(&self) -> TypeHash {
        self.hash
    }
}

impl PartialEq for NamedType {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash
    }
}

impl Eq for NamedType {}

impl Hash for NamedType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.hash.hash(state);
    }
}

/// Declared type of a parameter or return value.
///
/// Host-native members: `Void`, `Bool`, `Int`, `Float`, `String`, `Object`,
/// `Array(Object)` and `Array(Float)`. Everything else must be converted
/// away before a function can be registered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum DataType {
    /// No value (return position only).
    #[default]
    Void,
    /// Boolean.
    Bool,
    /// 64-bit signed integer.
    Int,
    /// 64-bit float.
    Float,
    /// UTF-8 text.
    String,
    /// Any host value.
    Object,
    /// Homogeneous sequence.
    Array(Box<DataType>),
    /// A value that may be absent.
    Optional(Box<DataType>),
    /// The eventual result of a long-running call.
    Task(Box<DataType>),
    /// An author-defined type.
    Named(NamedType),
}

impl DataType {
    /// Create a named author type.
    pub fn named(name: impl Into<Arc<str>>) -> Self {
        DataType::Named(NamedType::new(name))
    }

    /// Create a named type for a Rust type, using its type name.
    pub fn native<T: 'static>() -> Self {
        DataType::named(std::any::type_name::<T>())
    }

    /// Create an array type.
    pub fn array(element: DataType) -> Self {
        DataType::Array(Box::new(element))
    }

    /// Create an optional type.
    pub fn optional(inner: DataType) -> Self {
        DataType::Optional(Box::new(inner))
    }

    /// Create a task type.
    pub fn task(output: DataType) -> Self {
        DataType::Task(Box::new(output))
    }

    /// Check whether a host can carry this type directly.
    pub fn is_host_native(&self) -> bool {
        match self {
            DataType::Void
            | DataType::Bool
            | DataType::Int
            | DataType::Float
            | DataType::String
            | DataType::Object => true,
            DataType::Array(element) => matches!(**element, DataType::Object | DataType::Float),
            DataType::Optional(_) | DataType::Task(_) | DataType::Named(_) => false,
        }
    }

    /// Element type if this is an array.
    pub fn element_type(&self) -> Option<&DataType> {
        match self {
            DataType::Array(element) => Some(element),
            _ => None,
        }
    }

    /// Output type if this is a task.
    pub fn task_output(&self) -> Option<&DataType> {
        match self {
            DataType::Task(output) => Some(output),
            _ => None,
        }
    }

    /// Check if this is `Void`.
    pub fn is_void(&self) -> bool {
        matches!(self, DataType::Void)
    }

    /// Identity hash of this type.
    pub fn type_hash(&self) -> TypeHash {
        match self {
            DataType::Named(named) => named.type_hash(),
            other => TypeHash::from_name(&other.to_string()),
        }
    }
}

impl Display for DataType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Void => write!(f, "void"),
            DataType::Bool => write!(f, "bool"),
            DataType::Int => write!(f, "int"),
            DataType::Float => write!(f, "double"),
            DataType::String => write!(f, "string"),
            DataType::Object => write!(f, "object"),
            DataType::Array(element) => write!(f, "{element}[]"),
            DataType::Optional(inner) => write!(f, "{inner}?"),
            DataType::Task(output) => write!(f, "task<{output}>"),
            DataType::Named(named) => write!(f, "{}", named.name()),
        }
    }
}
