//! Hashable snapshots of argument lists.

use ordered_float::OrderedFloat;

use super::Dynamic;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum KeyPart {
    Void,
    Missing,
    Empty,
    Bool(bool),
    Int(i64),
    Float(OrderedFloat<f64>),
    String(String),
    Error(u16),
    Array(Vec<KeyPart>),
}

impl KeyPart {
    fn from_dynamic(value: &Dynamic) -> Option<Self> {
        Some(match value {
            Dynamic::Void => KeyPart::Void,
            Dynamic::Missing => KeyPart::Missing,
            Dynamic::Empty => KeyPart::Empty,
            Dynamic::Bool(b) => KeyPart::Bool(*b),
            Dynamic::Int(i) => KeyPart::Int(*i),
            Dynamic::Float(f) => KeyPart::Float(OrderedFloat(*f)),
            Dynamic::String(s) => KeyPart::String(s.clone()),
            Dynamic::Error(e) => KeyPart::Error((*e).into()),
            Dynamic::Array(items) => KeyPart::Array(
                items
                    .iter()
                    .map(KeyPart::from_dynamic)
                    .collect::<Option<Vec<_>>>()?,
            ),
            Dynamic::Native(_) => return None,
        })
    }
}

/// Identity of an argument list, used to key caches and async tables.
///
/// Two argument lists produce equal keys when they are value-equal. Lists
/// holding author values have no key, since those compare by identity only.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArgumentKey(Vec<KeyPart>);

impl ArgumentKey {
    /// Build a key, or `None` if any argument is an author value.
    pub fn from_args(args: &[Dynamic]) -> Option<Self> {
        args.iter()
            .map(KeyPart::from_dynamic)
            .collect::<Option<Vec<_>>>()
            .map(ArgumentKey)
    }

    /// Number of arguments in the key.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if the key has no arguments.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
