//! Read-only metadata attached to functions, parameters and return values.
//!
//! Attributes are the only thing conversion rules and handler selectors
//! look at besides types. They are set once when a descriptor is built and
//! never change afterwards.

use std::sync::Arc;

use rustc_hash::FxHashMap;

/// Well-known attribute keys.
pub mod attr {
    /// Marks a function as long-running.
    pub const ASYNC: &str = "async";
    /// Log every call.
    pub const LOGGING: &str = "logging";
    /// Cache results; the value is the time to live in seconds.
    pub const CACHE: &str = "cache";
    /// Time every call.
    pub const TIMING: &str = "timing";
    /// Hide failures while the host is in a restricted context.
    pub const SUPPRESS_IN_DIALOG: &str = "suppress_in_dialog";
    /// Human-readable description.
    pub const DESCRIPTION: &str = "description";
    /// Grouping shown by the host.
    pub const CATEGORY: &str = "category";
}

/// A single attribute value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeValue {
    /// Present without a value.
    Flag,
    /// Integer value.
    Int(i64),
    /// Text value.
    Text(Arc<str>),
}

/// A bag of named attributes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attributes {
    entries: FxHashMap<String, AttributeValue>,
}

impl Attributes {
    /// Create an empty bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a flag.
    pub fn with_flag(mut self, key: impl Into<String>) -> Self {
        self.entries.insert(key.into(), AttributeValue::Flag);
        self
    }

    /// Add an integer.
    pub fn with_int(mut self, key: impl Into<String>, value: i64) -> Self {
        self.entries.insert(key.into(), AttributeValue::Int(value));
        self
    }

    /// Add a text value.
    pub fn with_text(mut self, key: impl Into<String>, value: impl Into<Arc<str>>) -> Self {
        self.entries.insert(key.into(), AttributeValue::Text(value.into()));
        self
    }

    /// Check whether a key is present, whatever its value.
    pub fn has(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Get a raw value.
    pub fn get(&self, key: &str) -> Option<&AttributeValue> {
        self.entries.get(key)
    }

    /// Get an integer value.
    pub fn int(&self, key: &str) -> Option<i64> {
        match self.entries.get(key)? {
            AttributeValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Get a text value.
    pub fn text(&self, key: &str) -> Option<&str> {
        match self.entries.get(key)? {
            AttributeValue::Text(v) => Some(v),
            _ => None,
        }
    }

    /// Iterate over all entries (unordered).
    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttributeValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if there are no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
