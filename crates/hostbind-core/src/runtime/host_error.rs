//! Host error values.

use std::fmt;

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// An error value understood by the host.
///
/// These are values, not failures: a function may legitimately return one,
/// and the host displays it in place of a result. The numeric codes are
/// stable and match the host's wire representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u16)]
pub enum HostError {
    /// Intersection of two ranges that do not intersect.
    Null = 0,
    /// Division by zero.
    Div0 = 7,
    /// Wrong kind of argument.
    Value = 15,
    /// Invalid reference.
    Ref = 23,
    /// Unknown name.
    Name = 29,
    /// Invalid numeric value.
    Num = 36,
    /// Value not available.
    NA = 42,
    /// Result is still being computed.
    GettingData = 43,
}

impl HostError {
    /// The host's display text for this error.
    pub fn as_str(self) -> &'static str {
        match self {
            HostError::Null => "#NULL!",
            HostError::Div0 => "#DIV/0!",
            HostError::Value => "#VALUE!",
            HostError::Ref => "#REF!",
            HostError::Name => "#NAME?",
            HostError::Num => "#NUM!",
            HostError::NA => "#N/A",
            HostError::GettingData => "#GETTING_DATA",
        }
    }
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
