//! Error types for binding and calling.
//!
//! - [`ConversionError`]: a value could not be turned into the requested type
//! - [`CallError`]: a failure while a bound function runs
//! - [`BindError`]: a configuration error found while binding, reported per
//!   function

use std::fmt;

use thiserror::Error;

use crate::DataType;
use crate::runtime::HostError;

// ============================================================================
// Conversion Errors
// ============================================================================

/// Errors converting between host values and Rust values.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConversionError {
    /// The value has the wrong kind.
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        /// The expected type.
        expected: String,
        /// The kind of value found.
        actual: &'static str,
    },

    /// An integer value overflowed during conversion.
    #[error("integer overflow: {value} doesn't fit in {target_type}")]
    IntegerOverflow {
        /// The value that overflowed.
        value: i64,
        /// The target type.
        target_type: &'static str,
    },

    /// Text could not be read as a number.
    #[error("cannot read {text:?} as {target_type}")]
    InvalidNumber {
        /// The text that was rejected.
        text: String,
        /// The target type.
        target_type: &'static str,
    },

    /// A host error value was found where data was expected.
    #[error("host error value {0}")]
    HostError(HostError),
}

impl ConversionError {
    /// Create a type mismatch error.
    pub fn mismatch(expected: impl fmt::Display, actual: &'static str) -> Self {
        ConversionError::TypeMismatch {
            expected: expected.to_string(),
            actual,
        }
    }
}

// ============================================================================
// Call Errors
// ============================================================================

/// Failures raised while a bound function runs.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CallError {
    /// Argument index out of bounds.
    #[error("argument index {index} out of bounds (count: {count})")]
    ArgumentIndexOutOfBounds {
        /// The requested index.
        index: usize,
        /// The number of arguments supplied.
        count: usize,
    },

    /// An argument or result could not be converted.
    #[error("conversion failed: {0}")]
    Conversion(#[from] ConversionError),

    /// The function reported a failure.
    #[error("{message}")]
    Failed {
        /// The failure message.
        message: String,
    },

    /// The function panicked.
    #[error("native function panicked: {message}")]
    Panicked {
        /// The panic message.
        message: String,
    },

    /// The call was abandoned before it finished.
    #[error("call was cancelled")]
    Cancelled,
}

impl CallError {
    /// Create a failure with a message.
    pub fn failed(message: impl Into<String>) -> Self {
        CallError::Failed {
            message: message.into(),
        }
    }

    /// Build a `Panicked` error from a caught panic payload.
    pub fn from_panic(payload: &(dyn std::any::Any + Send)) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic".to_string()
        };
        CallError::Panicked { message }
    }
}

// ============================================================================
// Bind Errors
// ============================================================================

/// The part of a function a bind error refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionTarget {
    /// A parameter, by position and name.
    Parameter {
        /// Position of the parameter.
        index: usize,
        /// Name of the parameter.
        name: String,
    },
    /// The return value.
    Return,
}

impl fmt::Display for ConversionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConversionTarget::Parameter { index, name } => {
                write!(f, "parameter {index} '{name}'")
            }
            ConversionTarget::Return => write!(f, "return value"),
        }
    }
}

/// Configuration errors found while binding.
///
/// Each error names the function it belongs to; a failing function is
/// dropped from the batch without affecting the others.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BindError {
    /// A conversion chain returned to a type it already passed through.
    #[error("function '{function}': {target} conversion chain cycles back to '{data_type}' ({})", format_chain(chain))]
    ConversionCycle {
        /// The function name.
        function: String,
        /// The parameter or return value.
        target: ConversionTarget,
        /// The repeated type.
        data_type: DataType,
        /// Types visited, in order.
        chain: Vec<DataType>,
    },

    /// A conversion chain applied more rules than allowed.
    #[error("function '{function}': {target} conversion chain exceeds {limit} steps")]
    ChainTooLong {
        /// The function name.
        function: String,
        /// The parameter or return value.
        target: ConversionTarget,
        /// The configured limit.
        limit: usize,
    },

    /// A conversion rule failed while building its mapping.
    #[error("function '{function}': conversion rule failed for {target}: {message}")]
    RuleFailed {
        /// The function name.
        function: String,
        /// The parameter or return value.
        target: ConversionTarget,
        /// The rule's message.
        message: String,
    },

    /// A type is still not host-native after every stage.
    #[error("function '{function}': {target} has type '{data_type}' which the host cannot carry")]
    NonHostType {
        /// The function name.
        function: String,
        /// The parameter or return value.
        target: ConversionTarget,
        /// The offending type.
        data_type: DataType,
    },

    /// A variadic marker on a parameter that is not the trailing array.
    #[error("function '{function}': parameter {index} '{param}' is marked variadic but is not a trailing array")]
    MisplacedParams {
        /// The function name.
        function: String,
        /// Name of the parameter.
        param: String,
        /// Position of the parameter.
        index: usize,
    },

    /// Two functions share a name.
    #[error("function '{function}' is declared more than once")]
    DuplicateFunction {
        /// The function name.
        function: String,
    },

    /// The host rejected the function.
    #[error("function '{function}': host registration failed: {message}")]
    Registration {
        /// The function name.
        function: String,
        /// The host's message.
        message: String,
    },
}

impl BindError {
    /// Name of the function this error belongs to.
    pub fn function(&self) -> &str {
        match self {
            BindError::ConversionCycle { function, .. }
            | BindError::ChainTooLong { function, .. }
            | BindError::RuleFailed { function, .. }
            | BindError::NonHostType { function, .. }
            | BindError::MisplacedParams { function, .. }
            | BindError::DuplicateFunction { function }
            | BindError::Registration { function, .. } => function,
        }
    }
}

fn format_chain(chain: &[DataType]) -> String {
    chain
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversion_error_display() {
        let err = ConversionError::mismatch(DataType::Float, "string");
        assert_eq!(err.to_string(), "type mismatch: expected double, got string");

        let err = ConversionError::IntegerOverflow {
            value: 300,
            target_type: "u8",
        };
        assert!(err.to_string().contains("300"));
    }

    #[test]
    fn call_error_from_conversion() {
        let err: CallError = ConversionError::HostError(HostError::NA).into();
        assert!(matches!(err, CallError::Conversion(_)));
        assert!(err.to_string().contains("#N/A"));
    }

    #[test]
    fn call_error_from_panic_payload() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(
            CallError::from_panic(payload.as_ref()),
            CallError::Panicked {
                message: "boom".to_string()
            }
        );

        let payload: Box<dyn std::any::Any + Send> = Box::new(String::from("bang"));
        assert!(CallError::from_panic(payload.as_ref()).to_string().contains("bang"));
    }

    #[test]
    fn bind_error_names_function_and_target() {
        let err = BindError::NonHostType {
            function: "price".to_string(),
            target: ConversionTarget::Parameter {
                index: 1,
                name: "currency".to_string(),
            },
            data_type: DataType::named("Currency"),
        };
        assert_eq!(err.function(), "price");
        let text = err.to_string();
        assert!(text.contains("parameter 1 'currency'"));
        assert!(text.contains("Currency"));
    }

    #[test]
    fn cycle_error_shows_chain() {
        let err = BindError::ConversionCycle {
            function: "f".to_string(),
            target: ConversionTarget::Return,
            data_type: DataType::named("A"),
            chain: vec![DataType::named("A"), DataType::named("B"), DataType::named("A")],
        };
        assert!(err.to_string().contains("A -> B -> A"));
    }
}
