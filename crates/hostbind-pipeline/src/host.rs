//! Interfaces the pipeline consumes from the host.
//!
//! The host is never implemented here. Stages and bound functions only see
//! it through [`HostServices`] (queried at call time) and
//! [`HostRegistrar`] (called once, at the end of binding).

use hostbind_core::{ConversionError, DataType, Dynamic};
use thiserror::Error;

use crate::finalize::BoundFunction;

/// Services a host offers to bound functions while they run.
pub trait HostServices: Send + Sync {
    /// The value shown while an asynchronous result is not available yet.
    fn pending_value(&self) -> Dynamic;

    /// Whether the host is currently in a context where function results
    /// are not shown to the user (e.g. an argument editing dialog).
    fn is_restricted_context(&self) -> bool;

    /// Coerce a host value to a declared type.
    fn coerce(&self, value: &Dynamic, target: &DataType) -> Result<Dynamic, ConversionError> {
        hostbind_core::coerce(value, target)
    }

    /// Whether the host supplies its own completion handles.
    fn supports_native_async(&self) -> bool {
        false
    }

    /// Called from any thread when an emulated asynchronous invocation of
    /// `function` has its result ready.
    fn async_ready(&self, _function: &str) {}

    /// Whether the host can carry a value of this type.
    fn is_native_type(&self, data_type: &DataType) -> bool {
        data_type.is_host_native()
    }
}

/// The host's registration entry point.
pub trait HostRegistrar {
    /// Register a batch of functions. Returns one result per function, in
    /// the same order.
    fn register(&self, functions: Vec<BoundFunction>) -> Vec<Result<(), RegistrationFailure>>;
}

/// A host's refusal to register one function.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct RegistrationFailure {
    /// The host's message.
    pub message: String,
}

impl RegistrationFailure {
    /// Create a failure.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
