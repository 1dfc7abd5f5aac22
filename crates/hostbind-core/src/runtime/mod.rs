//! Native function storage and execution context.
//!
//! This module provides the infrastructure for storing and calling native
//! Rust functions from a host.
//!
//! ## Key Types
//!
//! - [`Dynamic`]: Runtime value type exchanged with the host
//! - [`NativeFn`]: Type-erased callable wrapper
//! - [`CallContext`]: Bridge between the host and Rust for one call
//! - [`Completion`]: One-shot handoff for asynchronous results
//! - [`ArgumentKey`]: Hashable identity of an argument list

mod call_context;
mod completion;
mod dynamic;
mod host_error;
mod key;
mod native_fn;

pub use call_context::CallContext;
pub use completion::{CallOutcome, Completion};
pub use dynamic::Dynamic;
pub use host_error::HostError;
pub use key::ArgumentKey;
pub use native_fn::{NativeCallable, NativeFn};
