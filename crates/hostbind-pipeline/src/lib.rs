//! Binding stages for hostbind.
//!
//! Takes author [`FunctionDescriptor`](hostbind_core::FunctionDescriptor)s
//! through a fixed sequence of stages until every one of them only uses
//! types a host understands, then hands the batch to the host:
//!
//! 1. [`conversion`]: ordered parameter and return conversion chains
//! 2. [`async_call`]: long-running functions return a pending value first
//! 3. post-async conversions (same resolver, second rule set)
//! 4. variadic adaptation of trailing `PARAMS` arrays
//! 5. [`execution`]: logging, caching, timing and suppression layers
//! 6. [`finalize`]: validation, error boundary, registration
//!
//! [`Pipeline`] runs them in that order; [`FunctionSet`] exposes each stage
//! on its own.

pub mod async_call;
pub mod conversion;
pub mod execution;
pub mod finalize;
mod function_set;
pub mod host;
mod params;

pub use async_call::{AsyncInvocations, AsyncOptions, AsyncTracker, Job, RayonSpawner, TaskSpawner};
pub use conversion::{
    Conversion, ConversionConfig, ConversionRule, DEFAULT_MAX_CHAIN_LENGTH, RuleContext,
    RuleError, ValueMap, conversion_rule, standard, typed_map,
};
pub use execution::{
    CacheHandler, CachePolicy, CacheStats, CallRecord, CallRecorder, ExecutionConfig,
    ExecutionHandler, FunctionCall, FunctionTiming, HandlerChain, HandlerSelector, LoggingHandler,
    MemoryRecorder, SuppressInDialogHandler, TimingHandler, TimingLog, TimingSnapshot,
    TracingRecorder,
};
pub use finalize::{BoundFunction, BoundParam, FinalizeOptions, UnhandledErrorHandler};
pub use function_set::{FunctionSet, Pipeline, RegistrationReport};
pub use host::{HostRegistrar, HostServices, RegistrationFailure};
