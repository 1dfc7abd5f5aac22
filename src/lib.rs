//! Bind native Rust functions to a host that only speaks a few value types.
//!
//! Authors describe functions with [`FunctionDescriptor`]s. A [`Pipeline`]
//! rewrites them (conversions, async, variadic lists, execution handlers)
//! until every parameter and return type is one the host can carry, then
//! registers the batch through a [`HostRegistrar`].
//!
//! ```
//! use std::sync::Arc;
//! use hostbind::prelude::*;
//!
//! let host = Arc::new(LocalHost::new());
//! let add = FunctionDescriptor::new("add", |ctx: &mut CallContext| {
//!     let a: f64 = ctx.arg(0)?;
//!     let b: f64 = ctx.arg(1)?;
//!     ctx.set_return(a + b);
//!     Ok(())
//! })
//! .param("a", DataType::Float)
//! .param("b", DataType::Float)
//! .returns(DataType::Float);
//!
//! let report = Pipeline::new(host.clone()).run([add], host.as_ref());
//! assert!(report.is_success());
//! assert_eq!(
//!     host.call("add", vec![Dynamic::Float(1.0), Dynamic::Float(2.0)]),
//!     Dynamic::Float(3.0)
//! );
//! ```

pub mod local;

pub use hostbind_core as core;
pub use hostbind_pipeline as pipeline;

pub use hostbind_core::{
    AttributeValue, Attributes, BindError, CallContext, CallError, ConversionError, DataType,
    Dynamic, FromDynamic, FunctionDescriptor, HostError, IntoDynamic, Native, NativeFn,
    ParamDescriptor, ParamFlags, attr,
};
pub use hostbind_pipeline::{
    AsyncOptions, BoundFunction, CachePolicy, ConversionConfig, ExecutionConfig, FinalizeOptions,
    FunctionSet, HostRegistrar, HostServices, Pipeline, RegistrationReport, standard,
};
pub use local::LocalHost;

// Re-export main types
pub mod prelude {
    pub use crate::local::LocalHost;
    pub use hostbind_core::{
        Attributes, BindError, CallContext, CallConvention, CallError, Completion, DataType,
        Dynamic, FunctionDescriptor, HostError, Native, NativeFn, ParamDescriptor, ParamFlags,
        attr,
    };
    pub use hostbind_pipeline::{
        AsyncOptions, BoundFunction, CachePolicy, ConversionConfig, ExecutionConfig,
        FinalizeOptions, FunctionSet, HostRegistrar, HostServices, MemoryRecorder, Pipeline,
        RegistrationReport, SuppressInDialogHandler, TimingLog, TracingRecorder, standard,
    };
}
