//! Core types for the hostbind function-binding pipeline.
//!
//! This crate holds everything a bound function is made of, independent of
//! how the pipeline rewrites it:
//!
//! - [`DataType`] and [`TypeHash`]: the type vocabulary and its identities
//! - [`Dynamic`] and [`HostError`]: values exchanged with the host
//! - [`NativeFn`] and [`CallContext`]: type-erased callables and their calls
//! - [`FromDynamic`] / [`IntoDynamic`] and [`coerce`]: value conversions
//! - [`FunctionDescriptor`] and [`Attributes`]: what the pipeline works on
//! - [`BindError`], [`CallError`], [`ConversionError`]

pub mod attributes;
pub mod coerce;
pub mod convert;
mod data_type;
pub mod descriptor;
pub mod error;
pub mod runtime;
mod type_hash;

pub use attributes::{AttributeValue, Attributes, attr};
pub use coerce::{coerce, format_number};
pub use convert::{FromDynamic, IntoDynamic, Native};
pub use data_type::{DataType, NamedType};
pub use descriptor::{
    AdaptedStages, CallConvention, FunctionDescriptor, ParamDescriptor, ParamFlags,
    ReturnDescriptor,
};
pub use error::{BindError, CallError, ConversionError, ConversionTarget};
pub use runtime::{
    ArgumentKey, CallContext, CallOutcome, Completion, Dynamic, HostError, NativeCallable,
    NativeFn,
};
pub use type_hash::{TypeHash, hash_constants};
