//! Function descriptors - the unit of work of the binding pipeline.
//!
//! A [`FunctionDescriptor`] carries everything known about one function: its
//! name, its parameters and return value with their current types and
//! attributes, and the callable that implements it. Pipeline stages take
//! descriptors by value and hand back rebuilt ones.
//!
//! # Example
//!
//! ```
//! use hostbind_core::{attr, Attributes, CallContext, DataType, FunctionDescriptor};
//!
//! let desc = FunctionDescriptor::new("add", |ctx: &mut CallContext| {
//!     let a: f64 = ctx.arg(0)?;
//!     let b: f64 = ctx.arg(1)?;
//!     ctx.set_return(a + b);
//!     Ok(())
//! })
//! .param("a", DataType::Float)
//! .param("b", DataType::Float)
//! .returns(DataType::Float)
//! .with_attributes(Attributes::new().with_flag(attr::LOGGING));
//!
//! assert_eq!(desc.params().len(), 2);
//! assert!(!desc.is_async());
//! ```

use bitflags::bitflags;

use crate::attributes::{Attributes, attr};
use crate::runtime::{Dynamic, NativeCallable, NativeFn};
use crate::{DataType, TypeHash};

bitflags! {
    /// Markers on a parameter.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ParamFlags: u8 {
        /// Trailing variadic parameter.
        const PARAMS = 0b0000_0001;
    }
}

bitflags! {
    /// Pipeline stages that have already rewritten a descriptor.
    ///
    /// A stage skips descriptors it has already adapted, so running the
    /// pipeline twice changes nothing.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct AdaptedStages: u8 {
        /// Async adaptation applied.
        const ASYNC = 0b0000_0001;
        /// Variadic adaptation applied.
        const PARAMS = 0b0000_0010;
        /// Execution handlers applied.
        const HANDLERS = 0b0000_0100;
    }
}

/// How the host must call a function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CallConvention {
    /// Plain synchronous call.
    #[default]
    Direct,
    /// Synchronous call returning a pending sentinel until the result is in.
    EmulatedAsync,
    /// The host supplies a completion handle with each call.
    NativeAsync,
}

/// A parameter of a function.
#[derive(Debug, Clone)]
pub struct ParamDescriptor {
    /// Parameter name.
    pub name: String,
    /// Current declared type.
    pub data_type: DataType,
    /// Position in the parameter list.
    pub index: usize,
    /// Markers.
    pub flags: ParamFlags,
    /// Value used when the caller leaves the argument out.
    pub default: Option<Dynamic>,
    /// Read-only metadata.
    pub attributes: Attributes,
    /// Receives the host's variadic argument list.
    pub variadic: bool,
}

impl ParamDescriptor {
    /// Create a parameter. Its index is assigned when it is added to a
    /// function.
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            index: 0,
            flags: ParamFlags::empty(),
            default: None,
            attributes: Attributes::default(),
            variadic: false,
        }
    }

    /// Set markers.
    pub fn with_flags(mut self, flags: ParamFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Set the default value.
    pub fn with_default(mut self, default: Dynamic) -> Self {
        self.default = Some(default);
        self
    }

    /// Set the attributes.
    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = attributes;
        self
    }

    /// Check for the variadic marker.
    pub fn is_params(&self) -> bool {
        self.flags.contains(ParamFlags::PARAMS)
    }
}

/// The return value of a function.
#[derive(Debug, Clone, Default)]
pub struct ReturnDescriptor {
    /// Current declared type.
    pub data_type: DataType,
    /// Read-only metadata.
    pub attributes: Attributes,
}

/// Everything the pipeline knows about one function.
#[derive(Debug, Clone)]
pub struct FunctionDescriptor {
    name: String,
    params: Vec<ParamDescriptor>,
    ret: ReturnDescriptor,
    attributes: Attributes,
    native_fn: NativeFn,
    convention: CallConvention,
    adapted: AdaptedStages,
}

impl FunctionDescriptor {
    /// Create a descriptor with no parameters returning `Void`.
    pub fn new<F>(name: impl Into<String>, f: F) -> Self
    where
        F: NativeCallable + Send + Sync + 'static,
    {
        let name = name.into();
        let native_fn = NativeFn::new(TypeHash::from_function(&name, &[]), f);
        Self::from_native(name, native_fn)
    }

    /// Create a descriptor around an existing callable.
    pub fn from_native(name: impl Into<String>, native_fn: NativeFn) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            ret: ReturnDescriptor::default(),
            attributes: Attributes::default(),
            native_fn,
            convention: CallConvention::Direct,
            adapted: AdaptedStages::empty(),
        }
    }

    /// Append a parameter.
    pub fn param(self, name: impl Into<String>, data_type: DataType) -> Self {
        self.with_param(ParamDescriptor::new(name, data_type))
    }

    /// Append a fully described parameter.
    pub fn with_param(mut self, mut param: ParamDescriptor) -> Self {
        param.index = self.params.len();
        self.params.push(param);
        self
    }

    /// Set the return type.
    pub fn returns(mut self, data_type: DataType) -> Self {
        self.ret.data_type = data_type;
        self
    }

    /// Set the return value's attributes.
    pub fn with_return_attributes(mut self, attributes: Attributes) -> Self {
        self.ret.attributes = attributes;
        self
    }

    /// Set the function's attributes.
    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = attributes;
        self
    }

    /// Function name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Identity of the current signature.
    pub fn id(&self) -> TypeHash {
        let params: Vec<TypeHash> = self.params.iter().map(|p| p.data_type.type_hash()).collect();
        TypeHash::from_function(&self.name, &params)
    }

    /// Parameters in order.
    pub fn params(&self) -> &[ParamDescriptor] {
        &self.params
    }

    /// Parameters in order, mutably.
    pub fn params_mut(&mut self) -> &mut [ParamDescriptor] {
        &mut self.params
    }

    /// The return value.
    pub fn return_desc(&self) -> &ReturnDescriptor {
        &self.ret
    }

    /// The return value, mutably.
    pub fn return_mut(&mut self) -> &mut ReturnDescriptor {
        &mut self.ret
    }

    /// Current return type.
    pub fn return_type(&self) -> &DataType {
        &self.ret.data_type
    }

    /// Function attributes.
    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// The callable.
    pub fn native_fn(&self) -> &NativeFn {
        &self.native_fn
    }

    /// Replace the callable, keeping its identity.
    pub fn with_native_fn(mut self, native_fn: NativeFn) -> Self {
        self.native_fn = native_fn.with_id(self.native_fn.id);
        self
    }

    /// How the host must call this function.
    pub fn convention(&self) -> CallConvention {
        self.convention
    }

    /// Set the call convention.
    pub fn with_convention(mut self, convention: CallConvention) -> Self {
        self.convention = convention;
        self
    }

    /// Stages already applied.
    pub fn adapted(&self) -> AdaptedStages {
        self.adapted
    }

    /// Record that a stage has been applied.
    pub fn mark_adapted(mut self, stage: AdaptedStages) -> Self {
        self.adapted |= stage;
        self
    }

    /// Check whether the function is long-running and not yet adapted.
    pub fn is_async(&self) -> bool {
        self.attributes.has(attr::ASYNC) || matches!(self.ret.data_type, DataType::Task(_))
    }

    /// Check whether any parameter receives the host's variadic list.
    pub fn is_variadic(&self) -> bool {
        self.params.iter().any(|p| p.variadic)
    }
}
