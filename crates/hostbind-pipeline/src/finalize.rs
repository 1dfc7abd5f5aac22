//! Binding finalizer.
//!
//! The last stage checks that every descriptor only uses types the host can
//! carry and turns the valid ones into [`BoundFunction`]s, each wrapped in
//! the outermost error boundary.

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use hostbind_core::{
    Attributes, BindError, CallConvention, CallContext, CallError, CallOutcome, Completion,
    ConversionTarget, DataType, Dynamic, FunctionDescriptor, HostError, NativeFn, TypeHash,
};

use crate::host::HostServices;

/// Turns a failure nothing else handled into the value the host shows.
pub type UnhandledErrorHandler = Arc<dyn Fn(&str, &CallError) -> Dynamic + Send + Sync>;

/// Options of the finalizer.
#[derive(Clone)]
pub struct FinalizeOptions {
    unhandled: UnhandledErrorHandler,
}

impl FinalizeOptions {
    /// Unhandled failures become `#VALUE!`.
    pub fn new() -> Self {
        Self {
            unhandled: Arc::new(|_function: &str, _error: &CallError| {
                Dynamic::Error(HostError::Value)
            }),
        }
    }

    /// Replace the unhandled failure handler.
    pub fn with_unhandled_error_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&str, &CallError) -> Dynamic + Send + Sync + 'static,
    {
        self.unhandled = Arc::new(handler);
        self
    }

    pub fn unhandled_error_handler(&self) -> &UnhandledErrorHandler {
        &self.unhandled
    }
}

impl Default for FinalizeOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for FinalizeOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FinalizeOptions").finish_non_exhaustive()
    }
}

/// A parameter as registered with the host.
#[derive(Debug, Clone)]
pub struct BoundParam {
    pub name: String,
    pub data_type: DataType,
    pub attributes: Attributes,
    /// Receives the host's variadic argument list.
    pub variadic: bool,
}

/// A function ready for registration.
///
/// Calling it never fails: failures and panics come back as host values.
#[derive(Clone)]
pub struct BoundFunction {
    name: String,
    id: TypeHash,
    params: Vec<BoundParam>,
    return_type: DataType,
    return_attributes: Attributes,
    attributes: Attributes,
    convention: CallConvention,
    invoker: NativeFn,
    unhandled: UnhandledErrorHandler,
}

impl BoundFunction {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Identity of the function as declared by its author.
    pub fn id(&self) -> TypeHash {
        self.id
    }

    pub fn params(&self) -> &[BoundParam] {
        &self.params
    }

    pub fn return_type(&self) -> &DataType {
        &self.return_type
    }

    pub fn return_attributes(&self) -> &Attributes {
        &self.return_attributes
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn convention(&self) -> CallConvention {
        self.convention
    }

    /// Check whether the last parameter takes the host's variadic list.
    pub fn is_variadic(&self) -> bool {
        self.params.last().is_some_and(|p| p.variadic)
    }

    /// Call with host arguments, one per parameter.
    pub fn call(&self, args: Vec<Dynamic>) -> Dynamic {
        self.run(CallContext::new(args))
    }

    /// Call a natively asynchronous function. The result is delivered
    /// through `completion`; the returned value is what the host shows
    /// meanwhile (or the failure, if the call could not start).
    pub fn call_with_completion(&self, args: Vec<Dynamic>, completion: Completion) -> Dynamic {
        self.run(CallContext::new(args).with_completion(completion))
    }

    /// Turn an outcome into the value the host shows.
    pub fn outcome_to_value(&self, outcome: CallOutcome) -> Dynamic {
        match outcome {
            Ok(value) => value,
            Err(error) => {
                tracing::warn!(function = %self.name, %error, "unhandled call failure");
                (self.unhandled)(&self.name, &error)
            }
        }
    }

    fn run(&self, mut ctx: CallContext) -> Dynamic {
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            self.invoker.call(&mut ctx).map(|()| ctx.take_return())
        }))
        .unwrap_or_else(|payload| Err(CallError::from_panic(payload.as_ref())));
        self.outcome_to_value(outcome)
    }
}

impl fmt::Debug for BoundFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundFunction")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("return_type", &self.return_type)
            .field("convention", &self.convention)
            .finish_non_exhaustive()
    }
}

/// Check that the host can carry every type of `desc`.
pub(crate) fn validate(desc: &FunctionDescriptor, host: &dyn HostServices) -> Result<(), BindError> {
    for param in desc.params() {
        if param.is_params() && !param.variadic {
            return Err(BindError::MisplacedParams {
                function: desc.name().to_string(),
                param: param.name.clone(),
                index: param.index,
            });
        }
        if !host.is_native_type(&param.data_type) {
            return Err(BindError::NonHostType {
                function: desc.name().to_string(),
                target: ConversionTarget::Parameter {
                    index: param.index,
                    name: param.name.clone(),
                },
                data_type: param.data_type.clone(),
            });
        }
    }

    if !host.is_native_type(desc.return_type()) {
        return Err(BindError::NonHostType {
            function: desc.name().to_string(),
            target: ConversionTarget::Return,
            data_type: desc.return_type().clone(),
        });
    }
    Ok(())
}

/// Build the registrable form of a validated descriptor.
pub(crate) fn bind(desc: FunctionDescriptor, options: &FinalizeOptions) -> BoundFunction {
    let params = desc
        .params()
        .iter()
        .map(|p| BoundParam {
            name: p.name.clone(),
            data_type: p.data_type.clone(),
            attributes: p.attributes.clone(),
            variadic: p.variadic,
        })
        .collect();

    BoundFunction {
        name: desc.name().to_string(),
        id: desc.native_fn().id,
        params,
        return_type: desc.return_type().clone(),
        return_attributes: desc.return_desc().attributes.clone(),
        attributes: desc.attributes().clone(),
        convention: desc.convention(),
        invoker: desc.native_fn().clone(),
        unhandled: Arc::clone(&options.unhandled),
    }
}

#[cfg(test)]
mod tests {
    use hostbind_core::{ParamDescriptor, ParamFlags};

    use super::*;

    struct PlainHost;

    impl HostServices for PlainHost {
        fn pending_value(&self) -> Dynamic {
            Dynamic::Error(HostError::NA)
        }
        fn is_restricted_context(&self) -> bool {
            false
        }
    }

    fn divide() -> FunctionDescriptor {
        FunctionDescriptor::new("divide", |ctx: &mut CallContext| {
            let a: f64 = ctx.arg(0)?;
            let b: f64 = ctx.arg(1)?;
            if b == 0.0 {
                return Err(CallError::failed("division by zero"));
            }
            ctx.set_return(a / b);
            Ok(())
        })
        .param("a", DataType::Float)
        .param("b", DataType::Float)
        .returns(DataType::Float)
    }

    #[test]
    fn host_native_descriptor_is_valid() {
        assert!(validate(&divide(), &PlainHost).is_ok());
    }

    #[test]
    fn author_types_are_rejected_with_position() {
        let desc = FunctionDescriptor::new("f", |_: &mut CallContext| Ok(()))
            .param("x", DataType::Float)
            .param("when", DataType::named("Date"));
        match validate(&desc, &PlainHost) {
            Err(BindError::NonHostType {
                function,
                target: ConversionTarget::Parameter { index, name },
                data_type,
            }) => {
                assert_eq!(function, "f");
                assert_eq!(index, 1);
                assert_eq!(name, "when");
                assert_eq!(data_type, DataType::named("Date"));
            }
            other => panic!("expected NonHostType, got {other:?}"),
        }

        let desc = FunctionDescriptor::new("g", |_: &mut CallContext| Ok(()))
            .returns(DataType::optional(DataType::Float));
        assert!(matches!(
            validate(&desc, &PlainHost),
            Err(BindError::NonHostType {
                target: ConversionTarget::Return,
                ..
            })
        ));
    }

    #[test]
    fn stray_params_marker_is_rejected() {
        let desc = FunctionDescriptor::new("f", |_: &mut CallContext| Ok(()))
            .with_param(
                ParamDescriptor::new("values", DataType::array(DataType::Object))
                    .with_flags(ParamFlags::PARAMS),
            )
            .param("x", DataType::Float);
        assert!(matches!(
            validate(&desc, &PlainHost),
            Err(BindError::MisplacedParams { index: 0, .. })
        ));
    }

    #[test]
    fn bound_functions_never_fail() {
        let bound = bind(divide(), &FinalizeOptions::new());
        assert_eq!(bound.name(), "divide");
        assert_eq!(bound.params().len(), 2);
        assert_eq!(
            bound.call(vec![Dynamic::Float(1.0), Dynamic::Float(4.0)]),
            Dynamic::Float(0.25)
        );
        assert_eq!(
            bound.call(vec![Dynamic::Float(1.0), Dynamic::Float(0.0)]),
            Dynamic::Error(HostError::Value)
        );
        assert_eq!(bound.call(vec![]), Dynamic::Error(HostError::Value));
    }

    #[test]
    fn unhandled_handler_is_configurable() {
        let options = FinalizeOptions::new().with_unhandled_error_handler(|_f, err| {
            Dynamic::String(format!("!!! ERROR: {err}"))
        });
        let panicking =
            FunctionDescriptor::new("boom", |_: &mut CallContext| -> Result<(), CallError> {
                panic!("kaboom")
            });
        let bound = bind(panicking, &options);
        match bound.call(vec![]) {
            Dynamic::String(text) => {
                assert!(text.starts_with("!!! ERROR:"));
                assert!(text.contains("kaboom"));
            }
            other => panic!("expected text, got {other:?}"),
        }
    }
}
