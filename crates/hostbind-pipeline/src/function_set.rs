//! The descriptor collection and the fixed stage order.
//!
//! ```text
//! conversions -> async -> post-async conversions -> variadic -> handlers -> register
//! ```
//!
//! Every stage consumes the collection and hands back a rebuilt one. A
//! descriptor that fails a stage leaves the collection and is reported at
//! the end; the others carry on.

use std::sync::Arc;

use hostbind_core::{
    BindError, CallContext, ConversionTarget, DataType, Dynamic, FunctionDescriptor, NativeFn,
};
use rustc_hash::FxHashSet;

use crate::async_call::{self, AsyncOptions};
use crate::conversion::{ConversionConfig, RuleContext, ValueMap, resolve_chain};
use crate::execution::{self, ExecutionConfig};
use crate::finalize::{self, FinalizeOptions};
use crate::host::{HostRegistrar, HostServices};
use crate::params;

/// Outcome of a binding run.
#[derive(Debug, Default)]
pub struct RegistrationReport {
    /// Names the host accepted, in order.
    pub registered: Vec<String>,
    /// Every failure from every stage.
    pub failures: Vec<BindError>,
}

impl RegistrationReport {
    /// Check that nothing failed.
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// The failure of one function, if it failed.
    pub fn failure(&self, function: &str) -> Option<&BindError> {
        self.failures.iter().find(|err| err.function() == function)
    }
}

/// Descriptors in flight plus the failures collected so far.
#[derive(Debug, Default)]
pub struct FunctionSet {
    functions: Vec<FunctionDescriptor>,
    failures: Vec<BindError>,
}

impl FunctionSet {
    /// Create a set from author descriptors.
    pub fn new(functions: impl IntoIterator<Item = FunctionDescriptor>) -> Self {
        Self {
            functions: functions.into_iter().collect(),
            failures: Vec::new(),
        }
    }

    /// Add one descriptor.
    pub fn push(&mut self, desc: FunctionDescriptor) {
        self.functions.push(desc);
    }

    /// Descriptors still live.
    pub fn functions(&self) -> &[FunctionDescriptor] {
        &self.functions
    }

    /// Look up a live descriptor.
    pub fn get(&self, name: &str) -> Option<&FunctionDescriptor> {
        self.functions.iter().find(|desc| desc.name() == name)
    }

    /// Failures collected so far.
    pub fn failures(&self) -> &[BindError] {
        &self.failures
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Resolve conversion chains and wrap each function in its mappings.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn process_conversions(self, config: &ConversionConfig) -> Self {
        if config.is_empty() {
            return self;
        }
        self.try_each(|desc| convert(desc, config))
    }

    /// Adapt long-running functions.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn process_async(self, options: &AsyncOptions, host: &Arc<dyn HostServices>) -> Self {
        self.map_each(|desc| async_call::adapt(desc, options, host))
    }

    /// Expose trailing `PARAMS` arrays as variadic lists.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn process_params(self, host: &Arc<dyn HostServices>) -> Self {
        self.map_each(|desc| params::adapt(desc, host))
    }

    /// Wrap each function in the handlers its selectors pick.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn process_execution_handlers(self, config: &ExecutionConfig) -> Self {
        self.map_each(|desc| execution::adapt(desc, config))
    }

    /// Validate, bind and hand the batch to the host in one call.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn register(
        self,
        registrar: &dyn HostRegistrar,
        host: &dyn HostServices,
        options: &FinalizeOptions,
    ) -> RegistrationReport {
        let mut failures = self.failures;
        let mut seen = FxHashSet::default();
        let mut batch = Vec::with_capacity(self.functions.len());

        for desc in self.functions {
            if !seen.insert(desc.name().to_string()) {
                failures.push(BindError::DuplicateFunction {
                    function: desc.name().to_string(),
                });
                continue;
            }
            match finalize::validate(&desc, host) {
                Ok(()) => batch.push(finalize::bind(desc, options)),
                Err(err) => failures.push(err),
            }
        }

        let names: Vec<String> = batch.iter().map(|f| f.name().to_string()).collect();
        let mut results = registrar.register(batch).into_iter();
        let mut registered = Vec::with_capacity(names.len());
        for name in names {
            match results.next() {
                Some(Ok(())) => registered.push(name),
                Some(Err(failure)) => failures.push(BindError::Registration {
                    function: name,
                    message: failure.message,
                }),
                None => failures.push(BindError::Registration {
                    function: name,
                    message: "host returned no result".to_string(),
                }),
            }
        }

        for failure in &failures {
            tracing::error!(function = failure.function(), error = %failure, "binding failed");
        }
        tracing::info!(
            registered = registered.len(),
            failed = failures.len(),
            "registration finished"
        );

        RegistrationReport {
            registered,
            failures,
        }
    }

    fn map_each(mut self, mut stage: impl FnMut(FunctionDescriptor) -> FunctionDescriptor) -> Self {
        self.functions = self.functions.into_iter().map(&mut stage).collect();
        self
    }

    fn try_each(
        mut self,
        mut stage: impl FnMut(FunctionDescriptor) -> Result<FunctionDescriptor, BindError>,
    ) -> Self {
        let mut kept = Vec::with_capacity(self.functions.len());
        for desc in self.functions {
            match stage(desc) {
                Ok(desc) => kept.push(desc),
                Err(err) => {
                    tracing::debug!(function = err.function(), error = %err, "dropped from binding");
                    self.failures.push(err);
                }
            }
        }
        self.functions = kept;
        self
    }
}

/// Resolve every parameter and the return value of one descriptor.
fn convert(desc: FunctionDescriptor, config: &ConversionConfig) -> Result<FunctionDescriptor, BindError> {
    let limit = config.max_chain_length();
    let mut param_types = Vec::with_capacity(desc.params().len());
    let mut param_maps: Vec<(usize, Vec<ValueMap>)> = Vec::new();

    for param in desc.params() {
        let ctx = RuleContext {
            function: desc.attributes(),
            target: &param.attributes,
            default: param.default.as_ref(),
        };
        let target = ConversionTarget::Parameter {
            index: param.index,
            name: param.name.clone(),
        };
        let chain = resolve_chain(
            desc.name(),
            target,
            &param.data_type,
            config.param_rules(),
            &ctx,
            limit,
        )?;
        if !chain.maps.is_empty() {
            param_maps.push((param.index, chain.maps));
        }
        param_types.push(chain.data_type);
    }

    let ret = desc.return_desc();
    let ctx = RuleContext {
        function: desc.attributes(),
        target: &ret.attributes,
        default: None,
    };
    // Task(T): the callable produces a T; keep the wrapper around the result.
    let (start, is_task) = match ret.data_type.task_output() {
        Some(output) => (output, true),
        None => (&ret.data_type, false),
    };
    let chain = resolve_chain(
        desc.name(),
        ConversionTarget::Return,
        start,
        config.return_rules(),
        &ctx,
        limit,
    )?;
    let return_type = if is_task {
        DataType::task(chain.data_type)
    } else {
        chain.data_type
    };
    let return_maps = chain.maps;

    let mut desc = desc;
    for (param, data_type) in desc.params_mut().iter_mut().zip(param_types) {
        param.data_type = data_type;
    }
    desc.return_mut().data_type = return_type;

    if param_maps.is_empty() && return_maps.is_empty() {
        return Ok(desc);
    }

    let inner = desc.native_fn().clone();
    let wrapper = NativeFn::new(inner.id, move |ctx: &mut CallContext| {
        for (index, maps) in &param_maps {
            let Ok(slot) = ctx.arg_slot_mut(*index) else {
                continue;
            };
            // Host value first meets the last rule applied.
            let mut value = std::mem::replace(slot, Dynamic::Void);
            for map in maps.iter().rev() {
                value = map(value)?;
            }
            *slot = value;
        }

        inner.call(ctx)?;

        if !return_maps.is_empty() {
            let mut value = ctx.take_return();
            for map in &return_maps {
                value = map(value)?;
            }
            ctx.set_return_slot(value);
        }
        Ok(())
    });
    Ok(desc.with_native_fn(wrapper))
}

// ============================================================================
// Pipeline
// ============================================================================

/// Every stage's configuration, run in the fixed order.
#[derive(Clone)]
pub struct Pipeline {
    host: Arc<dyn HostServices>,
    conversions: ConversionConfig,
    async_options: AsyncOptions,
    post_async_conversions: ConversionConfig,
    execution: ExecutionConfig,
    finalize: FinalizeOptions,
}

impl Pipeline {
    /// Create a pipeline with no rules and no handlers.
    pub fn new(host: Arc<dyn HostServices>) -> Self {
        Self {
            host,
            conversions: ConversionConfig::new(),
            async_options: AsyncOptions::new(),
            post_async_conversions: ConversionConfig::new(),
            execution: ExecutionConfig::new(),
            finalize: FinalizeOptions::new(),
        }
    }

    pub fn with_conversions(mut self, config: ConversionConfig) -> Self {
        self.conversions = config;
        self
    }

    pub fn with_async(mut self, options: AsyncOptions) -> Self {
        self.async_options = options;
        self
    }

    /// Conversions run after the async stage, e.g. on pending sentinels.
    pub fn with_post_async_conversions(mut self, config: ConversionConfig) -> Self {
        self.post_async_conversions = config;
        self
    }

    pub fn with_execution(mut self, config: ExecutionConfig) -> Self {
        self.execution = config;
        self
    }

    pub fn with_finalize(mut self, options: FinalizeOptions) -> Self {
        self.finalize = options;
        self
    }

    pub fn host(&self) -> &Arc<dyn HostServices> {
        &self.host
    }

    pub fn async_options(&self) -> &AsyncOptions {
        &self.async_options
    }

    /// Run every stage before registration.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn process(&self, set: FunctionSet) -> FunctionSet {
        set.process_conversions(&self.conversions)
            .process_async(&self.async_options, &self.host)
            .process_conversions(&self.post_async_conversions)
            .process_params(&self.host)
            .process_execution_handlers(&self.execution)
    }

    /// Run every stage and register the result.
    pub fn run(
        &self,
        functions: impl IntoIterator<Item = FunctionDescriptor>,
        registrar: &dyn HostRegistrar,
    ) -> RegistrationReport {
        let set = self.process(FunctionSet::new(functions));
        tracing::debug!(functions = set.len(), failures = set.failures().len(), "stages finished");
        set.register(registrar, self.host.as_ref(), &self.finalize)
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("conversions", &self.conversions)
            .field("async_options", &self.async_options)
            .field("post_async_conversions", &self.post_async_conversions)
            .field("execution", &self.execution)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use hostbind_core::{Attributes, CallError, HostError, Native, ParamDescriptor, attr};
    use parking_lot::Mutex;

    use super::*;
    use crate::conversion::standard;
    use crate::finalize::BoundFunction;
    use crate::host::RegistrationFailure;

    struct TestHost;

    impl HostServices for TestHost {
        fn pending_value(&self) -> Dynamic {
            Dynamic::Error(HostError::NA)
        }
        fn is_restricted_context(&self) -> bool {
            false
        }
    }

    /// Accepts everything except names in `reject`.
    #[derive(Default)]
    struct Collector {
        reject: Vec<&'static str>,
        bound: Mutex<Vec<BoundFunction>>,
        calls: Mutex<usize>,
    }

    impl HostRegistrar for Collector {
        fn register(&self, functions: Vec<BoundFunction>) -> Vec<Result<(), RegistrationFailure>> {
            *self.calls.lock() += 1;
            let results = functions
                .iter()
                .map(|f| {
                    if self.reject.iter().any(|name| *name == f.name()) {
                        Err(RegistrationFailure::new("name reserved"))
                    } else {
                        Ok(())
                    }
                })
                .collect();
            self.bound.lock().extend(functions);
            results
        }
    }

    #[derive(Debug, PartialEq)]
    struct Meters {
        value: f64,
    }

    fn meters_config() -> ConversionConfig {
        ConversionConfig::new()
            .add_param_conversion(DataType::Float, DataType::native::<Meters>(), |value: f64| {
                Native::new(Meters { value })
            })
            .add_return_conversion(DataType::native::<Meters>(), DataType::Float, |m: Native<Meters>| {
                m.value
            })
    }

    fn double() -> FunctionDescriptor {
        FunctionDescriptor::new("double", |ctx: &mut CallContext| {
            let m: Native<Meters> = ctx.arg(0)?;
            ctx.set_return(Native::new(Meters { value: m.value * 2.0 }));
            Ok(())
        })
        .param("length", DataType::native::<Meters>())
        .returns(DataType::native::<Meters>())
    }

    #[test]
    fn conversions_rewrite_types_and_values() {
        let set = FunctionSet::new([double()]).process_conversions(&meters_config());
        let desc = set.get("double").unwrap();
        assert_eq!(desc.params()[0].data_type, DataType::Float);
        assert_eq!(desc.return_type(), &DataType::Float);
        assert_eq!(
            desc.native_fn().invoke(vec![Dynamic::Float(1.5)]),
            Ok(Dynamic::Float(3.0))
        );
        assert!(matches!(
            desc.native_fn().invoke(vec![Dynamic::String("far".into())]),
            Err(CallError::Conversion(_))
        ));
    }

    #[test]
    fn conversion_failures_leave_the_set() {
        let a = DataType::named("A");
        let b = DataType::named("B");
        let config = ConversionConfig::new()
            .add_param_conversion(b.clone(), a.clone(), |v: Dynamic| v)
            .add_param_conversion(a.clone(), b.clone(), |v: Dynamic| v);
        let looping = FunctionDescriptor::new("looping", |_: &mut CallContext| Ok(())).param("x", a);
        let plain = FunctionDescriptor::new("plain", |_: &mut CallContext| Ok(()))
            .param("x", DataType::Float);

        let set = FunctionSet::new([looping, plain]).process_conversions(&config);
        assert_eq!(set.len(), 1);
        assert!(matches!(
            set.failures(),
            [BindError::ConversionCycle { function, .. }] if function == "looping"
        ));
    }

    #[test]
    fn task_returns_keep_their_wrapper() {
        let desc = FunctionDescriptor::new("later", |ctx: &mut CallContext| {
            ctx.set_return(Native::new(Meters { value: 5.0 }));
            Ok(())
        })
        .returns(DataType::task(DataType::native::<Meters>()));
        let set = FunctionSet::new([desc]).process_conversions(&meters_config());
        let desc = set.get("later").unwrap();
        assert_eq!(desc.return_type(), &DataType::task(DataType::Float));
        assert_eq!(desc.native_fn().invoke(vec![]), Ok(Dynamic::Float(5.0)));
    }

    #[test]
    fn defaults_flow_through_standard_rules() {
        let desc = FunctionDescriptor::new("scale", |ctx: &mut CallContext| {
            let x: f64 = ctx.arg(0)?;
            let factor: f64 = ctx.arg(1)?;
            ctx.set_return(x * factor);
            Ok(())
        })
        .param("x", DataType::Float)
        .with_param(ParamDescriptor::new("factor", DataType::Float).with_default(Dynamic::Float(10.0)))
        .returns(DataType::Float);
        let config = ConversionConfig::new().with_param_rule(standard::optional(false));

        let set = FunctionSet::new([desc]).process_conversions(&config);
        let desc = set.get("scale").unwrap();
        assert_eq!(desc.params()[0].data_type, DataType::Float);
        assert_eq!(desc.params()[1].data_type, DataType::Object);
        assert_eq!(
            desc.native_fn().invoke(vec![Dynamic::Float(2.0), Dynamic::Missing]),
            Ok(Dynamic::Float(20.0))
        );
    }

    #[test]
    fn register_reports_every_failure_and_calls_host_once() {
        let host: Arc<dyn HostServices> = Arc::new(TestHost);
        let registrar = Collector {
            reject: vec!["reserved"],
            ..Collector::default()
        };
        let ok = |name: &'static str| {
            FunctionDescriptor::new(name, |_: &mut CallContext| Ok(())).returns(DataType::Float)
        };
        let unconverted = FunctionDescriptor::new("raw", |_: &mut CallContext| Ok(()))
            .param("m", DataType::native::<Meters>());

        let set = FunctionSet::new([ok("a"), ok("a"), ok("reserved"), unconverted, ok("b")]);
        let report = set.register(&registrar, host.as_ref(), &FinalizeOptions::new());

        assert_eq!(report.registered, vec!["a", "b"]);
        assert_eq!(report.failures.len(), 3);
        assert!(matches!(report.failure("raw"), Some(BindError::NonHostType { .. })));
        assert!(matches!(
            report.failure("reserved"),
            Some(BindError::Registration { message, .. }) if message == "name reserved"
        ));
        assert!(report.failures.iter().any(
            |e| matches!(e, BindError::DuplicateFunction { function } if function == "a")
        ));
        assert_eq!(*registrar.calls.lock(), 1);
        assert!(!report.is_success());
    }

    #[test]
    fn pipeline_runs_all_stages() {
        let host: Arc<dyn HostServices> = Arc::new(TestHost);
        let recorder = Arc::new(crate::execution::MemoryRecorder::new());
        let pipeline = Pipeline::new(Arc::clone(&host))
            .with_conversions(meters_config())
            .with_execution(
                ExecutionConfig::new()
                    .with_logging(Arc::clone(&recorder) as Arc<dyn crate::execution::CallRecorder>),
            );
        let desc = double().with_attributes(Attributes::new().with_flag(attr::LOGGING));
        let registrar = Collector::default();

        let report = pipeline.run([desc], &registrar);
        assert!(report.is_success());

        let bound = registrar.bound.lock();
        assert_eq!(bound[0].call(vec![Dynamic::Float(2.0)]), Dynamic::Float(4.0));
        assert_eq!(recorder.len(), 1);
    }

    #[test]
    fn second_run_changes_no_types() {
        let host: Arc<dyn HostServices> = Arc::new(TestHost);
        let pipeline = Pipeline::new(host)
            .with_conversions(meters_config().with_param_rule(standard::nullable(false)))
            .with_post_async_conversions(
                ConversionConfig::new().with_return_rule(standard::not_available_as_getting_data()),
            );
        let slow = double().with_attributes(Attributes::new().with_flag(attr::ASYNC));

        let once = pipeline.process(FunctionSet::new([slow]));
        let types = |set: &FunctionSet| {
            let desc = &set.functions()[0];
            let params: Vec<DataType> = desc.params().iter().map(|p| p.data_type.clone()).collect();
            (params, desc.return_type().clone(), desc.convention())
        };
        let first = types(&once);
        let twice = pipeline.process(once);
        assert_eq!(types(&twice), first);
        assert_eq!(first.1, DataType::Object);
    }
}
