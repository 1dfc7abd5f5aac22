//! An in-process host.
//!
//! [`LocalHost`] implements both host interfaces over a plain registry, so
//! bound functions can be driven without an external host: tests, tools
//! and benchmarks call them by name the way a spreadsheet would.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use hostbind_core::{CallConvention, Completion, Dynamic, HostError};
use hostbind_pipeline::{BoundFunction, HostRegistrar, HostServices, RegistrationFailure};
use parking_lot::{Condvar, Mutex, RwLock};
use rustc_hash::FxHashMap;

/// How long [`LocalHost::call`] waits on a natively asynchronous result.
pub const DEFAULT_ASYNC_TIMEOUT: Duration = Duration::from_secs(30);

/// Registry of bound functions plus the host state they can observe.
pub struct LocalHost {
    functions: RwLock<FxHashMap<String, Arc<BoundFunction>>>,
    restricted: AtomicBool,
    native_async: bool,
    pending: Dynamic,
    async_timeout: Duration,
    ready: Mutex<Vec<String>>,
    ready_signal: Condvar,
}

impl LocalHost {
    /// A host without native async whose pending value is `#N/A`.
    pub fn new() -> Self {
        Self {
            functions: RwLock::new(FxHashMap::default()),
            restricted: AtomicBool::new(false),
            native_async: false,
            pending: Dynamic::Error(HostError::NA),
            async_timeout: DEFAULT_ASYNC_TIMEOUT,
            ready: Mutex::new(Vec::new()),
            ready_signal: Condvar::new(),
        }
    }

    /// Offer completion handles to natively asynchronous functions.
    pub fn with_native_async(mut self, native: bool) -> Self {
        self.native_async = native;
        self
    }

    /// Value shown while an emulated async result is not ready.
    pub fn with_pending_value(mut self, pending: Dynamic) -> Self {
        self.pending = pending;
        self
    }

    /// How long a natively asynchronous call may block.
    pub fn with_async_timeout(mut self, timeout: Duration) -> Self {
        self.async_timeout = timeout;
        self
    }

    /// Enter or leave the restricted context (an open argument dialog).
    pub fn set_restricted(&self, restricted: bool) {
        self.restricted.store(restricted, Ordering::SeqCst);
    }

    pub fn function(&self, name: &str) -> Option<Arc<BoundFunction>> {
        self.functions.read().get(name).cloned()
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.functions.read().contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.functions.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Call a function the way the host would.
    ///
    /// Left-out arguments arrive as `Missing`. For a variadic function, the
    /// arguments past the fixed ones are packed into one list. Unknown
    /// names give `#NAME?`. A natively asynchronous call blocks until its
    /// completion arrives or the timeout elapses (then the pending value
    /// is returned).
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn call(&self, name: &str, args: Vec<Dynamic>) -> Dynamic {
        let Some(function) = self.function(name) else {
            tracing::warn!(function = name, "call to unknown function");
            return Dynamic::Error(HostError::Name);
        };
        let args = arrange_args(&function, args);

        if function.convention() != CallConvention::NativeAsync {
            return function.call(args);
        }

        let completion = Completion::new();
        let started = function.call_with_completion(args, completion.clone());
        if !started.is_void() {
            completion.abandon();
            return started;
        }
        match completion.wait_timeout(self.async_timeout) {
            Some(outcome) => function.outcome_to_value(outcome),
            None => {
                completion.abandon();
                tracing::warn!(function = name, "async call timed out");
                self.pending.clone()
            }
        }
    }

    /// Block until `name` reports a finished emulated async invocation,
    /// consuming the notification. Returns `false` on timeout.
    pub fn wait_ready(&self, name: &str, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut ready = self.ready.lock();
        loop {
            if let Some(pos) = ready.iter().position(|n| n == name) {
                ready.remove(pos);
                return true;
            }
            if self.ready_signal.wait_until(&mut ready, deadline).timed_out() {
                return false;
            }
        }
    }

    /// Take every pending ready notification.
    pub fn take_ready(&self) -> Vec<String> {
        std::mem::take(&mut *self.ready.lock())
    }
}

/// Pad to the declared parameter count and pack variadic tails.
fn arrange_args(function: &BoundFunction, mut args: Vec<Dynamic>) -> Vec<Dynamic> {
    let declared = function.params().len();
    if !function.is_variadic() {
        if args.len() < declared {
            args.resize(declared, Dynamic::Missing);
        }
        return args;
    }

    let fixed = declared.saturating_sub(1);
    if args.len() <= fixed {
        args.resize(fixed, Dynamic::Missing);
        args.push(Dynamic::Missing);
        return args;
    }
    let tail = args.split_off(fixed);
    let packed = match <[Dynamic; 1]>::try_from(tail) {
        Ok([single @ Dynamic::Array(_)]) => single,
        Ok([single]) => Dynamic::Array(vec![single]),
        Err(tail) => Dynamic::Array(tail),
    };
    args.push(packed);
    args
}

impl Default for LocalHost {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for LocalHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalHost")
            .field("functions", &self.names())
            .field("restricted", &self.restricted.load(Ordering::SeqCst))
            .field("native_async", &self.native_async)
            .finish_non_exhaustive()
    }
}

impl HostServices for LocalHost {
    fn pending_value(&self) -> Dynamic {
        self.pending.clone()
    }

    fn is_restricted_context(&self) -> bool {
        self.restricted.load(Ordering::SeqCst)
    }

    fn supports_native_async(&self) -> bool {
        self.native_async
    }

    fn async_ready(&self, function: &str) {
        self.ready.lock().push(function.to_string());
        self.ready_signal.notify_all();
    }
}

impl HostRegistrar for LocalHost {
    fn register(&self, functions: Vec<BoundFunction>) -> Vec<Result<(), RegistrationFailure>> {
        let mut registry = self.functions.write();
        functions
            .into_iter()
            .map(|function| {
                if registry.contains_key(function.name()) {
                    return Err(RegistrationFailure::new(format!(
                        "'{}' is already registered",
                        function.name()
                    )));
                }
                tracing::debug!(
                    function = function.name(),
                    params = function.params().len(),
                    return_type = %function.return_type(),
                    "registered"
                );
                registry.insert(function.name().to_string(), Arc::new(function));
                Ok(())
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use hostbind_core::{CallContext, DataType, FunctionDescriptor, ParamDescriptor, ParamFlags};
    use hostbind_pipeline::Pipeline;

    use super::*;

    fn bind(host: &Arc<LocalHost>, functions: Vec<FunctionDescriptor>) {
        let report = Pipeline::new(Arc::clone(host) as Arc<dyn HostServices>)
            .run(functions, host.as_ref());
        assert!(report.is_success(), "{:?}", report.failures);
    }

    fn count() -> FunctionDescriptor {
        FunctionDescriptor::new("count", |ctx: &mut CallContext| {
            let label: Option<String> = ctx.arg(0)?;
            let items: Vec<Dynamic> = ctx.arg(1)?;
            ctx.set_return(format!("{}:{}", label.unwrap_or_default(), items.len()));
            Ok(())
        })
        .param("label", DataType::Object)
        .with_param(
            ParamDescriptor::new("items", DataType::array(DataType::Object))
                .with_flags(ParamFlags::PARAMS),
        )
        .returns(DataType::String)
    }

    #[test]
    fn unknown_names_are_name_errors() {
        let host = LocalHost::new();
        assert_eq!(host.call("nope", vec![]), Dynamic::Error(HostError::Name));
    }

    #[test]
    fn variadic_tails_are_packed() {
        let host = Arc::new(LocalHost::new());
        bind(&host, vec![count()]);

        let text = |v: &str| Dynamic::String(v.into());
        assert_eq!(host.call("count", vec![]), text(":0"));
        assert_eq!(host.call("count", vec![text("a"), Dynamic::Int(1)]), text("a:1"));
        assert_eq!(
            host.call("count", vec![text("a"), Dynamic::Int(1), Dynamic::Int(2)]),
            text("a:2")
        );
        assert_eq!(
            host.call(
                "count",
                vec![text("a"), Dynamic::Array(vec![Dynamic::Int(1), Dynamic::Int(2)])]
            ),
            text("a:2")
        );
    }

    #[test]
    fn duplicates_are_refused() {
        let host = Arc::new(LocalHost::new());
        bind(&host, vec![count()]);

        let report = Pipeline::new(Arc::clone(&host) as Arc<dyn HostServices>)
            .run(vec![count()], host.as_ref());
        assert_eq!(report.failures.len(), 1);
        assert_eq!(host.names(), vec!["count"]);
    }

    #[test]
    fn ready_notifications_are_consumed() {
        let host = LocalHost::new();
        host.async_ready("a");
        host.async_ready("b");
        assert!(host.wait_ready("b", Duration::from_millis(10)));
        assert!(!host.wait_ready("b", Duration::from_millis(10)));
        assert_eq!(host.take_ready(), vec!["a"]);
    }

    #[test]
    fn restricted_flag_is_visible_to_services() {
        let host = LocalHost::new();
        assert!(!host.is_restricted_context());
        host.set_restricted(true);
        assert!(host.is_restricted_context());
    }
}
