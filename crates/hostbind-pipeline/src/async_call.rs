//! Asynchronous call adaptation.
//!
//! Long-running functions are rewritten so the host never blocks on them.
//! Two strategies exist:
//!
//! - **Emulated** (default): the registered function stays synchronous.
//!   The first call for an argument set starts the work on a
//!   [`TaskSpawner`] and returns the host's pending sentinel. When the work
//!   finishes the host is notified, and the next call with the same
//!   arguments returns the value, exactly once.
//! - **Native**: the host passes a [`Completion`] with every call and the
//!   result is delivered through it.

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use hostbind_core::{
    AdaptedStages, ArgumentKey, CallConvention, CallContext, CallError, CallOutcome, Completion,
    DataType, Dynamic, FunctionDescriptor, NativeFn,
};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::host::HostServices;

/// A unit of background work.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Runs background work for asynchronous functions.
pub trait TaskSpawner: Send + Sync {
    /// Run `job` on some other thread.
    fn spawn(&self, job: Job);
}

/// Spawns onto the rayon global thread pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct RayonSpawner;

impl TaskSpawner for RayonSpawner {
    fn spawn(&self, job: Job) {
        rayon::spawn(job);
    }
}

// ============================================================================
// Invocation tracking
// ============================================================================

/// What an emulated async call should do next.
enum Poll {
    /// No invocation for these arguments; one was just created.
    Start(Completion),
    /// Still running.
    Pending,
    /// Finished; the invocation has been cleared.
    Ready(CallOutcome),
}

/// Running invocations of one emulated async function, keyed by arguments.
#[derive(Default)]
pub struct AsyncInvocations {
    table: Mutex<FxHashMap<ArgumentKey, Completion>>,
}

impl AsyncInvocations {
    fn poll(&self, key: &ArgumentKey) -> Poll {
        let mut table = self.table.lock();
        match table.get(key) {
            None => {
                let completion = Completion::new();
                table.insert(key.clone(), completion.clone());
                Poll::Start(completion)
            }
            Some(completion) => match completion.try_take() {
                Some(outcome) => {
                    table.remove(key);
                    Poll::Ready(outcome)
                }
                None => Poll::Pending,
            },
        }
    }

    /// Drop the invocation for `args`. A result arriving later is ignored.
    pub fn abandon(&self, args: &[Dynamic]) -> bool {
        let Some(key) = ArgumentKey::from_args(args) else {
            return false;
        };
        match self.table.lock().remove(&key) {
            Some(completion) => {
                completion.abandon();
                true
            }
            None => false,
        }
    }

    /// Drop every invocation.
    pub fn abandon_all(&self) {
        for (_, completion) in self.table.lock().drain() {
            completion.abandon();
        }
    }

    /// Number of invocations not yet observed.
    pub fn len(&self) -> usize {
        self.table.lock().len()
    }

    /// Check if nothing is outstanding.
    pub fn is_empty(&self) -> bool {
        self.table.lock().is_empty()
    }
}

impl fmt::Debug for AsyncInvocations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncInvocations")
            .field("outstanding", &self.len())
            .finish()
    }
}

/// Per-function invocation tables for every function the stage adapted.
#[derive(Debug, Clone, Default)]
pub struct AsyncTracker {
    functions: Arc<Mutex<FxHashMap<String, Arc<AsyncInvocations>>>>,
}

impl AsyncTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    fn table_for(&self, function: &str) -> Arc<AsyncInvocations> {
        Arc::clone(
            self.functions
                .lock()
                .entry(function.to_string())
                .or_default(),
        )
    }

    /// The invocation table of one function.
    pub fn invocations(&self, function: &str) -> Option<Arc<AsyncInvocations>> {
        self.functions.lock().get(function).cloned()
    }

    /// Drop the invocation of `function` for `args`.
    pub fn abandon(&self, function: &str, args: &[Dynamic]) -> bool {
        self.invocations(function)
            .is_some_and(|table| table.abandon(args))
    }

    /// Number of outstanding invocations across all functions.
    pub fn outstanding(&self) -> usize {
        self.functions.lock().values().map(|table| table.len()).sum()
    }
}

// ============================================================================
// Options
// ============================================================================

/// Configuration of the async stage.
#[derive(Clone)]
pub struct AsyncOptions {
    /// Use the host's own async convention when it has one.
    pub native_if_available: bool,
    spawner: Arc<dyn TaskSpawner>,
    tracker: AsyncTracker,
}

impl AsyncOptions {
    /// Emulated async on the rayon pool.
    pub fn new() -> Self {
        Self {
            native_if_available: false,
            spawner: Arc::new(RayonSpawner),
            tracker: AsyncTracker::new(),
        }
    }

    /// Prefer the host's native async convention.
    pub fn native_if_available(mut self, native: bool) -> Self {
        self.native_if_available = native;
        self
    }

    /// Run background work somewhere else.
    pub fn with_spawner(mut self, spawner: Arc<dyn TaskSpawner>) -> Self {
        self.spawner = spawner;
        self
    }

    /// The tracker holding emulated invocations.
    pub fn tracker(&self) -> &AsyncTracker {
        &self.tracker
    }
}

impl Default for AsyncOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for AsyncOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncOptions")
            .field("native_if_available", &self.native_if_available)
            .field("tracker", &self.tracker)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Adaptation
// ============================================================================

fn run_to_outcome(inner: &NativeFn, args: Vec<Dynamic>) -> CallOutcome {
    match catch_unwind(AssertUnwindSafe(|| inner.invoke(args))) {
        Ok(outcome) => outcome,
        Err(payload) => Err(CallError::from_panic(payload.as_ref())),
    }
}

/// Rewrite one descriptor. Non-async and already adapted descriptors pass
/// through untouched.
///
/// A descriptor whose produced value is not a host type is left as it is,
/// so the finalizer rejects it instead of the wrapper hiding it behind
/// `Object` or `Void`.
pub(crate) fn adapt(
    desc: FunctionDescriptor,
    options: &AsyncOptions,
    host: &Arc<dyn HostServices>,
) -> FunctionDescriptor {
    if desc.adapted().contains(AdaptedStages::ASYNC) || !desc.is_async() {
        return desc;
    }

    let produced = desc.return_type().task_output().unwrap_or(desc.return_type());
    if !host.is_native_type(produced) {
        tracing::warn!(
            function = desc.name(),
            data_type = %produced,
            "async result is not a host type, leaving it for validation"
        );
        return desc;
    }

    if options.native_if_available && host.supports_native_async() {
        tracing::debug!(function = desc.name(), "using native async");
        adapt_native(desc, Arc::clone(&options.spawner))
    } else {
        tracing::debug!(function = desc.name(), "using emulated async");
        let table = options.tracker.table_for(desc.name());
        adapt_emulated(desc, Arc::clone(&options.spawner), table, Arc::clone(host))
    }
}

fn adapt_native(desc: FunctionDescriptor, spawner: Arc<dyn TaskSpawner>) -> FunctionDescriptor {
    let inner = desc.native_fn().clone();
    let wrapper = NativeFn::new(inner.id, move |ctx: &mut CallContext| {
        let completion = ctx
            .take_completion()
            .ok_or_else(|| CallError::failed("native async call without a completion handle"))?;
        let inner = inner.clone();
        let args = ctx.args().to_vec();
        spawner.spawn(Box::new(move || {
            completion.complete(run_to_outcome(&inner, args));
        }));
        ctx.set_return_slot(Dynamic::Void);
        Ok(())
    });

    let mut desc = desc
        .with_native_fn(wrapper)
        .with_convention(CallConvention::NativeAsync)
        .mark_adapted(AdaptedStages::ASYNC);
    desc.return_mut().data_type = DataType::Void;
    desc
}

fn adapt_emulated(
    desc: FunctionDescriptor,
    spawner: Arc<dyn TaskSpawner>,
    table: Arc<AsyncInvocations>,
    host: Arc<dyn HostServices>,
) -> FunctionDescriptor {
    let inner = desc.native_fn().clone();
    let name: Arc<str> = Arc::from(desc.name());
    let wrapper = NativeFn::new(inner.id, move |ctx: &mut CallContext| {
        // Author values cannot be matched across calls; run in place.
        let Some(key) = ArgumentKey::from_args(ctx.args()) else {
            return inner.call(ctx);
        };

        match table.poll(&key) {
            Poll::Start(completion) => {
                let inner = inner.clone();
                let args = ctx.args().to_vec();
                let notify = Arc::clone(&host);
                let name = Arc::clone(&name);
                spawner.spawn(Box::new(move || {
                    if completion.complete(run_to_outcome(&inner, args)) {
                        notify.async_ready(&name);
                    }
                }));
                ctx.set_return_slot(host.pending_value());
                Ok(())
            }
            Poll::Pending => {
                ctx.set_return_slot(host.pending_value());
                Ok(())
            }
            Poll::Ready(outcome) => {
                ctx.set_return_slot(outcome?);
                Ok(())
            }
        }
    });

    let mut desc = desc
        .with_native_fn(wrapper)
        .with_convention(CallConvention::EmulatedAsync)
        .mark_adapted(AdaptedStages::ASYNC);
    desc.return_mut().data_type = DataType::Object;
    desc
}
