//! Execution handlers - interceptors layered around every call.
//!
//! An [`ExecutionConfig`] holds an ordered list of selectors. At bind time
//! each selector looks at a descriptor once and may return a handler; the
//! handlers returned become the function's layers, first-registered
//! outermost. The chain is fixed from then on.
//!
//! At call time `before` runs outer to inner, then the function, then
//! `after` inner to outer. A layer that sets an outcome in `before` skips
//! the function and every layer inside it, while the `after` of every layer
//! already entered still runs.

mod cache;
mod logging;
mod suppress;
mod timing;

use std::any::Any;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use hostbind_core::{
    AdaptedStages, CallContext, CallError, CallOutcome, Dynamic, FunctionDescriptor, NativeFn,
    attr,
};

use crate::host::HostServices;

pub use cache::{CacheHandler, CachePolicy, CacheStats};
pub use logging::{CallRecord, CallRecorder, LoggingHandler, MemoryRecorder, TracingRecorder};
pub use suppress::SuppressInDialogHandler;
pub use timing::{FunctionTiming, TimingHandler, TimingLog, TimingSnapshot};

// ============================================================================
// Call state
// ============================================================================

/// One call as seen by the handlers.
pub struct FunctionCall {
    name: Arc<str>,
    args: Vec<Dynamic>,
    outcome: Option<CallOutcome>,
    tag: Option<Box<dyn Any + Send>>,
}

impl FunctionCall {
    /// Create a call with no outcome yet.
    pub fn new(name: Arc<str>, args: Vec<Dynamic>) -> Self {
        Self {
            name,
            args,
            outcome: None,
            tag: None,
        }
    }

    /// The function's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The arguments the function will receive.
    pub fn args(&self) -> &[Dynamic] {
        &self.args
    }

    /// Replace arguments before the call.
    pub fn args_mut(&mut self) -> &mut Vec<Dynamic> {
        &mut self.args
    }

    /// The outcome, once known.
    pub fn outcome(&self) -> Option<&CallOutcome> {
        self.outcome.as_ref()
    }

    /// Check whether an outcome is set.
    pub fn has_outcome(&self) -> bool {
        self.outcome.is_some()
    }

    /// Set the outcome. From `before`, this skips the call.
    pub fn set_outcome(&mut self, outcome: CallOutcome) {
        self.outcome = Some(outcome);
    }

    /// Set a successful result.
    pub fn set_result(&mut self, value: Dynamic) {
        self.outcome = Some(Ok(value));
    }

    /// Set a failure.
    pub fn set_failure(&mut self, error: CallError) {
        self.outcome = Some(Err(error));
    }

    /// Take the outcome, leaving none.
    pub fn take_outcome(&mut self) -> Option<CallOutcome> {
        self.outcome.take()
    }

    /// Store state for this layer's `after`.
    pub fn set_tag<T: Any + Send>(&mut self, tag: T) {
        self.tag = Some(Box::new(tag));
    }

    /// Borrow this layer's state.
    pub fn tag<T: Any + Send>(&self) -> Option<&T> {
        self.tag.as_ref()?.downcast_ref::<T>()
    }

    /// Take this layer's state.
    pub fn take_tag<T: Any + Send>(&mut self) -> Option<T> {
        let tag = self.tag.take()?;
        match tag.downcast::<T>() {
            Ok(tag) => Some(*tag),
            Err(tag) => {
                self.tag = Some(tag);
                None
            }
        }
    }
}

impl fmt::Debug for FunctionCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionCall")
            .field("name", &self.name)
            .field("args", &self.args)
            .field("outcome", &self.outcome)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Handlers and selectors
// ============================================================================

/// An interceptor around calls to one function.
pub trait ExecutionHandler: Send + Sync {
    /// Runs before the call. Setting an outcome skips the call.
    fn before(&self, _call: &mut FunctionCall) {}

    /// Runs after the call (or after a skip), with the outcome set.
    fn after(&self, _call: &mut FunctionCall) {}
}

/// Picks a handler for a descriptor, once, at bind time.
pub type HandlerSelector =
    Arc<dyn Fn(&FunctionDescriptor) -> Option<Arc<dyn ExecutionHandler>> + Send + Sync>;

/// Ordered handler selectors.
#[derive(Clone, Default)]
pub struct ExecutionConfig {
    selectors: Vec<HandlerSelector>,
}

impl ExecutionConfig {
    /// Create an empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a selector.
    pub fn add_selector<F>(mut self, selector: F) -> Self
    where
        F: Fn(&FunctionDescriptor) -> Option<Arc<dyn ExecutionHandler>> + Send + Sync + 'static,
    {
        self.selectors.push(Arc::new(selector));
        self
    }

    /// Log calls of functions carrying the `logging` attribute.
    pub fn with_logging(self, recorder: Arc<dyn CallRecorder>) -> Self {
        self.add_selector(move |desc: &FunctionDescriptor| {
            desc.attributes().has(attr::LOGGING).then(|| {
                Arc::new(LoggingHandler::new(Arc::clone(&recorder))) as Arc<dyn ExecutionHandler>
            })
        })
    }

    /// Cache results of functions carrying the `cache` attribute.
    pub fn with_caching(self, policy: CachePolicy) -> Self {
        self.add_selector(move |desc: &FunctionDescriptor| {
            CacheHandler::for_descriptor(desc, policy)
                .map(|handler| Arc::new(handler) as Arc<dyn ExecutionHandler>)
        })
    }

    /// Time calls of functions carrying the `timing` attribute.
    pub fn with_timing(self, log: Arc<TimingLog>) -> Self {
        self.add_selector(move |desc: &FunctionDescriptor| {
            desc.attributes().has(attr::TIMING).then(|| {
                Arc::new(TimingHandler::new(log.function(desc.name()))) as Arc<dyn ExecutionHandler>
            })
        })
    }

    /// Hide failures of functions carrying the `suppress_in_dialog`
    /// attribute while the host is in a restricted context.
    pub fn with_suppression(self, handler: SuppressInDialogHandler) -> Self {
        let handler = Arc::new(handler);
        self.add_selector(move |desc: &FunctionDescriptor| {
            desc.attributes()
                .has(attr::SUPPRESS_IN_DIALOG)
                .then(|| Arc::clone(&handler) as Arc<dyn ExecutionHandler>)
        })
    }

    /// The canonical stack: logging, caching, timing, suppression.
    pub fn standard(
        recorder: Arc<dyn CallRecorder>,
        timing: Arc<TimingLog>,
        host: Arc<dyn HostServices>,
    ) -> Self {
        Self::new()
            .with_logging(recorder)
            .with_caching(CachePolicy::default())
            .with_timing(timing)
            .with_suppression(SuppressInDialogHandler::new(host))
    }

    /// Number of selectors.
    pub fn len(&self) -> usize {
        self.selectors.len()
    }

    /// Check if there are no selectors.
    pub fn is_empty(&self) -> bool {
        self.selectors.is_empty()
    }

    fn select(&self, desc: &FunctionDescriptor) -> Vec<Arc<dyn ExecutionHandler>> {
        self.selectors.iter().filter_map(|select| select(desc)).collect()
    }
}

impl fmt::Debug for ExecutionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionConfig")
            .field("selectors", &self.selectors.len())
            .finish()
    }
}

// ============================================================================
// Chain
// ============================================================================

/// The fixed layers of one function.
pub struct HandlerChain {
    name: Arc<str>,
    layers: Vec<Arc<dyn ExecutionHandler>>,
}

impl HandlerChain {
    /// Create a chain, outermost layer first.
    pub fn new(name: impl Into<Arc<str>>, layers: Vec<Arc<dyn ExecutionHandler>>) -> Self {
        Self {
            name: name.into(),
            layers,
        }
    }

    /// Number of layers.
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Check if there are no layers.
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Run one call through the layers and `inner`.
    pub fn invoke(&self, inner: &NativeFn, ctx: &mut CallContext) -> Result<(), CallError> {
        let mut call = FunctionCall::new(Arc::clone(&self.name), ctx.args().to_vec());
        let mut tags = Vec::with_capacity(self.layers.len());

        // A layer that panics counts as entered and ends the call with a
        // failure, so every entered layer still gets its `after`.
        for layer in &self.layers {
            call.tag = None;
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| layer.before(&mut call))) {
                call.set_failure(CallError::from_panic(payload.as_ref()));
            }
            tags.push(call.tag.take());
            if call.has_outcome() {
                break;
            }
        }

        if !call.has_outcome() {
            let mut inner_ctx = CallContext::new(call.args.clone());
            if let Some(completion) = ctx.completion() {
                inner_ctx = inner_ctx.with_completion(completion.clone());
            }
            let outcome = catch_unwind(AssertUnwindSafe(|| {
                inner.call(&mut inner_ctx).map(|()| inner_ctx.take_return())
            }))
            .unwrap_or_else(|payload| Err(CallError::from_panic(payload.as_ref())));
            call.set_outcome(outcome);
        }

        for (layer, tag) in self.layers.iter().zip(tags).rev() {
            call.tag = tag;
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| layer.after(&mut call))) {
                call.set_failure(CallError::from_panic(payload.as_ref()));
            }
        }

        match call.take_outcome() {
            Some(Ok(value)) => {
                ctx.set_return_slot(value);
                Ok(())
            }
            Some(Err(err)) => Err(err),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for HandlerChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerChain")
            .field("name", &self.name)
            .field("layers", &self.layers.len())
            .finish()
    }
}

/// Wrap one descriptor in the handlers its selectors pick.
pub(crate) fn adapt(desc: FunctionDescriptor, config: &ExecutionConfig) -> FunctionDescriptor {
    if desc.adapted().contains(AdaptedStages::HANDLERS) {
        return desc;
    }

    let layers = config.select(&desc);
    if layers.is_empty() {
        return desc.mark_adapted(AdaptedStages::HANDLERS);
    }
    tracing::debug!(function = desc.name(), layers = layers.len(), "attached execution handlers");

    let chain = HandlerChain::new(desc.name(), layers);
    let inner = desc.native_fn().clone();
    let wrapper = NativeFn::new(inner.id, move |ctx: &mut CallContext| chain.invoke(&inner, ctx));
    desc.with_native_fn(wrapper).mark_adapted(AdaptedStages::HANDLERS)
}
