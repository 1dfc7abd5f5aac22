//! Failure suppression while the host shows a dialog.

use std::sync::Arc;

use hostbind_core::Dynamic;

use super::{ExecutionHandler, FunctionCall};
use crate::host::HostServices;

/// Replaces failures with a placeholder in the host's restricted context.
///
/// Outside that context calls and failures pass through unchanged.
pub struct SuppressInDialogHandler {
    host: Arc<dyn HostServices>,
    placeholder: Dynamic,
    skip_call: bool,
}

impl SuppressInDialogHandler {
    pub fn new(host: Arc<dyn HostServices>) -> Self {
        Self {
            host,
            placeholder: Dynamic::Empty,
            skip_call: false,
        }
    }

    /// Value shown instead of a failure. Defaults to `Empty`.
    pub fn with_placeholder(mut self, placeholder: Dynamic) -> Self {
        self.placeholder = placeholder;
        self
    }

    /// Do not run the function at all in the restricted context.
    pub fn skip_call(mut self, skip: bool) -> Self {
        self.skip_call = skip;
        self
    }
}

impl ExecutionHandler for SuppressInDialogHandler {
    fn before(&self, call: &mut FunctionCall) {
        if self.skip_call && self.host.is_restricted_context() {
            call.set_result(self.placeholder.clone());
        }
    }

    fn after(&self, call: &mut FunctionCall) {
        if matches!(call.outcome(), Some(Err(_))) && self.host.is_restricted_context() {
            tracing::debug!(function = call.name(), "suppressed failure in restricted context");
            call.set_result(self.placeholder.clone());
        }
    }
}
