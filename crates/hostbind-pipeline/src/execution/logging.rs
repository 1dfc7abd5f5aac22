//! Call logging.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use hostbind_core::{CallOutcome, Dynamic};
use parking_lot::Mutex;

use super::{ExecutionHandler, FunctionCall};

/// One finished call.
#[derive(Debug, Clone, PartialEq)]
pub struct CallRecord {
    pub function: String,
    pub args: Vec<Dynamic>,
    pub outcome: CallOutcome,
    /// Time spent inside the logging layer, including inner layers.
    pub duration: Duration,
}

/// Destination of call records.
pub trait CallRecorder: Send + Sync {
    fn record(&self, record: CallRecord);
}

/// Emits one `tracing` event per call.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingRecorder;

impl CallRecorder for TracingRecorder {
    fn record(&self, record: CallRecord) {
        match &record.outcome {
            Ok(value) => tracing::info!(
                function = %record.function,
                args = ?record.args,
                result = ?value,
                elapsed_us = record.duration.as_micros() as u64,
                "call"
            ),
            Err(err) => tracing::warn!(
                function = %record.function,
                args = ?record.args,
                error = %err,
                elapsed_us = record.duration.as_micros() as u64,
                "call failed"
            ),
        }
    }
}

/// Keeps records in memory.
#[derive(Default)]
pub struct MemoryRecorder {
    records: Mutex<Vec<CallRecord>>,
}

impl MemoryRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything recorded so far.
    pub fn records(&self) -> Vec<CallRecord> {
        self.records.lock().clone()
    }

    /// Remove and return everything recorded so far.
    pub fn drain(&self) -> Vec<CallRecord> {
        std::mem::take(&mut *self.records.lock())
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl CallRecorder for MemoryRecorder {
    fn record(&self, record: CallRecord) {
        self.records.lock().push(record);
    }
}

impl fmt::Debug for MemoryRecorder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryRecorder")
            .field("records", &self.len())
            .finish()
    }
}

/// Records every call and its outcome.
pub struct LoggingHandler {
    recorder: Arc<dyn CallRecorder>,
}

impl LoggingHandler {
    pub fn new(recorder: Arc<dyn CallRecorder>) -> Self {
        Self { recorder }
    }
}

impl ExecutionHandler for LoggingHandler {
    fn before(&self, call: &mut FunctionCall) {
        call.set_tag(Instant::now());
    }

    fn after(&self, call: &mut FunctionCall) {
        let duration = call
            .take_tag::<Instant>()
            .map(|start| start.elapsed())
            .unwrap_or_default();
        let Some(outcome) = call.outcome().cloned() else {
            return;
        };
        self.recorder.record(CallRecord {
            function: call.name().to_string(),
            args: call.args().to_vec(),
            outcome,
            duration,
        });
    }
}
