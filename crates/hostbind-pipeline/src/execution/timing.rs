//! Wall-time measurement of calls.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use super::{ExecutionHandler, FunctionCall};

/// Accumulated timings of one function.
#[derive(Debug, Default)]
pub struct FunctionTiming {
    calls: AtomicU64,
    total_nanos: AtomicU64,
    max_nanos: AtomicU64,
}

impl FunctionTiming {
    pub fn record(&self, elapsed: Duration) {
        let nanos = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.total_nanos.fetch_add(nanos, Ordering::Relaxed);
        self.max_nanos.fetch_max(nanos, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> TimingSnapshot {
        TimingSnapshot {
            calls: self.calls.load(Ordering::Relaxed),
            total: Duration::from_nanos(self.total_nanos.load(Ordering::Relaxed)),
            max: Duration::from_nanos(self.max_nanos.load(Ordering::Relaxed)),
        }
    }
}

/// Point-in-time copy of a [`FunctionTiming`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimingSnapshot {
    pub calls: u64,
    pub total: Duration,
    pub max: Duration,
}

impl TimingSnapshot {
    pub fn mean(&self) -> Duration {
        match u32::try_from(self.calls) {
            Ok(0) => Duration::ZERO,
            Ok(calls) => self.total / calls,
            Err(_) => Duration::from_nanos(
                u64::try_from(self.total.as_nanos() / u128::from(self.calls)).unwrap_or(u64::MAX),
            ),
        }
    }
}

/// Timings of every timed function, shared by their handlers.
#[derive(Debug, Default)]
pub struct TimingLog {
    functions: RwLock<FxHashMap<String, Arc<FunctionTiming>>>,
}

impl TimingLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// The counters for `name`, created on first use.
    pub fn function(&self, name: &str) -> Arc<FunctionTiming> {
        if let Some(timing) = self.functions.read().get(name) {
            return Arc::clone(timing);
        }
        Arc::clone(
            self.functions
                .write()
                .entry(name.to_string())
                .or_default(),
        )
    }

    pub fn snapshot(&self, name: &str) -> Option<TimingSnapshot> {
        self.functions.read().get(name).map(|timing| timing.snapshot())
    }

    /// Every function's timings, sorted by name.
    pub fn snapshots(&self) -> Vec<(String, TimingSnapshot)> {
        let mut all: Vec<_> = self
            .functions
            .read()
            .iter()
            .map(|(name, timing)| (name.clone(), timing.snapshot()))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }
}

/// Measures the time spent in the layers inside it and the function.
pub struct TimingHandler {
    timing: Arc<FunctionTiming>,
}

impl TimingHandler {
    pub fn new(timing: Arc<FunctionTiming>) -> Self {
        Self { timing }
    }
}

impl ExecutionHandler for TimingHandler {
    fn before(&self, call: &mut FunctionCall) {
        call.set_tag(Instant::now());
    }

    fn after(&self, call: &mut FunctionCall) {
        let Some(start) = call.take_tag::<Instant>() else {
            return;
        };
        let elapsed = start.elapsed();
        self.timing.record(elapsed);
        tracing::debug!(
            function = call.name(),
            elapsed_us = elapsed.as_micros() as u64,
            "timed call"
        );
    }
}
