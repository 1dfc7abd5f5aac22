//! Result caching keyed by argument values.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use hostbind_core::{ArgumentKey, Dynamic, FunctionDescriptor, attr};
use parking_lot::{Condvar, Mutex};
use rustc_hash::{FxHashMap, FxHashSet};

use super::{ExecutionHandler, FunctionCall};

/// How concurrent misses on the same arguments are handled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CachePolicy {
    /// Every miss runs the function; the last result stored wins.
    #[default]
    BestEffort,
    /// One caller runs the function while same-key callers wait for its
    /// result. If it fails, one waiter runs the function instead.
    SingleFlight,
}

/// Counters of one cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

struct Entry {
    value: Dynamic,
    expires: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires.is_none_or(|expires| now < expires)
    }
}

#[derive(Default)]
struct State {
    entries: FxHashMap<ArgumentKey, Entry>,
    in_flight: FxHashSet<ArgumentKey>,
    last_sweep: Option<Instant>,
}

impl State {
    /// Drop expired entries, at most once per `ttl`.
    fn sweep(&mut self, ttl: Duration, now: Instant) {
        if self.last_sweep.is_some_and(|at| now.duration_since(at) < ttl) {
            return;
        }
        self.entries.retain(|_, entry| entry.is_live(now));
        self.last_sweep = Some(now);
    }
}

/// Per-call state carried from `before` to `after`.
struct Pending {
    key: ArgumentKey,
    leader: bool,
}

/// Returns stored results for repeated argument sets.
///
/// Only successful, non-error values are stored. Calls whose arguments
/// hold author values are never cached.
pub struct CacheHandler {
    ttl: Option<Duration>,
    policy: CachePolicy,
    state: Mutex<State>,
    settled: Condvar,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CacheHandler {
    /// Create a cache whose entries live for `ttl`, or forever with `None`.
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            ttl,
            policy: CachePolicy::default(),
            state: Mutex::new(State::default()),
            settled: Condvar::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Set the concurrency policy.
    pub fn with_policy(mut self, policy: CachePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Build a cache for a descriptor carrying the `cache` attribute.
    ///
    /// A positive integer value is the lifetime in seconds; a bare flag or
    /// a non-positive value keeps entries forever.
    pub fn for_descriptor(desc: &FunctionDescriptor, policy: CachePolicy) -> Option<Self> {
        if !desc.attributes().has(attr::CACHE) {
            return None;
        }
        let ttl = desc
            .attributes()
            .int(attr::CACHE)
            .filter(|secs| *secs > 0)
            .map(|secs| Duration::from_secs(secs.unsigned_abs()));
        Some(Self::new(ttl).with_policy(policy))
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    pub fn policy(&self) -> CachePolicy {
        self.policy
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.state.lock().entries.len(),
        }
    }

    /// Drop every stored result.
    pub fn clear(&self) {
        self.state.lock().entries.clear();
    }
}

impl ExecutionHandler for CacheHandler {
    fn before(&self, call: &mut FunctionCall) {
        let Some(key) = ArgumentKey::from_args(call.args()) else {
            return;
        };

        let mut state = self.state.lock();
        loop {
            let now = Instant::now();
            let stored = state
                .entries
                .get(&key)
                .map(|entry| entry.is_live(now).then(|| entry.value.clone()));
            match stored {
                Some(Some(value)) => {
                    drop(state);
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    tracing::trace!(function = call.name(), "cache hit");
                    call.set_result(value);
                    return;
                }
                Some(None) => {
                    state.entries.remove(&key);
                }
                None => {}
            }

            if self.policy == CachePolicy::SingleFlight && state.in_flight.contains(&key) {
                self.settled.wait(&mut state);
                continue;
            }

            let leader = self.policy == CachePolicy::SingleFlight;
            if leader {
                state.in_flight.insert(key.clone());
            }
            self.misses.fetch_add(1, Ordering::Relaxed);
            call.set_tag(Pending { key, leader });
            return;
        }
    }

    fn after(&self, call: &mut FunctionCall) {
        let Some(pending) = call.take_tag::<Pending>() else {
            return;
        };

        let mut state = self.state.lock();
        let fresh = match call.outcome() {
            Some(Ok(Dynamic::Error(_))) | Some(Err(_)) | None => None,
            Some(Ok(value)) => Some(value.clone()),
        };
        if let Some(value) = fresh {
            let now = Instant::now();
            if let Some(ttl) = self.ttl {
                state.sweep(ttl, now);
            }
            let expires = self.ttl.and_then(|ttl| now.checked_add(ttl));
            state.entries.insert(pending.key.clone(), Entry { value, expires });
        }
        if pending.leader {
            state.in_flight.remove(&pending.key);
            drop(state);
            self.settled.notify_all();
        }
    }
}

impl fmt::Debug for CacheHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheHandler")
            .field("ttl", &self.ttl)
            .field("policy", &self.policy)
            .field("stats", &self.stats())
            .finish()
    }
}
