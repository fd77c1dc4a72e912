//! Phase-keyed worker pools.
//!
//! Elements are grouped into the standing INIT, STEP and FINAL pools plus one
//! pool per named trigger. A pool run hands its elements to scoped worker
//! threads through a channel and returns once every worker has joined.

use std::collections::BTreeMap;
use std::fmt;
use std::thread;

use crossbeam_channel::unbounded;
use tracing::{debug, warn};

use crate::config::RecordContext;
use crate::element::Element;
use crate::error::{AggregateError, RunFailure, Stage};

/// Acquisition phase an element is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Init,
    Step,
    Final,
}

impl Phase {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "INIT" => Some(Phase::Init),
            "STEP" => Some(Phase::Step),
            "FINAL" => Some(Phase::Final),
            _ => None,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Init => write!(f, "INIT"),
            Phase::Step => write!(f, "STEP"),
            Phase::Final => write!(f, "FINAL"),
        }
    }
}

/// Key of one pool.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PoolKey {
    Init,
    Step,
    Final,
    Trigger(String),
}

impl PoolKey {
    /// Pool an element with `phase` and optional `trigger` belongs to.
    pub fn for_phase(phase: Phase, trigger: Option<&str>) -> Self {
        match (phase, trigger) {
            (Phase::Step, Some(t)) => PoolKey::Trigger(t.to_string()),
            (Phase::Init, _) => PoolKey::Init,
            (Phase::Step, None) => PoolKey::Step,
            (Phase::Final, _) => PoolKey::Final,
        }
    }

    pub fn trigger(name: impl Into<String>) -> Self {
        PoolKey::Trigger(name.into())
    }
}

impl fmt::Display for PoolKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolKey::Init => write!(f, "INIT"),
            PoolKey::Step => write!(f, "STEP"),
            PoolKey::Final => write!(f, "FINAL"),
            PoolKey::Trigger(name) => write!(f, "trigger:{}", name),
        }
    }
}

type Pool = Vec<Box<dyn Element>>;

/// Worker pools of one entry.
pub struct Scheduler {
    workers: usize,
    pools: BTreeMap<PoolKey, Pool>,
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sizes: BTreeMap<String, usize> = self
            .pools
            .iter()
            .map(|(k, p)| (k.to_string(), p.len()))
            .collect();
        f.debug_struct("Scheduler")
            .field("workers", &self.workers)
            .field("pools", &sizes)
            .finish()
    }
}

impl Scheduler {
    /// `workers == 0` runs one thread per element.
    pub fn new(workers: usize) -> Self {
        let mut pools = BTreeMap::new();
        pools.insert(PoolKey::Init, Vec::new());
        pools.insert(PoolKey::Step, Vec::new());
        pools.insert(PoolKey::Final, Vec::new());
        Self { workers, pools }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Add an element to the pool of its phase, or of its trigger during STEP.
    pub fn append(&mut self, element: Box<dyn Element>, phase: Phase, trigger: Option<&str>) {
        let key = PoolKey::for_phase(phase, trigger);
        debug!(element = element.name(), pool = %key, "scheduling element");
        self.pools.entry(key).or_default().push(element);
    }

    pub fn len(&self, key: &PoolKey) -> usize {
        self.pools.get(key).map(Vec::len).unwrap_or(0)
    }

    pub fn has_pool(&self, key: &PoolKey) -> bool {
        self.pools.contains_key(key)
    }

    /// Names of every trigger pool.
    pub fn triggers(&self) -> Vec<&str> {
        self.pools
            .keys()
            .filter_map(|k| match k {
                PoolKey::Trigger(name) => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Element names of one pool, in append order.
    pub fn element_names(&self, key: &PoolKey) -> Vec<&str> {
        self.pools
            .get(key)
            .map(|p| p.iter().map(|e| e.name()).collect())
            .unwrap_or_default()
    }

    /// Run every element of `key` concurrently and wait for all of them.
    pub fn run_and_wait(&mut self, key: &PoolKey, context: &RecordContext) {
        let Some(pool) = self.pools.get_mut(key) else {
            return;
        };
        if pool.is_empty() {
            return;
        }
        let count = pool.len();
        let threads = if self.workers == 0 {
            count
        } else {
            self.workers.min(count)
        };
        debug!(pool = %key, elements = count, threads, "running pool");

        let (work_tx, work_rx) = unbounded::<(usize, Box<dyn Element>)>();
        let (done_tx, done_rx) = unbounded::<(usize, Box<dyn Element>)>();
        for item in std::mem::take(pool).into_iter().enumerate() {
            // The receiver is alive until the scope below ends.
            let _ = work_tx.send(item);
        }
        drop(work_tx);

        thread::scope(|s| {
            for _ in 0..threads {
                let work_rx = work_rx.clone();
                let done_tx = done_tx.clone();
                s.spawn(move || {
                    while let Ok((index, mut element)) = work_rx.try_recv() {
                        element.run(context);
                        let _ = done_tx.send((index, element));
                    }
                });
            }
        });
        drop(done_tx);

        let mut finished: Vec<(usize, Box<dyn Element>)> = done_rx.try_iter().collect();
        finished.sort_by_key(|(index, _)| *index);
        *pool = finished.into_iter().map(|(_, e)| e).collect();
        debug!(pool = %key, "pool finished");
    }

    /// Apply the failure policy to every element of `key`.
    ///
    /// Tolerated failures are filled and flagged; the others are raised
    /// together once the whole pool has been scanned.
    pub fn check_errors(&mut self, key: &PoolKey) -> Result<(), AggregateError> {
        let Some(pool) = self.pools.get_mut(key) else {
            return Ok(());
        };
        let mut fatal = Vec::new();
        for element in pool.iter_mut() {
            let Some(failure) = element.take_error() else {
                continue;
            };
            if !element.can_fail() {
                fatal.push(failure);
                continue;
            }
            warn!(element = element.name(), error = %failure, "tolerated failure, filling sentinel");
            if let Err(e) = element.mark_failed(&failure) {
                fatal.push(RunFailure::new(Stage::Fill, element.name().to_string(), e));
            }
        }
        if fatal.is_empty() {
            Ok(())
        } else {
            Err(AggregateError {
                pool: key.to_string(),
                errors: fatal,
            })
        }
    }

    /// Run a pool and apply the failure policy.
    pub fn run_pool(&mut self, key: &PoolKey, context: &RecordContext) -> Result<(), AggregateError> {
        self.run_and_wait(key, context);
        self.check_errors(key)
    }

    /// Release the handles of every element of `key` and empty the pool.
    pub fn close(&mut self, key: &PoolKey) {
        if let Some(pool) = self.pools.get_mut(key) {
            for element in pool.iter_mut() {
                element.close();
            }
            pool.clear();
        }
    }

    /// Close every pool.
    pub fn close_all(&mut self) {
        let keys: Vec<PoolKey> = self.pools.keys().cloned().collect();
        for key in &keys {
            self.close(key);
        }
    }
}
