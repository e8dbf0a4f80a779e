//! Execution backends for the data-parallel phases of relocalization.
//!
//! Every phase (hypothesis generation, per-candidate refinement and scoring)
//! is an independent evaluation over `N` items followed by a barrier. A
//! backend only has to provide that capability; the choice between a
//! sequential loop and a `rayon` pool is made by configuration.
//!
//! Results are always returned in item order, so a phase produces the same
//! output on every backend as long as the per-item work is deterministic.

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::{Deserialize, Serialize};

use crate::relocalization::RelocalizationError;

/// Evaluate independent work items in parallel.
pub trait ParallelBackend: Send + Sync {
    /// Evaluate `f(i)` for every `i in 0..len`, returning results in order.
    fn map<T, F>(&self, len: usize, f: F) -> Vec<T>
    where
        T: Send,
        F: Fn(usize) -> T + Send + Sync;

    /// Apply `f(i, &mut items[i])` to every item.
    fn for_each_mut<T, F>(&self, items: &mut [T], f: F)
    where
        T: Send,
        F: Fn(usize, &mut T) + Send + Sync;

    /// Number of workers the backend schedules onto.
    fn num_workers(&self) -> usize;
}

/// Runs every item on the calling thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct SequentialBackend;

impl ParallelBackend for SequentialBackend {
    fn map<T, F>(&self, len: usize, f: F) -> Vec<T>
    where
        T: Send,
        F: Fn(usize) -> T + Send + Sync,
    {
        (0..len).map(f).collect()
    }

    fn for_each_mut<T, F>(&self, items: &mut [T], f: F)
    where
        T: Send,
        F: Fn(usize, &mut T) + Send + Sync,
    {
        for (i, item) in items.iter_mut().enumerate() {
            f(i, item);
        }
    }

    fn num_workers(&self) -> usize {
        1
    }
}

/// Runs items on a dedicated `rayon` thread pool.
pub struct RayonBackend {
    pool: ThreadPool,
}

impl RayonBackend {
    /// Build a pool with `num_threads` workers (0 lets rayon decide).
    pub fn new(num_threads: usize) -> Result<Self, RelocalizationError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .thread_name(|i| format!("reloc-worker-{}", i))
            .build()?;
        Ok(Self { pool })
    }
}

impl ParallelBackend for RayonBackend {
    fn map<T, F>(&self, len: usize, f: F) -> Vec<T>
    where
        T: Send,
        F: Fn(usize) -> T + Send + Sync,
    {
        self.pool
            .install(|| (0..len).into_par_iter().map(f).collect())
    }

    fn for_each_mut<T, F>(&self, items: &mut [T], f: F)
    where
        T: Send,
        F: Fn(usize, &mut T) + Send + Sync,
    {
        self.pool.install(|| {
            items
                .par_iter_mut()
                .enumerate()
                .for_each(|(i, item)| f(i, item))
        })
    }

    fn num_workers(&self) -> usize {
        self.pool.current_num_threads()
    }
}

impl std::fmt::Debug for RayonBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RayonBackend")
            .field("num_threads", &self.pool.current_num_threads())
            .finish()
    }
}

/// Which backend to run on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackendKind {
    Sequential,
    Rayon,
}

/// Backend selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendConfig {
    pub kind: BackendKind,
    /// Worker count for the rayon pool; 0 uses rayon's default.
    pub num_threads: usize,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::Rayon,
            num_threads: 0,
        }
    }
}

/// Backend chosen at construction time from a [`BackendConfig`].
#[derive(Debug)]
pub enum ExecutionBackend {
    Sequential(SequentialBackend),
    Rayon(RayonBackend),
}

impl ExecutionBackend {
    pub fn from_config(config: &BackendConfig) -> Result<Self, RelocalizationError> {
        match config.kind {
            BackendKind::Sequential => Ok(Self::Sequential(SequentialBackend)),
            BackendKind::Rayon => Ok(Self::Rayon(RayonBackend::new(config.num_threads)?)),
        }
    }
}

impl ParallelBackend for ExecutionBackend {
    fn map<T, F>(&self, len: usize, f: F) -> Vec<T>
    where
        T: Send,
        F: Fn(usize) -> T + Send + Sync,
    {
        match self {
            Self::Sequential(b) => b.map(len, f),
            Self::Rayon(b) => b.map(len, f),
        }
    }

    fn for_each_mut<T, F>(&self, items: &mut [T], f: F)
    where
        T: Send,
        F: Fn(usize, &mut T) + Send + Sync,
    {
        match self {
            Self::Sequential(b) => b.for_each_mut(items, f),
            Self::Rayon(b) => b.for_each_mut(items, f),
        }
    }

    fn num_workers(&self) -> usize {
        match self {
            Self::Sequential(b) => b.num_workers(),
            Self::Rayon(b) => b.num_workers(),
        }
    }
}
