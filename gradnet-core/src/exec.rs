//! Fixed worker pool for the elementwise math inside a single node.

use crate::error::GraphError;
use rayon::prelude::*;
use std::ops::Range;

/// Tuning for the worker pool built at graph finalization.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Workers per available CPU core.
    pub thread_multiplier: usize,
    /// Smallest amount of work worth handing to one worker; ranges at or
    /// below this size run on the calling thread.
    pub ops_per_thread: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        ExecutorConfig {
            thread_multiplier: 1,
            ops_per_thread: 1024,
        }
    }
}

/// Data-parallel loops over buffer indices on a pool of fixed size.
///
/// Parallelism in the engine lives inside a node's math, not across nodes:
/// the passes walk the graph on one thread and fan each per-element loop out
/// through this pool. Work is split into `ops_per_thread` chunks, so small
/// buffers never pay for thread coordination.
#[derive(Debug)]
pub struct ParallelExecutor {
    pool: rayon::ThreadPool,
    workers: usize,
    ops_per_thread: usize,
}

impl ParallelExecutor {
    pub fn new(config: &ExecutorConfig) -> Result<Self, GraphError> {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let workers = (cores * config.thread_multiplier).max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|index| format!("gradnet-worker-{index}"))
            .build()
            .map_err(|e| GraphError::ThreadPool {
                reason: e.to_string(),
            })?;
        Ok(ParallelExecutor {
            pool,
            workers,
            ops_per_thread: config.ops_per_thread.max(1),
        })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Fills `out` by calling `f(index, slot)` for every element.
    ///
    /// Each index is written by exactly one worker, so the result does not
    /// depend on scheduling.
    pub fn map<F>(&self, out: &mut [f32], f: F)
    where
        F: Fn(usize, &mut f32) + Sync,
    {
        if out.len() <= self.ops_per_thread {
            for (index, slot) in out.iter_mut().enumerate() {
                f(index, slot);
            }
            return;
        }
        let chunk = self.ops_per_thread;
        self.pool.install(|| {
            out.par_chunks_mut(chunk)
                .enumerate()
                .for_each(|(chunk_index, slots)| {
                    let base = chunk_index * chunk;
                    for (offset, slot) in slots.iter_mut().enumerate() {
                        f(base + offset, slot);
                    }
                });
        });
    }

    /// Sums `f(index)` over the range.
    ///
    /// Workers accumulate into private partials which are merged once at the
    /// end, so no element is ever added to a shared accumulator under
    /// contention.
    pub fn sum<F>(&self, range: Range<usize>, f: F) -> f32
    where
        F: Fn(usize) -> f32 + Sync,
    {
        if range.len() <= self.ops_per_thread {
            return range.map(f).sum();
        }
        let min_len = self.ops_per_thread;
        self.pool.install(|| {
            range
                .into_par_iter()
                .with_min_len(min_len)
                .fold(|| 0.0f32, |acc, index| acc + f(index))
                .sum()
        })
    }
}
