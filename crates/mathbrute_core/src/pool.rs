//! Fixed-size worker pool running the jobs of one function run.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::error::{BruteError, Result};

pub struct WorkerPool {
    pool: rayon::ThreadPool,
    threads: usize,
}

impl WorkerPool {
    pub fn new(threads: usize) -> Result<Self> {
        let threads = threads.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|idx| format!("brute-worker-{idx}"))
            .build()
            .map_err(|err| BruteError::Config(format!("cannot start worker pool: {err}")))?;
        Ok(Self { pool, threads })
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Runs `job(index, worker)` for every index in `0..job_count`.
    ///
    /// Each worker pulls indices from a shared counter, so `worker` is unique among the
    /// jobs running at one time and below [`WorkerPool::threads`]. The first error stops
    /// the hand-out of further indices and is returned once every worker is idle.
    pub fn parallel_for<F>(&self, job_count: usize, job: F) -> Result<()>
    where
        F: Fn(usize, usize) -> Result<()> + Sync,
    {
        let next = AtomicUsize::new(0);
        let stop = AtomicBool::new(false);
        let first_error: Mutex<Option<BruteError>> = Mutex::new(None);

        self.pool.broadcast(|ctx| {
            let worker = ctx.index();
            while !stop.load(Ordering::Relaxed) {
                let index = next.fetch_add(1, Ordering::Relaxed);
                if index >= job_count {
                    break;
                }
                if let Err(err) = job(index, worker) {
                    stop.store(true, Ordering::Relaxed);
                    let mut slot = first_error.lock().unwrap_or_else(PoisonError::into_inner);
                    if slot.is_none() {
                        *slot = Some(err);
                    }
                    break;
                }
            }
        });

        match first_error
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
        {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Runs `op` inside the pool so nested parallel iterators use its threads.
    pub fn install<R, OP>(&self, op: OP) -> R
    where
        OP: FnOnce() -> R + Send,
        R: Send,
    {
        self.pool.install(op)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn every_job_runs_once_on_a_valid_worker() {
        let pool = WorkerPool::new(4).unwrap();
        let seen = Mutex::new(Vec::new());
        pool.parallel_for(1000, |job, worker| {
            assert!(worker < 4, "worker {worker} out of range");
            seen.lock().unwrap().push(job);
            Ok(())
        })
        .unwrap();
        let seen = seen.into_inner().unwrap();
        assert_eq!(seen.len(), 1000);
        assert_eq!(seen.iter().copied().collect::<HashSet<_>>().len(), 1000);
    }

    #[test]
    fn first_error_is_reported_and_stops_hand_out() {
        let pool = WorkerPool::new(2).unwrap();
        let ran = AtomicUsize::new(0);
        let err = pool
            .parallel_for(10_000, |job, _| {
                ran.fetch_add(1, Ordering::Relaxed);
                if job == 3 {
                    Err(BruteError::device("enqueue_nd_range", "lost"))
                } else {
                    Ok(())
                }
            })
            .unwrap_err();
        assert!(err.to_string().contains("lost"));
        assert!(ran.load(Ordering::Relaxed) < 10_000);
    }

    #[test]
    fn workers_are_exclusive_while_running() {
        let pool = WorkerPool::new(3).unwrap();
        let busy: Vec<AtomicBool> = (0..3).map(|_| AtomicBool::new(false)).collect();
        pool.parallel_for(300, |_, worker| {
            assert!(!busy[worker].swap(true, Ordering::SeqCst), "worker reused");
            std::thread::yield_now();
            busy[worker].store(false, Ordering::SeqCst);
            Ok(())
        })
        .unwrap();
    }
}
