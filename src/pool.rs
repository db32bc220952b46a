//! Worker Pool (C4): runs a function over a list of items in parallel with
//! cancellation propagation.
//!
//! There is no multiprocess page-level isolation here the way the Python
//! original used `multiprocessing.Pool` — each task only ever touches its
//! own disjoint files and an immutable options struct, so plain OS threads
//! (via `rayon`) parallelize the same work safely and far more cheaply.
//!
//! Cancellation is a single process-wide `AtomicBool` flipped by a SIGINT
//! handler installed once per process. Every task checks it at its own task
//! boundary before doing any work; the pool never kills an in-flight task.

use crate::error::{RecbzError, Result};
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

static CANCEL_FLAG: OnceLock<Arc<AtomicBool>> = OnceLock::new();

fn cancel_flag() -> Arc<AtomicBool> {
    CANCEL_FLAG
        .get_or_init(|| {
            let flag = Arc::new(AtomicBool::new(false));
            let handler_flag = flag.clone();
            // best-effort: if a handler is already installed (e.g. in tests
            // that construct multiple pools), ignore the error rather than
            // panicking the whole process.
            let _ = ctrlc::set_handler(move || {
                handler_flag.store(true, Ordering::SeqCst);
            });
            flag
        })
        .clone()
}

/// True once a SIGINT-equivalent has been observed by this process.
pub fn is_cancelled() -> bool {
    cancel_flag().load(Ordering::SeqCst)
}

/// Construct the interrupt a cancelled task (or a pool noticing cancellation
/// after the fact) returns.
pub fn cancelled() -> RecbzError {
    RecbzError::WorkerPoolInterrupt
}

/// Effective worker count for `item_count` items under `configured`
/// parallelism: never more workers than items, never fewer than one.
pub fn worker_count(item_count: usize, configured: usize) -> usize {
    configured.max(1).min(item_count.max(1))
}

/// Run `func` over every item in `items`, preserving input order in the
/// result. `multithread` selects the analyzer's outer fan-out (one OS
/// thread per item, used for the small per-codec job set); otherwise a
/// `rayon` pool sized to `parallelism` is used, degrading to a plain
/// sequential map when `parallelism <= 1`.
///
/// If an interrupt is observed at any point, every in-flight task still
/// drains, but the function as a whole returns `WorkerPoolInterrupt`
/// instead of the (possibly partial) results.
pub fn map_workers<T, R, F>(
    items: &[T],
    parallelism: usize,
    multithread: bool,
    func: F,
) -> Result<Vec<R>>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> Result<R> + Sync,
{
    let flag = cancel_flag();
    let workers = worker_count(items.len(), parallelism);

    let run_one = |item: &T| -> Result<R> {
        if flag.load(Ordering::SeqCst) {
            return Err(cancelled());
        }
        func(item)
    };

    let results: Vec<Result<R>> = if workers <= 1 {
        items.iter().map(run_one).collect()
    } else if multithread {
        std::thread::scope(|scope| {
            let handles: Vec<_> = items.iter().map(|item| scope.spawn(|| run_one(item))).collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap_or_else(|_| Err(cancelled())))
                .collect()
        })
    } else {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()
            .map_err(|e| RecbzError::Other(anyhow::anyhow!(e)))?;
        pool.install(|| items.par_iter().map(run_one).collect())
    };

    if flag.load(Ordering::SeqCst) {
        return Err(cancelled());
    }

    results.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preserves_order_sequential() {
        let items = vec![1, 2, 3, 4, 5];
        let out = map_workers(&items, 1, false, |n| Ok(n * 2)).unwrap();
        assert_eq!(out, vec![2, 4, 6, 8, 10]);
    }

    #[test]
    fn preserves_order_parallel() {
        let items: Vec<i32> = (0..200).collect();
        let out = map_workers(&items, 8, false, |n| Ok(n * 2)).unwrap();
        let expect: Vec<i32> = (0..200).map(|n| n * 2).collect();
        assert_eq!(out, expect);
    }

    #[test]
    fn worker_count_never_exceeds_item_count() {
        assert_eq!(worker_count(3, 16), 3);
        assert_eq!(worker_count(16, 3), 3);
        assert_eq!(worker_count(0, 3), 1);
    }

    #[test]
    fn propagates_a_worker_error_when_not_ignored() {
        let items = vec![1, 2, 3];
        let result: Result<Vec<i32>> = map_workers(&items, 4, false, |n| {
            if *n == 2 {
                Err(RecbzError::PageIOError(std::path::PathBuf::from("x")))
            } else {
                Ok(*n)
            }
        });
        assert!(result.is_err());
    }
}
