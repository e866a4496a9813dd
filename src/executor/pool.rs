//! Bounded worker pool for blocking pipeline work.

use crossbeam_channel::bounded;
use tracing::error;

use crate::error::{MapError, Result};

use super::RenderTask;

/// Upper bound on renderer threads.
const MAX_THREADS: usize = 4;

/// Number of renderer threads: the available parallelism, capped at 4.
pub fn default_pool_size() -> usize {
    std::thread::available_parallelism()
        .map_or(1, |n| n.get())
        .min(MAX_THREADS)
}

/// Worker pool running network fetches, image decoding, scaling and file IO.
///
/// A panicking job is logged and dropped; its [`RenderTask`] then resolves to
/// [`MapError::WorkerFailed`].
pub struct RenderPool {
    pool: rayon::ThreadPool,
}

impl RenderPool {
    /// Create a pool sized with [`default_pool_size`].
    pub fn new() -> Result<Self> {
        Self::with_threads(default_pool_size())
    }

    pub fn with_threads(threads: usize) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads.max(1))
            .thread_name(|i| format!("Image Renderer - #{}", i))
            .panic_handler(|panic| {
                let thread = std::thread::current();
                let name = thread.name().unwrap_or("unnamed");
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!(thread = name, "An exception occurred in the thread {}: {}", name, message);
            })
            .build()
            .map_err(|e| {
                error!("Failed to start the image renderer pool: {}", e);
                MapError::WorkerFailed
            })?;

        Ok(Self { pool })
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Run `job` on the pool.
    pub fn submit<T, F>(&self, job: F) -> RenderTask<T>
    where
        F: FnOnce() -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let (sender, receiver) = bounded(1);
        self.pool.spawn(move || {
            let _ = sender.send(job());
        });
        RenderTask::new(receiver)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_size_is_capped() {
        let size = default_pool_size();
        assert!(size >= 1);
        assert!(size <= MAX_THREADS);
    }

    #[test]
    fn test_submit_returns_result() {
        let pool = RenderPool::with_threads(2).unwrap();
        let task = pool.submit(|| Ok(21 * 2));
        assert_eq!(task.wait().unwrap(), 42);
    }

    #[test]
    fn test_submit_propagates_error() {
        let pool = RenderPool::with_threads(1).unwrap();
        let task: RenderTask<()> = pool.submit(|| Err(MapError::NotFound {
            message: "gone".to_string(),
        }));
        assert!(matches!(task.wait(), Err(MapError::NotFound { .. })));
    }

    #[test]
    fn test_panicking_job_fails_task() {
        let pool = RenderPool::with_threads(1).unwrap();
        let task: RenderTask<u32> = pool.submit(|| panic!("boom"));
        assert!(matches!(task.wait(), Err(MapError::WorkerFailed)));

        // The pool keeps working after a panic.
        let task = pool.submit(|| Ok(1));
        assert_eq!(task.wait().unwrap(), 1);
    }

    #[test]
    fn test_threads_are_named() {
        let pool = RenderPool::with_threads(1).unwrap();
        let task = pool.submit(|| Ok(std::thread::current().name().map(str::to_string)));
        let name = task.wait().unwrap().unwrap();
        assert!(name.starts_with("Image Renderer - #"));
    }
}
