//! The host's single logical thread.
//!
//! Registry state and host APIs are confined to the thread that owns the
//! [`MapRegistry`] and the [`MapHost`]. Other threads never touch them
//! directly: they queue closures on the [`MainThread`], which the owner runs
//! from its tick loop.

use crossbeam_channel::{bounded, select, unbounded, Receiver, Sender};

use crate::error::{MapError, Result};
use crate::host::MapHost;
use crate::registry::MapRegistry;

use super::RenderTask;

type Job = Box<dyn FnOnce(&mut MapRegistry, &mut dyn MapHost) + Send>;

/// Queue of work that must run on the main thread.
pub struct MainThread {
    sender: Sender<Job>,
    receiver: Receiver<Job>,
}

impl MainThread {
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self { sender, receiver }
    }

    /// A handle worker threads use to schedule main-thread work.
    pub fn handle(&self) -> MainThreadHandle {
        MainThreadHandle {
            sender: self.sender.clone(),
        }
    }

    /// Run every job queued so far. Returns the number of jobs run.
    ///
    /// Call once per host tick.
    pub fn pump(&self, registry: &mut MapRegistry, host: &mut dyn MapHost) -> usize {
        let mut ran = 0;
        while let Ok(job) = self.receiver.try_recv() {
            job(registry, host);
            ran += 1;
        }
        ran
    }

    /// Keep running main-thread jobs until `task` completes.
    ///
    /// For callers without a tick loop, such as the command line tool and
    /// tests.
    pub fn run_until<T>(
        &self,
        registry: &mut MapRegistry,
        host: &mut dyn MapHost,
        task: RenderTask<T>,
    ) -> Result<T> {
        let result = loop {
            select! {
                recv(self.receiver) -> job => {
                    if let Ok(job) = job {
                        job(registry, host);
                    }
                }
                recv(task.receiver()) -> result => {
                    break result.unwrap_or(Err(MapError::WorkerFailed));
                }
            }
        };
        self.pump(registry, host);
        result
    }
}

impl Default for MainThread {
    fn default() -> Self {
        Self::new()
    }
}

/// Cloneable sender side of the [`MainThread`] queue.
#[derive(Clone)]
pub struct MainThreadHandle {
    sender: Sender<Job>,
}

impl MainThreadHandle {
    /// Schedule `job` without waiting for it.
    pub fn execute<F>(&self, job: F) -> Result<()>
    where
        F: FnOnce(&mut MapRegistry, &mut dyn MapHost) + Send + 'static,
    {
        self.sender
            .send(Box::new(job))
            .map_err(|_| MapError::MainThreadGone)
    }

    /// Schedule `job` and block until the main thread has run it.
    ///
    /// Only worker threads may call this; calling it on the main thread
    /// deadlocks.
    pub fn call<T, F>(&self, job: F) -> Result<T>
    where
        F: FnOnce(&mut MapRegistry, &mut dyn MapHost) -> T + Send + 'static,
        T: Send + 'static,
    {
        let (sender, receiver) = bounded(1);
        self.execute(move |registry, host| {
            let _ = sender.send(job(registry, host));
        })?;
        receiver.recv().map_err(|_| MapError::MainThreadGone)
    }
}
