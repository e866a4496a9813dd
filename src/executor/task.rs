//! Asynchronous results of pipeline requests.

use crossbeam_channel::{Receiver, TryRecvError};

use crate::error::{MapError, Result};

/// Pending result of a request submitted to the render pool.
///
/// If the worker running the request panics, the result is reported as
/// [`MapError::WorkerFailed`].
#[derive(Debug)]
pub struct RenderTask<T> {
    receiver: Receiver<Result<T>>,
}

impl<T> RenderTask<T> {
    pub(crate) fn new(receiver: Receiver<Result<T>>) -> Self {
        Self { receiver }
    }

    /// Block until the request completes.
    ///
    /// Must not be called from the main thread while the request still needs
    /// main-thread stages; use [`crate::executor::MainThread::run_until`]
    /// there instead.
    pub fn wait(self) -> Result<T> {
        self.receiver.recv().unwrap_or(Err(MapError::WorkerFailed))
    }

    /// Return the result if the request has completed.
    pub fn try_result(&self) -> Option<Result<T>> {
        match self.receiver.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(MapError::WorkerFailed)),
        }
    }

    pub(crate) fn receiver(&self) -> &Receiver<Result<T>> {
        &self.receiver
    }
}
