//! Thread affinity for the render pipeline.
//!
//! Two kinds of stages exist:
//!
//! - worker stages (network fetch, decoding, scaling, file IO) run on the
//!   bounded [`RenderPool`];
//! - main-thread stages (registry mutation, ID allocation, host calls) are
//!   queued on the [`MainThread`] and run when the host drains it from its
//!   tick loop.
//!
//! Worker stages hop to the main thread through a [`MainThreadHandle`].

mod main_thread;
mod pool;
mod task;

pub use main_thread::{MainThread, MainThreadHandle};
pub use pool::{default_pool_size, RenderPool};
pub use task::RenderTask;
