//! Self-feeding priority work queue.
//!
//! Workers pull the lowest `(priority, sequence)` item, hand its action to an
//! [`Executor`], and the executor may `add` more work while it runs. A run
//! ends when the queue drains, the deadline passes, an interrupt arrives or
//! [`WorkQueue::cancel`] is called; the configured [`ShutdownPolicy`] decides
//! what happens to work still outstanding at that point.

mod interrupt;
mod item;
mod policy;
mod stats;
mod work_queue;

pub use interrupt::InterruptToken;
pub use item::{Admission, WorkItem};
pub use policy::{ShutdownPolicy, StopTrigger};
pub use stats::{QueueStats, RunReport};
pub use work_queue::WorkQueue;

use async_trait::async_trait;

use crate::error::Result;

/// Runs the action carried by a work item.
///
/// Errors are logged and counted by the worker; they never stop the run.
#[async_trait]
pub trait Executor<A: Send + 'static>: Send + Sync {
    async fn execute(&self, action: A) -> Result<()>;
}
