//! Queue counters and the run report.

use serde::{Deserialize, Serialize};

use super::{ShutdownPolicy, StopTrigger};

/// Counters kept by the queue for diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    /// Items accepted by `add`
    pub enqueued: usize,
    /// Items whose action ran to completion (success or failure)
    pub executed: usize,
    /// Items whose action returned an error or panicked
    pub failed: usize,
    /// Items dropped because the bounded queue was full
    pub dropped_full: usize,
    /// Items refused because the queue was stopping or stopped
    pub rejected_stopping: usize,
    /// Exploratory items thrown away when a complete-priority shutdown began
    pub discarded: usize,
    /// Pending items left behind by a cancel
    pub abandoned: usize,
}

/// Returned by `WorkQueue::run`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub trigger: StopTrigger,

    /// Policy that ran after a timeout or interrupt
    pub policy: Option<ShutdownPolicy>,

    /// An interrupt during a graceful shutdown forced a cancel
    pub escalated: bool,

    pub elapsed_secs: f64,

    /// Must-complete items still pending or in flight when `run` returned
    pub unfinished_must_complete: usize,

    pub stats: QueueStats,
}
