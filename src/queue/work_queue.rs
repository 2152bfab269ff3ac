//! In-memory work queue and its worker pool.

use std::collections::{BinaryHeap, HashSet};
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use futures::FutureExt;
use futures::future::join_all;
use tokio::sync::{Notify, watch};

use super::item::Queued;
use super::{
    Admission, Executor, InterruptToken, QueueStats, RunReport, ShutdownPolicy, StopTrigger,
    WorkItem,
};
use crate::error::{AppError, Result};

/// Lifecycle of a queue.
///
/// Idle -> Running -> Draining(policy) -> Stopped. Draining is skipped when
/// the queue drains on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Running,
    Draining(ShutdownPolicy),
    Stopped,
}

struct QueueState<A> {
    pending: BinaryHeap<Queued<A>>,

    /// Sequence numbers of must-complete items pending or in flight.
    must_complete: HashSet<u64>,

    in_flight: usize,
    phase: Phase,
    next_seq: u64,
    ran: bool,
    stats: QueueStats,

    /// First invariant violation seen; fatal to the run.
    fault: Option<String>,
}

impl<A> QueueState<A> {
    fn new() -> Self {
        Self {
            pending: BinaryHeap::new(),
            must_complete: HashSet::new(),
            in_flight: 0,
            phase: Phase::Idle,
            next_seq: 0,
            ran: false,
            stats: QueueStats::default(),
            fault: None,
        }
    }

    /// Exploratory work is refused while a complete-priority shutdown runs.
    fn stopping(&self) -> bool {
        self.phase == Phase::Draining(ShutdownPolicy::CompletePriority)
    }

    /// Nothing pending, nothing executing: stop for good.
    fn settle(&mut self) {
        if !self.must_complete.is_empty() && self.fault.is_none() {
            self.fault = Some(format!(
                "{} must-complete item(s) unaccounted for after the queue drained",
                self.must_complete.len()
            ));
        }
        self.phase = Phase::Stopped;
    }

    /// Drop everything pending; in-flight items keep their accounting.
    fn abandon_pending(&mut self) -> usize {
        let abandoned = self.pending.len();
        for queued in self.pending.drain() {
            if queued.item.must_complete {
                self.must_complete.remove(&queued.seq);
            }
        }
        self.stats.abandoned += abandoned;
        abandoned
    }

    fn fail(&mut self, message: String) {
        self.fault.get_or_insert(message);
        self.phase = Phase::Stopped;
    }
}

/// Priority-ordered, optionally bounded queue drained by a pool of workers.
///
/// One queue serves one run. Share it as `Arc<WorkQueue<A>>` so executors
/// can `add` follow-up work while their action runs.
pub struct WorkQueue<A> {
    state: Mutex<QueueState<A>>,
    notify: Notify,
    halt: watch::Sender<bool>,
    capacity: usize,
    policy: ShutdownPolicy,
}

impl<A> WorkQueue<A>
where
    A: fmt::Display + Send + 'static,
{
    /// Create a queue. `capacity` 0 means unbounded.
    pub fn new(capacity: usize, policy: ShutdownPolicy) -> Self {
        let (halt, _) = watch::channel(false);
        Self {
            state: Mutex::new(QueueState::new()),
            notify: Notify::new(),
            halt,
            capacity,
            policy,
        }
    }

    pub fn policy(&self) -> ShutdownPolicy {
        self.policy
    }

    fn lock(&self) -> MutexGuard<'_, QueueState<A>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Offer an item at `priority` (lower runs first). Never blocks.
    ///
    /// A full bounded queue drops the item; a stopping queue refuses
    /// exploratory items; a stopped queue refuses everything.
    pub fn add(&self, item: WorkItem<A>, priority: u8) -> Admission {
        let mut state = self.lock();

        let refused = match state.phase {
            Phase::Stopped => true,
            _ => state.stopping() && !item.must_complete,
        };
        if refused {
            state.stats.rejected_stopping += 1;
            if item.must_complete {
                log::warn!("Queue stopped; must-complete {} refused", item.action);
            } else {
                log::debug!("Queue stopping; {} refused", item.action);
            }
            return Admission::Rejected;
        }

        if self.capacity > 0 && state.pending.len() >= self.capacity {
            state.stats.dropped_full += 1;
            if item.must_complete {
                log::error!(
                    "Queue full ({}); must-complete {} dropped",
                    self.capacity,
                    item.action
                );
            } else {
                log::debug!("Queue full ({}); {} dropped", self.capacity, item.action);
            }
            return Admission::DroppedFull;
        }

        let seq = state.next_seq;
        state.next_seq += 1;
        if item.must_complete {
            state.must_complete.insert(seq);
        }
        state.pending.push(Queued {
            item,
            priority,
            seq,
        });
        state.stats.enqueued += 1;
        drop(state);

        self.notify.notify_one();
        Admission::Queued
    }

    /// Items waiting to run.
    pub fn pending_len(&self) -> usize {
        self.lock().pending.len()
    }

    /// Must-complete items pending or in flight.
    pub fn must_complete_len(&self) -> usize {
        self.lock().must_complete.len()
    }

    /// Whether exploratory work is currently being refused.
    pub fn is_stopping(&self) -> bool {
        let state = self.lock();
        state.stopping() || state.phase == Phase::Stopped
    }

    pub fn stats(&self) -> QueueStats {
        self.lock().stats.clone()
    }

    /// Stop all workers: no further dequeues, pending work abandoned.
    ///
    /// In-flight actions are not interrupted. Idempotent, and safe to call
    /// before, during or after `run`.
    pub fn cancel(&self) {
        let mut state = self.lock();
        if state.phase != Phase::Stopped {
            let abandoned = state.abandon_pending();
            state.phase = Phase::Stopped;
            if abandoned > 0 {
                log::warn!("Queue cancelled; {} pending item(s) abandoned", abandoned);
            }
        }
        drop(state);

        self.halt.send_replace(true);
        self.notify.notify_waiters();
    }

    /// Run `workers` workers until the queue drains, `timeout` elapses, an
    /// interrupt arrives on `interrupt`, or `cancel` is called.
    ///
    /// On timeout or a first interrupt the queue's shutdown policy runs. Any
    /// further interrupt during that shutdown forces a cancel.
    pub async fn run(
        self: &Arc<Self>,
        executor: Arc<dyn Executor<A>>,
        workers: usize,
        timeout: Option<Duration>,
        interrupt: &InterruptToken,
    ) -> Result<RunReport> {
        let started = Instant::now();

        let cancelled_early = {
            let mut state = self.lock();
            if state.ran {
                return Err(AppError::queue("work queue has already been run"));
            }
            state.ran = true;
            if state.phase == Phase::Idle {
                state.phase = Phase::Running;
            }
            state.phase == Phase::Stopped
        };
        if cancelled_early {
            return self.report(StopTrigger::Cancelled, None, false, started);
        }

        let workers = workers.max(1);
        let interrupts_at_start = interrupt.count();
        log::info!(
            "Queue running: {} worker(s), {} pending, timeout {:?}, policy {}",
            workers,
            self.pending_len(),
            timeout,
            self.policy
        );

        let handles: Vec<_> = (0..workers)
            .map(|worker_id| {
                let queue = Arc::clone(self);
                let executor = Arc::clone(&executor);
                tokio::spawn(queue.worker_loop(worker_id, executor))
            })
            .collect();

        let workers_done = join_all(handles);
        tokio::pin!(workers_done);

        let deadline = async {
            match timeout {
                Some(t) => tokio::time::sleep(t).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(deadline);

        let mut halt_rx = self.halt.subscribe();

        let trigger = tokio::select! {
            _ = &mut workers_done => StopTrigger::Drained,
            _ = &mut deadline => StopTrigger::Timeout,
            _ = interrupt.reached(interrupts_at_start + 1) => StopTrigger::Interrupt,
            _ = halt_rx.wait_for(|halted| *halted) => StopTrigger::Cancelled,
        };

        let mut applied = None;
        let mut escalated = false;

        if matches!(trigger, StopTrigger::Timeout | StopTrigger::Interrupt) {
            let policy = self.policy;
            if trigger == StopTrigger::Timeout {
                log::warn!("Run deadline {:?} reached; applying {} shutdown", timeout, policy);
            } else {
                log::warn!(
                    "Interrupt received; applying {} shutdown (interrupt again to force cancel)",
                    policy
                );
            }
            applied = Some(policy);
            self.begin_shutdown(policy);

            // The interrupt that started the drain does not count twice
            let escalate_at = match trigger {
                StopTrigger::Interrupt => interrupts_at_start + 2,
                _ => interrupts_at_start + 1,
            };

            if policy != ShutdownPolicy::Cancel {
                tokio::select! {
                    _ = &mut workers_done => {}
                    _ = interrupt.reached(escalate_at) => {
                        log::warn!("Interrupt during shutdown; forcing cancel");
                        escalated = true;
                        self.cancel();
                    }
                    _ = halt_rx.wait_for(|halted| *halted) => {}
                }
            }
        }

        self.report(trigger, applied, escalated, started)
    }

    fn begin_shutdown(&self, policy: ShutdownPolicy) {
        match policy {
            ShutdownPolicy::Cancel => self.cancel(),
            ShutdownPolicy::Finish => {
                let mut state = self.lock();
                if state.phase == Phase::Running {
                    state.phase = Phase::Draining(ShutdownPolicy::Finish);
                }
            }
            ShutdownPolicy::CompletePriority => {
                let mut state = self.lock();
                if state.phase != Phase::Running {
                    return;
                }
                state.phase = Phase::Draining(ShutdownPolicy::CompletePriority);

                let before = state.pending.len();
                state.pending.retain(|queued| queued.item.must_complete);
                let discarded = before - state.pending.len();
                state.stats.discarded += discarded;

                log::info!(
                    "Stopping: {} exploratory item(s) discarded, {} must-complete item(s) outstanding",
                    discarded,
                    state.must_complete.len()
                );
                drop(state);

                // Idle workers re-check whether anything is left to do
                self.notify.notify_waiters();
            }
        }
    }

    async fn next_job(&self) -> Option<Queued<A>> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.lock();
                if state.phase == Phase::Stopped {
                    return None;
                }
                if let Some(job) = state.pending.pop() {
                    state.in_flight += 1;
                    return Some(job);
                }
                if state.in_flight == 0 {
                    state.settle();
                    drop(state);
                    self.notify.notify_waiters();
                    return None;
                }
            }

            notified.await;
        }
    }

    fn finish(&self, seq: u64, must_complete: bool, ok: bool) {
        let mut state = self.lock();
        state.stats.executed += 1;
        if !ok {
            state.stats.failed += 1;
        }

        match state.in_flight.checked_sub(1) {
            Some(n) => state.in_flight = n,
            None => state.fail("in-flight counter underflow".to_string()),
        }
        if must_complete && !state.must_complete.remove(&seq) {
            state.fail(format!(
                "must-complete item #{} completed but was not registered",
                seq
            ));
        }

        let faulted = state.fault.is_some();
        let idle = state.pending.is_empty() && state.in_flight == 0;
        drop(state);

        if faulted {
            self.halt.send_replace(true);
        }
        if faulted || idle {
            self.notify.notify_waiters();
        }
    }

    async fn worker_loop(self: Arc<Self>, worker_id: usize, executor: Arc<dyn Executor<A>>) {
        while let Some(job) = self.next_job().await {
            let Queued {
                item,
                priority,
                seq,
            } = job;
            let WorkItem {
                action,
                must_complete,
            } = item;
            let label = action.to_string();
            log::debug!("[worker-{}] {} (priority {})", worker_id, label, priority);

            let outcome = AssertUnwindSafe(executor.execute(action))
                .catch_unwind()
                .await;

            let ok = match outcome {
                Ok(Ok(())) => true,
                Ok(Err(e)) if must_complete => {
                    log::error!("[worker-{}] {} failed: {}", worker_id, label, e);
                    false
                }
                Ok(Err(e)) => {
                    log::warn!("[worker-{}] {} failed: {}", worker_id, label, e);
                    false
                }
                Err(_) => {
                    log::error!("[worker-{}] {} panicked", worker_id, label);
                    false
                }
            };

            self.finish(seq, must_complete, ok);
        }

        log::debug!("[worker-{}] exiting", worker_id);
    }

    fn report(
        &self,
        trigger: StopTrigger,
        policy: Option<ShutdownPolicy>,
        escalated: bool,
        started: Instant,
    ) -> Result<RunReport> {
        let state = self.lock();
        if let Some(fault) = &state.fault {
            return Err(AppError::invariant(fault.clone()));
        }

        let report = RunReport {
            trigger,
            policy,
            escalated,
            elapsed_secs: started.elapsed().as_secs_f64(),
            unfinished_must_complete: state.must_complete.len(),
            stats: state.stats.clone(),
        };

        log::info!(
            "Queue stopped ({:?}): {} executed, {} failed, {} dropped, {} discarded, {} abandoned",
            report.trigger,
            report.stats.executed,
            report.stats.failed,
            report.stats.dropped_full,
            report.stats.discarded,
            report.stats.abandoned
        );
        Ok(report)
    }
}
