//! Single-threaded cooperative event loop.
//!
//! Owns the microtask [`JobQueue`] and an optional macrotask round:
//! scheduled callbacks run one at a time, each followed by a full microtask
//! drain, matching the task/microtask split of a JS host. There is no
//! wall-clock timer here; "later" means a later turn of this loop.

use crate::error::JSError;
use crate::task::{Job, JobQueue};
use std::cell::RefCell;
use std::collections::VecDeque;

const DEFAULT_JOB_LIMIT: usize = 1_000_000;

pub struct EventLoop {
    queue: JobQueue,
    macrotasks: RefCell<VecDeque<Job>>,
    job_limit: usize,
}

impl EventLoop {
    pub fn new() -> Self {
        Self::with_job_limit(DEFAULT_JOB_LIMIT)
    }

    /// `job_limit` bounds the total number of jobs one `run_until_idle` call
    /// may execute before bailing out with `InfiniteLoopError`, catching
    /// chains that reschedule themselves forever.
    pub fn with_job_limit(job_limit: usize) -> Self {
        Self {
            queue: JobQueue::new(),
            macrotasks: RefCell::new(VecDeque::new()),
            job_limit,
        }
    }

    /// Handle to the microtask queue; promises constructed with it deliver
    /// their callbacks through this loop.
    pub fn queue(&self) -> JobQueue {
        self.queue.clone()
    }

    /// Enqueues a macrotask: it runs only after the microtask queue has
    /// drained, in FIFO order with other macrotasks.
    pub fn schedule<F>(&self, task: F)
    where
        F: FnOnce() + 'static,
    {
        self.macrotasks.borrow_mut().push_back(Box::new(task));
    }

    /// Drains microtasks FIFO, interleaving one macrotask per round, until
    /// both queues are empty. Returns the number of jobs executed.
    ///
    /// Rejections that still have no subscriber once the loop goes idle are
    /// reported at warn level; this is diagnostics only and alters no
    /// settlement.
    pub fn run_until_idle(&self) -> Result<usize, JSError> {
        let mut executed = 0usize;
        loop {
            while let Some(job) = self.queue.dequeue() {
                executed += 1;
                if executed > self.job_limit {
                    log::warn!("event loop: job limit {} exceeded, bailing out", self.job_limit);
                    return Err(JSError::InfiniteLoopError { iterations: executed });
                }
                log::trace!("event loop: running microtask ({} remain)", self.queue.len());
                job();
            }
            let task = self.macrotasks.borrow_mut().pop_front();
            match task {
                Some(task) => {
                    executed += 1;
                    if executed > self.job_limit {
                        log::warn!("event loop: job limit {} exceeded, bailing out", self.job_limit);
                        return Err(JSError::InfiniteLoopError { iterations: executed });
                    }
                    log::trace!("event loop: running macrotask");
                    task();
                }
                None => break,
            }
        }
        log::debug!("event loop: idle after {executed} jobs");
        self.report_unhandled_rejections();
        Ok(executed)
    }

    fn report_unhandled_rejections(&self) {
        for (cell, reason) in self.queue.take_unhandled() {
            // A dropped cell can no longer tell us whether a handler was
            // attached before it went away; skip rather than misreport.
            let Some(cell) = cell.upgrade() else { continue };
            if !cell.borrow().is_handled() {
                log::warn!("unhandled promise rejection: {reason:?}");
            }
        }
    }
}

impl Default for EventLoop {
    fn default() -> Self {
        Self::new()
    }
}
