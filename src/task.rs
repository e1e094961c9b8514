//! The deferred-task scheduler.
//!
//! `JobQueue` is the microtask-equivalent queue every promise schedules its
//! callback delivery through: a FIFO of zero-argument jobs that run strictly
//! after the current synchronous segment, once the event loop drains the
//! queue. The handle is cheap to clone and every cell spawned by `then` or a
//! combinator inherits its parent's handle, so one queue serves one logical
//! thread of promises.
//!
//! The queue also carries the unhandled-rejection registry: rejections that
//! had no subscriber at settlement time are parked here and reported by the
//! event loop after a drain, unless a handler showed up in the meantime.

use crate::promise::PromiseInner;
use crate::value::Value;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::{Rc, Weak};

pub(crate) type Job = Box<dyn FnOnce()>;

struct QueueInner {
    jobs: VecDeque<Job>,
    pushed: usize,
    unhandled: Vec<(Weak<RefCell<PromiseInner>>, Value)>,
}

/// Cloneable handle to a FIFO microtask queue.
#[derive(Clone)]
pub struct JobQueue {
    inner: Rc<RefCell<QueueInner>>,
}

impl JobQueue {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(QueueInner {
                jobs: VecDeque::new(),
                pushed: 0,
                unhandled: Vec::new(),
            })),
        }
    }

    pub(crate) fn enqueue(&self, job: Job) {
        let mut inner = self.inner.borrow_mut();
        inner.jobs.push_back(job);
        inner.pushed += 1;
        log::trace!("job queue: push #{} (len={})", inner.pushed, inner.jobs.len());
    }

    pub(crate) fn dequeue(&self) -> Option<Job> {
        self.inner.borrow_mut().jobs.pop_front()
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.borrow().jobs.is_empty()
    }

    /// Parks a rejection that settled with no subscriber attached. The event
    /// loop re-checks the cell's handled flag before warning, so late
    /// `catch` registrations quiet the report.
    pub(crate) fn track_unhandled(&self, promise: Weak<RefCell<PromiseInner>>, reason: Value) {
        self.inner.borrow_mut().unhandled.push((promise, reason));
    }

    pub(crate) fn take_unhandled(&self) -> Vec<(Weak<RefCell<PromiseInner>>, Value)> {
        std::mem::take(&mut self.inner.borrow_mut().unhandled)
    }
}

impl Default for JobQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for JobQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        write!(f, "JobQueue {{ len: {}, pushed: {} }}", inner.jobs.len(), inner.pushed)
    }
}
