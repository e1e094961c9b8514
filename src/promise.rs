//! The state cell at the heart of the engine.
//!
//! A [`Promise`] is a cloneable handle to a shared three-state cell:
//! `Pending` until one of the settlement functions fires, then permanently
//! `Fulfilled(value)` or `Rejected(reason)`. Subscribers registered while
//! pending are queued FIFO per cell; subscribers registered after settlement
//! are scheduled immediately. Either way the callback runs through the
//! injected [`JobQueue`], never synchronously inside `then` or inside a
//! settlement function, so a caller can never observe settlement before the
//! current synchronous segment completes.
//!
//! The resolution procedure ([`Promise::resolve_value`]) decides how a value
//! flows into a cell: self-reference rejects with a chaining-cycle TypeError,
//! another cell is adopted (unwrapping recursively on fulfillment), an
//! external [`Thenable`](crate::value::Thenable) is probed behind a
//! single-invocation latch, and everything else fulfills directly.

use crate::error::{JSError, js_error_to_value};
use crate::task::JobQueue;
use crate::value::Value;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A settlement function handed to executors and external thenables.
pub type SettleFn = Box<dyn Fn(Value)>;

/// A `then`/`catch` handler. Returning `Err` settles the continuation cell
/// as rejected with the fault converted to a reason value.
pub type OnSettled = Box<dyn FnOnce(Value) -> Result<Value, JSError>>;

/// A `finally` handler: runs on either path, sees no arguments.
pub type OnFinally = Box<dyn FnOnce() -> Result<Value, JSError>>;

/// An internal reaction: consumes the settled payload exactly once.
type Callback = Box<dyn FnOnce(Value)>;

#[derive(Debug, Clone, PartialEq)]
pub enum PromiseState {
    Pending,
    Fulfilled(Value),
    Rejected(Value),
}

pub(crate) struct PromiseInner {
    id: usize,
    state: PromiseState,
    on_fulfilled: Vec<Callback>,
    on_rejected: Vec<Callback>,
    /// Whether a rejection subscriber has been attached or has consumed the
    /// rejection. Used only to quiet unhandled-rejection reporting.
    handled: bool,
}

impl PromiseInner {
    pub(crate) fn is_handled(&self) -> bool {
        self.handled
    }
}

static UNIQUE_ID_SEED: AtomicUsize = AtomicUsize::new(1);

pub(crate) fn generate_unique_id() -> usize {
    UNIQUE_ID_SEED.fetch_add(1, Ordering::SeqCst)
}

/// Cloneable handle to a deferred-value cell. Clones share the same cell.
#[derive(Clone)]
pub struct Promise {
    inner: Rc<RefCell<PromiseInner>>,
    queue: JobQueue,
}

impl Promise {
    /// Constructs a cell and runs `executor` synchronously, exactly once,
    /// before returning. The executor receives the cell's two settlement
    /// functions; a fault raised by the executor is caught and treated as an
    /// implicit rejection (unless the executor already settled the cell).
    pub fn new<E>(queue: &JobQueue, executor: E) -> Promise
    where
        E: FnOnce(SettleFn, SettleFn) -> Result<(), JSError>,
    {
        let promise = Promise::new_pending(queue);
        let (resolve, reject, latch) = promise.settlement_fns();
        if let Err(err) = executor(resolve, reject)
            && !latch.replace(true)
        {
            promise.reject_with(js_error_to_value(&err));
        }
        promise
    }

    /// Creates a pending cell along with its settlement functions, for host
    /// code that settles from outside an executor.
    ///
    /// The pair shares a latch: the first of the two functions to fire wins
    /// and later calls to either are ignored, in addition to the cell's own
    /// at-most-once transition guarantee.
    pub fn capability(queue: &JobQueue) -> (Promise, SettleFn, SettleFn) {
        let promise = Promise::new_pending(queue);
        let (resolve, reject, _latch) = promise.settlement_fns();
        (promise, resolve, reject)
    }

    fn settlement_fns(&self) -> (SettleFn, SettleFn, Rc<Cell<bool>>) {
        let already_settled = Rc::new(Cell::new(false));

        let target = self.clone();
        let latch = already_settled.clone();
        let resolve: SettleFn = Box::new(move |value| {
            if latch.replace(true) {
                return;
            }
            target.resolve_value(value);
        });

        let target = self.clone();
        let latch = already_settled.clone();
        let reject: SettleFn = Box::new(move |reason| {
            if latch.replace(true) {
                return;
            }
            target.reject_with(reason);
        });

        (resolve, reject, already_settled)
    }

    pub(crate) fn new_pending(queue: &JobQueue) -> Promise {
        Promise {
            inner: Rc::new(RefCell::new(PromiseInner {
                id: generate_unique_id(),
                state: PromiseState::Pending,
                on_fulfilled: Vec::new(),
                on_rejected: Vec::new(),
                handled: false,
            })),
            queue: queue.clone(),
        }
    }

    /// Snapshot of the current state, for hosts and tests that want to
    /// observe settlement without attaching handlers.
    pub fn state(&self) -> PromiseState {
        self.inner.borrow().state.clone()
    }

    pub fn id(&self) -> usize {
        self.inner.borrow().id
    }

    /// Whether two handles refer to the same cell.
    pub fn ptr_eq(&self, other: &Promise) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Registers a continuation pair and returns the chained cell
    /// synchronously, regardless of this cell's state.
    ///
    /// A missing `on_fulfilled` defaults to value passthrough; a missing
    /// `on_rejected` defaults to re-raising the reason into the chained
    /// cell. Handler return values run through the resolution procedure;
    /// handler faults reject the chained cell.
    pub fn then(&self, on_fulfilled: Option<OnSettled>, on_rejected: Option<OnSettled>) -> Promise {
        let next = Promise::new_pending(&self.queue);

        let fulfil_reaction: Callback = {
            let next = next.clone();
            Box::new(move |value| match on_fulfilled {
                Some(handler) => match handler(value) {
                    Ok(x) => next.resolve_value(x),
                    Err(err) => next.reject_with(js_error_to_value(&err)),
                },
                None => next.resolve_value(value),
            })
        };
        let reject_reaction: Callback = {
            let next = next.clone();
            Box::new(move |reason| match on_rejected {
                Some(handler) => match handler(reason) {
                    Ok(x) => next.resolve_value(x),
                    Err(err) => next.reject_with(js_error_to_value(&err)),
                },
                None => next.reject_with(reason),
            })
        };
        self.subscribe(fulfil_reaction, reject_reaction);

        next
    }

    pub fn catch(&self, on_rejected: OnSettled) -> Promise {
        self.then(None, Some(on_rejected))
    }

    /// Runs `on_finally` on either path without seeing or altering the
    /// outcome, except: a deferred value returned by `on_finally` delays
    /// propagation until it settles, and a fault from `on_finally` overrides
    /// the original settlement.
    pub fn finally(&self, on_finally: OnFinally) -> Promise {
        let queue = self.queue.clone();
        // Only one of the two branches ever runs, so the handler is parked
        // in a shared slot both closures can take from.
        let shared = Rc::new(RefCell::new(Some(on_finally)));

        let slot = shared.clone();
        let cleanup_queue = queue.clone();
        let on_ful: OnSettled = Box::new(move |value| {
            let cleanup = run_finally_slot(&slot)?;
            Ok(Value::Promise(Promise::resolve(&cleanup_queue, cleanup).then(
                Some(Box::new(move |_| Ok(value))),
                None,
            )))
        });
        let on_rej: OnSettled = Box::new(move |reason| {
            let cleanup = run_finally_slot(&shared)?;
            Ok(Value::Promise(Promise::resolve(&queue, cleanup).then(
                Some(Box::new(move |_| Err(JSError::Throw { value: reason }))),
                None,
            )))
        });
        self.then(Some(on_ful), Some(on_rej))
    }

    /// Attaches one reaction pair. Pending cells queue it FIFO; settled
    /// cells schedule the matching side immediately (still deferred through
    /// the job queue).
    pub(crate) fn subscribe(&self, on_fulfilled: Callback, on_rejected: Callback) {
        let settled = {
            let mut inner = self.inner.borrow_mut();
            match inner.state.clone() {
                PromiseState::Pending => {
                    inner.on_fulfilled.push(on_fulfilled);
                    inner.on_rejected.push(on_rejected);
                    log::trace!(
                        "promise {}: queued reaction ({} pending)",
                        inner.id,
                        inner.on_fulfilled.len()
                    );
                    return;
                }
                PromiseState::Fulfilled(value) => Ok(value),
                PromiseState::Rejected(reason) => {
                    inner.handled = true;
                    Err(reason)
                }
            }
        };
        match settled {
            Ok(value) => self.queue.enqueue(Box::new(move || on_fulfilled(value))),
            Err(reason) => self.queue.enqueue(Box::new(move || on_rejected(reason))),
        }
    }

    /// The resolution procedure: decides how `x` determines this cell's
    /// settlement.
    pub(crate) fn resolve_value(&self, x: Value) {
        if !matches!(self.inner.borrow().state, PromiseState::Pending) {
            return;
        }
        match x {
            Value::Promise(other) => {
                if self.ptr_eq(&other) {
                    let fault = crate::raise_type_error!("Chaining cycle detected for promise");
                    self.reject_with(js_error_to_value(&fault));
                    return;
                }
                // Adopt the other cell's settlement. Fulfillment values are
                // re-resolved so nested cells unwrap; rejections pass
                // through without further unwrapping.
                log::trace!("promise {}: adopting promise {}", self.id(), other.id());
                let target = self.clone();
                let on_fulfilled: Callback = Box::new(move |y| target.resolve_value(y));
                let target = self.clone();
                let on_rejected: Callback = Box::new(move |r| target.reject_with(r));
                other.subscribe(on_fulfilled, on_rejected);
            }
            Value::Thenable(thenable) => {
                // First of on_fulfilled/on_rejected to fire wins; later
                // firings and post-firing faults are ignored.
                let called = Rc::new(Cell::new(false));

                let target = self.clone();
                let latch = called.clone();
                let on_fulfilled: SettleFn = Box::new(move |y| {
                    if latch.replace(true) {
                        return;
                    }
                    target.resolve_value(y);
                });
                let target = self.clone();
                let latch = called.clone();
                let on_rejected: SettleFn = Box::new(move |r| {
                    if latch.replace(true) {
                        return;
                    }
                    target.reject_with(r);
                });

                if let Err(err) = thenable.then(on_fulfilled, on_rejected)
                    && !called.replace(true)
                {
                    self.reject_with(js_error_to_value(&err));
                }
            }
            plain => self.fulfill(plain),
        }
    }

    /// Transitions to `Fulfilled` and schedules every queued fulfillment
    /// reaction. No-op if the cell is already settled.
    pub(crate) fn fulfill(&self, value: Value) {
        let callbacks = {
            let mut inner = self.inner.borrow_mut();
            if !matches!(inner.state, PromiseState::Pending) {
                return;
            }
            inner.state = PromiseState::Fulfilled(value.clone());
            inner.on_rejected.clear();
            std::mem::take(&mut inner.on_fulfilled)
        };
        // Logged outside the borrow: the payload may itself reference this cell.
        log::debug!("promise {}: fulfilled with {:?}", self.id(), value);
        for callback in callbacks {
            let value = value.clone();
            self.queue.enqueue(Box::new(move || callback(value)));
        }
    }

    /// Transitions to `Rejected` and schedules every queued rejection
    /// reaction. No-op if the cell is already settled. A rejection with no
    /// subscriber is parked for unhandled-rejection reporting.
    pub(crate) fn reject_with(&self, reason: Value) {
        let (callbacks, handled) = {
            let mut inner = self.inner.borrow_mut();
            if !matches!(inner.state, PromiseState::Pending) {
                return;
            }
            inner.state = PromiseState::Rejected(reason.clone());
            inner.on_fulfilled.clear();
            let callbacks = std::mem::take(&mut inner.on_rejected);
            if !callbacks.is_empty() {
                inner.handled = true;
            }
            (callbacks, inner.handled)
        };
        log::debug!("promise {}: rejected with {:?}", self.id(), reason);
        if !handled {
            self.queue.track_unhandled(Rc::downgrade(&self.inner), reason.clone());
        }
        for callback in callbacks {
            let reason = reason.clone();
            self.queue.enqueue(Box::new(move || callback(reason)));
        }
    }
}

fn run_finally_slot(slot: &Rc<RefCell<Option<OnFinally>>>) -> Result<Value, JSError> {
    match slot.borrow_mut().take() {
        Some(on_finally) => on_finally(),
        None => Ok(Value::Undefined),
    }
}

impl std::fmt::Debug for Promise {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        match &inner.state {
            PromiseState::Pending => write!(
                f,
                "Promise#{} {{ pending, reactions: {} }}",
                inner.id,
                inner.on_fulfilled.len()
            ),
            PromiseState::Fulfilled(value) => {
                write!(f, "Promise#{} {{ fulfilled: {value:?} }}", inner.id)
            }
            PromiseState::Rejected(reason) => {
                write!(f, "Promise#{} {{ rejected: {reason:?} }}", inner.id)
            }
        }
    }
}
