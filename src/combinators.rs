//! The static surface: `resolve`, `reject`, `all`, `race`, `all_settled`,
//! `any`.
//!
//! Every combinator is built on the public cell contract only: inputs are
//! wrapped through [`Promise::resolve`] (so plain values participate), one
//! continuation pair is attached per input, and an index-aligned aggregate
//! collects the settlements. The aggregate's result slots and counter are
//! mutated only by that combinator's own reactions, which the job queue runs
//! one at a time.

use crate::error::{JSError, js_error_to_value};
use crate::promise::{OnSettled, Promise};
use crate::task::JobQueue;
use crate::value::{self, Value};
use std::cell::RefCell;
use std::rc::Rc;

/// Index-aligned result slots plus a completion counter, discarded once the
/// combinator's cell settles.
struct Aggregate {
    slots: Vec<Option<Value>>,
    completed: usize,
}

impl Aggregate {
    fn new(total: usize) -> Rc<RefCell<Aggregate>> {
        Rc::new(RefCell::new(Aggregate {
            slots: vec![None; total],
            completed: 0,
        }))
    }

    /// Records one settlement; returns the full result array once every
    /// slot is filled.
    fn record(&mut self, index: usize, outcome: Value) -> Option<Vec<Value>> {
        self.slots[index] = Some(outcome);
        self.completed += 1;
        if self.completed == self.slots.len() {
            Some(self.slots.iter_mut().map(|slot| slot.take().unwrap_or(Value::Undefined)).collect())
        } else {
            None
        }
    }
}

impl Promise {
    /// Returns `value` unchanged if it is already a cell; otherwise a new
    /// cell resolved with it (thenables are adopted, plain values fulfill
    /// immediately).
    pub fn resolve(queue: &JobQueue, value: Value) -> Promise {
        if let Value::Promise(promise) = value {
            return promise;
        }
        let promise = Promise::new_pending(queue);
        promise.resolve_value(value);
        promise
    }

    /// A cell immediately rejected with `reason`.
    pub fn reject(queue: &JobQueue, reason: Value) -> Promise {
        let promise = Promise::new_pending(queue);
        promise.reject_with(reason);
        promise
    }

    /// Fulfills with every input's value in input order, or rejects with the
    /// first reason seen. Empty input fulfills with an empty array.
    pub fn all(queue: &JobQueue, inputs: Vec<Value>) -> Promise {
        let result = Promise::new_pending(queue);
        let total = inputs.len();
        if total == 0 {
            result.fulfill(Value::Array(Vec::new()));
            return result;
        }

        let aggregate = Aggregate::new(total);
        for (index, input) in inputs.into_iter().enumerate() {
            let on_fulfilled: OnSettled = {
                let aggregate = aggregate.clone();
                let result = result.clone();
                Box::new(move |v| {
                    if let Some(values) = aggregate.borrow_mut().record(index, v) {
                        result.fulfill(Value::Array(values));
                    }
                    Ok(Value::Undefined)
                })
            };
            let on_rejected: OnSettled = {
                let result = result.clone();
                Box::new(move |reason| {
                    result.reject_with(reason);
                    Ok(Value::Undefined)
                })
            };
            Promise::resolve(queue, input).then(Some(on_fulfilled), Some(on_rejected));
        }
        result
    }

    /// Settles identically to whichever input settles first in scheduling
    /// order; later settlements are ignored. Empty input stays pending.
    pub fn race(queue: &JobQueue, inputs: Vec<Value>) -> Promise {
        let result = Promise::new_pending(queue);
        for input in inputs {
            let on_fulfilled: OnSettled = {
                let result = result.clone();
                Box::new(move |v| {
                    result.fulfill(v);
                    Ok(Value::Undefined)
                })
            };
            let on_rejected: OnSettled = {
                let result = result.clone();
                Box::new(move |reason| {
                    result.reject_with(reason);
                    Ok(Value::Undefined)
                })
            };
            Promise::resolve(queue, input).then(Some(on_fulfilled), Some(on_rejected));
        }
        result
    }

    /// Always fulfills once every input settles, with index-aligned outcome
    /// records `{status: "fulfilled", value}` / `{status: "rejected",
    /// reason}`. Empty input fulfills with an empty array.
    pub fn all_settled(queue: &JobQueue, inputs: Vec<Value>) -> Promise {
        let result = Promise::new_pending(queue);
        let total = inputs.len();
        if total == 0 {
            result.fulfill(Value::Array(Vec::new()));
            return result;
        }

        let aggregate = Aggregate::new(total);
        for (index, input) in inputs.into_iter().enumerate() {
            let on_fulfilled: OnSettled = {
                let aggregate = aggregate.clone();
                let result = result.clone();
                Box::new(move |v| {
                    let outcome = value::object([
                        ("status", Value::String("fulfilled".to_string())),
                        ("value", v),
                    ]);
                    if let Some(outcomes) = aggregate.borrow_mut().record(index, outcome) {
                        result.fulfill(Value::Array(outcomes));
                    }
                    Ok(Value::Undefined)
                })
            };
            let on_rejected: OnSettled = {
                let aggregate = aggregate.clone();
                let result = result.clone();
                Box::new(move |reason| {
                    let outcome = value::object([
                        ("status", Value::String("rejected".to_string())),
                        ("reason", reason),
                    ]);
                    if let Some(outcomes) = aggregate.borrow_mut().record(index, outcome) {
                        result.fulfill(Value::Array(outcomes));
                    }
                    Ok(Value::Undefined)
                })
            };
            Promise::resolve(queue, input).then(Some(on_fulfilled), Some(on_rejected));
        }
        result
    }

    /// Fulfills with the first fulfilled value; rejects only once every
    /// input has rejected, with an AggregateError carrying the ordered
    /// reasons. Empty input rejects immediately with an empty aggregate.
    pub fn any(queue: &JobQueue, inputs: Vec<Value>) -> Promise {
        let result = Promise::new_pending(queue);
        let total = inputs.len();
        if total == 0 {
            result.reject_with(js_error_to_value(&all_rejected(Vec::new())));
            return result;
        }

        let aggregate = Aggregate::new(total);
        for (index, input) in inputs.into_iter().enumerate() {
            let on_fulfilled: OnSettled = {
                let result = result.clone();
                Box::new(move |v| {
                    result.fulfill(v);
                    Ok(Value::Undefined)
                })
            };
            let on_rejected: OnSettled = {
                let aggregate = aggregate.clone();
                let result = result.clone();
                Box::new(move |reason| {
                    if let Some(reasons) = aggregate.borrow_mut().record(index, reason) {
                        result.reject_with(js_error_to_value(&all_rejected(reasons)));
                    }
                    Ok(Value::Undefined)
                })
            };
            Promise::resolve(queue, input).then(Some(on_fulfilled), Some(on_rejected));
        }
        result
    }
}

fn all_rejected(reasons: Vec<Value>) -> JSError {
    JSError::AggregateError {
        message: "All promises were rejected".to_string(),
        errors: reasons,
    }
}
