//! A standalone JavaScript-style promise engine.
//!
//! The engine is a single-threaded deferred-value primitive: a three-state
//! cell ([`Promise`]) whose subscribers are always invoked through a FIFO
//! microtask queue ([`JobQueue`], driven by an [`EventLoop`]), the
//! Promises/A+ resolution procedure (nested-cell adoption and external
//! [`Thenable`] probing), and the static combinators `resolve` / `reject` /
//! `all` / `race` / `all_settled` / `any`.
//!
//! ```
//! use js_promise::{EventLoop, Promise, PromiseState, Value};
//!
//! let event_loop = EventLoop::new();
//! let queue = event_loop.queue();
//!
//! let doubled = Promise::new(&queue, |resolve, _reject| {
//!     resolve(Value::Number(21.0));
//!     Ok(())
//! })
//! .then(Some(Box::new(|v| match v {
//!     Value::Number(n) => Ok(Value::Number(n * 2.0)),
//!     other => Ok(other),
//! })), None);
//!
//! event_loop.run_until_idle().unwrap();
//! assert_eq!(doubled.state(), PromiseState::Fulfilled(Value::Number(42.0)));
//! ```

pub(crate) mod combinators;
pub(crate) mod error;
pub(crate) mod event_loop;
pub(crate) mod promise;
pub(crate) mod task;
pub(crate) mod value;

pub use error::{JSError, js_error_to_value};
pub use event_loop::EventLoop;
pub use promise::{OnFinally, OnSettled, Promise, PromiseState, SettleFn};
pub use task::JobQueue;
pub use value::{Thenable, Value, is_thenable, object};
