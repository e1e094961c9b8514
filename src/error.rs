use crate::value::{self, Value};

#[derive(thiserror::Error, Debug, Clone)]
pub enum JSError {
    #[error("Type error: {message}")]
    TypeError { message: String },

    #[error("AggregateError: {message}")]
    AggregateError { message: String, errors: Vec<Value> },

    #[error("Runtime error: {message}")]
    RuntimeError { message: String },

    #[error("Thrown value: {value:?}")]
    Throw { value: Value },

    #[error("Runaway job queue detected (executed {iterations} jobs)")]
    InfiniteLoopError { iterations: usize },
}

// Macro that constructs a TypeError from a message. Kept as a macro so call
// sites read like a raise rather than a struct literal.
#[macro_export]
macro_rules! raise_type_error {
    ($msg:expr) => {
        $crate::JSError::TypeError { message: $msg.to_string() }
    };
}

/// Converts a fault into the `Value` used as a rejection reason.
///
/// A thrown value passes through unchanged so downstream handlers observe
/// exactly what was thrown; every other variant becomes an error-shaped
/// object with `name` and `message` properties (plus `errors` for the
/// aggregate case).
pub fn js_error_to_value(err: &JSError) -> Value {
    match err {
        JSError::Throw { value } => value.clone(),
        JSError::TypeError { message } => error_object("TypeError", message, None),
        JSError::AggregateError { message, errors } => {
            error_object("AggregateError", message, Some(errors.clone()))
        }
        JSError::RuntimeError { message } => error_object("Error", message, None),
        JSError::InfiniteLoopError { .. } => error_object("Error", &err.to_string(), None),
    }
}

fn error_object(name: &str, message: &str, errors: Option<Vec<Value>>) -> Value {
    let mut entries = vec![
        ("name", Value::String(name.to_string())),
        ("message", Value::String(message.to_string())),
    ];
    if let Some(errors) = errors {
        entries.push(("errors", Value::Array(errors)));
    }
    value::object(entries)
}
