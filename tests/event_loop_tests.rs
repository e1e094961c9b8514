use js_promise::{EventLoop, JSError, JobQueue, Promise, Value};

// Initialize logger for this integration test binary so `RUST_LOG` is honored.
// Using `ctor` ensures initialization runs before tests start.
#[ctor::ctor]
fn __init_test_logger() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default()).is_test(true).try_init();
}

#[cfg(test)]
mod event_loop_tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_idle_loop_runs_zero_jobs() {
        let event_loop = EventLoop::new();
        assert_eq!(event_loop.run_until_idle().unwrap(), 0);
    }

    #[test]
    fn test_microtasks_drain_before_macrotasks() {
        let event_loop = EventLoop::new();
        let queue = event_loop.queue();
        let order = Rc::new(RefCell::new(Vec::new()));

        let sink = order.clone();
        event_loop.schedule(move || sink.borrow_mut().push("macrotask"));
        let sink = order.clone();
        Promise::resolve(&queue, Value::Undefined).then(
            Some(Box::new(move |_| {
                sink.borrow_mut().push("microtask");
                Ok(Value::Undefined)
            })),
            None,
        );

        event_loop.run_until_idle().unwrap();
        assert_eq!(*order.borrow(), vec!["microtask", "macrotask"]);
    }

    #[test]
    fn test_macrotask_can_settle_a_promise() {
        let event_loop = EventLoop::new();
        let queue = event_loop.queue();
        let seen = Rc::new(RefCell::new(Vec::new()));

        let (p, resolve, _reject) = Promise::capability(&queue);
        let sink = seen.clone();
        p.then(
            Some(Box::new(move |v| {
                sink.borrow_mut().push(v);
                Ok(Value::Undefined)
            })),
            None,
        );
        event_loop.schedule(move || resolve(Value::String("later".to_string())));

        event_loop.run_until_idle().unwrap();
        assert_eq!(*seen.borrow(), vec![Value::String("later".to_string())]);
    }

    #[test]
    fn test_jobs_from_different_cells_run_in_subscription_order() {
        let event_loop = EventLoop::new();
        let queue = event_loop.queue();
        let order = Rc::new(RefCell::new(Vec::new()));

        let p1 = Promise::resolve(&queue, Value::Number(1.0));
        let p2 = Promise::resolve(&queue, Value::Number(2.0));
        for p in [&p1, &p2] {
            let sink = order.clone();
            p.then(
                Some(Box::new(move |v| {
                    sink.borrow_mut().push(v);
                    Ok(Value::Undefined)
                })),
                None,
            );
        }

        event_loop.run_until_idle().unwrap();
        assert_eq!(*order.borrow(), vec![Value::Number(1.0), Value::Number(2.0)]);
    }

    #[test]
    fn test_job_limit_catches_runaway_chains() {
        fn spin(queue: &JobQueue) {
            let next = queue.clone();
            Promise::resolve(queue, Value::Undefined).then(
                Some(Box::new(move |_| {
                    spin(&next);
                    Ok(Value::Undefined)
                })),
                None,
            );
        }

        let event_loop = EventLoop::with_job_limit(100);
        let queue = event_loop.queue();
        spin(&queue);

        let err = event_loop.run_until_idle().unwrap_err();
        assert!(matches!(err, JSError::InfiniteLoopError { .. }));
    }

    #[test]
    fn test_rejection_handled_in_a_later_turn_is_quiet() {
        // The warn-only unhandled report must not disturb settlement or a
        // late catch registration.
        let event_loop = EventLoop::new();
        let queue = event_loop.queue();

        let p = Promise::reject(&queue, Value::String("lost".to_string()));
        event_loop.run_until_idle().unwrap();

        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        p.catch(Box::new(move |reason| {
            sink.borrow_mut().push(reason);
            Ok(Value::Undefined)
        }));
        event_loop.run_until_idle().unwrap();
        assert_eq!(*seen.borrow(), vec![Value::String("lost".to_string())]);
    }

    #[test]
    fn test_run_reports_number_of_jobs_executed() {
        let event_loop = EventLoop::new();
        let queue = event_loop.queue();

        Promise::resolve(&queue, Value::Undefined).then(None, None).then(None, None);
        let executed = event_loop.run_until_idle().unwrap();
        assert_eq!(executed, 2);
    }
}
