use http::Method;
use midstack::{DispatchError, Flow, Outcome, Request, Response, Router};
use std::sync::{Arc, Mutex};

use tracing_util::TestTracing;

type Log = Arc<Mutex<Vec<&'static str>>>;

fn new_log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

fn entries(log: &Log) -> Vec<&'static str> {
    log.lock().unwrap().clone()
}

fn passthrough(log: &Log, name: &'static str) -> impl Fn(&mut Request, &mut Response) -> Flow {
    let log = Arc::clone(log);
    move |_req: &mut Request, _res: &mut Response| {
        log.lock().unwrap().push(name);
        Flow::Next
    }
}

#[test]
fn test_layers_run_in_registration_order() {
    let _tracing = TestTracing::init();
    let log = new_log();
    let mut router = Router::new();
    router.use_at("/x", passthrough(&log, "a"));
    router.use_at("/x", passthrough(&log, "b"));

    let mut req = Request::new(Method::GET, "/x");
    let mut res = Response::new();
    let outcome = router.handle(&mut req, &mut res);

    assert!(matches!(outcome, Outcome::Exhausted(None)));
    assert_eq!(entries(&log), vec!["a", "b"]);
}

#[test]
fn test_error_bypasses_request_handlers() {
    let _tracing = TestTracing::init();
    let log = new_log();
    let mut router = Router::new();
    router.use_fn(passthrough(&log, "mw1"));
    router.use_fn(|_req: &mut Request, _res: &mut Response| {
        Flow::Fail(DispatchError::new(418, "teapot"))
    });
    {
        let log = Arc::clone(&log);
        router.use_error(
            move |err: &DispatchError, _req: &mut Request, res: &mut Response| {
                assert_eq!(err.status, 418);
                log.lock().unwrap().push("err_handler");
                res.send_json(err.status, serde_json::json!({ "error": err.message }));
                Flow::Halt
            },
        );
    }
    router.use_fn(passthrough(&log, "mw3"));

    let mut req = Request::new(Method::GET, "/anything");
    let mut res = Response::new();
    let outcome = router.handle(&mut req, &mut res);

    assert!(matches!(outcome, Outcome::Handled));
    assert_eq!(entries(&log), vec!["mw1", "err_handler"]);
    assert_eq!(res.status, 418);
}

#[test]
fn test_panicking_handler_becomes_error() {
    let _tracing = TestTracing::init();
    let log = new_log();
    let mut router = Router::new();
    router.use_fn(|_req: &mut Request, _res: &mut Response| -> Flow {
        panic!("boom");
    });
    {
        let log = Arc::clone(&log);
        router.use_error(
            move |err: &DispatchError, _req: &mut Request, _res: &mut Response| {
                assert_eq!(err.status, 500);
                assert!(err.message.contains("panicked"));
                log.lock().unwrap().push("caught");
                Flow::Fail(err.clone())
            },
        );
    }
    router.use_fn(passthrough(&log, "mw_after"));

    let mut req = Request::new(Method::GET, "/");
    let mut res = Response::new();
    let outcome = router.handle(&mut req, &mut res);

    // error handler kept the error pending, so it reaches the terminal caller
    match outcome {
        Outcome::Exhausted(Some(err)) => assert_eq!(err.status, 500),
        other => panic!("expected exhausted with error, got {other:?}"),
    }
    assert_eq!(entries(&log), vec!["caught"]);
}

#[test]
fn test_error_handler_clears_error_and_routing_resumes() {
    let _tracing = TestTracing::init();
    let log = new_log();
    let mut router = Router::new();
    router.use_fn(|_req: &mut Request, _res: &mut Response| {
        Flow::Fail(DispatchError::internal("transient"))
    });
    {
        let log = Arc::clone(&log);
        router.use_error(
            move |_err: &DispatchError, _req: &mut Request, _res: &mut Response| {
                log.lock().unwrap().push("recovered");
                Flow::Next
            },
        );
    }
    router.use_fn(passthrough(&log, "mw_after"));

    let mut req = Request::new(Method::GET, "/");
    let mut res = Response::new();
    let outcome = router.handle(&mut req, &mut res);

    assert!(matches!(outcome, Outcome::Exhausted(None)));
    assert_eq!(entries(&log), vec!["recovered", "mw_after"]);
}

#[test]
fn test_error_handlers_skipped_without_pending_error() {
    let _tracing = TestTracing::init();
    let log = new_log();
    let mut router = Router::new();
    {
        let log = Arc::clone(&log);
        router.use_error(
            move |_err: &DispatchError, _req: &mut Request, _res: &mut Response| {
                log.lock().unwrap().push("err_handler");
                Flow::Next
            },
        );
    }
    router.use_fn(passthrough(&log, "mw"));

    let mut req = Request::new(Method::GET, "/");
    let mut res = Response::new();
    let _ = router.handle(&mut req, &mut res);

    assert_eq!(entries(&log), vec!["mw"]);
}

#[test]
fn test_skip_router_unwinds_without_error() {
    let _tracing = TestTracing::init();
    let log = new_log();
    let mut router = Router::new();
    router.use_fn(passthrough(&log, "before"));
    router.use_fn(|_req: &mut Request, _res: &mut Response| Flow::SkipRouter);
    router.use_fn(passthrough(&log, "after"));

    let mut req = Request::new(Method::GET, "/");
    let mut res = Response::new();
    let outcome = router.handle(&mut req, &mut res);

    assert!(matches!(outcome, Outcome::Exhausted(None)));
    assert_eq!(entries(&log), vec!["before"]);
}

#[test]
fn test_unroutable_target_matches_nothing() {
    let _tracing = TestTracing::init();
    let log = new_log();
    let mut router = Router::new();
    router.use_fn(passthrough(&log, "mw"));

    let mut req = Request::new(Method::GET, "no-leading-slash");
    let mut res = Response::new();
    let outcome = router.handle(&mut req, &mut res);

    assert!(matches!(outcome, Outcome::Exhausted(None)));
    assert!(entries(&log).is_empty());
}

#[test]
fn test_unmatched_prefix_layers_are_skipped() {
    let _tracing = TestTracing::init();
    let log = new_log();
    let mut router = Router::new();
    router.use_at("/admin", passthrough(&log, "admin"));
    router.use_at("/api", passthrough(&log, "api"));

    let mut req = Request::new(Method::GET, "/api/pets");
    let mut res = Response::new();
    let _ = router.handle(&mut req, &mut res);

    assert_eq!(entries(&log), vec!["api"]);
}

#[test]
fn test_long_passthrough_stack_completes() {
    let _tracing = TestTracing::init();
    let mut router = Router::new();
    // far beyond the spin limit; every layer is scanned and skipped
    for _ in 0..350 {
        router.use_at("/elsewhere", |_req: &mut Request, _res: &mut Response| {
            Flow::Next
        });
    }
    router.get("/target", |_req: &mut Request, res: &mut Response| {
        res.send_json(200, serde_json::json!({ "ok": true }));
        Flow::Halt
    });

    let mut req = Request::new(Method::GET, "/target");
    let mut res = Response::new();
    let outcome = router.handle(&mut req, &mut res);

    assert!(matches!(outcome, Outcome::Handled));
    assert_eq!(res.status, 200);
}

#[test]
fn test_router_shared_across_threads() {
    let _tracing = TestTracing::init();
    let mut router = Router::new();
    router.get("/pets/:id", |req: &mut Request, res: &mut Response| {
        let id = req.get_param("id").unwrap_or("").to_string();
        // linger so in-flight dispatches overlap
        std::thread::sleep(std::time::Duration::from_millis(20));
        res.send_json(200, serde_json::json!({ "id": id }));
        Flow::Halt
    });
    let router = Arc::new(router);

    let mut handles = Vec::new();
    for id in ["1", "2", "3", "4"] {
        let router = Arc::clone(&router);
        handles.push(std::thread::spawn(move || {
            let mut req = Request::new(Method::GET, &format!("/pets/{id}"));
            let mut res = Response::new();
            let outcome = router.handle(&mut req, &mut res);
            assert!(matches!(outcome, Outcome::Handled));
            assert_eq!(res.body["id"], serde_json::json!(id));
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }
}

#[test]
fn test_match_decode_error_reaches_error_handler() {
    let _tracing = TestTracing::init();
    let log = new_log();
    let mut router = Router::new();
    router.get("/users/:name", |_req: &mut Request, _res: &mut Response| {
        Flow::Halt
    });
    {
        let log = Arc::clone(&log);
        router.use_error(
            move |err: &DispatchError, _req: &mut Request, res: &mut Response| {
                assert_eq!(err.status, 400);
                log.lock().unwrap().push("bad_request");
                res.send_json(err.status, serde_json::json!({ "error": err.message }));
                Flow::Halt
            },
        );
    }

    let mut req = Request::new(Method::GET, "/users/bad%zzname");
    let mut res = Response::new();
    let outcome = router.handle(&mut req, &mut res);

    assert!(matches!(outcome, Outcome::Handled));
    assert_eq!(entries(&log), vec!["bad_request"]);
    assert_eq!(res.status, 400);
}

#[test]
fn test_malformed_encoding_surfaces_400_not_panic() {
    let _tracing = TestTracing::init();
    let mut router = Router::new();
    router.get("/users/:name", |_req: &mut Request, _res: &mut Response| {
        Flow::Halt
    });

    let mut req = Request::new(Method::GET, "/users/bad%2value");
    let mut res = Response::new();
    match router.handle(&mut req, &mut res) {
        Outcome::Exhausted(Some(err)) => {
            assert_eq!(err.status, 400);
            assert!(err.message.contains("bad%2value"));
        }
        other => panic!("expected a 400 dispatch error, got {other:?}"),
    }
}
