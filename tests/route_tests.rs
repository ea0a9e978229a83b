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

fn respond(name: &'static str) -> impl Fn(&mut Request, &mut Response) -> Flow {
    move |_req: &mut Request, res: &mut Response| {
        res.send_json(200, serde_json::json!({ "handler": name }));
        Flow::Halt
    }
}

#[test]
fn test_method_dispatch_selects_matching_verb() {
    let _tracing = TestTracing::init();
    let mut router = Router::new();
    router
        .route("/animals")
        .get(respond("get_animals"))
        .post(respond("create_animal"));

    let mut req = Request::new(Method::POST, "/animals");
    let mut res = Response::new();
    let outcome = router.handle(&mut req, &mut res);

    assert!(matches!(outcome, Outcome::Handled));
    assert_eq!(res.body["handler"], "create_animal");
}

#[test]
fn test_unhandled_method_falls_through() {
    let _tracing = TestTracing::init();
    let mut router = Router::new();
    router.route("/animals").get(respond("get_animals"));

    let mut req = Request::new(Method::DELETE, "/animals");
    let mut res = Response::new();
    let outcome = router.handle(&mut req, &mut res);

    assert!(matches!(outcome, Outcome::Exhausted(None)));
}

#[test]
fn test_head_falls_back_to_get() {
    let _tracing = TestTracing::init();
    let mut router = Router::new();
    router.get("/a", respond("get_a"));

    let mut req = Request::new(Method::HEAD, "/a");
    let mut res = Response::new();
    let outcome = router.handle(&mut req, &mut res);

    assert!(matches!(outcome, Outcome::Handled));
    assert_eq!(res.body["handler"], "get_a");
}

#[test]
fn test_explicit_head_wins_over_get() {
    let _tracing = TestTracing::init();
    let mut router = Router::new();
    router
        .route("/a")
        .get(respond("get_a"))
        .head(respond("head_a"));

    let mut req = Request::new(Method::HEAD, "/a");
    let mut res = Response::new();
    let _ = router.handle(&mut req, &mut res);

    assert_eq!(res.body["handler"], "head_a");
}

#[test]
fn test_options_synthesis_lists_methods() {
    let _tracing = TestTracing::init();
    let mut router = Router::new();
    router.get("/a", respond("get_a"));
    router.post("/a", respond("post_a"));

    let mut req = Request::new(Method::OPTIONS, "/a");
    let mut res = Response::new();
    let outcome = router.handle(&mut req, &mut res);

    assert!(matches!(outcome, Outcome::Handled));
    assert_eq!(res.status, 200);
    assert_eq!(res.get_header("Allow"), Some("GET,HEAD,POST"));
    assert_eq!(res.body, serde_json::json!("GET,HEAD,POST"));
}

#[test]
fn test_options_synthesis_multi_verb_route() {
    let _tracing = TestTracing::init();
    let mut router = Router::new();
    router
        .route("/a")
        .get(respond("get_a"))
        .post(respond("post_a"));

    let mut req = Request::new(Method::OPTIONS, "/a");
    let mut res = Response::new();
    let outcome = router.handle(&mut req, &mut res);

    assert!(matches!(outcome, Outcome::Handled));
    // one route carrying both verbs appends the automatic HEAD last
    assert_eq!(res.get_header("Allow"), Some("GET,POST,HEAD"));
}

#[test]
fn test_explicit_options_handler_preempts_synthesis() {
    let _tracing = TestTracing::init();
    let mut router = Router::new();
    router
        .route("/a")
        .get(respond("get_a"))
        .options(respond("options_a"));

    let mut req = Request::new(Method::OPTIONS, "/a");
    let mut res = Response::new();
    let _ = router.handle(&mut req, &mut res);

    assert_eq!(res.body["handler"], "options_a");
}

#[test]
fn test_options_without_routes_is_unhandled() {
    let _tracing = TestTracing::init();
    let mut router = Router::new();
    router.use_fn(|_req: &mut Request, _res: &mut Response| Flow::Next);

    let mut req = Request::new(Method::OPTIONS, "/nothing");
    let mut res = Response::new();
    let outcome = router.handle(&mut req, &mut res);

    assert!(matches!(outcome, Outcome::Exhausted(None)));
}

#[test]
fn test_skip_route_skips_rest_of_route_only() {
    let _tracing = TestTracing::init();
    let log = new_log();
    let mut router = Router::new();
    {
        let log = Arc::clone(&log);
        let route = router.route("/checkout");
        route.get(move |_req: &mut Request, _res: &mut Response| {
            log.lock().unwrap().push("guard");
            Flow::SkipRoute
        });
    }
    {
        let log = Arc::clone(&log);
        router
            .route("/checkout")
            .get(move |_req: &mut Request, res: &mut Response| {
                log.lock().unwrap().push("fallback");
                res.send_json(200, serde_json::json!({ "handler": "fallback" }));
                Flow::Halt
            });
    }
    {
        let log = Arc::clone(&log);
        router.use_fn(move |_req: &mut Request, _res: &mut Response| {
            log.lock().unwrap().push("tail_mw");
            Flow::Next
        });
    }

    let mut req = Request::new(Method::GET, "/checkout");
    let mut res = Response::new();
    let outcome = router.handle(&mut req, &mut res);

    // the first route bailed without an error; the router kept scanning
    assert!(matches!(outcome, Outcome::Handled));
    assert_eq!(entries(&log), vec!["guard", "fallback"]);
}

#[test]
fn test_skip_route_within_multi_handler_route() {
    let _tracing = TestTracing::init();
    let log = new_log();
    let mut router = Router::new();
    {
        let log_a = Arc::clone(&log);
        let log_b = Arc::clone(&log);
        router
            .route("/checkout")
            .get(move |_req: &mut Request, _res: &mut Response| {
                log_a.lock().unwrap().push("first");
                Flow::SkipRoute
            })
            .get(move |_req: &mut Request, _res: &mut Response| {
                log_b.lock().unwrap().push("second");
                Flow::Halt
            });
    }

    let mut req = Request::new(Method::GET, "/checkout");
    let mut res = Response::new();
    let outcome = router.handle(&mut req, &mut res);

    assert!(matches!(outcome, Outcome::Exhausted(None)));
    assert_eq!(entries(&log), vec!["first"]);
}

#[test]
fn test_route_error_bypass_and_catch() {
    let _tracing = TestTracing::init();
    let log = new_log();
    let mut router = Router::new();
    {
        let log_skip = Arc::clone(&log);
        let log_catch = Arc::clone(&log);
        router
            .route("/pay")
            .get(|_req: &mut Request, _res: &mut Response| {
                Flow::Fail(DispatchError::new(402, "payment required"))
            })
            .get(move |_req: &mut Request, _res: &mut Response| {
                log_skip.lock().unwrap().push("skipped");
                Flow::Halt
            })
            .catch(
                move |err: &DispatchError, _req: &mut Request, res: &mut Response| {
                    log_catch.lock().unwrap().push("caught");
                    res.send_json(err.status, serde_json::json!({ "error": err.message }));
                    Flow::Halt
                },
            );
    }

    let mut req = Request::new(Method::GET, "/pay");
    let mut res = Response::new();
    let outcome = router.handle(&mut req, &mut res);

    assert!(matches!(outcome, Outcome::Handled));
    assert_eq!(entries(&log), vec!["caught"]);
    assert_eq!(res.status, 402);
}

#[test]
fn test_route_error_propagates_to_router() {
    let _tracing = TestTracing::init();
    let mut router = Router::new();
    router.get("/fail", |_req: &mut Request, _res: &mut Response| {
        Flow::Fail(DispatchError::internal("route blew up"))
    });

    let mut req = Request::new(Method::GET, "/fail");
    let mut res = Response::new();
    match router.handle(&mut req, &mut res) {
        Outcome::Exhausted(Some(err)) => assert_eq!(err.message, "route blew up"),
        other => panic!("expected pending error, got {other:?}"),
    }
}

#[test]
fn test_pending_error_rejects_routes() {
    let _tracing = TestTracing::init();
    let log = new_log();
    let mut router = Router::new();
    router.use_fn(|_req: &mut Request, _res: &mut Response| {
        Flow::Fail(DispatchError::internal("early"))
    });
    {
        let log = Arc::clone(&log);
        router.get("/a", move |_req: &mut Request, _res: &mut Response| {
            log.lock().unwrap().push("route_ran");
            Flow::Halt
        });
    }

    let mut req = Request::new(Method::GET, "/a");
    let mut res = Response::new();
    let outcome = router.handle(&mut req, &mut res);

    assert!(entries(&log).is_empty());
    assert!(matches!(outcome, Outcome::Exhausted(Some(_))));
}

#[test]
fn test_all_answers_every_method() {
    let _tracing = TestTracing::init();
    let mut router = Router::new();
    router.all("/anything", respond("catch_all"));

    for method in [Method::GET, Method::PUT, Method::PATCH] {
        let mut req = Request::new(method, "/anything");
        let mut res = Response::new();
        let outcome = router.handle(&mut req, &mut res);
        assert!(matches!(outcome, Outcome::Handled));
        assert_eq!(res.body["handler"], "catch_all");
    }
}
