//! End-to-end composition over real listeners.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use routeweave::compose::{APPLICATION, ROOT_APPLICATION};
use routeweave::lifecycle::{LifecycleError, Phase};
use routeweave::{
    compose, ApplicationHandle, Blueprint, ComposeError, ContainerError, Dependencies, Flow, Next, Provider,
    Request, ResolutionMode, Response, Service,
};
use serde_json::json;

mod common;

static SESSIONS_OPENED: AtomicUsize = AtomicUsize::new(0);

struct SessionStore {
    serial: usize,
}

impl Service for SessionStore {
    const NAME: &'static str = "SessionStore";

    fn construct(_deps: &Dependencies) -> Result<Self, ContainerError> {
        Ok(SessionStore {
            serial: SESSIONS_OPENED.fetch_add(1, Ordering::SeqCst),
        })
    }
}

struct AuditLog;

struct GreetingRouter {
    application: Arc<ApplicationHandle>,
    root: Arc<ApplicationHandle>,
    sessions: Arc<SessionStore>,
}

impl Service for GreetingRouter {
    const NAME: &'static str = "GreetingRouter";
    const DEPENDENCIES: &'static [&'static str] = &[APPLICATION, ROOT_APPLICATION, "SessionStore"];

    fn construct(deps: &Dependencies) -> Result<Self, ContainerError> {
        Ok(GreetingRouter {
            application: deps.get(APPLICATION)?,
            root: deps.get(ROOT_APPLICATION)?,
            sessions: deps.service::<SessionStore>()?,
        })
    }
}

impl GreetingRouter {
    fn hello(&self, req: &mut Request, res: &mut Response) -> Flow {
        res.json(&json!({ "router": "greeting", "path": req.path(), "url": req.original_url() }))
    }
}

struct IdApp {
    root: Arc<ApplicationHandle>,
    sessions: Arc<SessionStore>,
    audit: Option<Arc<AuditLog>>,
}

impl IdApp {
    fn mod_id(&self, req: &mut Request, _res: &mut Response, next: Next, id: &str) -> Flow {
        req.query.insert("id".into(), format!("00{id}"));
        next.run()
    }

    fn add_id(&self, req: &mut Request, _res: &mut Response, next: Next) -> Flow {
        let id = req.query.get("id").cloned().unwrap_or_default();
        req.query.insert("id".into(), format!("x{id}"));
        next.run()
    }

    fn get_id(&self, req: &mut Request, res: &mut Response) -> Flow {
        let id = req.query.get("id").cloned().unwrap_or_default();
        res.send(id)
    }

    fn hello_id(&self, req: &mut Request, res: &mut Response) -> Flow {
        let id = req.query.get("id").cloned().unwrap_or_default();
        res.json(&json!({ "hello": "world", "id": id }))
    }
}

fn greeting_router() -> Blueprint<GreetingRouter> {
    Blueprint::<GreetingRouter>::from_service()
        .service(Provider::class::<SessionStore>())
        .routes(|t| {
            t.method("hello", GreetingRouter::hello).route("/hi")?;
            Ok(())
        })
        .unwrap()
}

fn id_app(mode: ResolutionMode) -> Blueprint<IdApp> {
    Blueprint::new("IdApp", |deps: &Dependencies| {
        Ok(IdApp {
            root: deps.get(ROOT_APPLICATION)?,
            sessions: deps.service::<SessionStore>()?,
            audit: deps.optional::<AuditLog>("AuditLog"),
        })
    })
    .inject([ROOT_APPLICATION, "SessionStore", "AuditLog"])
    .config(common::config(mode))
    .service(Provider::class::<SessionStore>())
    .router("/greet", greeting_router())
    .order(["mod_id", "add_id"])
    .routes(|t| {
        t.method("mod_id", IdApp::mod_id).param("id")?;
        t.method("add_id", IdApp::add_id).middleware("/:id")?;
        t.method("get_id", IdApp::get_id).route("/:id")?;
        t.method("hello_id", IdApp::hello_id).route("/:id/hello")?;
        Ok(())
    })
    .unwrap()
    .listen(0)
}

#[tokio::test]
async fn test_ordered_handlers_rewrite_id() {
    let app = compose(&id_app(ResolutionMode::Permissive)).await.unwrap();
    let addr = app.local_addr().await.unwrap();
    let client = common::client();

    assert_eq!(common::get_text(&client, addr, "/42").await, (200, "x0042".to_string()));

    let hello: serde_json::Value = client
        .get(common::url(addr, "/42/hello"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(hello, json!({ "hello": "world", "id": "x0042" }));

    let (status, body) = common::get_text(&client, addr, "/greet/hi").await;
    assert_eq!(status, 200);
    let body: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body, json!({ "router": "greeting", "path": "/hi", "url": "/greet/hi" }));

    let (status, body) = common::get_text(&client, addr, "/").await;
    assert_eq!(status, 404);
    assert_eq!(body, "Cannot GET /");

    app.close().await.unwrap();
}

#[tokio::test]
async fn test_sub_router_shares_root_and_scopes_services() {
    let app = compose(&id_app(ResolutionMode::Permissive)).await.unwrap();

    let instance = app.instance();
    assert!(instance.root.ptr_eq(app.handle()));
    assert!(instance.audit.is_none());

    let mounted = &app.routers()[0];
    assert_eq!(mounted.path(), "/greet");
    let router = mounted.instance::<GreetingRouter>().unwrap();

    assert!(!router.application.is_root());
    assert!(router.application.ptr_eq(mounted.handle()));
    assert!(router.root.ptr_eq(app.handle()));
    assert!(!Arc::ptr_eq(&router.sessions, &instance.sessions));
    assert_ne!(router.sessions.serial, instance.sessions.serial);

    app.close().await.unwrap();
}

#[tokio::test]
async fn test_strict_mode_rejects_unregistered_dependency() {
    match compose(&id_app(ResolutionMode::Strict)).await {
        Err(ComposeError::Construct { name, source }) => {
            assert_eq!(name, "IdApp");
            assert_eq!(source, ContainerError::NotRegistered { name: "AuditLog".into() });
        }
        other => panic!("expected Construct error, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn test_listen_close_state_machine() {
    let app = id_app(ResolutionMode::Permissive).build().unwrap();
    assert_eq!(app.phase(), Phase::Built);

    assert!(matches!(app.close().await, Err(LifecycleError::CloseState { .. })));

    let first = app.listen(0).await.unwrap();
    assert!(matches!(
        app.listen(0).await,
        Err(LifecycleError::ListenState { phase: Phase::Listening })
    ));

    let client = common::client();
    assert_eq!(common::get_text(&client, first, "/7").await.1, "x007");

    app.close().await.unwrap();
    assert_eq!(app.phase(), Phase::Closed);
    assert!(client.get(common::url(first, "/7")).send().await.is_err());

    let second = app.listen(0).await.unwrap();
    assert_eq!(common::get_text(&client, second, "/7").await.1, "x007");
    app.close().await.unwrap();
}

#[tokio::test]
async fn test_sub_router_cannot_listen() {
    let app = id_app(ResolutionMode::Permissive).build().unwrap();
    let mounted = &app.routers()[0];
    assert!(matches!(mounted.handle().listen(0).await, Err(LifecycleError::NotRoot)));
}

#[tokio::test]
async fn test_failing_hooks_do_not_block_startup() {
    let fired = Arc::new(AtomicUsize::new(0));
    let after = Arc::clone(&fired);

    let bp = id_app(ResolutionMode::Permissive)
        .on_init(|_, _| Err("on_init broke".into()))
        .on_start(|_, _| panic!("on_start broke"))
        .after_start(move |_, _| {
            after.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

    let app = compose(&bp).await.unwrap();
    assert_eq!(app.phase(), Phase::Listening);
    assert_eq!(fired.load(Ordering::SeqCst), 1);

    let addr = app.local_addr().await.unwrap();
    assert_eq!(common::get_text(&common::client(), addr, "/1").await.1, "x001");
    app.close().await.unwrap();
}

#[tokio::test]
async fn test_non_class_service_aborts_composition() {
    let bp = id_app(ResolutionMode::Permissive).service(Provider::value("Config", json!({ "a": 1 })));
    match compose(&bp).await {
        Err(ComposeError::MustBeClass { index, name }) => {
            assert_eq!(index, 1);
            assert_eq!(name, "Config");
        }
        other => panic!("expected MustBeClass, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn test_mount_routers_is_not_repeated() {
    let mut app = id_app(ResolutionMode::Permissive).build().unwrap();
    assert!(matches!(app.mount_routers(), Err(ComposeError::AlreadyMounted)));
    assert_eq!(app.routers().len(), 1);

    let addr = app.listen(0).await.unwrap();
    let (status, _) = common::get_text(&common::client(), addr, "/greet/hi").await;
    assert_eq!(status, 200);
    app.close().await.unwrap();
}
