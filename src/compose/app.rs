//! Construction of composed applications.
//!
//! # Data Flow
//! ```text
//! Blueprint
//!     → handle + container (root, or child of the parent scope)
//!     → built-ins and services registered
//!     → dependencies resolved, instance constructed     [on_init]
//!     → order resolved, routes bound
//!     → sub-routers built recursively and mounted        [after_init]
//!     → Built
//!     → listen (root only, when requested)               [on_start, after_start]
//! ```

use std::any::Any;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::compose::blueprint::{Blueprint, ListenSpec, RouterEntry};
use crate::compose::hooks::{HookContext, HookKind, Hooks};
use crate::compose::ComposeError;
use crate::container::{Container, ContainerError, Instance, Provider};
use crate::http::ApplicationHandle;
use crate::lifecycle::{LifecycleError, Phase};
use crate::routing::{binder, order, RouteInfo};

/// Container name of the handle of the controller being constructed.
pub const APPLICATION: &str = "Application";

/// Container name of the root application's handle.
pub const ROOT_APPLICATION: &str = "RootApplication";

struct Parts<T> {
    instance: Arc<T>,
    handle: ApplicationHandle,
    container: Container,
    routes: Vec<RouteInfo>,
}

impl<T> Parts<T> {
    fn fire(&self, hooks: &Hooks<T>, kind: HookKind, blueprint: &str) {
        let ctx = HookContext {
            blueprint,
            handle: &self.handle,
            container: &self.container,
        };
        hooks.fire(kind, &self.instance, &ctx);
    }
}

/// Steps shared by roots and sub-routers, up to and including binding.
fn construct<T>(bp: &Blueprint<T>, parent: Option<&Container>) -> Result<Parts<T>, ComposeError>
where
    T: Send + Sync + 'static,
{
    if let Some((index, provider)) = bp.services.iter().enumerate().find(|(_, p)| !p.is_class()) {
        return Err(ComposeError::MustBeClass {
            index,
            name: provider.name().to_string(),
        });
    }

    let (handle, container) = match parent {
        None => (
            ApplicationHandle::root(bp.config.clone()),
            Container::with_mode(bp.config.injection.mode),
        ),
        Some(parent) => (ApplicationHandle::sub_router(), Container::child(parent)),
    };

    container.register(Provider::value(APPLICATION, handle.clone()));
    if parent.is_none() {
        container.register(Provider::value(ROOT_APPLICATION, handle.clone()));
    }
    for provider in &bp.services {
        container.register(provider.clone());
    }

    let construct_err = |source: ContainerError| ComposeError::Construct {
        name: bp.name.clone(),
        source,
    };
    let deps = container
        .resolve_all(&bp.dependencies, container.mode())
        .map_err(construct_err)?;
    let instance = Arc::new((bp.constructor)(&deps).map_err(construct_err)?);

    let parts = Parts {
        instance,
        handle,
        container,
        routes: Vec::new(),
    };
    parts.fire(&bp.hooks, HookKind::OnInit, &bp.name);

    let ordered = order::resolve(&bp.methods, &bp.order);
    let routes = binder::bind(&parts.instance, &ordered, parts.handle.router());
    tracing::debug!(blueprint = %bp.name, routes = routes.len(), "Routes bound");

    Ok(Parts { routes, ..parts })
}

/// Build and mount every entry under `handle`. Nothing is mounted unless
/// every entry passes its checks.
fn mount_entries(
    entries: &[RouterEntry],
    handle: &ApplicationHandle,
    container: &Container,
) -> Result<Vec<MountedRouter>, ComposeError> {
    for (index, entry) in entries.iter().enumerate() {
        if let Some(reason) = entry.check() {
            return Err(ComposeError::RouterConfig { index, reason });
        }
    }

    let mut mounted = Vec::with_capacity(entries.len());
    for entry in entries {
        let mut router = entry.blueprint.mount_under(container)?;
        handle.mount(&entry.path, &router.handle);
        router.path = entry.path.clone();
        tracing::debug!(path = %entry.path, router = %router.name, "Router mounted");
        mounted.push(router);
    }
    Ok(mounted)
}

pub(crate) fn build_router<T>(bp: &Blueprint<T>, parent: &Container) -> Result<MountedRouter, ComposeError>
where
    T: Send + Sync + 'static,
{
    let parts = construct(bp, Some(parent))?;
    let routers = mount_entries(&bp.routers, &parts.handle, &parts.container)?;
    parts.fire(&bp.hooks, HookKind::AfterInit, &bp.name);

    Ok(MountedRouter {
        name: bp.name.clone(),
        path: String::new(),
        instance: parts.instance,
        handle: parts.handle,
        container: parts.container,
        routes: parts.routes,
        routers,
    })
}

/// A constructed sub-router.
pub struct MountedRouter {
    name: String,
    path: String,
    instance: Instance,
    handle: ApplicationHandle,
    container: Container,
    routes: Vec<RouteInfo>,
    routers: Vec<MountedRouter>,
}

impl fmt::Debug for MountedRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MountedRouter")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("routes", &self.routes)
            .field("routers", &self.routers)
            .finish()
    }
}

impl MountedRouter {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Mount path relative to the parent.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The controller instance, if it is a `T`.
    pub fn instance<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        Arc::clone(&self.instance).downcast::<T>().ok()
    }

    pub fn handle(&self) -> &ApplicationHandle {
        &self.handle
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    pub fn routes(&self) -> &[RouteInfo] {
        &self.routes
    }

    pub fn routers(&self) -> &[MountedRouter] {
        &self.routers
    }
}

/// A composed root application.
pub struct App<T> {
    name: String,
    instance: Arc<T>,
    handle: ApplicationHandle,
    container: Container,
    routes: Vec<RouteInfo>,
    routers: Vec<MountedRouter>,
    entries: Vec<RouterEntry>,
    mounted: bool,
    hooks: Hooks<T>,
}

impl<T> fmt::Debug for App<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("App")
            .field("name", &self.name)
            .field("handle", &self.handle)
            .field("routes", &self.routes)
            .field("routers", &self.routers)
            .finish()
    }
}

impl<T: Send + Sync + 'static> Blueprint<T> {
    /// Construct as a root application, without listening.
    pub fn build(&self) -> Result<App<T>, ComposeError> {
        let parts = construct(self, None)?;
        let mut app = App {
            name: self.name.clone(),
            instance: parts.instance,
            handle: parts.handle,
            container: parts.container,
            routes: parts.routes,
            routers: Vec::new(),
            entries: self.routers.clone(),
            mounted: false,
            hooks: self.hooks.clone(),
        };
        app.mount_routers()?;
        app.fire(HookKind::AfterInit);
        app.handle.mark_built();
        tracing::info!(blueprint = %app.name, routes = app.routes.len(), routers = app.routers.len(), "Application built");
        Ok(app)
    }
}

impl<T: Send + Sync + 'static> App<T> {
    fn fire(&self, kind: HookKind) {
        let ctx = HookContext {
            blueprint: &self.name,
            handle: &self.handle,
            container: &self.container,
        };
        self.hooks.fire(kind, &self.instance, &ctx);
    }

    /// Build and mount the declared sub-routers. Runs once; a second call
    /// fails with `AlreadyMounted` and registers nothing.
    pub fn mount_routers(&mut self) -> Result<(), ComposeError> {
        if self.mounted {
            return Err(ComposeError::AlreadyMounted);
        }
        self.routers = mount_entries(&self.entries, &self.handle, &self.container)?;
        self.mounted = true;
        Ok(())
    }

    pub(crate) async fn start(&self, spec: &ListenSpec) -> Result<SocketAddr, ComposeError> {
        self.fire(HookKind::OnStart);
        let addr = self.handle.listen(spec.port).await?;
        if let Some(callback) = &spec.callback {
            callback(addr.port());
        }
        self.fire(HookKind::AfterStart);
        Ok(addr)
    }

    pub fn instance(&self) -> &Arc<T> {
        &self.instance
    }

    pub fn handle(&self) -> &ApplicationHandle {
        &self.handle
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    /// Routes bound on this controller, in registration order.
    pub fn routes(&self) -> &[RouteInfo] {
        &self.routes
    }

    pub fn routers(&self) -> &[MountedRouter] {
        &self.routers
    }

    pub fn phase(&self) -> Phase {
        self.handle.phase()
    }

    pub async fn listen(&self, port: u16) -> Result<SocketAddr, LifecycleError> {
        self.handle.listen(port).await
    }

    pub async fn close(&self) -> Result<(), LifecycleError> {
        self.handle.close().await
    }

    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.handle.local_addr().await
    }

    /// The axum service, for driving the application without a socket.
    pub fn service(&self) -> axum::Router {
        self.handle.service()
    }
}

/// Construct `blueprint` as a root application and start listening if it
/// declares listen settings.
pub async fn compose<T: Send + Sync + 'static>(blueprint: &Blueprint<T>) -> Result<App<T>, ComposeError> {
    let app = blueprint.build()?;
    if let Some(spec) = blueprint.listen_spec() {
        app.start(spec).await?;
    }
    Ok(app)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::{Dependencies, ResolutionMode, Service};
    use crate::http::{Request, Response};
    use crate::routing::{Flow, Next, RouteKind};
    use crate::ServerConfig;
    use axum::body::{to_bytes, Body};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tower::ServiceExt;

    struct Ids;

    impl Ids {
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
    }

    fn ids_blueprint() -> Blueprint<Ids> {
        Blueprint::new("Ids", |_| Ok(Ids))
            .order(["mod_id", "add_id"])
            .routes(|t| {
                t.method("get_id", Ids::get_id).route("/:id")?;
                t.method("add_id", Ids::add_id).middleware("/:id")?;
                t.method("mod_id", Ids::mod_id).param("id")?;
                Ok(())
            })
            .unwrap()
    }

    async fn get(app: axum::Router, uri: &str) -> (u16, String) {
        let request = axum::http::Request::builder().uri(uri).body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status().as_u16();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_ordered_param_middleware_route() {
        let app = ids_blueprint().build().unwrap();
        assert_eq!(app.phase(), Phase::Built);

        let kinds: Vec<_> = app.routes().iter().map(|r| (r.method.as_str(), r.kind)).collect();
        assert_eq!(
            kinds,
            vec![
                ("mod_id", RouteKind::Param),
                ("add_id", RouteKind::Middleware),
                ("get_id", RouteKind::Route),
            ]
        );

        assert_eq!(get(app.service(), "/42").await, (200, "x0042".to_string()));
    }

    struct ParamIds;

    impl ParamIds {
        fn mod_id(&self, req: &mut Request, _res: &mut Response, next: Next, id: &str) -> Flow {
            req.params.insert("id".into(), format!("00{id}"));
            next.run()
        }

        fn add_id(&self, req: &mut Request, _res: &mut Response, next: Next) -> Flow {
            let id = req.param("id").unwrap_or_default().to_string();
            req.params.insert("id".into(), format!("x{id}"));
            next.run()
        }

        fn get_id(&self, req: &mut Request, res: &mut Response) -> Flow {
            let id = req.param("id").unwrap_or_default().to_string();
            res.send(id)
        }
    }

    #[tokio::test]
    async fn test_param_rewrites_flow_through_request_params() {
        let app = Blueprint::new("ParamIds", |_| Ok(ParamIds))
            .order(["mod_id", "add_id"])
            .routes(|t| {
                t.method("get_id", ParamIds::get_id).route("/:id")?;
                t.method("add_id", ParamIds::add_id).middleware("/:id")?;
                t.method("mod_id", ParamIds::mod_id).param("id")?;
                Ok(())
            })
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(get(app.service(), "/42").await, (200, "x0042".to_string()));
    }

    struct Store {
        hits: AtomicUsize,
    }

    impl Service for Store {
        const NAME: &'static str = "Store";

        fn construct(_deps: &Dependencies) -> Result<Self, ContainerError> {
            Ok(Store { hits: AtomicUsize::new(0) })
        }
    }

    struct Child {
        store: Arc<Store>,
        root: Arc<ApplicationHandle>,
        own: Arc<ApplicationHandle>,
    }

    impl Service for Child {
        const NAME: &'static str = "Child";
        const DEPENDENCIES: &'static [&'static str] = &["Store", ROOT_APPLICATION, APPLICATION];

        fn construct(deps: &Dependencies) -> Result<Self, ContainerError> {
            Ok(Child {
                store: deps.service::<Store>()?,
                root: deps.get(ROOT_APPLICATION)?,
                own: deps.get(APPLICATION)?,
            })
        }
    }

    impl Child {
        fn hit(&self, _req: &mut Request, res: &mut Response) -> Flow {
            let n = self.store.hits.fetch_add(1, Ordering::SeqCst) + 1;
            res.send(format!("child {n}"))
        }
    }

    struct Parent {
        store: Arc<Store>,
    }

    fn parent_blueprint() -> Blueprint<Parent> {
        let child = Blueprint::<Child>::from_service()
            .service(Provider::class::<Store>())
            .routes(|t| {
                t.method("hit", Child::hit).route("/hit")?;
                Ok(())
            })
            .unwrap();

        Blueprint::new("Parent", |deps: &Dependencies| {
            Ok(Parent {
                store: deps.service::<Store>()?,
            })
        })
        .inject(["Store"])
        .service(Provider::class::<Store>())
        .router("/child", child)
    }

    #[tokio::test]
    async fn test_sub_router_scoping() {
        let app = parent_blueprint().build().unwrap();
        assert_eq!(app.routers().len(), 1);

        let mounted = &app.routers()[0];
        assert_eq!(mounted.path(), "/child");
        assert!(!mounted.handle().is_root());
        assert!(mounted.instance::<Parent>().is_none());

        let child = mounted.instance::<Child>().unwrap();
        assert!(child.root.ptr_eq(app.handle()));
        assert!(child.own.ptr_eq(mounted.handle()));
        assert!(!Arc::ptr_eq(&child.store, &app.instance().store));

        assert_eq!(get(app.service(), "/child/hit").await, (200, "child 1".to_string()));
        assert_eq!(get(app.service(), "/child/hit").await, (200, "child 2".to_string()));
        assert_eq!(app.instance().store.hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_mount_routers_twice_is_rejected() {
        let mut app = parent_blueprint().build().unwrap();
        let layers = app.handle().router().len();
        assert!(matches!(app.mount_routers(), Err(ComposeError::AlreadyMounted)));
        assert_eq!(app.handle().router().len(), layers);
        assert_eq!(app.routers().len(), 1);
    }

    #[test]
    fn test_non_class_service_rejected_before_binding() {
        let constructed = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&constructed);
        let bp = Blueprint::new("Ids", move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
            Ok(Ids)
        })
        .service(Provider::class::<Store>())
        .service(Provider::value("Settings", 42u32))
        .routes(|t| {
            t.method("get_id", Ids::get_id).route("/:id")?;
            Ok(())
        })
        .unwrap();

        match bp.build() {
            Err(ComposeError::MustBeClass { index, name }) => {
                assert_eq!(index, 1);
                assert_eq!(name, "Settings");
            }
            other => panic!("expected MustBeClass, got {other:?}"),
        }
        assert_eq!(constructed.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_router_config_rejects_relative_path() {
        let bp = Blueprint::new("Root", |_| Ok(Ids)).router("child", ids_blueprint());
        assert!(matches!(bp.build(), Err(ComposeError::RouterConfig { index: 0, .. })));
    }

    #[test]
    fn test_router_config_rejects_listening_sub_router() {
        let bp = Blueprint::new("Root", |_| Ok(Ids))
            .router("/ok", ids_blueprint())
            .router("/bad", ids_blueprint().listen(0));
        assert!(matches!(bp.build(), Err(ComposeError::RouterConfig { index: 1, .. })));
    }

    #[test]
    fn test_strict_mode_fails_on_missing_dependency() {
        let bp = Blueprint::new("Root", |_| Ok(Ids)).inject(["Missing"]);
        match bp.build() {
            Err(ComposeError::Construct { name, source }) => {
                assert_eq!(name, "Root");
                assert_eq!(source, ContainerError::NotRegistered { name: "Missing".into() });
            }
            other => panic!("expected Construct, got {other:?}"),
        }
    }

    #[test]
    fn test_constructor_failure_aborts_build() {
        let bp = Blueprint::new("Root", |_| -> Result<Ids, ContainerError> {
            Err(ContainerError::construction("Root", "database unavailable"))
        });
        match bp.build() {
            Err(ComposeError::Construct { name, source }) => {
                assert_eq!(name, "Root");
                assert_eq!(
                    source,
                    ContainerError::Construction {
                        name: "Root".into(),
                        reason: "database unavailable".into()
                    }
                );
            }
            other => panic!("expected Construct, got {other:?}"),
        }
    }

    #[test]
    fn test_permissive_mode_substitutes_absent() {
        let mut config = ServerConfig::default();
        config.injection.mode = ResolutionMode::Permissive;

        let bp = Blueprint::new("Root", |deps: &Dependencies| {
            assert!(deps.is_absent("Missing"));
            assert!(deps.optional::<Store>("Missing").is_none());
            Ok(Ids)
        })
        .inject(["Missing"])
        .config(config);
        assert!(bp.build().is_ok());
    }

    #[tokio::test]
    async fn test_hooks_fire_in_order_and_failures_do_not_block() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let (a, b, c, d) = (log.clone(), log.clone(), log.clone(), log.clone());
        let port_seen = Arc::new(AtomicUsize::new(0));
        let port_out = Arc::clone(&port_seen);

        let bp = ids_blueprint()
            .on_init(move |_, ctx| {
                assert_eq!(ctx.handle.phase(), Phase::Unbound);
                a.lock().unwrap().push("on_init");
                Err("on_init failed".into())
            })
            .after_init(move |_, _| {
                b.lock().unwrap().push("after_init");
                panic!("after_init panicked");
            })
            .on_start(move |_, ctx| {
                assert_eq!(ctx.handle.phase(), Phase::Built);
                c.lock().unwrap().push("on_start");
                Ok(())
            })
            .after_start(move |_, ctx| {
                assert_eq!(ctx.handle.phase(), Phase::Listening);
                d.lock().unwrap().push("after_start");
                Ok(())
            })
            .listen_with(0, move |port| {
                port_out.store(port as usize, Ordering::SeqCst);
            });

        let app = compose(&bp).await.unwrap();
        assert_eq!(app.phase(), Phase::Listening);
        assert_eq!(
            *log.lock().unwrap(),
            vec!["on_init", "after_init", "on_start", "after_start"]
        );

        let addr = app.local_addr().await.unwrap();
        assert_eq!(port_seen.load(Ordering::SeqCst), addr.port() as usize);
        app.close().await.unwrap();
        assert_eq!(app.phase(), Phase::Closed);
    }

    #[tokio::test]
    async fn test_compose_without_listen_stays_built() {
        let app = compose(&ids_blueprint()).await.unwrap();
        assert_eq!(app.phase(), Phase::Built);
        assert!(matches!(app.close().await, Err(LifecycleError::CloseState { .. })));
    }
}
