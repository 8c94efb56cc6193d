//! Blueprints: the declarative description of a controller.
//!
//! A blueprint records everything composition needs to build one
//! controller instance: its constructor and dependency names, its method
//! table and order list, the services it provides, the routers it mounts,
//! its hooks, and for a root application its listen settings and config.

use std::fmt;
use std::sync::Arc;

use crate::compose::app::{build_router, MountedRouter};
use crate::compose::hooks::{BoxError, HookContext, HookFn, HookKind, Hooks};
use crate::compose::ComposeError;
use crate::config::ServerConfig;
use crate::container::{Container, ContainerError, Dependencies, Provider, Service};
use crate::routing::{MethodTable, RouteError};

pub type Constructor<T> = Arc<dyn Fn(&Dependencies) -> Result<T, ContainerError> + Send + Sync>;

/// Called with the bound port once the root is listening.
pub type ListenCallback = Arc<dyn Fn(u16) + Send + Sync>;

#[derive(Clone)]
pub struct ListenSpec {
    pub port: u16,
    pub callback: Option<ListenCallback>,
}

impl fmt::Debug for ListenSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenSpec")
            .field("port", &self.port)
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

/// A blueprint that can be built as a sub-router, whatever its instance type.
pub trait Mountable: Send + Sync {
    fn name(&self) -> &str;

    /// True if the blueprint declares its own listen settings.
    fn listens(&self) -> bool;

    /// Build as a sub-router whose container chains to `parent`.
    fn mount_under(&self, parent: &Container) -> Result<MountedRouter, ComposeError>;
}

/// A sub-router declaration: mount `blueprint` at `path`.
#[derive(Clone)]
pub struct RouterEntry {
    pub path: String,
    pub blueprint: Arc<dyn Mountable>,
}

impl fmt::Debug for RouterEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouterEntry")
            .field("path", &self.path)
            .field("blueprint", &self.blueprint.name())
            .finish()
    }
}

impl RouterEntry {
    /// Reason this entry cannot be mounted, if any.
    pub(crate) fn check(&self) -> Option<String> {
        if !self.path.is_empty() && !self.path.starts_with('/') {
            return Some(format!("path {:?} must be empty or start with '/'", self.path));
        }
        if self.blueprint.listens() {
            return Some(format!(
                "{} declares listen settings; sub-routers share the root listener",
                self.blueprint.name()
            ));
        }
        None
    }
}

pub struct Blueprint<T> {
    pub(crate) name: String,
    pub(crate) dependencies: Vec<String>,
    pub(crate) constructor: Constructor<T>,
    pub(crate) methods: MethodTable<T>,
    pub(crate) order: Vec<String>,
    pub(crate) services: Vec<Provider>,
    pub(crate) routers: Vec<RouterEntry>,
    pub(crate) listen: Option<ListenSpec>,
    pub(crate) hooks: Hooks<T>,
    pub(crate) config: ServerConfig,
}

impl<T> fmt::Debug for Blueprint<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Blueprint")
            .field("name", &self.name)
            .field("dependencies", &self.dependencies)
            .field("methods", &self.methods.names())
            .field("order", &self.order)
            .field("services", &self.services)
            .field("routers", &self.routers)
            .field("listen", &self.listen)
            .field("hooks", &self.hooks)
            .finish()
    }
}

impl<T: Send + Sync + 'static> Blueprint<T> {
    pub fn new<F>(name: impl Into<String>, constructor: F) -> Self
    where
        F: Fn(&Dependencies) -> Result<T, ContainerError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            dependencies: Vec::new(),
            constructor: Arc::new(constructor),
            methods: MethodTable::new(),
            order: Vec::new(),
            services: Vec::new(),
            routers: Vec::new(),
            listen: None,
            hooks: Hooks::default(),
            config: ServerConfig::default(),
        }
    }

    /// Names resolved from the container and handed to the constructor.
    pub fn inject<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = names.into_iter().map(Into::into).collect();
        self
    }

    /// Provide a service to this controller's scope and its sub-routers.
    pub fn service(mut self, provider: Provider) -> Self {
        self.services.push(provider);
        self
    }

    /// Mount `blueprint` as a sub-router at `path`.
    pub fn router<U: Send + Sync + 'static>(mut self, path: impl Into<String>, blueprint: Blueprint<U>) -> Self {
        self.routers.push(RouterEntry {
            path: path.into(),
            blueprint: Arc::new(blueprint),
        });
        self
    }

    /// Listen on `port` once composed. Only meaningful for a root.
    pub fn listen(mut self, port: u16) -> Self {
        self.listen = Some(ListenSpec { port, callback: None });
        self
    }

    pub fn listen_with<F>(mut self, port: u16, callback: F) -> Self
    where
        F: Fn(u16) + Send + Sync + 'static,
    {
        self.listen = Some(ListenSpec {
            port,
            callback: Some(Arc::new(callback)),
        });
        self
    }

    /// Methods registered first, in this order.
    pub fn order<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.order = names.into_iter().map(Into::into).collect();
        self
    }

    /// Declare and decorate methods.
    ///
    /// ```ignore
    /// let bp = Blueprint::new("Api", |_| Ok(Api))
    ///     .routes(|t| {
    ///         t.method("get_id", Api::get_id).route("/:id")?;
    ///         Ok(())
    ///     })?;
    /// ```
    pub fn routes<F>(mut self, declare: F) -> Result<Self, RouteError>
    where
        F: FnOnce(&mut MethodTable<T>) -> Result<(), RouteError>,
    {
        declare(&mut self.methods)?;
        Ok(self)
    }

    pub fn hooks(mut self, hooks: Hooks<T>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn on_init<F>(self, f: F) -> Self
    where
        F: Fn(&T, &HookContext<'_>) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.hook(HookKind::OnInit, Arc::new(f))
    }

    pub fn after_init<F>(self, f: F) -> Self
    where
        F: Fn(&T, &HookContext<'_>) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.hook(HookKind::AfterInit, Arc::new(f))
    }

    pub fn on_start<F>(self, f: F) -> Self
    where
        F: Fn(&T, &HookContext<'_>) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.hook(HookKind::OnStart, Arc::new(f))
    }

    pub fn after_start<F>(self, f: F) -> Self
    where
        F: Fn(&T, &HookContext<'_>) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.hook(HookKind::AfterStart, Arc::new(f))
    }

    fn hook(mut self, kind: HookKind, f: HookFn<T>) -> Self {
        self.hooks.set(kind, f);
        self
    }

    /// Server settings used when this blueprint is composed as a root.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }
}

impl<S: Service> Blueprint<S> {
    /// A blueprint constructed like a service: same name, dependencies and
    /// constructor.
    pub fn from_service() -> Self {
        Blueprint::new(S::NAME, S::construct).inject(S::DEPENDENCIES.iter().copied())
    }
}

impl<T> Blueprint<T> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    pub fn methods(&self) -> &MethodTable<T> {
        &self.methods
    }

    pub fn listen_spec(&self) -> Option<&ListenSpec> {
        self.listen.as_ref()
    }

    pub fn router_entries(&self) -> &[RouterEntry] {
        &self.routers
    }
}

impl<T: Send + Sync + 'static> Mountable for Blueprint<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn listens(&self) -> bool {
        self.listen.is_some()
    }

    fn mount_under(&self, parent: &Container) -> Result<MountedRouter, ComposeError> {
        build_router(self, parent)
    }
}
