//! The resolution container.
//!
//! # Responsibilities
//! - Hold named registrations, chained to an optional parent scope
//! - Resolve names to instances, honoring each registration's lifetime
//! - Build the dependency record handed to a constructor
//!
//! # Design Decisions
//! - No map guard is held across a nested resolution; DashMap shards would
//!   deadlock on re-entry
//! - Singletons resolve their dependencies from the container that
//!   registered them, scoped instances from the container resolving them
//! - Cycles are detected with an explicit resolution stack

use std::any::{type_name, Any};
use std::fmt;
use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::container::provider::{Instance, Lifetime, Provider, Service};
use crate::container::ContainerError;

/// What to do when a declared dependency cannot be found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionMode {
    /// Fail construction.
    #[default]
    Strict,
    /// Substitute an absent slot and log a warning.
    Permissive,
}

struct Registration {
    provider: Provider,
    lifetime: Lifetime,
    singleton: OnceLock<Instance>,
}

struct Inner {
    parent: Option<Container>,
    mode: ResolutionMode,
    registrations: DashMap<String, Arc<Registration>>,
    scoped: DashMap<String, Instance>,
}

/// A resolution scope. Clones share the same scope.
#[derive(Clone)]
pub struct Container {
    inner: Arc<Inner>,
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<String> = self
            .inner
            .registrations
            .iter()
            .map(|r| r.key().clone())
            .collect();
        names.sort();
        f.debug_struct("Container")
            .field("registrations", &names)
            .field("mode", &self.inner.mode)
            .field("has_parent", &self.inner.parent.is_some())
            .finish()
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl Container {
    /// A root scope in strict mode.
    pub fn new() -> Self {
        Self::with_mode(ResolutionMode::Strict)
    }

    pub fn with_mode(mode: ResolutionMode) -> Self {
        Self {
            inner: Arc::new(Inner {
                parent: None,
                mode,
                registrations: DashMap::new(),
                scoped: DashMap::new(),
            }),
        }
    }

    /// A child scope. Lookups it cannot satisfy go to `parent`.
    pub fn child(parent: &Container) -> Self {
        Self {
            inner: Arc::new(Inner {
                parent: Some(parent.clone()),
                mode: parent.inner.mode,
                registrations: DashMap::new(),
                scoped: DashMap::new(),
            }),
        }
    }

    pub fn mode(&self) -> ResolutionMode {
        self.inner.mode
    }

    pub fn parent(&self) -> Option<&Container> {
        self.inner.parent.as_ref()
    }

    /// Register with the provider's default lifetime.
    pub fn register(&self, provider: Provider) {
        let lifetime = provider.default_lifetime();
        self.register_with(provider, lifetime);
    }

    /// Register, replacing any earlier registration of the same name in
    /// this scope.
    pub fn register_with(&self, provider: Provider, lifetime: Lifetime) {
        let name = provider.name().to_string();
        tracing::debug!(name = %name, lifetime = ?lifetime, "Registering provider");
        self.inner.scoped.remove(&name);
        self.inner.registrations.insert(
            name,
            Arc::new(Registration {
                provider,
                lifetime,
                singleton: OnceLock::new(),
            }),
        );
    }

    /// True if `name` is registered here or in a parent scope.
    pub fn has(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    pub fn resolve(&self, name: &str) -> Result<Instance, ContainerError> {
        self.resolve_in(name, &mut Vec::new())
    }

    pub fn resolve_as<T: Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>, ContainerError> {
        downcast(name, self.resolve(name)?)
    }

    pub fn resolve_service<S: Service>(&self) -> Result<Arc<S>, ContainerError> {
        self.resolve_as::<S>(S::NAME)
    }

    /// Resolve every name in `names` for a constructor.
    pub fn resolve_all<S: AsRef<str>>(
        &self,
        names: &[S],
        mode: ResolutionMode,
    ) -> Result<Dependencies, ContainerError> {
        self.collect(names, mode, &mut Vec::new())
    }

    fn lookup(&self, name: &str) -> Option<(Container, Arc<Registration>)> {
        let mut scope = Some(self);
        while let Some(container) = scope {
            if let Some(found) = container.inner.registrations.get(name) {
                return Some((container.clone(), Arc::clone(found.value())));
            }
            scope = container.inner.parent.as_ref();
        }
        None
    }

    fn resolve_in(&self, name: &str, stack: &mut Vec<String>) -> Result<Instance, ContainerError> {
        if stack.iter().any(|n| n == name) {
            let mut path = stack.clone();
            path.push(name.to_string());
            return Err(ContainerError::Cycle { path: path.join(" -> ") });
        }

        let cached = self.inner.scoped.get(name).map(|hit| Arc::clone(hit.value()));
        if let Some(instance) = cached {
            return Ok(instance);
        }

        let (owner, registration) = self.lookup(name).ok_or_else(|| ContainerError::NotRegistered {
            name: name.to_string(),
        })?;

        match registration.lifetime {
            Lifetime::Singleton => {
                if let Some(instance) = registration.singleton.get() {
                    return Ok(Arc::clone(instance));
                }
                let instance = owner.construct(name, &registration.provider, stack)?;
                // A concurrent resolution may have won; keep the first.
                let _ = registration.singleton.set(Arc::clone(&instance));
                Ok(registration
                    .singleton
                    .get()
                    .map(Arc::clone)
                    .unwrap_or(instance))
            }
            Lifetime::Scoped => {
                let instance = self.construct(name, &registration.provider, stack)?;
                let cached = self
                    .inner
                    .scoped
                    .entry(name.to_string())
                    .or_insert(instance)
                    .value()
                    .clone();
                Ok(cached)
            }
            Lifetime::Transient => self.construct(name, &registration.provider, stack),
        }
    }

    fn construct(
        &self,
        name: &str,
        provider: &Provider,
        stack: &mut Vec<String>,
    ) -> Result<Instance, ContainerError> {
        stack.push(name.to_string());
        let deps = self.collect(provider.dependencies(), self.inner.mode, stack);
        stack.pop();
        provider.provide(&deps?)
    }

    fn collect<S: AsRef<str>>(
        &self,
        names: &[S],
        mode: ResolutionMode,
        stack: &mut Vec<String>,
    ) -> Result<Dependencies, ContainerError> {
        let mut slots = Vec::with_capacity(names.len());
        for name in names {
            let name = name.as_ref();
            match self.resolve_in(name, stack) {
                Ok(instance) => slots.push((name.to_string(), Some(instance))),
                Err(ContainerError::NotRegistered { name: missing }) if mode == ResolutionMode::Permissive => {
                    tracing::warn!(dependency = %name, missing = %missing, "Dependency not registered, injecting absent value");
                    slots.push((name.to_string(), None));
                }
                Err(e) => return Err(e),
            }
        }
        Ok(Dependencies { slots })
    }
}

fn downcast<T: Any + Send + Sync>(name: &str, instance: Instance) -> Result<Arc<T>, ContainerError> {
    instance
        .downcast::<T>()
        .map_err(|_| ContainerError::TypeMismatch {
            name: name.to_string(),
            expected: type_name::<T>(),
        })
}

/// The resolved dependencies of one constructor, in declaration order.
/// A slot is absent when permissive resolution could not fill it.
#[derive(Clone, Default)]
pub struct Dependencies {
    slots: Vec<(String, Option<Instance>)>,
}

impl fmt::Debug for Dependencies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.slots.iter().map(|(name, slot)| (name, slot.is_some())))
            .finish()
    }
}

impl Dependencies {
    pub fn get<T: Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>, ContainerError> {
        match self.slots.iter().find(|(n, _)| n == name) {
            Some((_, Some(instance))) => downcast(name, Arc::clone(instance)),
            Some((_, None)) => Err(ContainerError::Absent { name: name.to_string() }),
            None => Err(ContainerError::NotRegistered { name: name.to_string() }),
        }
    }

    /// The dependency, or `None` if it is absent, undeclared or of another type.
    pub fn optional<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        self.get(name).ok()
    }

    pub fn service<S: Service>(&self) -> Result<Arc<S>, ContainerError> {
        self.get::<S>(S::NAME)
    }

    pub fn is_absent(&self, name: &str) -> bool {
        self.slots.iter().any(|(n, slot)| n == name && slot.is_none())
    }

    /// Declared names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.slots.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
