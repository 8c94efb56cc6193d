//! Method side-table and decorators.
//!
//! # Responsibilities
//! - Hold a controller's declared methods in declaration order
//! - Attach route metadata to a method through chained decorator calls
//! - Validate paths, arity and verbs when metadata is attached
//!
//! # Design Decisions
//! - Metadata lives beside the callable, never on it
//! - Decorators merge: a verb or description set before or after
//!   `route`/`middleware`/`param` ends up on the same descriptor
//! - Factory methods are invoked exactly once per decoration

use std::fmt;

use crate::routing::descriptor::{HttpMethod, IntoRoutePath, RouteDescriptor, RouteKind, RoutePath};
use crate::routing::error::RouteError;
use crate::routing::handler::{IntoMethod, MethodFn};

/// Largest arity accepted for routes and middleware: request, response, next.
pub const MAX_ROUTE_ARITY: usize = 3;

struct MethodEntry<T> {
    name: String,
    method: MethodFn<T>,
    http_method: Option<HttpMethod>,
    description: Option<String>,
    descriptor: Option<RouteDescriptor<T>>,
}

/// The declared methods of a controller, in declaration order.
pub struct MethodTable<T> {
    entries: Vec<MethodEntry<T>>,
}

impl<T> Default for MethodTable<T> {
    fn default() -> Self {
        Self { entries: Vec::new() }
    }
}

impl<T> fmt::Debug for MethodTable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|e| (&e.name, &e.descriptor)))
            .finish()
    }
}

impl<T: Send + Sync + 'static> MethodTable<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a method. Redeclaring a name replaces the callable and clears
    /// its metadata but keeps its declaration position.
    pub fn method<F, M>(&mut self, name: &str, f: F) -> Decorator<'_, T>
    where
        F: IntoMethod<T, M>,
    {
        let entry = MethodEntry {
            name: name.to_string(),
            method: f.into_method(),
            http_method: None,
            description: None,
            descriptor: None,
        };
        let index = match self.entries.iter().position(|e| e.name == name) {
            Some(i) => {
                self.entries[i] = entry;
                i
            }
            None => {
                self.entries.push(entry);
                self.entries.len() - 1
            }
        };
        Decorator { table: self, index }
    }
}

impl<T> MethodTable<T> {
    /// Re-open an already declared method for decoration.
    pub fn decorate(&mut self, name: &str) -> Option<Decorator<'_, T>> {
        let index = self.entries.iter().position(|e| e.name == name)?;
        Some(Decorator { table: self, index })
    }

    /// Method names in declaration order.
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }

    pub fn descriptor(&self, name: &str) -> Option<&RouteDescriptor<T>> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .and_then(|e| e.descriptor.as_ref())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `(name, descriptor)` for every entry, in declaration order.
    pub(crate) fn entries(&self) -> impl Iterator<Item = (&str, Option<&RouteDescriptor<T>>)> {
        self.entries
            .iter()
            .map(|e| (e.name.as_str(), e.descriptor.as_ref()))
    }
}

/// Chained decorator over one declared method.
pub struct Decorator<'a, T> {
    table: &'a mut MethodTable<T>,
    index: usize,
}

impl<'a, T> Decorator<'a, T> {
    fn entry(&mut self) -> &mut MethodEntry<T> {
        &mut self.table.entries[self.index]
    }

    /// Register the method as a route for its verb (GET unless set).
    pub fn route(self, path: impl IntoRoutePath) -> Result<Self, RouteError> {
        self.describe(RouteKind::Route, path)
    }

    /// Register the method as middleware for every verb under `path`.
    pub fn middleware(self, path: impl IntoRoutePath) -> Result<Self, RouteError> {
        self.describe(RouteKind::Middleware, path)
    }

    /// Register the method as the interceptor for path parameter `name`.
    pub fn param(self, name: &str) -> Result<Self, RouteError> {
        if name.is_empty() {
            return Err(RouteError::InvalidPath {
                kind: RouteKind::Param,
                reason: "parameter name must not be empty".to_string(),
            });
        }
        self.describe(RouteKind::Param, name)
    }

    /// Set the verb from its name. Unknown names are rejected.
    pub fn http_method(self, verb: &str) -> Result<Self, RouteError> {
        let verb = verb.parse::<HttpMethod>()?;
        Ok(self.verb(verb))
    }

    pub fn verb(mut self, verb: HttpMethod) -> Self {
        let entry = self.entry();
        entry.http_method = Some(verb);
        if let Some(descriptor) = entry.descriptor.as_mut() {
            descriptor.http_method = verb;
        }
        self
    }

    pub fn description(mut self, text: impl Into<String>) -> Self {
        let text = text.into();
        let entry = self.entry();
        if let Some(descriptor) = entry.descriptor.as_mut() {
            descriptor.description = text.clone();
        }
        entry.description = Some(text);
        self
    }

    fn describe(mut self, kind: RouteKind, path: impl IntoRoutePath) -> Result<Self, RouteError> {
        let path: RoutePath = path
            .into_route_path()
            .map_err(|e| RouteError::InvalidPath { kind, reason: e.0 })?;

        let entry = self.entry();
        let arity = entry.method.arity();
        if kind != RouteKind::Param && arity > MAX_ROUTE_ARITY {
            return Err(RouteError::InvalidArity {
                kind,
                method: entry.name.clone(),
                arity,
            });
        }

        let handlers = entry.method.handlers();
        if handlers.is_empty() {
            return Err(RouteError::EmptyHandlers {
                kind,
                method: entry.name.clone(),
            });
        }

        tracing::debug!(method = %entry.name, kind = %kind, path = %path, handlers = handlers.len(), "Decorated method");

        entry.descriptor = Some(RouteDescriptor {
            handlers,
            kind,
            path,
            description: entry.description.clone().unwrap_or_default(),
            http_method: entry.http_method.unwrap_or_default(),
        });
        Ok(self)
    }
}
