//! Providers: how a registration produces its instance.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::container::{ContainerError, Dependencies};

/// A resolved instance, type-erased.
pub type Instance = Arc<dyn Any + Send + Sync>;

type Factory = Arc<dyn Fn(&Dependencies) -> Result<Instance, ContainerError> + Send + Sync>;

/// How long a resolved instance lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lifetime {
    /// A new instance on every resolution.
    Transient,
    /// One instance per container scope.
    Scoped,
    /// One instance for the registration, shared by every scope.
    Singleton,
}

/// A constructible class: a named type with a static dependency list.
pub trait Service: Sized + Send + Sync + 'static {
    /// Registration name.
    const NAME: &'static str;

    /// Names resolved and handed to [`Service::construct`].
    const DEPENDENCIES: &'static [&'static str] = &[];

    fn construct(deps: &Dependencies) -> Result<Self, ContainerError>;
}

#[derive(Clone)]
enum Source {
    Class(Factory),
    Function(Factory),
    Value(Instance),
}

/// A named source of instances.
#[derive(Clone)]
pub struct Provider {
    name: String,
    dependencies: Vec<String>,
    source: Source,
}

impl fmt::Debug for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.source {
            Source::Class(_) => "class",
            Source::Function(_) => "function",
            Source::Value(_) => "value",
        };
        f.debug_struct("Provider")
            .field("name", &self.name)
            .field("kind", &kind)
            .field("dependencies", &self.dependencies)
            .finish()
    }
}

impl Provider {
    /// A constructible class. Scoped by default.
    pub fn class<S: Service>() -> Self {
        Self {
            name: S::NAME.to_string(),
            dependencies: S::DEPENDENCIES.iter().map(|d| d.to_string()).collect(),
            source: Source::Class(Arc::new(|deps: &Dependencies| {
                S::construct(deps).map(|s| Arc::new(s) as Instance)
            })),
        }
    }

    /// A factory function. Singleton by default.
    pub fn function<T, F>(name: impl Into<String>, f: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&Dependencies) -> Result<T, ContainerError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            dependencies: Vec::new(),
            source: Source::Function(Arc::new(move |deps: &Dependencies| {
                f(deps).map(|v| Arc::new(v) as Instance)
            })),
        }
    }

    /// An already built value.
    pub fn value<T: Send + Sync + 'static>(name: impl Into<String>, value: T) -> Self {
        Self {
            name: name.into(),
            dependencies: Vec::new(),
            source: Source::Value(Arc::new(value)),
        }
    }

    /// Names resolved before a function provider runs.
    pub fn depends_on<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    pub fn is_class(&self) -> bool {
        matches!(self.source, Source::Class(_))
    }

    pub fn default_lifetime(&self) -> Lifetime {
        match self.source {
            Source::Class(_) => Lifetime::Scoped,
            Source::Function(_) | Source::Value(_) => Lifetime::Singleton,
        }
    }

    /// Produce an instance from already resolved dependencies.
    pub(crate) fn provide(&self, deps: &Dependencies) -> Result<Instance, ContainerError> {
        match &self.source {
            Source::Class(factory) | Source::Function(factory) => factory(deps),
            Source::Value(value) => Ok(Arc::clone(value)),
        }
    }
}
