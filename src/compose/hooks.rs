//! Lifecycle hooks.
//!
//! A blueprint carries an optional callback per lifecycle event. Missing
//! hooks are skipped. A hook that fails or panics is logged and the
//! construction pipeline carries on.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crate::container::Container;
use crate::http::ApplicationHandle;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A hook callback: receives the instance and its construction context.
pub type HookFn<T> = Arc<dyn Fn(&T, &HookContext<'_>) -> Result<(), BoxError> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookKind {
    /// After the instance is constructed, before routes are bound.
    OnInit,
    /// After routes and sub-routers are wired.
    AfterInit,
    /// Immediately before the root starts listening.
    OnStart,
    /// After the listener is bound.
    AfterStart,
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HookKind::OnInit => "on_init",
            HookKind::AfterInit => "after_init",
            HookKind::OnStart => "on_start",
            HookKind::AfterStart => "after_start",
        };
        f.write_str(name)
    }
}

/// What a hook can see of the application being built.
pub struct HookContext<'a> {
    pub blueprint: &'a str,
    pub handle: &'a ApplicationHandle,
    pub container: &'a Container,
}

pub struct Hooks<T> {
    pub on_init: Option<HookFn<T>>,
    pub after_init: Option<HookFn<T>>,
    pub on_start: Option<HookFn<T>>,
    pub after_start: Option<HookFn<T>>,
}

impl<T> Default for Hooks<T> {
    fn default() -> Self {
        Self {
            on_init: None,
            after_init: None,
            on_start: None,
            after_start: None,
        }
    }
}

impl<T> Clone for Hooks<T> {
    fn clone(&self) -> Self {
        Self {
            on_init: self.on_init.clone(),
            after_init: self.after_init.clone(),
            on_start: self.on_start.clone(),
            after_start: self.after_start.clone(),
        }
    }
}

impl<T> fmt::Debug for Hooks<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("on_init", &self.on_init.is_some())
            .field("after_init", &self.after_init.is_some())
            .field("on_start", &self.on_start.is_some())
            .field("after_start", &self.after_start.is_some())
            .finish()
    }
}

impl<T> Hooks<T> {
    pub fn get(&self, kind: HookKind) -> Option<&HookFn<T>> {
        match kind {
            HookKind::OnInit => self.on_init.as_ref(),
            HookKind::AfterInit => self.after_init.as_ref(),
            HookKind::OnStart => self.on_start.as_ref(),
            HookKind::AfterStart => self.after_start.as_ref(),
        }
    }

    pub(crate) fn set(&mut self, kind: HookKind, hook: HookFn<T>) {
        let slot = match kind {
            HookKind::OnInit => &mut self.on_init,
            HookKind::AfterInit => &mut self.after_init,
            HookKind::OnStart => &mut self.on_start,
            HookKind::AfterStart => &mut self.after_start,
        };
        *slot = Some(hook);
    }

    /// Run the hook for `kind` if present. Returns true if it ran cleanly.
    pub fn fire(&self, kind: HookKind, instance: &T, ctx: &HookContext<'_>) -> bool {
        let Some(hook) = self.get(kind) else {
            return false;
        };

        match catch_unwind(AssertUnwindSafe(|| hook(instance, ctx))) {
            Ok(Ok(())) => {
                tracing::debug!(blueprint = %ctx.blueprint, hook = %kind, "Hook completed");
                true
            }
            Ok(Err(e)) => {
                tracing::warn!(blueprint = %ctx.blueprint, hook = %kind, error = %e, "Hook failed");
                false
            }
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "non-string panic payload".to_string());
                tracing::error!(blueprint = %ctx.blueprint, hook = %kind, panic = %message, "Hook panicked");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counter(AtomicUsize);

    fn fire(hooks: &Hooks<Counter>, kind: HookKind, counter: &Counter) -> bool {
        let handle = ApplicationHandle::root(ServerConfig::default());
        let container = Container::new();
        let ctx = HookContext {
            blueprint: "Counter",
            handle: &handle,
            container: &container,
        };
        hooks.fire(kind, counter, &ctx)
    }

    #[test]
    fn test_missing_hook_is_skipped() {
        let hooks = Hooks::<Counter>::default();
        assert!(!fire(&hooks, HookKind::OnInit, &Counter(AtomicUsize::new(0))));
    }

    #[test]
    fn test_present_hook_runs() {
        let mut hooks = Hooks::<Counter>::default();
        hooks.set(
            HookKind::AfterInit,
            Arc::new(|c: &Counter, _ctx: &HookContext<'_>| {
                c.0.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
        );
        let counter = Counter(AtomicUsize::new(0));
        assert!(fire(&hooks, HookKind::AfterInit, &counter));
        assert!(!fire(&hooks, HookKind::OnStart, &counter));
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failing_and_panicking_hooks_are_contained() {
        let mut hooks = Hooks::<Counter>::default();
        hooks.set(
            HookKind::OnInit,
            Arc::new(|_c: &Counter, _ctx: &HookContext<'_>| Err("boom".into())),
        );
        hooks.set(
            HookKind::OnStart,
            Arc::new(|_c: &Counter, _ctx: &HookContext<'_>| panic!("hook exploded")),
        );
        let counter = Counter(AtomicUsize::new(0));
        assert!(!fire(&hooks, HookKind::OnInit, &counter));
        assert!(!fire(&hooks, HookKind::OnStart, &counter));
    }
}
