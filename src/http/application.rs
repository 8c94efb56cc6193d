//! Application handles.
//!
//! A handle is either a root application, which owns the listen/close
//! lifecycle, or a mountable sub-router, which delegates it to its root.
//! Handles are cheap to clone and compare by identity.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::config::ServerConfig;
use crate::http::{HttpServer, Router};
use crate::lifecycle::{Lifecycle, LifecycleError, Phase};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Root,
    Router,
}

struct Inner {
    role: Role,
    router: Arc<Router>,
    lifecycle: Option<Lifecycle>,
}

#[derive(Clone)]
pub struct ApplicationHandle {
    inner: Arc<Inner>,
}

impl fmt::Debug for ApplicationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApplicationHandle")
            .field("role", &self.inner.role)
            .field("router", &self.inner.router)
            .field("phase", &self.phase())
            .finish()
    }
}

impl ApplicationHandle {
    /// A root application served with `config`.
    pub fn root(config: ServerConfig) -> Self {
        let router = Arc::new(Router::new());
        let lifecycle = Lifecycle::new(Arc::clone(&router), config);
        Self {
            inner: Arc::new(Inner {
                role: Role::Root,
                router,
                lifecycle: Some(lifecycle),
            }),
        }
    }

    /// A sub-router, to be mounted on another handle.
    pub fn sub_router() -> Self {
        Self {
            inner: Arc::new(Inner {
                role: Role::Router,
                router: Arc::new(Router::new()),
                lifecycle: None,
            }),
        }
    }

    pub fn role(&self) -> Role {
        self.inner.role
    }

    pub fn is_root(&self) -> bool {
        self.inner.role == Role::Root
    }

    pub fn router(&self) -> &Arc<Router> {
        &self.inner.router
    }

    /// Mount `child` under `path`.
    pub fn mount(&self, path: &str, child: &ApplicationHandle) {
        self.inner.router.mount(path, Arc::clone(&child.inner.router));
    }

    /// Lifecycle phase. Sub-routers report `Built` once constructed, since
    /// they have no lifecycle of their own.
    pub fn phase(&self) -> Phase {
        match &self.inner.lifecycle {
            Some(lifecycle) => lifecycle.phase(),
            None => Phase::Built,
        }
    }

    pub(crate) fn mark_built(&self) -> bool {
        self.inner
            .lifecycle
            .as_ref()
            .map(Lifecycle::mark_built)
            .unwrap_or(false)
    }

    pub async fn listen(&self, port: u16) -> Result<SocketAddr, LifecycleError> {
        match &self.inner.lifecycle {
            Some(lifecycle) => lifecycle.listen(port).await,
            None => Err(LifecycleError::NotRoot),
        }
    }

    pub async fn close(&self) -> Result<(), LifecycleError> {
        match &self.inner.lifecycle {
            Some(lifecycle) => lifecycle.close().await,
            None => Err(LifecycleError::CloseState { phase: Phase::Built }),
        }
    }

    pub async fn local_addr(&self) -> Option<SocketAddr> {
        match &self.inner.lifecycle {
            Some(lifecycle) => lifecycle.local_addr().await,
            None => None,
        }
    }

    /// The axum service for this handle, without binding a socket.
    pub fn service(&self) -> axum::Router {
        let limits = self
            .inner
            .lifecycle
            .as_ref()
            .map(|lc| lc.config().limits.clone())
            .unwrap_or_default();
        HttpServer::new(Arc::clone(&self.inner.router), &limits).into_router()
    }

    /// True if both handles refer to the same application.
    pub fn ptr_eq(&self, other: &ApplicationHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roles() {
        let root = ApplicationHandle::root(ServerConfig::default());
        let sub = ApplicationHandle::sub_router();
        assert!(root.is_root());
        assert!(!sub.is_root());
        assert_eq!(root.phase(), Phase::Unbound);
        assert!(root.ptr_eq(&root.clone()));
        assert!(!root.ptr_eq(&sub));
    }

    #[tokio::test]
    async fn test_sub_router_cannot_listen() {
        let sub = ApplicationHandle::sub_router();
        assert!(matches!(sub.listen(0).await, Err(LifecycleError::NotRoot)));
        assert!(matches!(sub.close().await, Err(LifecycleError::CloseState { .. })));
    }

    #[test]
    fn test_mount_adds_layer() {
        let root = ApplicationHandle::root(ServerConfig::default());
        root.mount("/api", &ApplicationHandle::sub_router());
        assert_eq!(root.router().len(), 1);
    }
}
