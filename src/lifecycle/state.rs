//! Listen/close state machine of a root application.
//!
//! # Responsibilities
//! - Track the application phase: Unbound → Built → Listening → Closed
//! - Bind the listener and spawn the server task on `listen`
//! - Stop the server gracefully on `close`
//!
//! # Design Decisions
//! - `listen` and `close` are serialized by an async mutex, so concurrent
//!   calls never double-bind the socket
//! - Invalid transitions are reported, never silently ignored
//! - The phase is published through a watch channel for lock-free reads

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

use crate::config::ServerConfig;
use crate::http::{HttpServer, Router};
use crate::lifecycle::shutdown::Shutdown;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Constructed, routes not yet wired.
    Unbound,
    /// Routes and routers wired.
    Built,
    Listening,
    Closed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Unbound => "unbound",
            Phase::Built => "built",
            Phase::Listening => "listening",
            Phase::Closed => "closed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("cannot listen: application is {phase}")]
    ListenState { phase: Phase },

    #[error("cannot listen: sub-routers share the root application's listener")]
    NotRoot,

    #[error("cannot close: application is {phase}")]
    CloseState { phase: Phase },

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server task failed: {0}")]
    Server(String),
}

struct Running {
    addr: SocketAddr,
    shutdown: Shutdown,
    task: JoinHandle<Result<(), std::io::Error>>,
}

/// Lifecycle of one root application.
pub struct Lifecycle {
    router: Arc<Router>,
    config: ServerConfig,
    phase: watch::Sender<Phase>,
    running: Mutex<Option<Running>>,
}

impl fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lifecycle").field("phase", &self.phase()).finish()
    }
}

impl Lifecycle {
    pub fn new(router: Arc<Router>, config: ServerConfig) -> Self {
        let (phase, _) = watch::channel(Phase::Unbound);
        Self {
            router,
            config,
            phase,
            running: Mutex::new(None),
        }
    }

    pub fn phase(&self) -> Phase {
        *self.phase.borrow()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// `Unbound → Built`. Returns false in any other phase.
    pub fn mark_built(&self) -> bool {
        self.phase.send_if_modified(|phase| {
            if *phase == Phase::Unbound {
                *phase = Phase::Built;
                true
            } else {
                false
            }
        })
    }

    /// Bind `bind_address:port` and start serving. Port 0 picks an
    /// ephemeral port; the bound address is returned.
    pub async fn listen(&self, port: u16) -> Result<SocketAddr, LifecycleError> {
        let mut running = self.running.lock().await;
        let phase = self.phase();
        if running.is_some() || !matches!(phase, Phase::Built | Phase::Closed) {
            return Err(LifecycleError::ListenState { phase });
        }

        let address = format!("{}:{}", self.config.listener.bind_address, port);
        let listener = TcpListener::bind(&address)
            .await
            .map_err(|source| LifecycleError::Bind {
                address: address.clone(),
                source,
            })?;
        let addr = listener
            .local_addr()
            .map_err(|source| LifecycleError::Bind { address, source })?;

        let shutdown = Shutdown::new();
        let server = HttpServer::new(Arc::clone(&self.router), &self.config.limits);
        let task = tokio::spawn(server.run(listener, shutdown.subscribe()));

        *running = Some(Running { addr, shutdown, task });
        self.phase.send_replace(Phase::Listening);
        tracing::info!(address = %addr, "Application listening");
        Ok(addr)
    }

    /// Stop serving and wait for the server task to finish.
    pub async fn close(&self) -> Result<(), LifecycleError> {
        let mut running = self.running.lock().await;
        let Some(current) = running.take() else {
            return Err(LifecycleError::CloseState { phase: self.phase() });
        };

        current.shutdown.trigger();
        let outcome = current.task.await;
        self.phase.send_replace(Phase::Closed);
        tracing::info!(address = %current.addr, "Application closed");

        match outcome {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(LifecycleError::Server(e.to_string())),
            Err(e) => Err(LifecycleError::Server(e.to_string())),
        }
    }

    /// Address of the running listener, if any.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.running.lock().await.as_ref().map(|r| r.addr)
    }
}
