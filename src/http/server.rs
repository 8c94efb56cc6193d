//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the axum Router that feeds every request into a layered `Router`
//! - Wire up middleware (tracing, timeout, request ID)
//! - Buffer the request body within the configured limit
//! - Answer 500 when a handler panics instead of dropping the connection
//! - Bind server to listener and stop on the shutdown signal
//! - Observability (metrics, correlation IDs)

use std::net::SocketAddr;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, State},
    http::StatusCode,
    response::IntoResponse,
    routing::any,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::LimitsConfig;
use crate::http::{Request, Response, Router};
use crate::observability::metrics;
use crate::routing::Flow;

/// State injected into the dispatch handler.
#[derive(Clone)]
struct DispatchState {
    router: Arc<Router>,
    max_body_size: usize,
}

/// HTTP server for a root application.
pub struct HttpServer {
    app: axum::Router,
}

impl HttpServer {
    pub fn new(router: Arc<Router>, limits: &LimitsConfig) -> Self {
        let state = DispatchState {
            router,
            max_body_size: limits.max_body_size,
        };
        Self {
            app: Self::build_router(limits, state),
        }
    }

    /// Build the axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(limits: &LimitsConfig, state: DispatchState) -> axum::Router {
        axum::Router::new()
            .route("/{*path}", any(dispatch))
            .route("/", any(dispatch))
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(limits.request_timeout_secs)))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// The axum service, for in-process use such as `oneshot` tests.
    pub fn into_router(self) -> axum::Router {
        self.app
    }

    /// Run the server, accepting connections on the given listener until
    /// `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.app.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!(address = %addr, "HTTP server stopped");
        Ok(())
    }
}

/// Buffer the request and run it through the layered router.
async fn dispatch(State(state): State<DispatchState>, request: axum::extract::Request) -> axum::response::Response {
    let start = Instant::now();
    let remote_addr = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0);
    let method = request.method().clone();

    let (parts, body) = request.into_parts();
    let body = match axum::body::to_bytes(body, state.max_body_size).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::debug!(error = %e, limit = state.max_body_size, "Request body rejected");
            metrics::record_request(method.as_str(), 413, start);
            return (StatusCode::PAYLOAD_TOO_LARGE, "Payload Too Large").into_response();
        }
    };

    let mut req = Request::from_parts(parts, body, remote_addr);
    let mut res = Response::new();

    tracing::debug!(request_id = %req.id(), method = %method, path = %req.path(), "Dispatching request");

    match catch_unwind(AssertUnwindSafe(|| state.router.handle(&mut req, &mut res))) {
        Ok(flow) => {
            if flow == Flow::Continue && !res.is_sent() {
                let _ = res
                    .status(404)
                    .send(format!("Cannot {} {}", method, req.uri().path()));
            }
        }
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "non-string panic payload".to_string());
            tracing::error!(request_id = %req.id(), path = %req.path(), panic = %message, "Handler panicked");
            res = Response::new();
            let _ = res.status(500).send("Internal Server Error");
        }
    }

    metrics::record_request(method.as_str(), res.status_code().as_u16(), start);
    res.into_response()
}
