//! routeweave status server.
//!
//! Composes a small status controller on the configured port:
//!
//! ```text
//! GET /          service name, version, phase, uptime
//! GET /routes    the bound route table
//! ```
//!
//! Runs until Ctrl-C, then closes the listener gracefully.

use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use std::time::Instant;

use clap::Parser;
use serde_json::json;

use routeweave::compose::ROOT_APPLICATION;
use routeweave::config::load_config;
use routeweave::observability::{logging, metrics};
use routeweave::routing::RouteInfo;
use routeweave::{ApplicationHandle, Blueprint, ContainerError, Dependencies, Flow, Request, Response, ServerConfig};

#[derive(Debug, Parser)]
#[command(name = "routeweave", version, about = "Serve the routeweave status controller")]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on, overriding the configuration
    #[arg(short, long)]
    port: Option<u16>,
}

struct Status {
    started: Instant,
    root: Arc<ApplicationHandle>,
    routes: OnceLock<Vec<RouteInfo>>,
}

impl Status {
    fn construct(deps: &Dependencies) -> Result<Self, ContainerError> {
        Ok(Status {
            started: Instant::now(),
            root: deps.get(ROOT_APPLICATION)?,
            routes: OnceLock::new(),
        })
    }

    fn index(&self, _req: &mut Request, res: &mut Response) -> Flow {
        res.json(&json!({
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
            "phase": self.root.phase(),
            "uptime_secs": self.started.elapsed().as_secs(),
        }))
    }

    fn routes(&self, _req: &mut Request, res: &mut Response) -> Flow {
        res.json(self.routes.get().map(Vec::as_slice).unwrap_or_default())
    }
}

fn status_blueprint(config: ServerConfig) -> Result<Blueprint<Status>, routeweave::RouteError> {
    Blueprint::new("Status", Status::construct)
        .inject([ROOT_APPLICATION])
        .config(config)
        .routes(|t| {
            t.method("index", Status::index)
                .route("/")?
                .description("Service status");
            t.method("routes", Status::routes)
                .route("/routes")?
                .description("Bound route table");
            Ok(())
        })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };

    logging::init(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "routeweave starting");

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to install metrics exporter");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let port = cli.port.unwrap_or(config.listener.port);
    let app = status_blueprint(config)?.build()?;
    let _ = app.instance().routes.set(app.routes().to_vec());

    let addr = app.listen(port).await?;
    tracing::info!(address = %addr, routes = app.routes().len(), "Status controller ready");

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");

    app.close().await?;
    tracing::info!("Shutdown complete");
    Ok(())
}
