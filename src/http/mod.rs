//! HTTP subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (axum setup, request ID, trace, timeout, body buffering)
//!     → request.rs (buffered Request with params and query)
//!     → router.rs (middleware, params, routes, mounted routers)
//!     → response.rs (collected Response → axum response)
//!     → Send to client
//! ```

pub mod application;
pub mod request;
pub mod response;
pub mod router;
pub mod server;

pub use application::{ApplicationHandle, Role};
pub use request::{Request, X_REQUEST_ID};
pub use response::Response;
pub use router::Router;
pub use server::HttpServer;
