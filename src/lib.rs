//! Declarative routing and composition over axum.
//!
//! Controllers declare their handler methods in a side table, decorate them
//! as routes, middleware or path-parameter interceptors, and are composed
//! into a served application together with their services and nested
//! routers.

pub mod compose;
pub mod config;
pub mod container;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;

pub use compose::{compose, App, Blueprint, ComposeError, Hooks, MountedRouter};
pub use config::ServerConfig;
pub use container::{Container, ContainerError, Dependencies, Provider, ResolutionMode, Service};
pub use http::{ApplicationHandle, Request, Response, Router};
pub use routing::{Flow, Handler, HttpMethod, MethodTable, Next, RouteError, RouteKind};
