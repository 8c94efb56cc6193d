//! Composition of controllers into served applications.
//!
//! # Responsibilities
//! - Describe a controller declaratively with a [`Blueprint`]
//! - Construct it: container scope, services, dependencies, routes
//! - Build and mount declared sub-routers recursively
//! - Fire lifecycle hooks and start the root listener
//!
//! # Design Decisions
//! - Blueprints are plain records; composition never subclasses or wraps
//!   the controller type
//! - Sub-routers get a child container, so services they declare are
//!   scoped to them while the root's registrations stay visible
//! - Hook failures are logged and never abort construction
//! - Every other construction error aborts it

pub mod app;
pub mod blueprint;
pub mod error;
pub mod hooks;

pub use app::{compose, App, MountedRouter, APPLICATION, ROOT_APPLICATION};
pub use blueprint::{Blueprint, Constructor, ListenCallback, ListenSpec, Mountable, RouterEntry};
pub use error::ComposeError;
pub use hooks::{BoxError, HookContext, HookFn, HookKind, Hooks};
