//! Dependency resolution subsystem.
//!
//! # Data Flow
//! ```text
//! Blueprint services / built-ins
//!     → provider.rs (class, function or value providers)
//!     → injector.rs (Container::register, scoped by lifetime)
//!
//! Construction:
//!     declared dependency names
//!     → Container::resolve_all (walks the parent chain)
//!     → Dependencies (handed to the constructor)
//! ```
//!
//! # Design Decisions
//! - Dependencies are declared by name, statically, per type
//! - Registration happens during construction only; request handling
//!   never registers
//! - Strict resolution by default; permissive resolution is opt-in

pub mod error;
pub mod injector;
pub mod provider;

pub use error::ContainerError;
pub use injector::{Container, Dependencies, ResolutionMode};
pub use provider::{Instance, Lifetime, Provider, Service};
