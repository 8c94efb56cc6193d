//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Declaration (once per blueprint):
//!     MethodTable::method(name, f)
//!     → metadata.rs (validate path, arity, verb → RouteDescriptor)
//!
//! Construction (once per instance):
//!     MethodTable + order list
//!     → order.rs (stable rank sort, drop plain methods)
//!     → binder.rs (bind handlers to the instance, register on the Router)
//!
//! Request time:
//!     http::Router → matcher.rs (exact or prefix match, capture params)
//! ```
//!
//! # Design Decisions
//! - All validation happens at declaration time; binding never fails
//! - Patterns are compiled at registration, never per request
//! - First registered layer runs first

pub mod binder;
pub mod descriptor;
pub mod error;
pub mod handler;
pub mod matcher;
pub mod metadata;
pub mod order;

pub use descriptor::{HttpMethod, IntoRoutePath, PathPattern, RouteDescriptor, RouteInfo, RouteKind, RoutePath};
pub use error::{PathError, RouteError};
pub use handler::{BoundHandler, Flow, Handler, IntoHandler, IntoMethod, Next};
pub use metadata::{Decorator, MethodTable};
