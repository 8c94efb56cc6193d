//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! compose() (state.rs):
//!     Unbound → routes + routers wired → Built
//!
//! listen(port) (state.rs):
//!     Built/Closed → bind → spawn HttpServer → Listening
//!
//! close() (shutdown.rs, state.rs):
//!     Listening → trigger shutdown → drain connections → Closed
//! ```
//!
//! # Design Decisions
//! - Only the root application owns a lifecycle; sub-routers have none
//! - Shutdown is explicit: nothing here listens for OS signals

pub mod shutdown;
pub mod state;

pub use shutdown::Shutdown;
pub use state::{Lifecycle, LifecycleError, Phase};
