//! Route binding.
//!
//! # Responsibilities
//! - Register resolved descriptors on a router, in order
//! - Fix every handler's execution context to the owning instance
//! - Report what was bound
//!
//! # Design Decisions
//! - Descriptors that cannot be registered are skipped with a debug log,
//!   never an error: they come from plain methods
//! - A `Param` descriptor registers its first handler only

use std::sync::Arc;

use crate::http::Router;
use crate::routing::descriptor::{RouteDescriptor, RouteInfo, RouteKind};

/// Register `ordered` on `router` with handlers bound to `instance`.
pub fn bind<T>(instance: &Arc<T>, ordered: &[(&str, &RouteDescriptor<T>)], router: &Router) -> Vec<RouteInfo>
where
    T: Send + Sync + 'static,
{
    let mut bound = Vec::with_capacity(ordered.len());

    for &(name, descriptor) in ordered {
        if !descriptor.is_bindable() {
            tracing::debug!(method = %name, "Skipping malformed route descriptor");
            continue;
        }

        let handlers: Vec<_> = descriptor
            .handlers()
            .iter()
            .map(|h| h.bind(Arc::clone(instance)))
            .collect();

        let http_method = match descriptor.kind() {
            RouteKind::Middleware => {
                router.use_path(descriptor.path(), handlers);
                None
            }
            RouteKind::Route => {
                router.route(descriptor.http_method(), descriptor.path(), handlers);
                Some(descriptor.http_method())
            }
            RouteKind::Param => {
                let Some(param) = descriptor.path().as_param_name() else {
                    continue;
                };
                if handlers.len() > 1 {
                    tracing::debug!(
                        method = %name,
                        ignored = handlers.len() - 1,
                        "Param uses its first handler only"
                    );
                }
                if let Some(first) = handlers.into_iter().next() {
                    router.param(param, first);
                }
                None
            }
        };

        bound.push(RouteInfo {
            method: name.to_string(),
            kind: descriptor.kind(),
            path: descriptor.path().to_string(),
            http_method,
            description: descriptor.description().to_string(),
        });
    }

    bound
}
