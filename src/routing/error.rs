//! Decoration-time errors.

use thiserror::Error;

use crate::routing::descriptor::RouteKind;

/// Raised while attaching route metadata to a method.
///
/// Every variant aborts the declaration it came from; none of them are
/// recoverable for that blueprint.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    #[error("{kind} requires a path of type string | pattern | non-empty array of string/pattern ({reason})")]
    InvalidPath { kind: RouteKind, reason: String },

    #[error("{kind} method `{method}` should either be a handler taking at most 3 arguments (request, response, next) or return an array of handlers, found {arity} arguments")]
    InvalidArity {
        kind: RouteKind,
        method: String,
        arity: usize,
    },

    #[error("{kind} method `{method}` returned an empty handler list")]
    EmptyHandlers { kind: RouteKind, method: String },

    #[error("`{0}` is not a valid HTTP method")]
    InvalidHttpMethod(String),
}

/// A path value that is not a string, a pattern, or a non-empty array of those.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct PathError(pub String);
