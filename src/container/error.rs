//! Resolution errors.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContainerError {
    #[error("`{name}` is not registered")]
    NotRegistered { name: String },

    #[error("dependency cycle: {path}")]
    Cycle { path: String },

    #[error("`{name}` does not resolve to a {expected}")]
    TypeMismatch { name: String, expected: &'static str },

    #[error("failed to construct `{name}`: {reason}")]
    Construction { name: String, reason: String },

    #[error("`{name}` was not resolved and is absent")]
    Absent { name: String },
}

impl ContainerError {
    /// Shorthand for a constructor failure.
    pub fn construction(name: impl Into<String>, reason: impl ToString) -> Self {
        ContainerError::Construction {
            name: name.into(),
            reason: reason.to_string(),
        }
    }
}
