//! Composition errors.

use thiserror::Error;

use crate::container::ContainerError;
use crate::lifecycle::LifecycleError;

#[derive(Debug, Error)]
pub enum ComposeError {
    #[error("service #{index} ({name}) must be a constructible class")]
    MustBeClass { index: usize, name: String },

    #[error("router #{index} is misconfigured: {reason}")]
    RouterConfig { index: usize, reason: String },

    #[error("routers are already mounted")]
    AlreadyMounted,

    #[error("failed to construct {name}: {source}")]
    Construct {
        name: String,
        #[source]
        source: ContainerError,
    },

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}
