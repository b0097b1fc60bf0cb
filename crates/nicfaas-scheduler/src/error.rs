//! Scheduler error types.

use nicfaas_state::StateError;
use thiserror::Error;

/// Errors that can occur during placement operations.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("no offload nodes available")]
    NoNodesAvailable,

    #[error("invalid function name: {0:?}")]
    InvalidName(String),

    #[error("function already registered: {0}")]
    AlreadyRegistered(String),

    #[error("function not found: {0}")]
    NotFound(String),

    #[error("placement failed for {function}: {reason}")]
    PlacementFailed { function: String, reason: String },

    #[error("deregister failed for {function}: {source}")]
    DeregisterFailed {
        function: String,
        #[source]
        source: StateError,
    },

    #[error("state store error: {0}")]
    State(#[from] StateError),
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;
