//! API error types and their HTTP mapping.

use std::fmt;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use nicfaas_scheduler::SchedulerError;
use nicfaas_state::StateError;
use thiserror::Error;

use crate::orchestrator::OrchestratorError;

/// Placement operation an error came from. The same scheduler error
/// maps to different statuses depending on the operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Register,
    Rebalance,
    Deregister,
    Read,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operation::Register => "deploy",
            Operation::Rebalance => "scale",
            Operation::Deregister => "delete",
            Operation::Read => "read",
        })
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{op} failed: {source}")]
    Placement {
        op: Operation,
        #[source]
        source: SchedulerError,
    },

    #[error("placement store error: {0}")]
    State(#[from] StateError),

    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),
}

impl ApiError {
    pub fn placement(op: Operation) -> impl FnOnce(SchedulerError) -> ApiError {
        move |source| ApiError::Placement { op, source }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::State(StateError::InvalidName(_)) => StatusCode::BAD_REQUEST,
            Self::State(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Orchestrator(e) => e.status,
            Self::Placement { op, source } => match source {
                SchedulerError::NoNodesAvailable
                | SchedulerError::InvalidName(_)
                | SchedulerError::State(StateError::InvalidName(_)) => StatusCode::BAD_REQUEST,
                SchedulerError::AlreadyRegistered(_) => StatusCode::CONFLICT,
                SchedulerError::NotFound(_) => StatusCode::NOT_FOUND,
                SchedulerError::PlacementFailed { .. } if *op == Operation::Register => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
                SchedulerError::PlacementFailed { .. }
                | SchedulerError::DeregisterFailed { .. } => StatusCode::BAD_REQUEST,
                SchedulerError::State(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "request rejected");
        }
        (status, self.to_string()).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
