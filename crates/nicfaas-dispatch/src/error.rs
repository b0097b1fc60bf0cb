//! Dispatcher error types.

use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use nicfaas_rpc::RpcError;
use nicfaas_state::StateError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("method {0} is not allowed for function calls")]
    MethodNotAllowed(Method),

    #[error("request body exceeds {limit} bytes")]
    BodyTooLarge { limit: usize },

    #[error("could not read request body: {0}")]
    Body(String),

    #[error("request body is not a job id: {0:?}")]
    InvalidJobId(String),

    #[error("no offload nodes available")]
    NoNodes,

    #[error("offload node {node} did not reply in time")]
    OffloadTimeout {
        node: String,
        #[source]
        source: RpcError,
    },

    #[error("offload invocation on {node} failed")]
    OffloadFailed {
        node: String,
        #[source]
        source: RpcError,
    },

    #[error("Can't reach service: {0}")]
    ClusterUnreachable(String),

    #[error("could not build forward request: {0}")]
    Request(String),

    #[error("placement store error: {0}")]
    State(#[from] StateError),
}

impl DispatchError {
    /// Map an RPC failure on `node` onto the matching dispatch error.
    pub fn from_rpc(node: &str, source: RpcError) -> Self {
        let node = node.to_string();
        if source.is_timeout() {
            Self::OffloadTimeout { node, source }
        } else {
            Self::OffloadFailed { node, source }
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            Self::BodyTooLarge { .. } | Self::Body(_) | Self::InvalidJobId(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::OffloadTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            Self::NoNodes | Self::OffloadFailed { .. } => StatusCode::BAD_GATEWAY,
            Self::ClusterUnreachable(_) | Self::Request(_) | Self::State(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for DispatchError {
    fn into_response(self) -> Response {
        (self.status_code(), self.to_string()).into_response()
    }
}

pub type DispatchResult<T> = Result<T, DispatchError>;
