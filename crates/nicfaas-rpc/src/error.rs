//! Offload RPC error types.

use std::time::Duration;

use thiserror::Error;

/// Why an offload invocation did not produce a reply.
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("could not resolve offload node {0}")]
    Resolve(String),

    #[error("transport error talking to {addr}: {source}")]
    Transport {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("no reply from {addr} within {timeout:?}")]
    Timeout { addr: String, timeout: Duration },

    #[error("malformed frame: {0}")]
    Frame(String),
}

impl RpcError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, RpcError::Timeout { .. })
    }
}

pub type RpcResult<T> = Result<T, RpcError>;
