//! Offload invocation seam.

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use nicfaas_rpc::{OffloadClient, RpcResult};

pub type InvokeFuture<'a> = Pin<Box<dyn Future<Output = RpcResult<Bytes>> + Send + 'a>>;

/// Invokes one job on one offload node.
pub trait OffloadInvoker: Send + Sync {
    fn invoke<'a>(
        &'a self,
        node: &'a str,
        port: u16,
        job_id: u32,
        payload: &'a [u8],
    ) -> InvokeFuture<'a>;
}

impl OffloadInvoker for OffloadClient {
    fn invoke<'a>(
        &'a self,
        node: &'a str,
        port: u16,
        job_id: u32,
        payload: &'a [u8],
    ) -> InvokeFuture<'a> {
        Box::pin(OffloadClient::invoke(self, node, port, job_id, payload))
    }
}
