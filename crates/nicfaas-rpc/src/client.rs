//! Offload RPC client: one request/response exchange per call.
//!
//! Each invocation opens its own UDP socket, sends a single framed
//! datagram and waits for a single reply datagram, bounded by the
//! configured timeout. The socket is dropped on every exit path. There
//! is no pipelining and no retry at this layer.

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use bytes::Bytes;
use tokio::net::UdpSocket;
use tracing::{debug, warn};

use crate::error::{RpcError, RpcResult};
use crate::frame::encode_request;

/// Default reply deadline.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

/// Largest reply kept; longer datagrams are truncated.
pub const DEFAULT_MAX_REPLY: usize = 2048;

/// Client for invoking jobs on offload nodes.
#[derive(Debug, Clone)]
pub struct OffloadClient {
    timeout: Duration,
    max_reply: usize,
}

impl OffloadClient {
    pub fn new() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            max_reply: DEFAULT_MAX_REPLY,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_reply(mut self, max_reply: usize) -> Self {
        self.max_reply = max_reply.max(1);
        self
    }

    /// Invoke `job_id` on `node:port` and return the reply payload.
    pub async fn invoke(
        &self,
        node: &str,
        port: u16,
        job_id: u32,
        payload: &[u8],
    ) -> RpcResult<Bytes> {
        let addr = format!("{node}:{port}");
        let exchange = self.exchange(node, port, &addr, job_id, payload);

        let result = match tokio::time::timeout(self.timeout, exchange).await {
            Ok(result) => result,
            Err(_) => Err(RpcError::Timeout {
                addr: addr.clone(),
                timeout: self.timeout,
            }),
        };

        match &result {
            Ok(reply) => debug!(%addr, job_id, bytes = reply.len(), "offload reply received"),
            Err(e) => warn!(%addr, job_id, error = %e, "offload invocation failed"),
        }
        result
    }

    async fn exchange(
        &self,
        node: &str,
        port: u16,
        addr: &str,
        job_id: u32,
        payload: &[u8],
    ) -> RpcResult<Bytes> {
        let transport = |source| RpcError::Transport {
            addr: addr.to_string(),
            source,
        };

        let target = tokio::net::lookup_host((node, port))
            .await
            .map_err(|_| RpcError::Resolve(addr.to_string()))?
            .next()
            .ok_or_else(|| RpcError::Resolve(addr.to_string()))?;

        let local: SocketAddr = if target.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(local).await.map_err(transport)?;
        socket.connect(target).await.map_err(transport)?;

        let frame = encode_request(job_id, payload);
        socket.send(&frame).await.map_err(transport)?;

        let mut buf = vec![0u8; self.max_reply];
        let n = socket.recv(&mut buf).await.map_err(transport)?;
        buf.truncate(n);
        Ok(Bytes::from(buf))
    }
}

impl Default for OffloadClient {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    use crate::frame::{PLACEHOLDER_PAYLOAD, decode_request};

    /// Reply to one request with `job <id>:<payload len>`.
    async fn spawn_node() -> u16 {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = socket.local_addr().unwrap().port();
        tokio::spawn(async move {
            let mut buf = [0u8; 1500];
            let (n, peer) = socket.recv_from(&mut buf).await.unwrap();
            let (job, payload) = decode_request(Bytes::copy_from_slice(&buf[..n])).unwrap();
            let reply = format!("job {job}:{}", payload.len());
            socket.send_to(reply.as_bytes(), peer).await.unwrap();
        });
        port
    }

    #[tokio::test]
    async fn invoke_returns_node_reply() {
        let port = spawn_node().await;
        let client = OffloadClient::new();

        let reply = client
            .invoke("127.0.0.1", port, 42, PLACEHOLDER_PAYLOAD)
            .await
            .unwrap();

        assert_eq!(&reply[..], b"job 42:16");
    }

    #[tokio::test]
    async fn long_reply_is_truncated() {
        let port = spawn_node().await;
        let client = OffloadClient::new().with_max_reply(3);

        let reply = client.invoke("127.0.0.1", port, 1, b"").await.unwrap();
        assert_eq!(&reply[..], b"job");
    }

    #[tokio::test]
    async fn silent_node_times_out() {
        let silent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = silent.local_addr().unwrap().port();
        let client = OffloadClient::new().with_timeout(Duration::from_millis(200));

        let started = Instant::now();
        let err = client.invoke("127.0.0.1", port, 7, b"").await.unwrap_err();

        assert!(err.is_timeout());
        assert!(started.elapsed() < Duration::from_secs(1));
        drop(silent);
    }

    #[tokio::test]
    async fn nothing_listening_returns_within_timeout() {
        let port = {
            let probe = UdpSocket::bind("127.0.0.1:0").await.unwrap();
            probe.local_addr().unwrap().port()
        };
        let client = OffloadClient::new().with_timeout(Duration::from_millis(300));

        let started = Instant::now();
        let result = client.invoke("127.0.0.1", port, 7, b"").await;

        assert!(result.is_err());
        assert!(started.elapsed() < Duration::from_millis(1300));
    }
}
