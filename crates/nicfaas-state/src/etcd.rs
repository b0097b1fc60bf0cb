//! etcd directory backend.
//!
//! Talks to an etcd v3 cluster through its JSON gateway
//! (`/v3/kv/range`, `/v3/kv/put`, `/v3/kv/deleterange`). Keys and values
//! travel base64-encoded. Directories map onto key prefixes.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::directory::{KvDirectory, KvEntry, KvFuture, dir_prefix};
use crate::error::{StateError, StateResult};

/// Default per-request deadline, so an unreachable store fails fast.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(1);

/// Directory backed by an etcd cluster.
#[derive(Clone)]
pub struct EtcdDirectory {
    endpoint: String,
    timeout: Duration,
    client: Client<HttpConnector, Full<Bytes>>,
}

#[derive(Serialize)]
struct RangeRequest {
    key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    range_end: Option<String>,
}

#[derive(Serialize)]
struct PutRequest {
    key: String,
    value: String,
}

#[derive(Deserialize, Default)]
struct RangeResponse {
    #[serde(default)]
    kvs: Vec<RawKeyValue>,
}

#[derive(Deserialize)]
struct RawKeyValue {
    key: String,
    #[serde(default)]
    value: String,
}

#[derive(Deserialize, Default)]
struct DeleteRangeResponse {
    #[serde(default)]
    deleted: Option<serde_json::Value>,
}

impl EtcdDirectory {
    /// Create a client for `endpoint`, e.g. `http://127.0.0.1:2379`.
    pub fn new(endpoint: impl Into<String>) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(DEFAULT_REQUEST_TIMEOUT));
        let client = Client::builder(TokioExecutor::new()).build(connector);
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
            client,
        }
    }

    /// Override the per-request deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn call<T: Serialize>(&self, path: &str, body: &T) -> StateResult<Bytes> {
        let uri = format!("{}{path}", self.endpoint);
        let payload = serde_json::to_vec(body).map_err(|e| StateError::Protocol(e.to_string()))?;
        let req = http::Request::builder()
            .method("POST")
            .uri(&uri)
            .header("content-type", "application/json")
            .body(Full::new(Bytes::from(payload)))
            .map_err(|e| StateError::Protocol(e.to_string()))?;

        let exchange = async {
            let resp = self
                .client
                .request(req)
                .await
                .map_err(|e| StateError::Unavailable(format!("{uri}: {e}")))?;
            let status = resp.status();
            let body = resp
                .into_body()
                .collect()
                .await
                .map_err(|e| StateError::Unavailable(format!("{uri}: {e}")))?
                .to_bytes();
            if !status.is_success() {
                return Err(StateError::Unavailable(format!(
                    "{uri}: {status}: {}",
                    String::from_utf8_lossy(&body)
                )));
            }
            Ok(body)
        };

        tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| {
                StateError::Unavailable(format!("{uri}: timed out after {:?}", self.timeout))
            })?
    }

    async fn range(&self, key: &str, range_end: Option<Vec<u8>>) -> StateResult<Vec<KvEntry>> {
        let request = RangeRequest {
            key: B64.encode(key),
            range_end: range_end.map(|end| B64.encode(end)),
        };
        let body = self.call("/v3/kv/range", &request).await?;
        let resp: RangeResponse =
            serde_json::from_slice(&body).map_err(|e| StateError::Protocol(e.to_string()))?;
        let mut entries = resp
            .kvs
            .into_iter()
            .map(decode_kv)
            .collect::<StateResult<Vec<_>>>()?;
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(entries)
    }

    async fn delete_range(&self, key: &str, range_end: Option<Vec<u8>>) -> StateResult<u64> {
        let request = RangeRequest {
            key: B64.encode(key),
            range_end: range_end.map(|end| B64.encode(end)),
        };
        let body = self.call("/v3/kv/deleterange", &request).await?;
        let resp: DeleteRangeResponse =
            serde_json::from_slice(&body).map_err(|e| StateError::Protocol(e.to_string()))?;
        Ok(resp.deleted.as_ref().map(int64_field).unwrap_or(0))
    }
}

impl KvDirectory for EtcdDirectory {
    fn get<'a>(&'a self, key: &'a str) -> KvFuture<'a, String> {
        Box::pin(async move {
            let mut entries = self.range(key, None).await?;
            match entries.pop() {
                Some(entry) => Ok(entry.value),
                None => Err(StateError::NotFound(key.to_string())),
            }
        })
    }

    fn list<'a>(&'a self, dir: &'a str) -> KvFuture<'a, Vec<KvEntry>> {
        Box::pin(async move {
            let prefix = dir_prefix(dir);
            let end = prefix_range_end(prefix.as_bytes());
            self.range(&prefix, Some(end)).await
        })
    }

    fn set<'a>(&'a self, key: &'a str, value: &'a str) -> KvFuture<'a, ()> {
        Box::pin(async move {
            let request = PutRequest {
                key: B64.encode(key),
                value: B64.encode(value),
            };
            self.call("/v3/kv/put", &request).await?;
            debug!(%key, "etcd key written");
            Ok(())
        })
    }

    fn delete<'a>(&'a self, key: &'a str) -> KvFuture<'a, ()> {
        Box::pin(async move {
            match self.delete_range(key, None).await? {
                0 => Err(StateError::NotFound(key.to_string())),
                _ => Ok(()),
            }
        })
    }

    fn delete_prefix<'a>(&'a self, dir: &'a str) -> KvFuture<'a, u64> {
        Box::pin(async move {
            let prefix = dir_prefix(dir);
            let end = prefix_range_end(prefix.as_bytes());
            self.delete_range(&prefix, Some(end)).await
        })
    }
}

/// The smallest key greater than every key starting with `prefix`.
fn prefix_range_end(prefix: &[u8]) -> Vec<u8> {
    let mut end = prefix.to_vec();
    while let Some(last) = end.pop() {
        if last < 0xff {
            end.push(last + 1);
            return end;
        }
    }
    // All 0xff: etcd reads "\0" as "to the end of the keyspace".
    vec![0]
}

fn decode_kv(raw: RawKeyValue) -> StateResult<KvEntry> {
    Ok(KvEntry {
        key: decode_b64(&raw.key)?,
        value: decode_b64(&raw.value)?,
    })
}

fn decode_b64(field: &str) -> StateResult<String> {
    let bytes = B64
        .decode(field)
        .map_err(|e| StateError::Protocol(format!("bad base64 {field:?}: {e}")))?;
    String::from_utf8(bytes).map_err(|e| StateError::Protocol(e.to_string()))
}

/// etcd encodes int64 fields as JSON strings.
fn int64_field(value: &serde_json::Value) -> u64 {
    match value {
        serde_json::Value::String(s) => s.parse().unwrap_or(0),
        serde_json::Value::Number(n) => n.as_u64().unwrap_or(0),
        _ => 0,
    }
}
