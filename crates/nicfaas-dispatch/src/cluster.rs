//! Cluster path: reverse proxy to a function's in-cluster service.
//!
//! The target is `http://<function>.<namespace>:<port><path>?<query>`.
//! Method, headers and body go out as received; status, headers and body
//! come back verbatim.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use axum::http::{Request, Response, Uri, header};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use tracing::{debug, warn};

use crate::error::{DispatchError, DispatchResult};

/// Port the function containers serve on.
pub const DEFAULT_CLUSTER_PORT: u16 = 8080;

pub type ForwardFuture<'a> =
    Pin<Box<dyn Future<Output = DispatchResult<Response<Bytes>>> + Send + 'a>>;

/// Forwards a buffered request to a function's service.
///
/// `request` carries only the path and query below the function; the
/// implementation decides the authority.
pub trait ClusterForwarder: Send + Sync {
    fn forward<'a>(&'a self, function: &'a str, request: Request<Bytes>) -> ForwardFuture<'a>;
}

/// HTTP reverse proxy onto `<function>.<namespace>`.
#[derive(Clone)]
pub struct ClusterProxy {
    namespace: String,
    port: u16,
    client: Client<HttpConnector, Full<Bytes>>,
}

impl ClusterProxy {
    /// `connect_timeout` bounds connection setup; idle pooled connections
    /// are dropped after 120ms and TCP keep-alive runs every second.
    pub fn new(namespace: impl Into<String>, port: u16, connect_timeout: Duration) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(connect_timeout));
        connector.set_keepalive(Some(Duration::from_secs(1)));
        let client = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(Duration::from_millis(120))
            .build(connector);
        Self {
            namespace: namespace.into(),
            port,
            client,
        }
    }

    /// Absolute URL for `function` with the path and query of `uri`.
    pub fn target_url(&self, function: &str, uri: &Uri) -> String {
        let path_and_query = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
        format!(
            "http://{function}.{}:{}{path_and_query}",
            self.namespace, self.port
        )
    }

    async fn send(
        &self,
        function: &str,
        request: Request<Bytes>,
    ) -> DispatchResult<Response<Bytes>> {
        let url = self.target_url(function, request.uri());
        let uri: Uri = url
            .parse()
            .map_err(|e| DispatchError::Request(format!("{url}: {e}")))?;

        let (mut parts, body) = request.into_parts();
        parts.uri = uri;
        parts.headers.remove(header::HOST);
        let outbound = Request::from_parts(parts, Full::new(body));

        let unreachable = |e: &dyn std::fmt::Display| {
            warn!(%function, %url, error = %e, "cluster forward failed");
            DispatchError::ClusterUnreachable(function.to_string())
        };

        let response = self
            .client
            .request(outbound)
            .await
            .map_err(|e| unreachable(&e))?;
        let (parts, body) = response.into_parts();
        let body = body.collect().await.map_err(|e| unreachable(&e))?.to_bytes();

        debug!(%function, status = parts.status.as_u16(), bytes = body.len(), "cluster reply");
        Ok(Response::from_parts(parts, body))
    }
}

impl ClusterForwarder for ClusterProxy {
    fn forward<'a>(&'a self, function: &'a str, request: Request<Bytes>) -> ForwardFuture<'a> {
        Box::pin(self.send(function, request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::http::StatusCode;
    use axum::routing::any;

    #[test]
    fn target_url_keeps_path_and_query() {
        let proxy = ClusterProxy::new("openfaas-fn", 8080, Duration::from_secs(1));
        let uri: Uri = "/api/v1?x=1&y=2".parse().unwrap();
        assert_eq!(
            proxy.target_url("figlet", &uri),
            "http://figlet.openfaas-fn:8080/api/v1?x=1&y=2"
        );
    }

    #[test]
    fn target_url_defaults_to_root() {
        let proxy = ClusterProxy::new("fn", 9000, Duration::from_secs(1));
        let uri: Uri = "/".parse().unwrap();
        assert_eq!(proxy.target_url("echo", &uri), "http://echo.fn:9000/");
    }

    #[tokio::test]
    async fn unreachable_service_is_reported_by_name() {
        // `127.0` + `.0.1` puts the authority on loopback, where port 1 is closed.
        let proxy = ClusterProxy::new("0.1", 1, Duration::from_millis(200));
        let request = Request::builder().uri("/").body(Bytes::new()).unwrap();
        let err = proxy.forward("127.0", request).await.unwrap_err();
        assert_eq!(err.to_string(), "Can't reach service: 127.0");
    }

    #[tokio::test]
    async fn reply_is_copied_verbatim() {
        let app = Router::new().route(
            "/{*rest}",
            any(|uri: Uri, body: Bytes| async move {
                (
                    StatusCode::CREATED,
                    [("x-upstream", "yes")],
                    format!("{}|{}", uri, String::from_utf8_lossy(&body)),
                )
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let proxy = ClusterProxy::new("0.1", port, Duration::from_secs(1));
        let request = Request::builder()
            .method("POST")
            .uri("/echo?q=1")
            .header(header::HOST, "gateway.local")
            .body(Bytes::from_static(b"hello"))
            .unwrap();
        let response = proxy.forward("127.0", request).await.unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()["x-upstream"], "yes");
        assert_eq!(&response.body()[..], b"/echo?q=1|hello");
    }
}
