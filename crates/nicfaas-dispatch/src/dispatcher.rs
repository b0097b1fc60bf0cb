//! Dispatcher: one inbound call, one path, one response.
//!
//! Function names carrying an offload marker go to an offload node over
//! the datagram RPC; everything else is reverse-proxied to the cluster.
//! Every call gets a correlation stamp, echoed in `x-call-id` and logged
//! with the elapsed time.

use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::http::{HeaderValue, Method, Request, Response, StatusCode, header};
use axum::response::IntoResponse;
use bytes::Bytes;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use nicfaas_rpc::{OffloadClass, OffloadPorts, PLACEHOLDER_PAYLOAD};
use tracing::{debug, info, warn};

use crate::cluster::ClusterForwarder;
use crate::error::{DispatchError, DispatchResult};
use crate::offload::OffloadInvoker;
use crate::pool::{NodePool, choose_node};
use crate::route::Route;
use crate::timing::{CALL_ID_HEADER, CallStamps};

/// Largest request body accepted for a function call.
pub const DEFAULT_MAX_BODY: usize = 4 * 1024 * 1024;

#[derive(Clone)]
pub struct Dispatcher {
    pool: NodePool,
    invoker: Arc<dyn OffloadInvoker>,
    cluster: Arc<dyn ClusterForwarder>,
    ports: OffloadPorts,
    max_body: usize,
    stamps: Arc<CallStamps>,
}

impl Dispatcher {
    pub fn new(
        pool: NodePool,
        invoker: Arc<dyn OffloadInvoker>,
        cluster: Arc<dyn ClusterForwarder>,
    ) -> Self {
        Self {
            pool,
            invoker,
            cluster,
            ports: OffloadPorts::default(),
            max_body: DEFAULT_MAX_BODY,
            stamps: Arc::new(CallStamps::new()),
        }
    }

    pub fn with_max_body(mut self, max_body: usize) -> Self {
        self.max_body = max_body;
        self
    }

    /// Override the node ports per offload class.
    pub fn with_ports(mut self, ports: OffloadPorts) -> Self {
        self.ports = ports;
        self
    }

    /// Handle a call to `function`. `rest` is the path below the function
    /// name, forwarded on the cluster path.
    pub async fn dispatch(
        &self,
        function: &str,
        rest: &str,
        request: Request<Body>,
    ) -> Response<Body> {
        let stamp = self.stamps.next();
        let started = Instant::now();
        let route = Route::for_function(function);

        let mut response = match self.route_call(function, rest, route, request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(call = %stamp, %function, route = route.label(), error = %e, "call failed");
                e.into_response()
            }
        };

        if let Ok(value) = HeaderValue::from_str(&stamp) {
            response.headers_mut().insert(CALL_ID_HEADER, value);
        }
        info!(
            call = %stamp,
            %function,
            route = route.label(),
            status = response.status().as_u16(),
            elapsed_ms = started.elapsed().as_secs_f64() * 1000.0,
            "call completed"
        );
        response
    }

    async fn route_call(
        &self,
        function: &str,
        rest: &str,
        route: Route,
        request: Request<Body>,
    ) -> DispatchResult<Response<Body>> {
        let (parts, body) = request.into_parts();
        if !is_routed_method(&parts.method) {
            return Err(DispatchError::MethodNotAllowed(parts.method));
        }
        let body = self.read_body(body).await?;

        match route {
            Route::Offload(class) => self.offload(function, class, &body).await,
            Route::Cluster => {
                let path = format!("/{}", rest.trim_start_matches('/'));
                let target = match parts.uri.query() {
                    Some(q) => format!("{path}?{q}"),
                    None => path,
                };
                let mut forward = Request::builder()
                    .method(parts.method)
                    .uri(target)
                    .body(body)
                    .map_err(|e| DispatchError::Request(e.to_string()))?;
                *forward.headers_mut() = parts.headers;

                let response = self.cluster.forward(function, forward).await?;
                Ok(response.map(Body::from))
            }
        }
    }

    async fn read_body(&self, body: Body) -> DispatchResult<Bytes> {
        let limit = self.max_body;
        let collected = Limited::new(body, limit).collect().await.map_err(|e| {
            if e.downcast_ref::<LengthLimitError>().is_some() {
                DispatchError::BodyTooLarge { limit }
            } else {
                DispatchError::Body(e.to_string())
            }
        })?;
        Ok(collected.to_bytes())
    }

    async fn offload(
        &self,
        function: &str,
        class: OffloadClass,
        body: &[u8],
    ) -> DispatchResult<Response<Body>> {
        let job_id = parse_job_id(body)?;

        let nodes = self.pool.nodes().await?;
        let placement = match self.pool.placement(function, &nodes).await {
            Ok(placement) => placement,
            Err(e) => {
                warn!(%function, error = %e, "placement lookup failed, choosing from pool");
                Vec::new()
            }
        };
        let node = choose_node(&nodes, &placement).ok_or(DispatchError::NoNodes)?;
        debug!(%function, %node, job_id, class = class.marker(), "invoking offload node");

        let reply = self
            .invoker
            .invoke(&node, self.ports.port(class), job_id, PLACEHOLDER_PAYLOAD)
            .await
            .map_err(|e| DispatchError::from_rpc(&node, e))?;

        Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_LENGTH, reply.len())
            .body(Body::from(reply))
            .map_err(|e| DispatchError::Request(e.to_string()))
    }
}

fn is_routed_method(method: &Method) -> bool {
    matches!(
        *method,
        Method::GET | Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}

/// The body of an offload call is the decimal job id.
fn parse_job_id(body: &[u8]) -> DispatchResult<u32> {
    let text = String::from_utf8_lossy(body);
    text.trim()
        .parse::<u32>()
        .map_err(|_| DispatchError::InvalidJobId(text.trim().chars().take(32).collect()))
}
