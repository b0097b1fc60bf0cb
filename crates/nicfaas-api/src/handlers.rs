//! Provider API handlers.
//!
//! Each handler decides per function name: offload functions go to the
//! placement scheduler, everything else to the orchestrator.

use axum::Json;
use axum::body::Body;
use axum::extract::{Path, Request, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use nicfaas_rpc::OffloadClass;
use nicfaas_state::keys::is_valid_segment;
use serde::de::DeserializeOwned;
use tracing::info;

use crate::ApiState;
use crate::error::{ApiError, ApiResult, Operation};
use crate::types::{
    CreateFunctionRequest, DeleteFunctionRequest, Function, NodePlacement, PlacementView,
    ScaleServiceRequest,
};

fn is_offload(name: &str) -> bool {
    OffloadClass::for_function(name).is_some()
}

fn parse_body<T: DeserializeOwned>(body: &Bytes) -> ApiResult<T> {
    serde_json::from_slice(body).map_err(|e| {
        ApiError::BadRequest(format!("Cannot parse request. Please pass valid JSON. {e}"))
    })
}

/// Function names end up as key segments and host labels.
fn check_name(field: &str, name: &str) -> ApiResult<()> {
    if name.is_empty() {
        return Err(ApiError::BadRequest(format!("{field} is required")));
    }
    if !is_valid_segment(name) {
        return Err(ApiError::BadRequest(format!("invalid {field}: {name:?}")));
    }
    Ok(())
}

/// GET /healthz
pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

// ── Functions ──────────────────────────────────────────────────

/// GET /system/functions
pub async fn list_functions(State(state): State<ApiState>) -> ApiResult<Json<Vec<Function>>> {
    let mut functions = state.orchestrator.list().await?;

    let scheduler = &state.scheduler;
    for name in scheduler.store().list_functions().await? {
        let replicas = scheduler
            .count_replicas(&name)
            .await
            .map_err(ApiError::placement(Operation::Read))?;
        functions.push(Function::offload(name, replicas));
    }
    Ok(Json(functions))
}

/// POST /system/functions
pub async fn deploy_function(State(state): State<ApiState>, body: Bytes) -> ApiResult<StatusCode> {
    let request: CreateFunctionRequest = parse_body(&body)?;
    check_name("service", &request.service)?;

    if is_offload(&request.service) {
        let node = state
            .scheduler
            .register(&request.service)
            .await
            .map_err(ApiError::placement(Operation::Register))?;
        info!(function = %request.service, %node, "offload function deployed");
    } else {
        state.orchestrator.deploy(&request).await?;
    }
    Ok(StatusCode::ACCEPTED)
}

/// PUT /system/functions
pub async fn update_function(State(state): State<ApiState>, body: Bytes) -> ApiResult<StatusCode> {
    let request: CreateFunctionRequest = parse_body(&body)?;
    check_name("service", &request.service)?;

    // Offload functions have nothing to update in place.
    if !is_offload(&request.service) {
        state.orchestrator.update(&request).await?;
    }
    Ok(StatusCode::ACCEPTED)
}

/// DELETE /system/functions
pub async fn delete_function(State(state): State<ApiState>, body: Bytes) -> ApiResult<StatusCode> {
    let request: DeleteFunctionRequest = parse_body(&body)?;
    let name = request.function_name;
    if name.is_empty() {
        return Err(ApiError::BadRequest("functionName is required".into()));
    }

    if is_offload(&name) {
        if !state.scheduler.store().function_exists(&name).await? {
            return Err(ApiError::NotFound(format!("Error Deleting Function: {name}")));
        }
        let removed = state
            .scheduler
            .deregister(&name)
            .await
            .map_err(ApiError::placement(Operation::Deregister))?;
        info!(function = %name, removed, "offload function deleted");
    } else {
        state.orchestrator.delete(&name).await?;
    }
    Ok(StatusCode::ACCEPTED)
}

// ── Replicas ───────────────────────────────────────────────────

/// GET /system/function/{name}
pub async fn read_function(
    State(state): State<ApiState>,
    Path(name): Path<String>,
) -> ApiResult<Json<Function>> {
    if is_offload(&name) {
        if !state.scheduler.store().function_exists(&name).await? {
            return Err(ApiError::NotFound(format!("function {name} not found")));
        }
        let replicas = state
            .scheduler
            .count_replicas(&name)
            .await
            .map_err(ApiError::placement(Operation::Read))?;
        return Ok(Json(Function::offload(name, replicas)));
    }

    match state.orchestrator.get(&name).await? {
        Some(function) => Ok(Json(function)),
        None => Err(ApiError::NotFound(format!("function {name} not found"))),
    }
}

/// POST /system/scale-function/{name}
pub async fn scale_function(
    State(state): State<ApiState>,
    Path(name): Path<String>,
    body: Bytes,
) -> ApiResult<StatusCode> {
    let request: ScaleServiceRequest = parse_body(&body)?;

    if is_offload(&name) {
        let desired = u32::try_from(request.replicas).map_err(|_| {
            ApiError::BadRequest(format!("replicas out of range: {}", request.replicas))
        })?;
        let placed = state
            .scheduler
            .rebalance(&name, desired)
            .await
            .map_err(ApiError::placement(Operation::Rebalance))?;
        info!(function = %name, desired, nodes = placed.len(), "offload function scaled");
    } else {
        state.orchestrator.scale(&name, request.replicas).await?;
    }
    Ok(StatusCode::ACCEPTED)
}

/// GET /system/placement/{name}
pub async fn read_placement(
    State(state): State<ApiState>,
    Path(name): Path<String>,
) -> ApiResult<Json<PlacementView>> {
    if !is_offload(&name) || !state.scheduler.store().function_exists(&name).await? {
        return Err(ApiError::NotFound(format!("offload function {name} not found")));
    }
    let placed = state
        .scheduler
        .placement(&name)
        .await
        .map_err(ApiError::placement(Operation::Read))?;

    Ok(Json(PlacementView {
        replicas: placed.iter().map(|a| u64::from(a.replicas)).sum(),
        nodes: placed
            .into_iter()
            .map(|a| NodePlacement {
                node: a.node_id,
                replicas: a.replicas,
            })
            .collect(),
        function: name,
    }))
}

// ── Invocation ─────────────────────────────────────────────────

/// ANY /function/{name}
pub async fn invoke(
    State(state): State<ApiState>,
    Path(name): Path<String>,
    request: Request<Body>,
) -> Response {
    state.dispatcher.dispatch(&name, "", request).await
}

/// ANY /function/{name}/{*path}
pub async fn invoke_path(
    State(state): State<ApiState>,
    Path((name, path)): Path<(String, String)>,
    request: Request<Body>,
) -> Response {
    state.dispatcher.dispatch(&name, &path, request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use nicfaas_dispatch::{ClusterProxy, Dispatcher, NodePool};
    use nicfaas_rpc::OffloadClient;
    use nicfaas_scheduler::PlacementScheduler;
    use nicfaas_state::{MemoryDirectory, PlacementStore};

    use crate::orchestrator::LocalOrchestrator;

    async fn test_state(nodes: &[&str]) -> ApiState {
        let store = PlacementStore::new(Arc::new(MemoryDirectory::new()));
        let nodes: Vec<String> = nodes.iter().map(|s| s.to_string()).collect();
        store.initialize(&nodes).await.unwrap();

        let scheduler = PlacementScheduler::new(store.clone());
        let dispatcher = Dispatcher::new(
            NodePool::new(store, Duration::ZERO),
            Arc::new(OffloadClient::new().with_timeout(Duration::from_millis(100))),
            Arc::new(ClusterProxy::new("openfaas-fn", 8080, Duration::from_millis(100))),
        );
        ApiState {
            scheduler,
            orchestrator: Arc::new(LocalOrchestrator::new()),
            dispatcher,
        }
    }

    fn json(value: serde_json::Value) -> Bytes {
        Bytes::from(value.to_string())
    }

    fn service(name: &str) -> Bytes {
        json(serde_json::json!({ "service": name }))
    }

    fn status<T: IntoResponse>(result: ApiResult<T>) -> StatusCode {
        result.into_response().status()
    }

    async fn deploy(state: &ApiState, name: &str) -> StatusCode {
        status(deploy_function(State(state.clone()), service(name)).await)
    }

    #[tokio::test]
    async fn healthz_ok() {
        let resp = healthz().await.into_response();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn deploy_offload_function_places_one_replica() {
        let state = test_state(&["a", "b", "c"]).await;

        assert_eq!(deploy(&state, "echo-lambdanic").await, StatusCode::ACCEPTED);

        let Json(f) = read_function(State(state), Path("echo-lambdanic".into()))
            .await
            .unwrap();
        assert_eq!(f, Function::offload("echo-lambdanic", 1));
    }

    #[tokio::test]
    async fn deploy_offload_twice_conflicts() {
        let state = test_state(&["a"]).await;

        assert_eq!(deploy(&state, "echo-lambdanic").await, StatusCode::ACCEPTED);
        assert_eq!(deploy(&state, "echo-lambdanic").await, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn deploy_without_nodes_is_bad_request() {
        let state = test_state(&[]).await;

        assert_eq!(deploy(&state, "x-baremetal").await, StatusCode::BAD_REQUEST);
        assert!(!state.scheduler.store().function_exists("x-baremetal").await.unwrap());
    }

    #[tokio::test]
    async fn nested_function_names_are_rejected() {
        let state = test_state(&["a"]).await;

        for name in ["team/echo-lambdanic", "..", "team/figlet"] {
            assert_eq!(deploy(&state, name).await, StatusCode::BAD_REQUEST, "{name}");
            let resp = update_function(State(state.clone()), service(name)).await;
            assert_eq!(status(resp), StatusCode::BAD_REQUEST, "{name}");
        }

        let Json(functions) = list_functions(State(state.clone())).await.unwrap();
        assert!(functions.is_empty());
        assert!(state.scheduler.store().list_functions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn malformed_json_is_bad_request() {
        let state = test_state(&["a"]).await;
        let resp = deploy_function(State(state.clone()), Bytes::from_static(b"{not json")).await;
        assert_eq!(status(resp), StatusCode::BAD_REQUEST);

        let resp = scale_function(State(state), Path("f-lambdanic".into()), Bytes::new()).await;
        assert_eq!(status(resp), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn cluster_functions_go_to_orchestrator() {
        let state = test_state(&["a"]).await;
        let body = json(serde_json::json!({"service": "figlet", "image": "functions/figlet"}));

        let resp = deploy_function(State(state.clone()), body).await;
        assert_eq!(status(resp), StatusCode::ACCEPTED);
        let resp = scale_function(
            State(state.clone()),
            Path("figlet".into()),
            json(serde_json::json!({"replicas": 3})),
        )
        .await;
        assert_eq!(status(resp), StatusCode::ACCEPTED);

        let Json(f) = read_function(State(state.clone()), Path("figlet".into()))
            .await
            .unwrap();
        assert_eq!(f.replicas, 3);
        assert_eq!(f.image, "functions/figlet");
        assert!(!state.scheduler.store().function_exists("figlet").await.unwrap());
    }

    #[tokio::test]
    async fn list_merges_cluster_and_offload_functions() {
        let state = test_state(&["a", "b"]).await;
        deploy(&state, "figlet").await;
        deploy(&state, "echo-lambdanic").await;

        let Json(functions) = list_functions(State(state)).await.unwrap();
        let names: Vec<&str> = functions.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["figlet", "echo-lambdanic"]);
        assert_eq!(functions[1].image, "smartnic");
    }

    #[tokio::test]
    async fn scale_offload_function_spreads_replicas() {
        let state = test_state(&["a", "b", "c"]).await;
        deploy(&state, "f-lambdanic").await;

        let resp = scale_function(
            State(state.clone()),
            Path("f-lambdanic".into()),
            json(serde_json::json!({"serviceName": "f-lambdanic", "replicas": 7})),
        )
        .await;
        assert_eq!(status(resp), StatusCode::ACCEPTED);

        let Json(view) = read_placement(State(state.clone()), Path("f-lambdanic".into()))
            .await
            .unwrap();
        assert_eq!(view.replicas, 7);
        let counts: Vec<u32> = view.nodes.iter().map(|n| n.replicas).collect();
        assert_eq!(counts, vec![3, 2, 2]);

        let Json(f) = read_function(State(state), Path("f-lambdanic".into()))
            .await
            .unwrap();
        assert_eq!(f.replicas, 7);
        assert_eq!(f.available_replicas, 4);
    }

    #[tokio::test]
    async fn scale_unknown_offload_function_is_not_found() {
        let state = test_state(&["a"]).await;
        let body = json(serde_json::json!({"replicas": 2}));
        let resp = scale_function(State(state), Path("f-lambdanic".into()), body).await;
        assert_eq!(status(resp), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn delete_offload_function() {
        let state = test_state(&["a", "b"]).await;
        let body = json(serde_json::json!({"functionName": "f-lambdanic"}));

        assert_eq!(
            status(delete_function(State(state.clone()), body.clone()).await),
            StatusCode::NOT_FOUND
        );

        deploy(&state, "f-lambdanic").await;
        assert_eq!(
            status(delete_function(State(state.clone()), body).await),
            StatusCode::ACCEPTED
        );

        assert!(!state.scheduler.store().function_exists("f-lambdanic").await.unwrap());
        assert_eq!(state.scheduler.count_replicas("f-lambdanic").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn delete_missing_cluster_function_passes_orchestrator_status() {
        let state = test_state(&["a"]).await;
        let body = json(serde_json::json!({"functionName": "figlet"}));
        let resp = delete_function(State(state), body).await;
        assert_eq!(status(resp), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn update_offload_function_is_accepted_noop() {
        let state = test_state(&["a"]).await;
        let resp = update_function(State(state), service("f-lambdanic")).await;
        assert_eq!(status(resp), StatusCode::ACCEPTED);
    }

    #[tokio::test]
    async fn placement_of_cluster_function_is_not_found() {
        let state = test_state(&["a"]).await;
        let resp = read_placement(State(state), Path("figlet".into())).await;
        assert_eq!(status(resp), StatusCode::NOT_FOUND);
    }
}
