//! nicfaas-api: provider HTTP surface.
//!
//! # Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/healthz` | Liveness |
//! | GET | `/system/functions` | List cluster and offload functions |
//! | POST | `/system/functions` | Deploy a function |
//! | PUT | `/system/functions` | Update a function |
//! | DELETE | `/system/functions` | Delete a function |
//! | GET | `/system/function/{name}` | Read a function and its replica count |
//! | POST | `/system/scale-function/{name}` | Set the desired replica count |
//! | GET | `/system/placement/{name}` | Per-node replicas of an offload function |
//! | ANY | `/function/{name}[/{*path}]` | Invoke a function |

pub mod error;
pub mod handlers;
pub mod orchestrator;
pub mod types;

use std::sync::Arc;

use axum::Router;
use axum::routing::{any, get, post};
use nicfaas_dispatch::Dispatcher;
use nicfaas_scheduler::PlacementScheduler;

pub use error::{ApiError, ApiResult, Operation};
pub use orchestrator::{LocalOrchestrator, Orchestrator, OrchestratorError};
pub use types::*;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub scheduler: PlacementScheduler,
    pub orchestrator: Arc<dyn Orchestrator>,
    pub dispatcher: Dispatcher,
}

/// Build the complete provider router.
pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/healthz", get(handlers::healthz))
        .route(
            "/system/functions",
            get(handlers::list_functions)
                .post(handlers::deploy_function)
                .put(handlers::update_function)
                .delete(handlers::delete_function),
        )
        .route("/system/function/{name}", get(handlers::read_function))
        .route("/system/scale-function/{name}", post(handlers::scale_function))
        .route("/system/placement/{name}", get(handlers::read_placement))
        .route("/function/{name}", any(handlers::invoke))
        .route("/function/{name}/{*path}", any(handlers::invoke_path))
        .with_state(state)
}
