//! Cluster orchestrator seam.
//!
//! Functions without an offload marker live in the cluster orchestrator.
//! Its failures carry an HTTP status and body that the API passes
//! through unchanged.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, RwLock};

use axum::http::StatusCode;
use thiserror::Error;
use tracing::info;

use crate::types::{CreateFunctionRequest, Function};

/// Label marking a deployment as a function.
pub const FUNCTION_LABEL: &str = "faas_function";

/// Label carrying the initial replica count.
pub const MIN_SCALE_LABEL: &str = "com.openfaas.scale.min";

#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct OrchestratorError {
    pub status: StatusCode,
    pub message: String,
}

impl OrchestratorError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn not_found(name: &str) -> Self {
        Self::new(StatusCode::NOT_FOUND, format!("function {name} not found"))
    }
}

pub type OrchestratorFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, OrchestratorError>> + Send + 'a>>;

pub trait Orchestrator: Send + Sync {
    fn list(&self) -> OrchestratorFuture<'_, Vec<Function>>;
    /// `None` when no function deployment with this name exists.
    fn get<'a>(&'a self, name: &'a str) -> OrchestratorFuture<'a, Option<Function>>;
    fn deploy<'a>(&'a self, request: &'a CreateFunctionRequest) -> OrchestratorFuture<'a, ()>;
    fn update<'a>(&'a self, request: &'a CreateFunctionRequest) -> OrchestratorFuture<'a, ()>;
    fn delete<'a>(&'a self, name: &'a str) -> OrchestratorFuture<'a, ()>;
    fn scale<'a>(&'a self, name: &'a str, replicas: u64) -> OrchestratorFuture<'a, ()>;
}

/// In-process orchestrator. Deployments become available immediately.
#[derive(Debug, Clone, Default)]
pub struct LocalOrchestrator {
    functions: Arc<RwLock<BTreeMap<String, Function>>>,
}

impl LocalOrchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    fn build(request: &CreateFunctionRequest, replicas: u64) -> Function {
        let mut labels = request.labels.clone().unwrap_or_default();
        labels.insert(FUNCTION_LABEL.to_string(), request.service.clone());
        Function {
            name: request.service.clone(),
            replicas,
            image: request.image.clone(),
            available_replicas: replicas,
            invocation_count: 0,
            labels: Some(labels),
        }
    }
}

fn min_replicas(request: &CreateFunctionRequest) -> u64 {
    request
        .labels
        .as_ref()
        .and_then(|l| l.get(MIN_SCALE_LABEL))
        .and_then(|v| v.parse().ok())
        .unwrap_or(1)
}

impl Orchestrator for LocalOrchestrator {
    fn list(&self) -> OrchestratorFuture<'_, Vec<Function>> {
        Box::pin(async move {
            let functions = self.functions.read().expect("orchestrator lock");
            Ok(functions.values().cloned().collect())
        })
    }

    fn get<'a>(&'a self, name: &'a str) -> OrchestratorFuture<'a, Option<Function>> {
        Box::pin(async move {
            let functions = self.functions.read().expect("orchestrator lock");
            Ok(functions.get(name).cloned())
        })
    }

    fn deploy<'a>(&'a self, request: &'a CreateFunctionRequest) -> OrchestratorFuture<'a, ()> {
        Box::pin(async move {
            let mut functions = self.functions.write().expect("orchestrator lock");
            if functions.contains_key(&request.service) {
                return Err(OrchestratorError::new(
                    StatusCode::CONFLICT,
                    format!("function {} already exists", request.service),
                ));
            }
            let function = Self::build(request, min_replicas(request));
            info!(function = %function.name, image = %function.image, "cluster function deployed");
            functions.insert(request.service.clone(), function);
            Ok(())
        })
    }

    fn update<'a>(&'a self, request: &'a CreateFunctionRequest) -> OrchestratorFuture<'a, ()> {
        Box::pin(async move {
            let mut functions = self.functions.write().expect("orchestrator lock");
            let existing = functions
                .get(&request.service)
                .ok_or_else(|| OrchestratorError::not_found(&request.service))?;
            let replicas = match request.labels.as_ref().and_then(|l| l.get(MIN_SCALE_LABEL)) {
                Some(_) => min_replicas(request),
                None => existing.replicas,
            };
            functions.insert(request.service.clone(), Self::build(request, replicas));
            Ok(())
        })
    }

    fn delete<'a>(&'a self, name: &'a str) -> OrchestratorFuture<'a, ()> {
        Box::pin(async move {
            let mut functions = self.functions.write().expect("orchestrator lock");
            if functions.remove(name).is_none() {
                return Err(OrchestratorError::not_found(name));
            }
            info!(function = %name, "cluster function deleted");
            Ok(())
        })
    }

    fn scale<'a>(&'a self, name: &'a str, replicas: u64) -> OrchestratorFuture<'a, ()> {
        Box::pin(async move {
            let mut functions = self.functions.write().expect("orchestrator lock");
            let function = functions
                .get_mut(name)
                .ok_or_else(|| OrchestratorError::not_found(name))?;
            function.replicas = replicas;
            function.available_replicas = replicas;
            Ok(())
        })
    }
}
