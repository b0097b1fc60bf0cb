//! Request and response bodies of the provider API.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Image tag reported for offload functions.
pub const OFFLOAD_IMAGE: &str = "smartnic";

/// Availability reported for offload functions; nodes do not report
/// per-replica health.
pub const OFFLOAD_AVAILABLE_REPLICAS: u64 = 4;

/// A deployed function as seen by API clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Function {
    pub name: String,
    pub replicas: u64,
    pub image: String,
    pub available_replicas: u64,
    pub invocation_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<BTreeMap<String, String>>,
}

impl Function {
    /// Reduced view of an offload function with `replicas` placed.
    pub fn offload(name: impl Into<String>, replicas: u64) -> Self {
        Self {
            name: name.into(),
            replicas,
            image: OFFLOAD_IMAGE.to_string(),
            available_replicas: OFFLOAD_AVAILABLE_REPLICAS,
            invocation_count: 0,
            labels: None,
        }
    }
}

/// Body of deploy and update calls.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFunctionRequest {
    pub service: String,
    #[serde(default)]
    pub image: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env_process: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env_vars: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constraints: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteFunctionRequest {
    pub function_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScaleServiceRequest {
    #[serde(default)]
    pub service_name: Option<String>,
    pub replicas: u64,
}

/// Replicas of one function on one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodePlacement {
    pub node: String,
    pub replicas: u32,
}

/// Where an offload function's replicas currently live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacementView {
    pub function: String,
    pub replicas: u64,
    pub nodes: Vec<NodePlacement>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn function_uses_camel_case() {
        let json = serde_json::to_value(Function::offload("echo-lambdanic", 3)).unwrap();
        assert_eq!(json["availableReplicas"], 4);
        assert_eq!(json["invocationCount"], 0);
        assert_eq!(json["image"], "smartnic");
        assert!(json.get("labels").is_none());
    }

    #[test]
    fn create_request_needs_only_service() {
        let req: CreateFunctionRequest = serde_json::from_str(r#"{"service":"figlet"}"#).unwrap();
        assert_eq!(req.service, "figlet");
        assert!(req.image.is_empty());
        assert!(req.constraints.is_empty());
    }

    #[test]
    fn scale_request_service_name_is_optional() {
        let req: ScaleServiceRequest = serde_json::from_str(r#"{"replicas":5}"#).unwrap();
        assert_eq!(req.replicas, 5);
        assert!(req.service_name.is_none());
    }
}
