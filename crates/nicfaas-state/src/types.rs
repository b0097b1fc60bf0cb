//! Domain types for the placement store.

use serde::{Deserialize, Serialize};

/// Identifier of an offload node (typically its IP address).
pub type NodeId = String;

/// Replicas of one function placed on one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub node_id: NodeId,
    pub function: String,
    pub replicas: u32,
}

/// A registered offload function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionRecord {
    pub name: String,
    /// Opaque token written at registration, for diagnostics only.
    pub creation_token: String,
}
