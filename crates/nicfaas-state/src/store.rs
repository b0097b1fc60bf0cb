//! PlacementStore: semantic layer over a key-value directory.
//!
//! Owns the key layout (see [`crate::keys`]) for the offload node
//! inventory, the function registry and the per-node replica counts.
//! Errors are reported truthfully: a missing key on delete is a
//! `NotFound` error here, and it is up to callers whether that matters.

use std::sync::Arc;

use tracing::{debug, info};

use crate::directory::KvDirectory;
use crate::error::{StateError, StateResult};
use crate::keys::{self, child_name, is_valid_segment};
use crate::types::{Assignment, FunctionRecord, NodeId};

/// Shared handle to the placement directory.
#[derive(Clone)]
pub struct PlacementStore {
    dir: Arc<dyn KvDirectory>,
}

impl PlacementStore {
    pub fn new(dir: Arc<dyn KvDirectory>) -> Self {
        Self { dir }
    }

    /// Reset the store for a fresh process and provision `nodes`.
    ///
    /// Wipes the node inventory, the function registry and all
    /// assignments, then writes one entry per node.
    pub async fn initialize(&self, nodes: &[NodeId]) -> StateResult<()> {
        for dir in [keys::NODES_DIR, keys::FUNCTIONS_DIR, keys::DEPLOYMENTS_DIR] {
            let removed = self.dir.delete_prefix(dir).await?;
            if removed > 0 {
                info!(%dir, removed, "cleared stale placement directory");
            }
        }
        for node in nodes {
            self.add_node(node).await?;
        }
        info!(nodes = nodes.len(), "placement store initialized");
        Ok(())
    }

    // ── Nodes ──────────────────────────────────────────────────────

    /// Provision one node. The id becomes a key segment, so it may not
    /// contain `/`.
    pub async fn add_node(&self, node_id: &str) -> StateResult<()> {
        check_segment(node_id)?;
        self.dir.set(&keys::node_key(node_id), node_id).await?;
        debug!(node = %node_id, "offload node added");
        Ok(())
    }

    /// Offload nodes in key order. Empty when none are provisioned.
    pub async fn list_nodes(&self) -> StateResult<Vec<NodeId>> {
        let entries = self.dir.list(keys::NODES_DIR).await?;
        Ok(sorted_children(keys::NODES_DIR, entries))
    }

    // ── Functions ──────────────────────────────────────────────────

    /// Whether `name` is registered. A lookup miss is `false`, not an error.
    pub async fn function_exists(&self, name: &str) -> StateResult<bool> {
        match self.dir.get(&keys::function_key(name)).await {
            Ok(_) => Ok(true),
            Err(StateError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Registered function names, ordered by full key path.
    pub async fn list_functions(&self) -> StateResult<Vec<String>> {
        let entries = self.dir.list(keys::FUNCTIONS_DIR).await?;
        Ok(sorted_children(keys::FUNCTIONS_DIR, entries))
    }

    /// Read a function's registry entry, if present.
    pub async fn get_function(&self, name: &str) -> StateResult<Option<FunctionRecord>> {
        match self.dir.get(&keys::function_key(name)).await {
            Ok(token) => Ok(Some(FunctionRecord {
                name: name.to_string(),
                creation_token: token,
            })),
            Err(StateError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn set_function(&self, name: &str, token: &str) -> StateResult<()> {
        check_segment(name)?;
        self.dir.set(&keys::function_key(name), token).await?;
        debug!(function = %name, %token, "function registered");
        Ok(())
    }

    pub async fn delete_function(&self, name: &str) -> StateResult<()> {
        self.dir.delete(&keys::function_key(name)).await?;
        debug!(function = %name, "function entry deleted");
        Ok(())
    }

    // ── Assignments ────────────────────────────────────────────────

    /// Replica count of `name` on `node_id`; `None` if no entry exists.
    ///
    /// A value that is not a non-negative integer is reported as
    /// [`StateError::Malformed`].
    pub async fn get_assignment(&self, node_id: &str, name: &str) -> StateResult<Option<u32>> {
        let key = keys::assignment_key(node_id, name);
        match self.dir.get(&key).await {
            Ok(value) => match value.trim().parse::<u32>() {
                Ok(count) => Ok(Some(count)),
                Err(_) => Err(StateError::Malformed { key, value }),
            },
            Err(StateError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn set_assignment(
        &self,
        node_id: &str,
        name: &str,
        replicas: u32,
    ) -> StateResult<()> {
        check_segment(node_id)?;
        check_segment(name)?;
        let key = keys::assignment_key(node_id, name);
        self.dir.set(&key, &replicas.to_string()).await?;
        debug!(%key, replicas, "assignment written");
        Ok(())
    }

    pub async fn delete_assignment(&self, node_id: &str, name: &str) -> StateResult<()> {
        self.dir.delete(&keys::assignment_key(node_id, name)).await
    }

    /// Every assignment entry for `name` across known nodes, zero counts included.
    pub async fn list_assignments(&self, name: &str) -> StateResult<Vec<Assignment>> {
        let mut assignments = Vec::new();
        for node_id in self.list_nodes().await? {
            if let Some(replicas) = self.get_assignment(&node_id, name).await? {
                assignments.push(Assignment {
                    node_id,
                    function: name.to_string(),
                    replicas,
                });
            }
        }
        Ok(assignments)
    }
}

fn check_segment(segment: &str) -> StateResult<()> {
    if is_valid_segment(segment) {
        Ok(())
    } else {
        Err(StateError::InvalidName(segment.to_string()))
    }
}

fn sorted_children(dir: &str, mut entries: Vec<crate::directory::KvEntry>) -> Vec<String> {
    entries.sort_by(|a, b| a.key.cmp(&b.key));
    entries
        .iter()
        .filter_map(|e| child_name(dir, &e.key).map(str::to_string))
        .collect()
}
