//! PlacementScheduler: function lifecycle on top of the placement store.
//!
//! Translates register / rebalance / deregister intents into sequences
//! of store writes, with bounded retry for node selection and
//! best-effort cleanup on partial failure. Mutations of one function are
//! serialized through [`FunctionLocks`]; different functions never wait
//! on each other.

use std::time::{SystemTime, UNIX_EPOCH};

use rand::seq::SliceRandom;
use tracing::{debug, info, warn};

use nicfaas_state::keys::is_valid_segment;
use nicfaas_state::{Assignment, NodeId, PlacementStore, StateError};

use crate::error::{SchedulerError, SchedulerResult};
use crate::locks::FunctionLocks;
use crate::spread::even_spread;

/// Placement attempts made by `register` before giving up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// Creates, scales and removes function placements.
#[derive(Clone)]
pub struct PlacementScheduler {
    store: PlacementStore,
    locks: FunctionLocks,
    max_attempts: u32,
}

impl PlacementScheduler {
    pub fn new(store: PlacementStore) -> Self {
        Self {
            store,
            locks: FunctionLocks::new(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Override the register retry bound.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn store(&self) -> &PlacementStore {
        &self.store
    }

    /// Register `name` and place one replica on a random node.
    ///
    /// Returns the node that received the replica. While the placement
    /// loop runs the function is visible with zero assignments.
    pub async fn register(&self, name: &str) -> SchedulerResult<NodeId> {
        if !is_valid_segment(name) {
            return Err(SchedulerError::InvalidName(name.to_string()));
        }
        let _guard = self.locks.acquire(name).await;

        if self.store.function_exists(name).await? {
            return Err(SchedulerError::AlreadyRegistered(name.to_string()));
        }

        let nodes = self.store.list_nodes().await?;
        if nodes.is_empty() {
            warn!(function = %name, "cannot register: node pool is empty");
            return Err(SchedulerError::NoNodesAvailable);
        }

        let token = creation_token();
        self.store.set_function(name, &token).await?;
        info!(function = %name, %token, "function registered");

        let mut last_error = None;
        for attempt in 1..=self.max_attempts {
            let Some(node) = pick_node(&nodes) else {
                break;
            };
            match self.store.set_assignment(&node, name, 1).await {
                Ok(()) => {
                    info!(function = %name, %node, attempt, "placed initial replica");
                    return Ok(node);
                }
                Err(e) => {
                    warn!(function = %name, %node, attempt, error = %e, "placement attempt failed");
                    last_error = Some(e);
                }
            }
        }

        if let Err(e) = self.store.delete_function(name).await {
            warn!(function = %name, error = %e, "could not roll back function entry");
        }
        Err(SchedulerError::PlacementFailed {
            function: name.to_string(),
            reason: match last_error {
                Some(e) => format!("{} attempts exhausted: {e}", self.max_attempts),
                None => format!("{} attempts exhausted", self.max_attempts),
            },
        })
    }

    /// Re-specify the placement of `name` as `desired` replicas spread
    /// evenly over every known node.
    ///
    /// Writes every node, zeros included. A failed write stops the
    /// operation; writes already applied to other nodes are kept.
    pub async fn rebalance(&self, name: &str, desired: u32) -> SchedulerResult<Vec<Assignment>> {
        let _guard = self.locks.acquire(name).await;

        if !self.store.function_exists(name).await? {
            return Err(SchedulerError::NotFound(name.to_string()));
        }

        let nodes = self.store.list_nodes().await?;
        if nodes.is_empty() {
            return Err(SchedulerError::NoNodesAvailable);
        }

        let plan = even_spread(desired, &nodes);
        let mut applied = Vec::with_capacity(plan.len());
        for (node, replicas) in plan {
            if let Err(e) = self.store.set_assignment(&node, name, replicas).await {
                warn!(
                    function = %name,
                    %node,
                    applied = applied.len(),
                    error = %e,
                    "rebalance interrupted"
                );
                return Err(SchedulerError::PlacementFailed {
                    function: name.to_string(),
                    reason: format!("write to {node} failed: {e}"),
                });
            }
            debug!(function = %name, %node, replicas, "assignment set");
            applied.push(Assignment {
                node_id: node,
                function: name.to_string(),
                replicas,
            });
        }

        info!(function = %name, desired, nodes = applied.len(), "rebalanced");
        Ok(applied)
    }

    /// Remove every assignment of `name`, then its registry entry.
    ///
    /// Missing assignments are skipped. Any other failed assignment delete
    /// stops the operation with the registry entry still in place, so a
    /// retry can finish the cleanup. A missing registry entry counts as
    /// already removed, so calling this twice is harmless. Returns the
    /// number of assignment entries deleted.
    pub async fn deregister(&self, name: &str) -> SchedulerResult<u32> {
        let _guard = self.locks.acquire(name).await;

        let nodes = self.store.list_nodes().await?;
        let mut removed = 0;
        for node in &nodes {
            match self.store.delete_assignment(node, name).await {
                Ok(()) => {
                    removed += 1;
                    debug!(function = %name, %node, "assignment deleted");
                }
                Err(StateError::NotFound(_)) => {
                    debug!(function = %name, %node, "no assignment on node");
                }
                Err(source) => {
                    warn!(
                        function = %name,
                        %node,
                        removed,
                        error = %source,
                        "could not delete assignment, keeping function entry"
                    );
                    return Err(SchedulerError::DeregisterFailed {
                        function: name.to_string(),
                        source,
                    });
                }
            }
        }

        match self.store.delete_function(name).await {
            Ok(()) => info!(function = %name, assignments = removed, "function deregistered"),
            Err(StateError::NotFound(_)) => {
                debug!(function = %name, "function entry already gone");
            }
            Err(source) => {
                return Err(SchedulerError::DeregisterFailed {
                    function: name.to_string(),
                    source,
                });
            }
        }
        Ok(removed)
    }

    /// Total replicas of `name` across all known nodes.
    ///
    /// Missing and unparsable assignments count as zero.
    pub async fn count_replicas(&self, name: &str) -> SchedulerResult<u64> {
        let nodes = self.store.list_nodes().await?;
        let mut total: u64 = 0;
        for node in &nodes {
            match self.store.get_assignment(node, name).await {
                Ok(Some(replicas)) => total += u64::from(replicas),
                Ok(None) => {}
                Err(StateError::Malformed { key, value }) => {
                    warn!(%key, %value, "ignoring malformed assignment");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(total)
    }

    /// Nodes currently carrying at least one replica of `name`.
    pub async fn placement(&self, name: &str) -> SchedulerResult<Vec<Assignment>> {
        let nodes = self.store.list_nodes().await?;
        let mut placed = Vec::new();
        for node in nodes {
            match self.store.get_assignment(&node, name).await {
                Ok(Some(replicas)) if replicas > 0 => placed.push(Assignment {
                    node_id: node,
                    function: name.to_string(),
                    replicas,
                }),
                Ok(_) | Err(StateError::Malformed { .. }) => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(placed)
    }
}

fn pick_node(nodes: &[NodeId]) -> Option<NodeId> {
    nodes.choose(&mut rand::thread_rng()).cloned()
}

/// Diagnostic token; uniqueness is not relied upon.
fn creation_token() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos()
        .to_string()
}
