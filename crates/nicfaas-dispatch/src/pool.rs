//! Live offload node pool.
//!
//! Nodes and per-function assignments are always resolved through the
//! placement store. Both are reused for at most `ttl`; a zero TTL reads
//! the store on every call.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use nicfaas_state::{Assignment, NodeId, PlacementStore, StateError, StateResult};
use rand::seq::SliceRandom;
use tracing::{debug, warn};

pub const DEFAULT_POOL_TTL: Duration = Duration::from_secs(5);

struct Cached<T> {
    fetched_at: Instant,
    value: T,
}

impl<T> Cached<T> {
    fn fresh(&self, ttl: Duration) -> bool {
        self.fetched_at.elapsed() < ttl
    }
}

/// Short-lived cache of the node inventory and of function placements.
#[derive(Clone)]
pub struct NodePool {
    store: PlacementStore,
    ttl: Duration,
    cached: Arc<Mutex<Option<Cached<Vec<NodeId>>>>>,
    placements: Arc<Mutex<HashMap<String, Cached<Vec<Assignment>>>>>,
}

impl NodePool {
    pub fn new(store: PlacementStore, ttl: Duration) -> Self {
        Self {
            store,
            ttl,
            cached: Arc::new(Mutex::new(None)),
            placements: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Current node list, from cache if still fresh.
    pub async fn nodes(&self) -> StateResult<Vec<NodeId>> {
        if !self.ttl.is_zero() {
            let cached = self.cached.lock().expect("node pool lock");
            if let Some(c) = cached.as_ref().filter(|c| c.fresh(self.ttl)) {
                return Ok(c.value.clone());
            }
        }

        let nodes = self.store.list_nodes().await?;
        debug!(count = nodes.len(), "node pool refreshed");

        if !self.ttl.is_zero() {
            *self.cached.lock().expect("node pool lock") = Some(Cached {
                fetched_at: Instant::now(),
                value: nodes.clone(),
            });
        }
        Ok(nodes)
    }

    /// Non-zero assignments of `function` on the given pool nodes, from
    /// cache if still fresh.
    ///
    /// Only `nodes` are queried, one read each. Malformed counts are
    /// skipped.
    pub async fn placement(
        &self,
        function: &str,
        nodes: &[NodeId],
    ) -> StateResult<Vec<Assignment>> {
        if !self.ttl.is_zero() {
            let placements = self.placements.lock().expect("placement cache lock");
            if let Some(c) = placements.get(function).filter(|c| c.fresh(self.ttl)) {
                return Ok(c.value.clone());
            }
        }

        let mut placed = Vec::new();
        for node in nodes {
            match self.store.get_assignment(node, function).await {
                Ok(Some(replicas)) if replicas > 0 => placed.push(Assignment {
                    node_id: node.clone(),
                    function: function.to_string(),
                    replicas,
                }),
                Ok(_) => {}
                Err(StateError::Malformed { key, value }) => {
                    warn!(%key, %value, "ignoring malformed assignment");
                }
                Err(e) => return Err(e),
            }
        }
        debug!(%function, nodes = placed.len(), "placement refreshed");

        if !self.ttl.is_zero() {
            let mut placements = self.placements.lock().expect("placement cache lock");
            placements.retain(|_, c| c.fresh(self.ttl));
            placements.insert(
                function.to_string(),
                Cached {
                    fetched_at: Instant::now(),
                    value: placed.clone(),
                },
            );
        }
        Ok(placed)
    }

    /// Drop every cached listing so the next calls hit the store.
    pub fn invalidate(&self) {
        *self.cached.lock().expect("node pool lock") = None;
        self.placements.lock().expect("placement cache lock").clear();
    }
}

/// Pick a node for one call.
///
/// Nodes holding replicas of the function are preferred, weighted by
/// their replica count. Assignments on nodes no longer in `pool` are
/// ignored. Without usable assignments the choice is uniform over `pool`.
pub fn choose_node(pool: &[NodeId], placement: &[Assignment]) -> Option<NodeId> {
    let mut rng = rand::thread_rng();

    let assigned: Vec<&Assignment> = placement
        .iter()
        .filter(|a| a.replicas > 0 && pool.contains(&a.node_id))
        .collect();
    if let Ok(a) = assigned.choose_weighted(&mut rng, |a| a.replicas) {
        return Some(a.node_id.clone());
    }

    pool.choose(&mut rng).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use nicfaas_state::{KvDirectory, MemoryDirectory};

    fn nodes(ids: &[&str]) -> Vec<NodeId> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    fn assignment(node: &str, replicas: u32) -> Assignment {
        Assignment {
            node_id: node.into(),
            function: "f-lambdanic".into(),
            replicas,
        }
    }

    async fn store_with(ids: &[&str]) -> PlacementStore {
        let store = PlacementStore::new(Arc::new(MemoryDirectory::new()));
        store.initialize(&nodes(ids)).await.unwrap();
        store
    }

    #[tokio::test]
    async fn cached_listing_is_reused_until_invalidated() {
        let store = store_with(&["10.0.0.1"]).await;
        let pool = NodePool::new(store.clone(), Duration::from_secs(60));

        assert_eq!(pool.nodes().await.unwrap(), nodes(&["10.0.0.1"]));
        store.add_node("10.0.0.2").await.unwrap();
        assert_eq!(pool.nodes().await.unwrap(), nodes(&["10.0.0.1"]));

        pool.invalidate();
        assert_eq!(pool.nodes().await.unwrap(), nodes(&["10.0.0.1", "10.0.0.2"]));
    }

    #[tokio::test]
    async fn zero_ttl_always_reads_store() {
        let store = store_with(&["10.0.0.1"]).await;
        let pool = NodePool::new(store.clone(), Duration::ZERO);

        pool.nodes().await.unwrap();
        store.add_node("10.0.0.2").await.unwrap();
        assert_eq!(pool.nodes().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn expired_listing_is_refreshed() {
        let store = store_with(&["10.0.0.1"]).await;
        let pool = NodePool::new(store.clone(), Duration::from_millis(20));

        pool.nodes().await.unwrap();
        store.add_node("10.0.0.2").await.unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(pool.nodes().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn placement_reads_only_pool_nodes() {
        let store = store_with(&["a", "b", "c"]).await;
        store.set_assignment("a", "f-lambdanic", 2).await.unwrap();
        store.set_assignment("b", "f-lambdanic", 0).await.unwrap();
        store.set_assignment("c", "f-lambdanic", 5).await.unwrap();
        let pool = NodePool::new(store, Duration::ZERO);

        let placed = pool.placement("f-lambdanic", &nodes(&["a", "b"])).await.unwrap();
        assert_eq!(placed, vec![assignment("a", 2)]);
    }

    #[tokio::test]
    async fn cached_placement_is_reused_until_invalidated() {
        let store = store_with(&["a", "b"]).await;
        store.set_assignment("a", "f-lambdanic", 1).await.unwrap();
        let pool = NodePool::new(store.clone(), Duration::from_secs(60));
        let pool_nodes = nodes(&["a", "b"]);

        assert_eq!(pool.placement("f-lambdanic", &pool_nodes).await.unwrap().len(), 1);
        store.set_assignment("b", "f-lambdanic", 3).await.unwrap();
        assert_eq!(pool.placement("f-lambdanic", &pool_nodes).await.unwrap().len(), 1);

        pool.invalidate();
        let placed = pool.placement("f-lambdanic", &pool_nodes).await.unwrap();
        assert_eq!(placed, vec![assignment("a", 1), assignment("b", 3)]);
    }

    #[tokio::test]
    async fn malformed_assignment_is_skipped() {
        let dir = Arc::new(MemoryDirectory::new());
        let store = PlacementStore::new(dir.clone());
        store.initialize(&nodes(&["a", "b"])).await.unwrap();
        store.set_assignment("a", "f-lambdanic", 4).await.unwrap();
        dir.set("/deployments/smartnic/b/f-lambdanic", "lots").await.unwrap();
        let pool = NodePool::new(store, Duration::ZERO);

        let placed = pool.placement("f-lambdanic", &nodes(&["a", "b"])).await.unwrap();
        assert_eq!(placed, vec![assignment("a", 4)]);
    }

    #[test]
    fn empty_pool_yields_nothing() {
        assert_eq!(choose_node(&[], &[]), None);
        assert_eq!(choose_node(&[], &[assignment("10.0.0.1", 2)]), None);
    }

    #[test]
    fn assigned_node_is_preferred() {
        let pool = nodes(&["a", "b", "c"]);
        let placement = vec![assignment("b", 3)];
        for _ in 0..50 {
            assert_eq!(choose_node(&pool, &placement).as_deref(), Some("b"));
        }
    }

    #[test]
    fn zero_weights_and_stale_nodes_fall_back_to_pool() {
        let pool = nodes(&["a", "b"]);
        let placement = vec![assignment("a", 0), assignment("gone", 4)];
        for _ in 0..50 {
            let node = choose_node(&pool, &placement).unwrap();
            assert!(pool.contains(&node));
        }
    }

    #[test]
    fn weighted_choice_stays_within_assigned_nodes() {
        let pool = nodes(&["a", "b", "c"]);
        let placement = vec![assignment("a", 1), assignment("c", 5)];
        for _ in 0..100 {
            let node = choose_node(&pool, &placement).unwrap();
            assert_ne!(node, "b");
        }
    }
}
