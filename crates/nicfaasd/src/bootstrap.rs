//! Wires the subsystems together from resolved settings.

use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use nicfaas_api::{ApiState, LocalOrchestrator};
use nicfaas_dispatch::{ClusterProxy, Dispatcher, NodePool};
use nicfaas_rpc::OffloadClient;
use nicfaas_scheduler::PlacementScheduler;
use nicfaas_state::{EtcdDirectory, KvDirectory, MemoryDirectory, PlacementStore, RedbDirectory};
use tracing::info;

use crate::config::{Settings, StoreBackend};

/// Open the directory backing the placement store.
pub fn open_directory(backend: &StoreBackend) -> anyhow::Result<Arc<dyn KvDirectory>> {
    let dir: Arc<dyn KvDirectory> = match backend {
        StoreBackend::Memory => Arc::new(MemoryDirectory::new()),
        StoreBackend::Redb(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
            let redb = RedbDirectory::open(path)
                .with_context(|| format!("opening {}", path.display()))?;
            Arc::new(redb)
        }
        StoreBackend::Etcd(endpoint) => Arc::new(EtcdDirectory::new(endpoint.as_str())),
    };
    info!(store = %backend, "placement directory opened");
    Ok(dir)
}

/// Build the provider router.
///
/// Resets the placement store and provisions the configured nodes; any
/// failure here is fatal for the daemon.
pub async fn build_app(settings: &Settings) -> anyhow::Result<Router> {
    let store = PlacementStore::new(open_directory(&settings.store)?);
    store
        .initialize(&settings.nodes)
        .await
        .with_context(|| format!("initializing placement store ({})", settings.store))?;

    let scheduler = PlacementScheduler::new(store.clone());
    let dispatcher = Dispatcher::new(
        NodePool::new(store, settings.pool_ttl),
        Arc::new(OffloadClient::new().with_timeout(settings.rpc_timeout)),
        Arc::new(ClusterProxy::new(
            settings.namespace.clone(),
            settings.cluster_port,
            settings.read_timeout,
        )),
    )
    .with_ports(settings.ports)
    .with_max_body(settings.max_body);

    info!(
        nodes = settings.nodes.len(),
        namespace = %settings.namespace,
        rpc_timeout_ms = settings.rpc_timeout.as_millis() as u64,
        "subsystems initialized"
    );

    Ok(nicfaas_api::build_router(ApiState {
        scheduler,
        orchestrator: Arc::new(LocalOrchestrator::new()),
        dispatcher,
    }))
}
