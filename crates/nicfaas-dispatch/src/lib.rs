//! nicfaas-dispatch: routing function calls.
//!
//! For each call the [`Dispatcher`] takes exactly one path:
//!
//! - **offload** - the body is a job id; a node is picked from the live pool
//!   (preferring nodes that hold replicas) and invoked over `nicfaas-rpc`.
//!   RPC timeouts surface as 504, other RPC failures as 502.
//! - **cluster** - the call is reverse-proxied to `<name>.<namespace>`.
//!
//! ```text
//! Dispatcher
//!   ├── NodePool          (store-backed nodes and placements, short TTL)
//!   ├── OffloadInvoker    (UDP RPC client)
//!   └── ClusterForwarder  (HTTP reverse proxy)
//! ```

pub mod cluster;
pub mod dispatcher;
pub mod error;
pub mod offload;
pub mod pool;
pub mod route;
pub mod timing;

pub use cluster::{ClusterForwarder, ClusterProxy, DEFAULT_CLUSTER_PORT, ForwardFuture};
pub use dispatcher::{DEFAULT_MAX_BODY, Dispatcher};
pub use error::{DispatchError, DispatchResult};
pub use offload::{InvokeFuture, OffloadInvoker};
pub use pool::{DEFAULT_POOL_TTL, NodePool, choose_node};
pub use route::Route;
pub use timing::{CALL_ID_HEADER, CallStamps};
