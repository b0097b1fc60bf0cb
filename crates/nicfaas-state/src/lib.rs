//! nicfaas-state: placement store for offload-capable functions.
//!
//! Tracks which offload nodes exist, which functions are registered and
//! how many replicas of each function are assigned to each node, on top of
//! a pluggable directory-style key-value service.
//!
//! # Architecture
//!
//! ```text
//! PlacementStore  (key layout, typed operations)
//!   └── Arc<dyn KvDirectory>
//!         ├── MemoryDirectory  (tests, single process)
//!         ├── RedbDirectory    (embedded, persistent)
//!         └── EtcdDirectory    (etcd v3 JSON gateway)
//! ```
//!
//! `PlacementStore` is `Clone` + `Send` + `Sync` and is shared by the
//! scheduler and the dispatcher; it is the only owner of placement state.

pub mod directory;
pub mod embedded;
pub mod error;
pub mod etcd;
pub mod keys;
pub mod memory;
pub mod store;
pub mod types;

pub use directory::{KvDirectory, KvEntry, KvFuture};
pub use embedded::RedbDirectory;
pub use error::{StateError, StateResult};
pub use etcd::EtcdDirectory;
pub use memory::MemoryDirectory;
pub use store::PlacementStore;
pub use types::*;
