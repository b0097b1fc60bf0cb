//! nicfaas-scheduler: placement of offload functions.
//!
//! Built on the [`nicfaas_state::PlacementStore`]. The scheduler:
//!
//! - Registers a function and places its first replica on a random node
//! - Spreads a desired replica count evenly over the node pool
//! - Removes a function and all its assignments, idempotently
//! - Counts the replicas currently placed
//!
//! # Architecture
//!
//! ```text
//! PlacementScheduler
//!   ├── PlacementStore (node list, registry, assignments)
//!   └── FunctionLocks  (one async mutex per function being mutated)
//! ```

pub mod error;
pub mod locks;
pub mod scheduler;
pub mod spread;

pub use error::{SchedulerError, SchedulerResult};
pub use locks::{FunctionGuard, FunctionLocks};
pub use scheduler::{DEFAULT_MAX_ATTEMPTS, PlacementScheduler};
pub use spread::even_spread;
