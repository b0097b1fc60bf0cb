//! Per-call routing decision.

use nicfaas_rpc::OffloadClass;

/// Where a call for a function goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Offload node of the given class, over the datagram RPC.
    Offload(OffloadClass),
    /// The function's service in the cluster, over HTTP.
    Cluster,
}

impl Route {
    /// Decide from the function name alone.
    pub fn for_function(name: &str) -> Route {
        match OffloadClass::for_function(name) {
            Some(class) => Route::Offload(class),
            None => Route::Cluster,
        }
    }

    pub fn is_offload(&self) -> bool {
        matches!(self, Route::Offload(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            Route::Offload(class) => class.marker(),
            Route::Cluster => "cluster",
        }
    }
}
