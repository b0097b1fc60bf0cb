//! nicfaas-rpc: invoking jobs on offload nodes.
//!
//! A minimal datagram protocol: the request carries a 4-byte big-endian
//! job identifier and an opaque payload, the reply is the raw result
//! payload. Every read is bounded by a deadline.
//!
//! - **`frame`** - request encoding/decoding
//! - **`client`** - the UDP request/response exchange
//! - **`class`** - offload classes (SmartNIC, bare metal) and their ports

pub mod class;
pub mod client;
pub mod error;
pub mod frame;

pub use class::{OffloadClass, OffloadPorts};
pub use client::{DEFAULT_MAX_REPLY, DEFAULT_TIMEOUT, OffloadClient};
pub use error::{RpcError, RpcResult};
pub use frame::{PLACEHOLDER_PAYLOAD, decode_request, encode_request};
