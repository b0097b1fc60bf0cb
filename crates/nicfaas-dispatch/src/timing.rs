//! Per-call correlation stamps.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Response header carrying the call's correlation stamp.
pub const CALL_ID_HEADER: &str = "x-call-id";

/// Issues `<unix-secs>-<sequence>` stamps, unique within the process.
#[derive(Debug, Default)]
pub struct CallStamps {
    seq: AtomicU64,
}

impl CallStamps {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self) -> String {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        format!("{secs}-{seq}")
    }
}
