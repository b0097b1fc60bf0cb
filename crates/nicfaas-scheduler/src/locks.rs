//! Per-function mutual exclusion.
//!
//! The placement directory has no compare-and-swap, so concurrent
//! mutations of the same function are serialized in process. Each
//! function name maps to an async mutex that lives only as long as some
//! operation holds or waits on it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::OwnedMutexGuard;

struct Slot {
    lock: Arc<tokio::sync::Mutex<()>>,
    /// Operations holding or waiting on `lock`.
    users: usize,
}

type Slots = Arc<Mutex<HashMap<String, Slot>>>;

/// Map from function name to its placement lock.
#[derive(Clone, Default)]
pub struct FunctionLocks {
    slots: Slots,
}

/// Counts one user of a slot; the slot is removed with its last user,
/// including users whose wait was cancelled.
struct Registration {
    name: String,
    slots: Slots,
}

impl Drop for Registration {
    fn drop(&mut self) {
        let mut slots = self.slots.lock().expect("function locks");
        if let Some(slot) = slots.get_mut(&self.name) {
            slot.users -= 1;
            if slot.users == 0 {
                slots.remove(&self.name);
            }
        }
    }
}

/// Held for the duration of one placement operation.
pub struct FunctionGuard {
    _guard: OwnedMutexGuard<()>,
    _registration: Registration,
}

impl FunctionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `name`.
    pub async fn acquire(&self, name: &str) -> FunctionGuard {
        let (lock, registration) = {
            let mut slots = self.slots.lock().expect("function locks");
            let slot = slots.entry(name.to_string()).or_insert_with(|| Slot {
                lock: Arc::default(),
                users: 0,
            });
            slot.users += 1;
            let registration = Registration {
                name: name.to_string(),
                slots: Arc::clone(&self.slots),
            };
            (Arc::clone(&slot.lock), registration)
        };
        let guard = lock.lock_owned().await;
        FunctionGuard {
            _guard: guard,
            _registration: registration,
        }
    }

    /// Number of names with a live lock (held or awaited).
    pub fn active(&self) -> usize {
        self.slots.lock().expect("function locks").len()
    }
}
