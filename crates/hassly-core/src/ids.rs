// ── Correlation ids ──
//
// Ids below `FIRST_SEQUENTIAL_ID` are reserved for the bootstrap sequence
// and heartbeat probes. Everything a caller issues draws from a counter
// that starts above the reserved range, so the two never collide.

use std::sync::atomic::{AtomicU64, Ordering};

/// Fixed ids, stable for the lifetime of a session.
pub mod reserved {
    pub const DEVICE_REGISTRY: u64 = 1;
    pub const ENTITY_REGISTRY: u64 = 2;
    pub const AREA_REGISTRY: u64 = 3;
    pub const LABEL_REGISTRY: u64 = 4;
    pub const STATES: u64 = 5;
    pub const CONFIG: u64 = 6;
    pub const SERVICES: u64 = 7;
    pub const EVENTS_SUBSCRIPTION: u64 = 8;
    pub const HEARTBEAT: u64 = 9;
}

/// First id handed out by [`RequestIds`].
pub const FIRST_SEQUENTIAL_ID: u64 = 100;

/// Whether `id` belongs to the reserved range.
pub fn is_reserved(id: u64) -> bool {
    id < FIRST_SEQUENTIAL_ID
}

/// Monotonic id allocator for caller-issued requests.
#[derive(Debug)]
pub(crate) struct RequestIds {
    next: AtomicU64,
}

impl RequestIds {
    pub(crate) fn new() -> Self {
        Self {
            next: AtomicU64::new(FIRST_SEQUENTIAL_ID),
        }
    }

    /// Next id that `in_flight` does not claim.
    pub(crate) fn next(&self, in_flight: impl Fn(u64) -> bool) -> u64 {
        loop {
            let id = self.next.fetch_add(1, Ordering::Relaxed);
            if id < FIRST_SEQUENTIAL_ID {
                // Wrapped around; skip back over the reserved range.
                self.next.store(FIRST_SEQUENTIAL_ID, Ordering::Relaxed);
                continue;
            }
            if !in_flight(id) {
                return id;
            }
        }
    }

    /// Restart the sequence after a new connection is established.
    pub(crate) fn reset(&self) {
        self.next.store(FIRST_SEQUENTIAL_ID, Ordering::Relaxed);
    }
}
