use std::sync::atomic::{AtomicU64, Ordering};

use callbridge_core::CallId;

/// Hands out call identifiers, starting at 1.
///
/// Identifiers are never reused for the lifetime of the allocator, which
/// lives as long as its client.
#[derive(Debug)]
pub struct CallIdAllocator {
    next: AtomicU64,
}

impl CallIdAllocator {
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    pub fn next(&self) -> CallId {
        CallId::new(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for CallIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}
