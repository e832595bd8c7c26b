//! Memory advisory checked between scheduler windows.

use sysinfo::{MemoryRefreshKind, RefreshKind, System};

const BYTES_PER_MB: u64 = 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemorySnapshot {
    pub total_mb: u64,
    pub available_mb: u64,
}

/// Read-only probe of system memory. A low reading is logged, never acted on.
pub struct MemoryMonitor {
    system: System,
    min_available_mb: u64,
}

impl MemoryMonitor {
    pub fn new(min_available_mb: u64) -> Self {
        let system = System::new_with_specifics(
            RefreshKind::nothing().with_memory(MemoryRefreshKind::everything()),
        );
        Self {
            system,
            min_available_mb,
        }
    }

    pub fn snapshot(&mut self) -> MemorySnapshot {
        self.system.refresh_memory();
        MemorySnapshot {
            total_mb: self.system.total_memory() / BYTES_PER_MB,
            available_mb: self.system.available_memory() / BYTES_PER_MB,
        }
    }

    /// Returns `true` when available memory is below the configured floor.
    pub fn check(&mut self, window: usize) -> bool {
        let snapshot = self.snapshot();
        let low = snapshot.available_mb < self.min_available_mb;
        if low {
            tracing::warn!(
                window,
                available_mb = snapshot.available_mb,
                total_mb = snapshot.total_mb,
                min_available_mb = self.min_available_mb,
                "available memory below advisory floor; continuing"
            );
        } else {
            tracing::debug!(window, available_mb = snapshot.available_mb, "memory check");
        }
        low
    }
}
