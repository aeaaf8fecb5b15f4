//! Adapter Statistics
//!
//! Statement counters shared by an adapter and every transaction scope it
//! opens.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct AdapterStats {
    selects: AtomicU64,
    inserts: AtomicU64,
    updates: AtomicU64,
    deletes: AtomicU64,
    transactions: AtomicU64,
}

/// Point-in-time copy of `AdapterStats`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AdapterStatsSnapshot {
    pub selects: u64,
    pub inserts: u64,
    pub updates: u64,
    pub deletes: u64,
    pub transactions: u64,
}

impl AdapterStatsSnapshot {
    /// Every call that reached the adapter
    pub fn total(&self) -> u64 {
        self.selects + self.inserts + self.updates + self.deletes + self.transactions
    }
}

impl AdapterStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_select(&self) {
        self.selects.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_insert(&self) {
        self.inserts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_update(&self) {
        self.updates.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_delete(&self) {
        self.deletes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_transaction(&self) {
        self.transactions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> AdapterStatsSnapshot {
        AdapterStatsSnapshot {
            selects: self.selects.load(Ordering::Relaxed),
            inserts: self.inserts.load(Ordering::Relaxed),
            updates: self.updates.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            transactions: self.transactions.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        self.selects.store(0, Ordering::Relaxed);
        self.inserts.store(0, Ordering::Relaxed);
        self.updates.store(0, Ordering::Relaxed);
        self.deletes.store(0, Ordering::Relaxed);
        self.transactions.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_and_reset() {
        let stats = AdapterStats::new();
        stats.record_select();
        stats.record_select();
        stats.record_insert();
        stats.record_transaction();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.selects, 2);
        assert_eq!(snapshot.total(), 4);

        stats.reset();
        assert_eq!(stats.snapshot(), AdapterStatsSnapshot::default());
    }
}
