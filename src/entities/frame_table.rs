//! Frame table: all records of one loaded sequence (one generation)
//!
//! A table is shared with worker threads through `Arc<FrameTable>`. Loading a new
//! sequence creates a new table instead of mutating this one, so tasks dispatched
//! against an old generation always have a valid target to write into.
//!
//! The task ledger counts work dispatched against the table that has not finished
//! yet. A ring slot holding the table is only recycled once the ledger drains.

use std::ops::Range;
use std::path::PathBuf;
use std::sync::{Condvar, Mutex};

use super::frame::{FrameRecord, LoadState};

/// Count of in-flight tasks against one generation
#[derive(Debug, Default)]
pub struct TaskLedger {
    pending: Mutex<usize>,
    drained: Condvar,
}

impl TaskLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task about to be dispatched
    pub fn begin(&self) {
        *self.pending.lock().unwrap_or_else(|e| e.into_inner()) += 1;
    }

    /// Task finished writing its record
    pub fn finish(&self) {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        *pending = pending.saturating_sub(1);
        if *pending == 0 {
            self.drained.notify_all();
        }
    }

    pub fn pending(&self) -> usize {
        *self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Block until every registered task has finished
    pub fn wait_drained(&self) {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        while *pending > 0 {
            pending = self
                .drained
                .wait(pending)
                .unwrap_or_else(|e| e.into_inner());
        }
    }
}

/// Ordered records of one sequence, tagged with a generation id
#[derive(Debug)]
pub struct FrameTable {
    generation: u64,
    records: Vec<FrameRecord>,
    ledger: TaskLedger,
}

impl FrameTable {
    /// Allocate one `NotLoaded` record per file
    pub fn new(generation: u64, paths: Vec<PathBuf>) -> Self {
        Self {
            generation,
            records: paths.into_iter().map(FrameRecord::new).collect(),
            ledger: TaskLedger::new(),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&FrameRecord> {
        self.records.get(idx)
    }

    /// Record by index.
    ///
    /// # Panics
    ///
    /// If `idx >= len()`. Callers index with the playhead, which is kept in range.
    pub fn record(&self, idx: usize) -> &FrameRecord {
        &self.records[idx]
    }

    pub fn iter(&self) -> impl Iterator<Item = &FrameRecord> {
        self.records.iter()
    }

    pub fn ledger(&self) -> &TaskLedger {
        &self.ledger
    }

    /// Snapshot of every record's state (debug strip / overlay data)
    pub fn states(&self) -> Vec<LoadState> {
        self.records.iter().map(|r| r.state()).collect()
    }

    /// Count presentable records inside the given index ranges
    pub fn count_presentable(&self, ranges: &[Range<usize>]) -> usize {
        ranges
            .iter()
            .flat_map(|r| self.records[r.clone()].iter())
            .filter(|r| r.is_presentable())
            .count()
    }

    /// Bytes currently held by decoded payloads
    pub fn resident_bytes(&self) -> usize {
        self.records.iter().map(|r| r.mem()).sum()
    }

    /// First record holding a payload, used as a representative for size estimates
    pub fn first_with_payload(&self) -> Option<&FrameRecord> {
        self.records.iter().find(|r| r.has_payload())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::frame::FramePayload;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn table(n: usize) -> FrameTable {
        let paths = (0..n).map(|i| PathBuf::from(format!("f{:04}.png", i))).collect();
        FrameTable::new(3, paths)
    }

    #[test]
    fn test_new_table_is_unloaded() {
        let t = table(5);
        assert_eq!(t.len(), 5);
        assert_eq!(t.generation(), 3);
        assert!(t.states().iter().all(|s| *s == LoadState::NotLoaded));
        assert_eq!(t.record(2).path(), PathBuf::from("f0002.png").as_path());
    }

    #[test]
    fn test_count_presentable_over_ranges() {
        let t = table(6);
        for i in [0, 1, 5] {
            t.record(i).try_claim();
            t.record(i).complete(FramePayload::Empty, 0.0);
        }
        assert_eq!(t.count_presentable(&[0..2]), 2);
        assert_eq!(t.count_presentable(&[4..6, 0..1]), 2);
        assert_eq!(t.count_presentable(&[2..5]), 0);
    }

    #[test]
    fn test_ledger_counts() {
        let ledger = TaskLedger::new();
        ledger.begin();
        ledger.begin();
        assert_eq!(ledger.pending(), 2);
        ledger.finish();
        ledger.finish();
        ledger.finish(); // saturates
        assert_eq!(ledger.pending(), 0);
    }

    #[test]
    fn test_wait_drained_blocks_until_finish() {
        let t = Arc::new(table(2));
        t.ledger().begin();

        let worker = {
            let t = Arc::clone(&t);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                t.ledger().finish();
            })
        };

        t.ledger().wait_drained();
        assert_eq!(t.ledger().pending(), 0);
        worker.join().unwrap();
    }
}
