//! Generation ring: fixed set of frame-table slots
//!
//! Loading a sequence moves to the next slot instead of rewriting the active table.
//! Tasks dispatched against earlier generations keep writing into their own table,
//! which stays parked in its slot until the ring comes back around. Reusing a slot
//! first waits for that slot's ledger to drain.

use log::{debug, info};
use std::path::PathBuf;
use std::sync::Arc;

use crate::entities::FrameTable;

/// Number of ring slots
pub const MAX_GENERATIONS: usize = 10;

#[derive(Debug)]
pub struct GenerationRing {
    slots: Vec<Option<Arc<FrameTable>>>,
    active: Option<usize>,
    next_id: u64,
}

impl Default for GenerationRing {
    fn default() -> Self {
        Self::new()
    }
}

impl GenerationRing {
    pub fn new() -> Self {
        Self {
            slots: vec![None; MAX_GENERATIONS],
            active: None,
            next_id: 0,
        }
    }

    /// Currently active table
    pub fn active(&self) -> Option<&Arc<FrameTable>> {
        self.active.and_then(|slot| self.slots[slot].as_ref())
    }

    pub fn active_slot(&self) -> Option<usize> {
        self.active
    }

    /// Install a new table for `paths` in the next slot and make it active.
    ///
    /// Blocks while the slot's previous occupant still has tasks in flight.
    pub fn advance(&mut self, paths: Vec<PathBuf>) -> Arc<FrameTable> {
        let slot = self.active.map(|s| (s + 1) % MAX_GENERATIONS).unwrap_or(0);

        if let Some(old) = self.slots[slot].take() {
            let pending = old.ledger().pending();
            if pending > 0 {
                info!(
                    "Waiting for {} tasks of gen {} before reusing slot {}",
                    pending,
                    old.generation(),
                    slot
                );
            }
            old.ledger().wait_drained();
        }

        let generation = self.next_id;
        self.next_id += 1;
        let table = Arc::new(FrameTable::new(generation, paths));
        self.slots[slot] = Some(Arc::clone(&table));
        self.active = Some(slot);

        debug!("Gen {} active in slot {} ({} frames)", generation, slot, table.len());
        table
    }

    /// Tasks still in flight across every retained generation
    pub fn pending_tasks(&self) -> usize {
        self.slots.iter().flatten().map(|t| t.ledger().pending()).sum()
    }

    /// Number of occupied slots
    pub fn retained(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    /// Block until every retained generation has no tasks in flight
    pub fn drain_all(&self) {
        for table in self.slots.iter().flatten() {
            table.ledger().wait_drained();
        }
    }
}
