//! Loader pool: background decode dispatch and completion tracking
//!
//! Owns the worker threads and the tick-side view of in-flight work. Workers write
//! straight into the frame record they claimed; the tick thread only learns about
//! completions through `poll()`, which feeds the latency estimate and frees a slot
//! in the outstanding set.
//!
//! # Scheduling
//!
//! Once per tick `dispatch()`:
//! 1. Budget = worker count - outstanding tasks
//! 2. Buffer nearly full (smoothed fullness > 0.75) and window smaller than the
//!    sequence: budget drops to at most 1
//! 3. Scan forward from the playhead (wrapping, one lap max) for a `NotLoaded` record,
//!    skipping records already resident on the GPU when textures persist
//! 4. Spawn only if the candidate lies inside the buffer window, else stop
//!
//! # Generations
//!
//! Every task holds an `Arc<FrameTable>` and bumps its ledger before it is queued.
//! The ledger is released after the record is written, so a ring slot is only
//! recycled once nothing can touch it anymore.

use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{debug, trace, warn};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use super::buffer::BufferManager;
use super::error::SequenceError;
use super::workers::Workers;
use crate::entities::{Decode, Decoder, FramePayload, FrameRecord, FrameTable, LoadState};

/// Smoothed fullness above which dispatch is throttled to one task per tick
pub const SPAWN_THROTTLE_FULLNESS: f32 = 0.75;

/// Exponential smoothing factor for decode latency
pub const LATENCY_SMOOTHING: f32 = 0.1;

/// In-flight unit of work
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoaderTask {
    pub frame: usize,
    pub generation: u64,
}

/// Completion report sent by a worker
#[derive(Debug, Clone, Copy)]
pub struct LoadResult {
    pub frame: usize,
    pub generation: u64,
    pub elapsed_ms: f32,
    pub ok: bool,
}

pub struct LoaderPool {
    workers: Option<Workers>, // None in immediate mode
    worker_count: usize,
    decoder: Arc<Decoder>,
    outstanding: Vec<LoaderTask>,
    results_tx: Sender<LoadResult>,
    results_rx: Receiver<LoadResult>,
    avg_load_ms: f32,
}

impl std::fmt::Debug for LoaderPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoaderPool")
            .field("worker_count", &self.worker_count)
            .field("decoder", &self.decoder)
            .field("outstanding", &self.outstanding.len())
            .field("avg_load_ms", &self.avg_load_ms)
            .finish()
    }
}

impl LoaderPool {
    /// Start `worker_count` decode threads. Zero threads means immediate mode.
    pub fn new(worker_count: usize, decoder: Decoder) -> Result<Self, SequenceError> {
        let workers = if worker_count > 0 {
            Some(Workers::new(worker_count).map_err(SequenceError::WorkerSpawn)?)
        } else {
            None
        };
        // Unbounded: a worker must never block on send, or draining a generation could deadlock
        let (results_tx, results_rx) = unbounded();

        debug!(
            "LoaderPool: {} workers, decoder {}",
            worker_count,
            decoder.label()
        );

        Ok(Self {
            workers,
            worker_count,
            decoder: Arc::new(decoder),
            outstanding: Vec::with_capacity(worker_count),
            results_tx,
            results_rx,
            avg_load_ms: 0.0,
        })
    }

    pub fn is_immediate(&self) -> bool {
        self.workers.is_none()
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    pub fn decoder(&self) -> &Decoder {
        &self.decoder
    }

    pub fn outstanding_count(&self) -> usize {
        self.outstanding.len()
    }

    pub fn outstanding(&self) -> &[LoaderTask] {
        &self.outstanding
    }

    /// Smoothed decode latency (ms), successful decodes only
    pub fn avg_load_ms(&self) -> f32 {
        self.avg_load_ms
    }

    fn record_latency(&mut self, sample_ms: f32) {
        self.avg_load_ms += LATENCY_SMOOTHING * (sample_ms - self.avg_load_ms);
    }

    /// Claim `frame` and queue its decode. No-op unless the record is `NotLoaded`.
    pub fn try_spawn(&mut self, table: &Arc<FrameTable>, frame: usize) -> bool {
        let Some(workers) = &self.workers else {
            return false;
        };
        let Some(record) = table.get(frame) else {
            return false;
        };
        if !record.try_claim() {
            return false;
        }

        let generation = table.generation();
        table.ledger().begin();
        self.outstanding.push(LoaderTask { frame, generation });

        let table = Arc::clone(table);
        let decoder = Arc::clone(&self.decoder);
        let tx = self.results_tx.clone();

        workers.execute(move || {
            let (elapsed_ms, ok) = decode_into(&decoder, table.record(frame));
            table.ledger().finish();
            // Receiver only disappears with the pool itself
            let _ = tx.send(LoadResult {
                frame,
                generation,
                elapsed_ms,
                ok,
            });
        });

        trace!("Spawned decode gen {} frame {}", generation, frame);
        true
    }

    /// Collect finished tasks without blocking. Returns how many completed.
    pub fn poll(&mut self) -> usize {
        let mut completed = 0;
        while let Ok(result) = self.results_rx.try_recv() {
            if let Some(pos) = self
                .outstanding
                .iter()
                .position(|t| t.frame == result.frame && t.generation == result.generation)
            {
                self.outstanding.swap_remove(pos);
            }
            if result.ok {
                self.record_latency(result.elapsed_ms);
            }
            trace!(
                "Decode done gen {} frame {} in {:.1}ms (ok={})",
                result.generation, result.frame, result.elapsed_ms, result.ok
            );
            completed += 1;
        }
        completed
    }

    /// Run one tick of the scheduling policy. Returns how many tasks were spawned.
    pub fn dispatch(
        &mut self,
        table: &Arc<FrameTable>,
        playhead: usize,
        buffer: &BufferManager,
        persist_gpu: bool,
    ) -> usize {
        let n = table.len();
        if self.is_immediate() || n == 0 {
            return 0;
        }

        let mut budget = self.worker_count.saturating_sub(self.outstanding.len());
        if buffer.fullness() > SPAWN_THROTTLE_FULLNESS && !buffer.spans(n) {
            budget = budget.min(1);
        }

        let mut spawned = 0;
        let mut offset = 0;
        while spawned < budget {
            let candidate = (offset..n).find(|&o| {
                let record = table.record((playhead + o) % n);
                record.state() == LoadState::NotLoaded && !(persist_gpu && record.is_gpu_loaded())
            });
            // One full lap without a candidate: everything is loaded or in flight
            let Some(found) = candidate else {
                break;
            };
            let idx = (playhead + found) % n;
            if !buffer.contains(idx, playhead, n) {
                break;
            }
            if self.try_spawn(table, idx) {
                spawned += 1;
            }
            offset = found + 1;
        }

        if spawned > 0 {
            debug!(
                "Dispatched {} (outstanding {}/{}, fullness {:.2}, playhead {})",
                spawned,
                self.outstanding.len(),
                self.worker_count,
                buffer.fullness(),
                playhead
            );
        }
        spawned
    }

    /// Decode `frame` on the calling thread. Returns false if the record was
    /// not `NotLoaded` or the decode failed.
    pub fn load_now(&mut self, table: &FrameTable, frame: usize) -> bool {
        let Some(record) = table.get(frame) else {
            return false;
        };
        if !record.try_claim() {
            return false;
        }
        let (elapsed_ms, ok) = decode_into(&self.decoder, record);
        if ok {
            self.record_latency(elapsed_ms);
        }
        trace!(
            "Decoded gen {} frame {} inline in {:.1}ms",
            table.generation(),
            frame,
            elapsed_ms
        );
        ok
    }
}

/// Decode a claimed record and store the result. Failures and panics store an
/// empty payload so the record still reaches `ReadyForPresentation`.
fn decode_into(decoder: &Decoder, record: &FrameRecord) -> (f32, bool) {
    let start = Instant::now();
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| decoder.decode(record.path())));
    let elapsed_ms = start.elapsed().as_secs_f32() * 1000.0;

    let (payload, ok) = match outcome {
        Ok(Ok(payload)) => (payload, true),
        Ok(Err(e)) => {
            warn!("Failed to decode {}: {}", record.path().display(), e);
            (FramePayload::Empty, false)
        }
        Err(_) => {
            warn!("Decoder panicked on {}", record.path().display());
            (FramePayload::Empty, false)
        }
    };
    record.complete(payload, elapsed_ms);
    (elapsed_ms, ok)
}
