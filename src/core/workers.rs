//! Fixed-size thread pool for background frame decoding
//!
//! Uses crossbeam work-stealing deques:
//! - Jobs are pushed to a global injector
//! - Each worker refills its local deque from the injector in batches
//! - Idle workers steal from each other before sleeping
//!
//! There is no cancellation: once a job is pushed it runs to completion.
//! Dropping the pool signals shutdown and joins every thread after the queue empties.

use crossbeam::deque::{Injector, Stealer, Worker};
use log::trace;
use std::iter;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Idle back-off between queue checks
const IDLE_SLEEP: Duration = Duration::from_millis(1);

/// Worker pool with work-stealing for even job distribution.
///
/// # Example
/// ```ignore
/// let workers = Workers::new(4)?;
/// workers.execute(move || {
///     let payload = decoder.decode(&path);
///     record.complete(payload, elapsed);
/// });
/// ```
pub struct Workers {
    injector: Arc<Injector<Job>>,         // Global queue for external tasks
    handles: Vec<thread::JoinHandle<()>>, // Thread handles for shutdown
    shutdown: Arc<AtomicBool>,            // Shutdown signal
}

impl Workers {
    /// Spawn `num_threads` worker threads.
    pub fn new(num_threads: usize) -> std::io::Result<Self> {
        let injector: Arc<Injector<Job>> = Arc::new(Injector::new());
        let shutdown = Arc::new(AtomicBool::new(false));

        let locals: Vec<Worker<Job>> = (0..num_threads).map(|_| Worker::new_fifo()).collect();
        let stealers: Vec<Stealer<Job>> = locals.iter().map(|w| w.stealer()).collect();

        let mut pool = Self {
            injector,
            handles: Vec::with_capacity(num_threads),
            shutdown,
        };

        for (worker_id, local) in locals.into_iter().enumerate() {
            let injector = Arc::clone(&pool.injector);
            let shutdown = Arc::clone(&pool.shutdown);
            let stealers = stealers.clone();

            // On spawn failure `pool` drops here, which shuts down the threads already started
            let handle = thread::Builder::new()
                .name(format!("seqplay-worker-{}", worker_id))
                .spawn(move || {
                    trace!("Worker {} started", worker_id);

                    loop {
                        if let Some(job) = find_job(&local, &injector, &stealers) {
                            job();
                            continue;
                        }

                        // Queue is empty: exit only now so pushed jobs always run
                        if shutdown.load(Ordering::Acquire) {
                            break;
                        }

                        thread::sleep(IDLE_SLEEP);
                    }

                    trace!("Worker {} stopped", worker_id);
                })?;

            pool.handles.push(handle);
        }

        trace!("Workers initialized: {} threads (work-stealing)", num_threads);
        Ok(pool)
    }

    /// Number of worker threads
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Run closure on a worker thread. Closure runs asynchronously, no return value.
    pub fn execute<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.injector.push(Box::new(f));
    }
}

/// Local deque first, then a batch from the injector, then other workers
fn find_job(local: &Worker<Job>, injector: &Injector<Job>, stealers: &[Stealer<Job>]) -> Option<Job> {
    local.pop().or_else(|| {
        iter::repeat_with(|| {
            injector
                .steal_batch_and_pop(local)
                .or_else(|| stealers.iter().map(|s| s.steal()).collect())
        })
        .find(|s| !s.is_retry())
        .and_then(|s| s.success())
    })
}

impl Drop for Workers {
    fn drop(&mut self) {
        let num_threads = self.handles.len();
        trace!("Workers shutting down ({} threads)...", num_threads);

        self.shutdown.store(true, Ordering::Release);

        for handle in std::mem::take(&mut self.handles) {
            let _ = handle.join();
        }

        trace!("All {} workers stopped", num_threads);
    }
}
