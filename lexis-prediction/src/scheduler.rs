//! PredictiveScheduler: background pre-fetch of likely-needed embeddings.
//!
//! One dedicated worker thread (`lexis-predictive`) repeats a cycle of
//! predict, enqueue and drain. Stop requests travel over a crossbeam
//! channel; the worker checks it between fetches and while waiting, and
//! signals completion on a second channel so `stop` can bound its wait.
//!
//! The scheduler only holds `Weak` references to the cache and tracker.
//! Once either is dropped the worker exits on its own.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use chrono::Utc;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use lexis_cache::key::normalize;
use lexis_cache::EmbeddingCache;
use lexis_core::config::PredictionConfig;
use lexis_core::traits::IEmbeddingProvider;
use lexis_observability::events;
use moka::sync::Cache;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::queue::PredictiveQueue;
use crate::scoring::{self, PredictionCandidate};
use crate::throttle::RequestPacer;
use crate::tracker::UsagePatternTracker;

/// Worker thread name.
pub const WORKER_THREAD_NAME: &str = "lexis-predictive";

/// Upper bound on texts held in the failure back-off cache.
const BACKOFF_CAPACITY: u64 = 10_000;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// How a `stop` call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    NotRunning,
    Stopped,
    /// The worker did not finish within the join timeout and was detached.
    TimedOut,
}

/// Counts for one prediction cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleReport {
    pub predicted: usize,
    pub enqueued: usize,
    pub fetched: usize,
    pub failed: usize,
    /// Dropped because cached meanwhile or backing off after a failure.
    pub skipped: usize,
}

/// Cumulative scheduler statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchedulerStats {
    pub running: bool,
    pub cycles: u64,
    pub predicted: u64,
    pub fetched: u64,
    pub failed: u64,
    pub skipped_cached: u64,
    pub skipped_backoff: u64,
    pub leaked_workers: u64,
    pub queue_len: usize,
    pub backoff_len: u64,
}

#[derive(Debug, Default)]
struct PredictionContext {
    texts: HashSet<String>,
    test_type: String,
}

#[derive(Debug, Default)]
struct Counters {
    cycles: AtomicU64,
    predicted: AtomicU64,
    fetched: AtomicU64,
    failed: AtomicU64,
    skipped_cached: AtomicU64,
    skipped_backoff: AtomicU64,
}

/// Why a cycle ended early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Interrupt {
    Stop,
    /// The cache or tracker has been dropped.
    Orphaned,
}

/// State shared between the handle and the worker thread.
struct Shared {
    cache: Weak<EmbeddingCache>,
    tracker: Weak<UsagePatternTracker>,
    provider: Arc<dyn IEmbeddingProvider>,
    config: PredictionConfig,
    model: String,
    context: Mutex<PredictionContext>,
    queue: Mutex<PredictiveQueue>,
    backoff: Cache<String, ()>,
    pacer: Mutex<RequestPacer>,
    counters: Counters,
    running: AtomicBool,
}

impl Shared {
    fn predict(&self) -> Result<Vec<PredictionCandidate>, Interrupt> {
        let cache = self.cache.upgrade().ok_or(Interrupt::Orphaned)?;
        let tracker = self.tracker.upgrade().ok_or(Interrupt::Orphaned)?;
        let (context, test_type) = {
            let ctx = lock(&self.context);
            (ctx.texts.clone(), ctx.test_type.clone())
        };

        let patterns = tracker.snapshot();
        let candidates = scoring::rank(
            patterns.iter().map(|(text, pattern)| (text.as_str(), pattern)),
            &test_type,
            self.config.max_predictions,
            Utc::now(),
            |text| context.contains(text) || cache.contains(text, &self.model),
        );
        self.counters
            .predicted
            .fetch_add(candidates.len() as u64, Ordering::Relaxed);
        Ok(candidates)
    }

    fn enqueue(&self, candidates: Vec<PredictionCandidate>) -> usize {
        let mut queue = lock(&self.queue);
        candidates.into_iter().filter(|c| queue.push(c.clone())).count()
    }

    /// Wait `duration`, returning early with `Interrupt::Stop` if a stop
    /// arrives. Without a stop channel this is a plain sleep.
    fn wait(&self, duration: Duration, stop: Option<&Receiver<()>>) -> Result<(), Interrupt> {
        if duration.is_zero() {
            return Ok(());
        }
        match stop {
            Some(rx) => match rx.recv_timeout(duration) {
                Err(RecvTimeoutError::Timeout) => Ok(()),
                Ok(()) | Err(RecvTimeoutError::Disconnected) => Err(Interrupt::Stop),
            },
            None => {
                thread::sleep(duration);
                Ok(())
            }
        }
    }

    fn drain(&self, stop: Option<&Receiver<()>>, report: &mut CycleReport) -> Result<(), Interrupt> {
        loop {
            if let Some(rx) = stop {
                if stop_requested(rx) {
                    return Err(Interrupt::Stop);
                }
            }
            let Some(candidate) = lock(&self.queue).pop() else {
                return Ok(());
            };

            let already_cached = {
                let cache = self.cache.upgrade().ok_or(Interrupt::Orphaned)?;
                cache.contains(&candidate.text, &self.model)
            };
            if already_cached {
                self.counters.skipped_cached.fetch_add(1, Ordering::Relaxed);
                report.skipped += 1;
                continue;
            }
            if self.backoff.contains_key(&candidate.text) {
                self.counters.skipped_backoff.fetch_add(1, Ordering::Relaxed);
                report.skipped += 1;
                continue;
            }

            let wait = lock(&self.pacer).wait_at(Instant::now());
            self.wait(wait, stop)?;
            lock(&self.pacer).mark(Instant::now());

            match self
                .provider
                .fetch_embedding(&candidate.text, &self.model, self.config.fetch_timeout())
            {
                Ok(vector) => {
                    let cache = self.cache.upgrade().ok_or(Interrupt::Orphaned)?;
                    if cache.put_predicted(&candidate.text, vector, &self.model, candidate.score) {
                        self.counters.fetched.fetch_add(1, Ordering::Relaxed);
                        report.fetched += 1;
                    } else {
                        report.failed += 1;
                    }
                }
                Err(e) => {
                    warn!(
                        text = %events::preview(&candidate.text),
                        provider = self.provider.name(),
                        error = %e,
                        "predictive fetch failed, backing off"
                    );
                    self.backoff.insert(candidate.text.clone(), ());
                    self.counters.failed.fetch_add(1, Ordering::Relaxed);
                    report.failed += 1;
                }
            }
        }
    }

    fn run_cycle(&self, stop: Option<&Receiver<()>>) -> Result<CycleReport, Interrupt> {
        let cycle = self.counters.cycles.fetch_add(1, Ordering::Relaxed) + 1;
        let span = lexis_observability::prediction_cycle_span!(cycle);
        let _guard = span.enter();

        let candidates = self.predict()?;
        let mut report = CycleReport {
            predicted: candidates.len(),
            ..Default::default()
        };
        report.enqueued = self.enqueue(candidates);
        self.drain(stop, &mut report)?;

        events::prediction_cycle_completed(
            report.predicted,
            report.fetched,
            report.failed,
            report.skipped,
        );
        Ok(report)
    }
}

fn stop_requested(rx: &Receiver<()>) -> bool {
    match rx.try_recv() {
        Ok(()) | Err(TryRecvError::Disconnected) => true,
        Err(TryRecvError::Empty) => false,
    }
}

fn worker_loop(shared: Arc<Shared>, stop_rx: Receiver<()>, done_tx: Sender<()>) {
    shared.running.store(true, Ordering::SeqCst);
    debug!("predictive worker started");
    loop {
        match shared.run_cycle(Some(&stop_rx)) {
            Ok(_) => {}
            Err(Interrupt::Stop) => break,
            Err(Interrupt::Orphaned) => {
                info!("cache or tracker dropped, predictive worker exiting");
                break;
            }
        }
        if shared.wait(shared.config.cycle_interval(), Some(&stop_rx)).is_err() {
            break;
        }
    }
    shared.running.store(false, Ordering::SeqCst);
    debug!("predictive worker stopped");
    let _ = done_tx.send(());
}

struct Worker {
    stop_tx: Sender<()>,
    done_rx: Receiver<()>,
    handle: JoinHandle<()>,
}

/// Handle to the background pre-fetch worker. Dropping it stops the worker.
pub struct PredictiveScheduler {
    shared: Arc<Shared>,
    worker: Mutex<Option<Worker>>,
    leaked_workers: AtomicU64,
}

impl std::fmt::Debug for PredictiveScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PredictiveScheduler")
            .field("model", &self.shared.model)
            .field("running", &self.is_running())
            .finish()
    }
}

impl PredictiveScheduler {
    pub fn new(
        cache: &Arc<EmbeddingCache>,
        tracker: &Arc<UsagePatternTracker>,
        provider: Arc<dyn IEmbeddingProvider>,
        config: PredictionConfig,
        model: impl Into<String>,
    ) -> Self {
        let backoff = Cache::builder()
            .max_capacity(BACKOFF_CAPACITY)
            .time_to_live(config.failure_backoff().max(Duration::from_millis(1)))
            .build();
        let pacer = RequestPacer::new(config.min_request_delay());
        Self {
            shared: Arc::new(Shared {
                cache: Arc::downgrade(cache),
                tracker: Arc::downgrade(tracker),
                provider,
                config,
                model: model.into(),
                context: Mutex::new(PredictionContext::default()),
                queue: Mutex::new(PredictiveQueue::new()),
                backoff,
                pacer: Mutex::new(pacer),
                counters: Counters::default(),
                running: AtomicBool::new(false),
            }),
            worker: Mutex::new(None),
            leaked_workers: AtomicU64::new(0),
        }
    }

    /// Start the worker. Returns `false` if it is already running, if
    /// prediction is disabled, or if the thread could not be spawned.
    pub fn start(&self) -> bool {
        if !self.shared.config.enabled {
            info!("predictive pre-loading disabled, not starting");
            return false;
        }
        let mut slot = lock(&self.worker);
        if let Some(worker) = slot.as_ref() {
            if !worker.handle.is_finished() {
                warn!("predictive worker already running");
                return false;
            }
        }
        if let Some(finished) = slot.take() {
            let _ = finished.handle.join();
        }

        let (stop_tx, stop_rx) = bounded(1);
        let (done_tx, done_rx) = bounded(1);
        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || worker_loop(shared, stop_rx, done_tx));

        match spawned {
            Ok(handle) => {
                *slot = Some(Worker {
                    stop_tx,
                    done_rx,
                    handle,
                });
                info!(model = %self.shared.model, "predictive worker started");
                true
            }
            Err(e) => {
                error!(error = %e, "failed to spawn predictive worker");
                false
            }
        }
    }

    /// Ask the worker to stop and wait up to the join timeout.
    ///
    /// Safe from any thread. A worker still busy after the timeout is
    /// detached and counted in `leaked_workers`.
    pub fn stop(&self) -> StopOutcome {
        let Some(worker) = lock(&self.worker).take() else {
            return StopOutcome::NotRunning;
        };
        let _ = worker.stop_tx.try_send(());

        let join_timeout = self.shared.config.join_timeout();
        match worker.done_rx.recv_timeout(join_timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                let _ = worker.handle.join();
                info!("predictive worker stopped");
                StopOutcome::Stopped
            }
            Err(RecvTimeoutError::Timeout) => {
                let leaked = self.leaked_workers.fetch_add(1, Ordering::Relaxed) + 1;
                events::scheduler_leaked(leaked, join_timeout.as_millis());
                StopOutcome::TimedOut
            }
        }
    }

    pub fn is_running(&self) -> bool {
        lock(&self.worker)
            .as_ref()
            .is_some_and(|worker| !worker.handle.is_finished())
    }

    /// One synchronous cycle on the caller's thread.
    pub fn run_once(&self) -> CycleReport {
        match self.shared.run_cycle(None) {
            Ok(report) => report,
            Err(_) => {
                debug!("cache or tracker dropped, nothing to predict");
                CycleReport::default()
            }
        }
    }

    /// Texts on screen right now (never predicted) and the active test type.
    pub fn set_context<S: AsRef<str>>(&self, texts: &[S], test_type: &str) {
        let mut ctx = lock(&self.shared.context);
        ctx.texts = texts
            .iter()
            .map(|t| normalize(t.as_ref()))
            .filter(|t| !t.is_empty())
            .collect();
        ctx.test_type = test_type.to_string();
    }

    /// Rank candidates for the current context without fetching anything.
    pub fn predict(&self) -> Vec<PredictionCandidate> {
        self.shared.predict().unwrap_or_default()
    }

    /// Queue candidates for the next drain. Returns how many were new.
    pub fn enqueue(&self, candidates: Vec<PredictionCandidate>) -> usize {
        self.shared.enqueue(candidates)
    }

    pub fn queue_len(&self) -> usize {
        lock(&self.shared.queue).len()
    }

    pub fn clear_queue(&self) {
        lock(&self.shared.queue).clear();
    }

    pub fn stats(&self) -> SchedulerStats {
        let c = &self.shared.counters;
        SchedulerStats {
            running: self.is_running(),
            cycles: c.cycles.load(Ordering::Relaxed),
            predicted: c.predicted.load(Ordering::Relaxed),
            fetched: c.fetched.load(Ordering::Relaxed),
            failed: c.failed.load(Ordering::Relaxed),
            skipped_cached: c.skipped_cached.load(Ordering::Relaxed),
            skipped_backoff: c.skipped_backoff.load(Ordering::Relaxed),
            leaked_workers: self.leaked_workers.load(Ordering::Relaxed),
            queue_len: self.queue_len(),
            backoff_len: self.shared.backoff.entry_count(),
        }
    }

    /// Whether the worker loop is inside its run (set by the worker itself).
    pub fn worker_active(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }
}

impl Drop for PredictiveScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
