//! Heavy render scheduler handle and its single worker loop

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::types::{HeavyJob, SchedulerStats, WorkerState};
use crate::errors::SchedulerError;
use crate::models::RenderRequest;
use crate::render::{Bitmap, RenderEngine};
use crate::utils::human_format::format_elapsed;

/// Counters shared between the producer handles and the worker
#[derive(Debug)]
struct SharedState {
    processing: AtomicBool,
    queued: AtomicUsize,
    completed: AtomicU64,
    next_job_id: AtomicU64,
    simulated_delay: Duration,
}

/// Producer side of the heavy render queue
///
/// Cheap to clone; every clone feeds the same FIFO queue. When the last handle
/// is dropped the worker drains what is left and stops.
#[derive(Debug, Clone)]
pub struct HeavyRequestScheduler {
    sender: mpsc::UnboundedSender<HeavyJob>,
    shared: Arc<SharedState>,
}

/// The single consumer of the heavy render queue
pub struct HeavyWorker {
    receiver: mpsc::UnboundedReceiver<HeavyJob>,
    engine: Arc<dyn RenderEngine>,
    shared: Arc<SharedState>,
}

impl HeavyRequestScheduler {
    /// Create a scheduler handle and the worker that serves it.
    ///
    /// The worker does nothing until [`HeavyWorker::run`] is polled.
    pub fn new(engine: Arc<dyn RenderEngine>, simulated_delay: Duration) -> (Self, HeavyWorker) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let shared = Arc::new(SharedState {
            processing: AtomicBool::new(false),
            queued: AtomicUsize::new(0),
            completed: AtomicU64::new(0),
            next_job_id: AtomicU64::new(1),
            simulated_delay,
        });

        let scheduler = Self {
            sender,
            shared: shared.clone(),
        };
        let worker = HeavyWorker {
            receiver,
            engine,
            shared,
        };
        (scheduler, worker)
    }

    /// Create a scheduler and spawn its worker on the current runtime.
    pub fn spawn(
        engine: Arc<dyn RenderEngine>,
        simulated_delay: Duration,
    ) -> (Self, JoinHandle<()>) {
        let (scheduler, worker) = Self::new(engine, simulated_delay);
        let handle = tokio::spawn(worker.run());
        (scheduler, handle)
    }

    /// Append a job to the queue and return the channel its bitmap will
    /// arrive on.
    ///
    /// # Errors
    /// Returns `WorkerStopped` if the worker is no longer receiving jobs.
    pub fn enqueue(
        &self,
        request: RenderRequest,
    ) -> Result<oneshot::Receiver<Bitmap>, SchedulerError> {
        let (completion, receiver) = oneshot::channel();
        let id = self.shared.next_job_id.fetch_add(1, Ordering::Relaxed);

        self.shared.queued.fetch_add(1, Ordering::SeqCst);
        if self
            .sender
            .send(HeavyJob {
                id,
                request,
                completion,
            })
            .is_err()
        {
            self.shared.queued.fetch_sub(1, Ordering::SeqCst);
            return Err(SchedulerError::WorkerStopped);
        }

        debug!(
            job_id = id,
            resolution = %request.resolution(),
            queued = self.shared.queued.load(Ordering::SeqCst),
            "Enqueued heavy render"
        );
        Ok(receiver)
    }

    /// Enqueue a job and wait, without a timeout, for its bitmap.
    ///
    /// # Errors
    /// Returns `WorkerStopped` if the worker is gone or dropped the job.
    pub async fn submit(&self, request: RenderRequest) -> Result<Bitmap, SchedulerError> {
        let receiver = self.enqueue(request)?;
        receiver.await.map_err(|_| SchedulerError::WorkerStopped)
    }

    /// Get current execution statistics
    pub fn stats(&self) -> SchedulerStats {
        let state = if self.shared.processing.load(Ordering::SeqCst) {
            WorkerState::Processing
        } else {
            WorkerState::Idle
        };

        SchedulerStats {
            state,
            queued: self.shared.queued.load(Ordering::SeqCst),
            completed: self.shared.completed.load(Ordering::SeqCst),
            simulated_delay_ms: self.shared.simulated_delay.as_millis(),
        }
    }
}

impl HeavyWorker {
    /// Serve jobs in arrival order until every scheduler handle is dropped
    pub async fn run(mut self) {
        info!(
            "Starting heavy render worker (simulated delay: {})",
            humantime::format_duration(self.shared.simulated_delay)
        );

        while let Some(job) = self.receiver.recv().await {
            self.process(job).await;
        }

        info!("Heavy render worker stopped");
    }

    async fn process(&self, job: HeavyJob) {
        let HeavyJob {
            id,
            request,
            completion,
        } = job;

        self.shared.queued.fetch_sub(1, Ordering::SeqCst);
        self.shared.processing.store(true, Ordering::SeqCst);
        let start = Instant::now();

        tokio::time::sleep(self.shared.simulated_delay).await;

        let engine = self.engine.clone();
        let rendered = tokio::task::spawn_blocking(move || engine.render(&request)).await;

        self.shared.processing.store(false, Ordering::SeqCst);

        let bitmap = match rendered {
            Ok(bitmap) => bitmap,
            Err(e) => {
                // Dropping `completion` wakes the requester with an error
                error!(job_id = id, "Heavy render task failed: {}", e);
                return;
            }
        };

        self.shared.completed.fetch_add(1, Ordering::SeqCst);
        info!(
            job_id = id,
            resolution = %request.resolution(),
            "Heavy render completed in {}",
            format_elapsed(start.elapsed())
        );

        if completion.send(bitmap).is_err() {
            debug!(job_id = id, "Requester stopped waiting, heavy render discarded");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Resolution;
    use image::GrayImage;
    use std::sync::Mutex;

    /// Records the zoom of every request in service order
    #[derive(Default)]
    struct RecordingEngine {
        order: Mutex<Vec<u64>>,
        active: AtomicUsize,
        max_active: AtomicUsize,
    }

    impl RenderEngine for RecordingEngine {
        fn render(&self, request: &RenderRequest) -> Bitmap {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(5));
            self.order.lock().unwrap().push(request.zoom());
            self.active.fetch_sub(1, Ordering::SeqCst);
            GrayImage::new(1, 1)
        }
    }

    fn heavy(zoom: u64) -> RenderRequest {
        RenderRequest::new(0.0, 0.0, zoom, Resolution::Ultra).unwrap()
    }

    #[tokio::test]
    async fn test_jobs_served_in_fifo_order() {
        let engine = Arc::new(RecordingEngine::default());
        let (scheduler, _worker) =
            HeavyRequestScheduler::spawn(engine.clone(), Duration::from_millis(50));

        let mut a = scheduler.enqueue(heavy(1)).unwrap();
        let mut b = scheduler.enqueue(heavy(2)).unwrap();
        let mut c = scheduler.enqueue(heavy(3)).unwrap();

        (&mut a).await.unwrap();
        assert!(b.try_recv().is_err(), "B must not complete before A");
        assert!(c.try_recv().is_err(), "C must not complete before A");

        (&mut b).await.unwrap();
        assert!(c.try_recv().is_err(), "C must not complete before B");

        c.await.unwrap();

        assert_eq!(*engine.order.lock().unwrap(), vec![1, 2, 3]);
        assert_eq!(engine.max_active.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_only_one_job_processing_at_a_time() {
        let engine = Arc::new(RecordingEngine::default());
        let (scheduler, _worker) =
            HeavyRequestScheduler::spawn(engine.clone(), Duration::from_millis(1));

        let handles: Vec<_> = (1..=6)
            .map(|zoom| {
                let scheduler = scheduler.clone();
                tokio::spawn(async move { scheduler.submit(heavy(zoom)).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(engine.max_active.load(Ordering::SeqCst), 1);
        assert_eq!(engine.order.lock().unwrap().len(), 6);
        assert_eq!(scheduler.stats().completed, 6);
    }

    #[tokio::test]
    async fn test_simulated_delay_is_paid() {
        let engine = Arc::new(RecordingEngine::default());
        let delay = Duration::from_millis(120);
        let (scheduler, _worker) = HeavyRequestScheduler::spawn(engine, delay);

        let start = Instant::now();
        let bitmap = scheduler.submit(heavy(1)).await.unwrap();
        assert!(start.elapsed() >= delay);
        assert_eq!(bitmap.dimensions(), (1, 1));
    }

    #[tokio::test]
    async fn test_stats_track_queue_and_state() {
        let engine = Arc::new(RecordingEngine::default());
        let (scheduler, worker) =
            HeavyRequestScheduler::new(engine, Duration::from_millis(10));

        let first = scheduler.enqueue(heavy(1)).unwrap();
        let second = scheduler.enqueue(heavy(2)).unwrap();

        let stats = scheduler.stats();
        assert_eq!(stats.queued, 2);
        assert_eq!(stats.state, WorkerState::Idle);
        assert_eq!(stats.simulated_delay_ms, 10);

        tokio::spawn(worker.run());
        first.await.unwrap();
        second.await.unwrap();

        let stats = scheduler.stats();
        assert_eq!(stats.queued, 0);
        assert_eq!(stats.completed, 2);
        assert_eq!(stats.state, WorkerState::Idle);
    }

    #[tokio::test]
    async fn test_abandoned_job_still_runs() {
        let engine = Arc::new(RecordingEngine::default());
        let (scheduler, _worker) =
            HeavyRequestScheduler::spawn(engine.clone(), Duration::from_millis(5));

        drop(scheduler.enqueue(heavy(7)).unwrap());
        scheduler.submit(heavy(8)).await.unwrap();

        assert_eq!(*engine.order.lock().unwrap(), vec![7, 8]);
        assert_eq!(scheduler.stats().completed, 2);
    }

    #[tokio::test]
    async fn test_enqueue_fails_without_worker() {
        let engine = Arc::new(RecordingEngine::default());
        let (scheduler, worker) = HeavyRequestScheduler::new(engine, Duration::ZERO);
        drop(worker);

        assert_eq!(
            scheduler.enqueue(heavy(1)).unwrap_err(),
            SchedulerError::WorkerStopped
        );
        assert_eq!(scheduler.stats().queued, 0);
    }

    #[tokio::test]
    async fn test_worker_stops_when_handles_dropped() {
        let engine = Arc::new(RecordingEngine::default());
        let (scheduler, handle) = HeavyRequestScheduler::spawn(engine, Duration::ZERO);

        drop(scheduler);
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("worker should stop")
            .unwrap();
    }
}
