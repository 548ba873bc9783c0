//! Types shared by the heavy render scheduler and its worker

use serde::Serialize;
use tokio::sync::oneshot;

use crate::models::RenderRequest;
use crate::render::Bitmap;

/// A queued heavy render and the channel its result is delivered on
#[derive(Debug)]
pub struct HeavyJob {
    pub id: u64,
    pub request: RenderRequest,
    pub completion: oneshot::Sender<Bitmap>,
}

/// What the worker is doing right now
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    Idle,
    Processing,
}

/// Statistics about heavy job execution
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStats {
    pub state: WorkerState,
    /// Jobs enqueued but not yet picked up by the worker
    pub queued: usize,
    pub completed: u64,
    pub simulated_delay_ms: u128,
}
