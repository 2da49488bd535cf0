use crate::models::TrainingMetrics;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub type TaskId = String;

/// How progress for a monitored task is obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorStrategy {
    /// Estimated from elapsed wall-clock time against a declared duration.
    Extrapolated,
    /// Delivered incrementally over a standing push channel.
    Streamed,
}

/// Lifecycle phase of a monitored task. Everything but `Running` is
/// terminal: no further progress updates are expected after it.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskPhase {
    Running,
    Completed,
    Stopped,
    Errored(String),
}

impl TaskPhase {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskPhase::Running)
    }
}

/// Point-in-time view of a monitored task, delivered on every update.
#[derive(Debug, Clone)]
pub struct TaskSnapshot {
    pub task_id: TaskId,
    pub strategy: MonitorStrategy,
    pub started_at: DateTime<Utc>,
    pub progress_percent: u8,
    pub phase: TaskPhase,
    pub current_epoch: u32,
    pub total_epochs: u32,
    pub current_batch: u32,
    pub total_batches: u32,
    pub metrics: TrainingMetrics,
    /// Rendered visualization reference, surfaced with the terminal update
    /// when the push channel provides one.
    pub visualization: Option<String>,
}

impl TaskSnapshot {
    pub(crate) fn new(task_id: TaskId, strategy: MonitorStrategy) -> Self {
        Self {
            task_id,
            strategy,
            started_at: Utc::now(),
            progress_percent: 0,
            phase: TaskPhase::Running,
            current_epoch: 0,
            total_epochs: 0,
            current_batch: 0,
            total_batches: 0,
            metrics: TrainingMetrics::default(),
            visualization: None,
        }
    }
}

pub(crate) type SharedTask = Arc<RwLock<TaskSnapshot>>;

/// Live subscription to one monitored task.
///
/// Dropping the subscription is the cancellation path: it aborts the
/// monitor worker, which tears down the cadence timer or closes the push
/// connection. That release happens on every exit path, error or not.
pub struct TaskSubscription {
    pub(crate) state: SharedTask,
    pub(crate) tx: mpsc::UnboundedSender<TaskSnapshot>,
    pub(crate) updates: mpsc::UnboundedReceiver<TaskSnapshot>,
    pub(crate) worker: JoinHandle<()>,
}

impl TaskSubscription {
    /// Next status update. `None` once the channel is exhausted.
    pub async fn recv(&mut self) -> Option<TaskSnapshot> {
        self.updates.recv().await
    }

    /// Current view of the task without waiting for an update.
    pub fn snapshot(&self) -> TaskSnapshot {
        self.state.read().clone()
    }

    pub fn task_id(&self) -> TaskId {
        self.state.read().task_id.clone()
    }
}

impl Drop for TaskSubscription {
    fn drop(&mut self) {
        self.worker.abort();
    }
}
