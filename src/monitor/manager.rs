use crate::api::ApiClient;
use crate::error::{ClientError, Result};
use crate::events::{Severity, ViewBridge};
use crate::models::TrainingConfig;
use crate::monitor::task::{
    MonitorStrategy, SharedTask, TaskId, TaskPhase, TaskSnapshot, TaskSubscription,
};
use crate::monitor::{extrapolated, streamed};
use crate::session::SessionManager;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Applied when the server omits its runtime estimate.
const DEFAULT_ESTIMATED_DURATION_MINS: u64 = 30;

/// Cadence of the elapsed-time extrapolation.
const DEFAULT_TICK: Duration = Duration::from_secs(1);

/// Tracks long-running backend jobs through either strategy and owns the
/// authenticated start/stop calls. Bearer tokens are re-read from the
/// session per call, never cached here.
pub struct TaskMonitor {
    api: ApiClient,
    session: Arc<SessionManager>,
    bridge: Arc<dyn ViewBridge>,
    tick: Duration,
    ws_base_url: Option<String>,
}

impl TaskMonitor {
    pub fn new(api: ApiClient, session: Arc<SessionManager>, bridge: Arc<dyn ViewBridge>) -> Self {
        Self {
            api,
            session,
            bridge,
            tick: DEFAULT_TICK,
            ws_base_url: None,
        }
    }

    pub fn with_tick_interval(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Override the progress channel base URL. By default it is derived
    /// from the API base URL by swapping the scheme.
    pub fn with_ws_base_url(mut self, url: String) -> Self {
        self.ws_base_url = Some(url.trim_end_matches('/').to_string());
        self
    }

    /// Start a training job and monitor it by elapsed-time extrapolation;
    /// the training endpoint offers no push channel, only an estimate.
    pub async fn start_training(
        &self,
        files: Vec<(String, Vec<u8>)>,
        config: &TrainingConfig,
    ) -> Result<TaskSubscription> {
        let token = self.require_token()?;
        let response = self.fail_auth(self.api.start_training(&token, files, config).await)?;

        let estimated = Duration::from_secs(
            60 * response
                .estimated_duration
                .unwrap_or(DEFAULT_ESTIMATED_DURATION_MINS),
        );

        Ok(self.watch_extrapolated(response.task_id, Some(estimated)))
    }

    /// Monitor a task by elapsed-time extrapolation against the estimated
    /// duration (30 minutes when none was supplied).
    pub fn watch_extrapolated(
        &self,
        task_id: TaskId,
        estimated: Option<Duration>,
    ) -> TaskSubscription {
        let estimated = estimated
            .unwrap_or_else(|| Duration::from_secs(60 * DEFAULT_ESTIMATED_DURATION_MINS));

        log::info!(
            "monitoring task {} by extrapolation over {:?}",
            task_id,
            estimated
        );

        let state: SharedTask = Arc::new(RwLock::new(TaskSnapshot::new(
            task_id,
            MonitorStrategy::Extrapolated,
        )));
        let (tx, updates) = mpsc::unbounded_channel();
        let worker =
            extrapolated::spawn(state.clone(), tx.clone(), self.tick, estimated, self.bridge.clone());

        TaskSubscription {
            state,
            tx,
            updates,
            worker,
        }
    }

    /// Monitor a task over its push channel. Opens exactly one standing
    /// connection for the task; a channel failure surfaces as an `Errored`
    /// update and is not retried.
    pub async fn watch_streamed(&self, task_id: TaskId) -> Result<TaskSubscription> {
        let url = self.progress_channel_url(&task_id);
        let stream = streamed::connect(&url).await?;

        let state: SharedTask = Arc::new(RwLock::new(TaskSnapshot::new(
            task_id,
            MonitorStrategy::Streamed,
        )));
        let (tx, updates) = mpsc::unbounded_channel();
        let worker = streamed::spawn(stream, state.clone(), tx.clone(), self.bridge.clone());

        Ok(TaskSubscription {
            state,
            tx,
            updates,
            worker,
        })
    }

    /// Stop the underlying job. Distinct from unsubscribing: this asks the
    /// server to end the job, and on success the local task goes to
    /// `Stopped` with progress reset to 0 — a stopped job has no
    /// meaningful final progress, whatever was last observed.
    pub async fn stop(&self, subscription: &TaskSubscription) -> Result<String> {
        let token = self.require_token()?;
        let response = self.fail_auth(self.api.stop_training(&token).await)?;

        subscription.worker.abort();
        let update = {
            let mut snap = subscription.state.write();
            snap.phase = TaskPhase::Stopped;
            snap.progress_percent = 0;
            snap.clone()
        };
        let _ = subscription.tx.send(update);

        log::info!("task {} stopped", subscription.task_id());
        self.bridge
            .notify("Training Stopped", &response.message, Severity::Info);

        Ok(response.message)
    }

    fn require_token(&self) -> Result<String> {
        self.session.bearer_token()?.ok_or(ClientError::Unauthorized)
    }

    /// An unauthorized response on any authenticated call invalidates the
    /// stored credential, whichever call it was.
    fn fail_auth<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(ClientError::Unauthorized) = &result {
            log::info!("server rejected credential, forcing re-login");
            self.session.invalidate_credential();
        }
        result
    }

    fn progress_channel_url(&self, task_id: &str) -> String {
        let base = match &self.ws_base_url {
            Some(base) => base.clone(),
            None => {
                let http_base = self.api.base_url();
                if let Some(rest) = http_base.strip_prefix("https://") {
                    format!("wss://{}", rest)
                } else if let Some(rest) = http_base.strip_prefix("http://") {
                    format!("ws://{}", rest)
                } else {
                    http_base.to_string()
                }
            }
        };
        format!("{}/admin/ws/training-progress/{}", base, task_id)
    }
}
