use crate::error::{ClientError, Result};
use crate::events::{Severity, ViewBridge};
use crate::models::TrainingStatus;
use crate::monitor::task::{SharedTask, TaskPhase, TaskSnapshot};
use futures_util::StreamExt;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

pub(crate) type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Open the standing progress connection for one task. Exactly one
/// connection exists per subscription; there is no automatic reconnect on
/// failure, the caller resubscribes if it wants to keep watching.
pub(crate) async fn connect(url: &str) -> Result<WsStream> {
    info!("connecting to training progress channel at {}", url);

    let (stream, _) = connect_async(url).await.map_err(|e| {
        ClientError::Channel(format!("failed to connect to progress channel: {}", e))
    })?;

    Ok(stream)
}

/// Consume the push channel until a terminal update or channel failure.
/// Closing the connection (by dropping the subscription, which aborts this
/// worker) is the only way to stop watching a job that keeps running.
pub(crate) fn spawn(
    stream: WsStream,
    state: SharedTask,
    tx: mpsc::UnboundedSender<TaskSnapshot>,
    bridge: Arc<dyn ViewBridge>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let (_write, mut read) = stream.split();

        while let Some(message) = read.next().await {
            match message {
                Ok(Message::Text(text)) => {
                    let status: TrainingStatus = match serde_json::from_str(text.as_str()) {
                        Ok(status) => status,
                        Err(e) => {
                            // Malformed frames are fatal for the channel,
                            // never silently coerced.
                            error!("malformed progress message: {}", e);
                            let update =
                                fail(&state, format!("malformed progress message: {}", e));
                            let _ = tx.send(update);
                            return;
                        }
                    };

                    let update = {
                        let mut snap = state.write();
                        if snap.phase.is_terminal() {
                            return;
                        }
                        apply(&mut snap, &status);
                        snap.clone()
                    };

                    let done = update.phase.is_terminal();
                    if tx.send(update).is_err() {
                        return;
                    }
                    if done {
                        info!("training finished, progress channel consumed");
                        bridge.notify(
                            "Training Complete",
                            "The model has been successfully trained!",
                            Severity::Success,
                        );
                        return;
                    }
                }
                Ok(Message::Close(frame)) => {
                    debug!("progress channel closed by server: {:?}", frame);
                    break;
                }
                Ok(_) => {
                    // ping/pong/binary, nothing to apply
                }
                Err(e) => {
                    error!("progress channel error: {}", e);
                    let update = fail(&state, e.to_string());
                    let _ = tx.send(update);
                    return;
                }
            }
        }

        // The server went away without delivering a terminal update.
        let still_running = state.read().phase == TaskPhase::Running;
        if still_running {
            warn!("progress channel closed before completion");
            let update = fail(&state, "progress channel closed before completion".to_string());
            let _ = tx.send(update);
        }
    })
}

/// Fold one inbound status object into the task snapshot: progress and
/// epoch/batch counters are replaced, metric series are appended, and
/// `is_training == false` at full progress marks completion, carrying the
/// visualization reference when the message has one.
fn apply(snap: &mut TaskSnapshot, status: &TrainingStatus) {
    snap.progress_percent = status.progress.min(100);
    snap.current_epoch = status.current_epoch;
    snap.total_epochs = status.total_epochs;
    snap.current_batch = status.current_batch;
    snap.total_batches = status.total_batches;

    if let Some(metrics) = &status.metrics {
        snap.metrics.extend_from(metrics);
    }
    if status.training_visualization.is_some() {
        snap.visualization = status.training_visualization.clone();
    }

    if !status.is_training && status.progress >= 100 {
        snap.phase = TaskPhase::Completed;
    }
}

fn fail(state: &SharedTask, message: String) -> TaskSnapshot {
    let mut snap = state.write();
    snap.phase = TaskPhase::Errored(message);
    snap.clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TrainingMetrics;
    use crate::monitor::task::MonitorStrategy;

    fn running_snapshot() -> TaskSnapshot {
        TaskSnapshot::new("session-7".to_string(), MonitorStrategy::Streamed)
    }

    fn status(progress: u8, is_training: bool) -> TrainingStatus {
        TrainingStatus {
            progress,
            is_training,
            current_epoch: 0,
            total_epochs: 0,
            current_batch: 0,
            total_batches: 0,
            metrics: None,
            training_visualization: None,
        }
    }

    #[test]
    fn test_apply_replaces_progress_and_counters() {
        let mut snap = running_snapshot();
        let mut update = status(45, true);
        update.current_epoch = 4;
        update.total_epochs = 10;
        update.current_batch = 12;
        update.total_batches = 32;

        apply(&mut snap, &update);

        assert_eq!(snap.progress_percent, 45);
        assert_eq!(snap.current_epoch, 4);
        assert_eq!(snap.total_batches, 32);
        assert_eq!(snap.phase, TaskPhase::Running);
    }

    #[test]
    fn test_apply_marks_completed_only_when_finished_at_full_progress() {
        let mut snap = running_snapshot();

        // Paused mid-run is not terminal
        apply(&mut snap, &status(60, false));
        assert_eq!(snap.phase, TaskPhase::Running);

        // Full progress while still training is not terminal either
        apply(&mut snap, &status(100, true));
        assert_eq!(snap.phase, TaskPhase::Running);

        apply(&mut snap, &status(100, false));
        assert_eq!(snap.phase, TaskPhase::Completed);
    }

    #[test]
    fn test_apply_carries_visualization_into_terminal_update() {
        let mut snap = running_snapshot();
        let mut update = status(100, false);
        update.training_visualization = Some("/plots/run.png".to_string());

        apply(&mut snap, &update);

        assert_eq!(snap.phase, TaskPhase::Completed);
        assert_eq!(snap.visualization.as_deref(), Some("/plots/run.png"));
    }

    #[test]
    fn test_apply_accumulates_metrics_across_messages() {
        let mut snap = running_snapshot();

        let mut first = status(30, true);
        first.metrics = Some(TrainingMetrics {
            loss: vec![0.9],
            ..Default::default()
        });
        apply(&mut snap, &first);

        let mut second = status(60, true);
        second.metrics = Some(TrainingMetrics {
            loss: vec![0.9, 0.4],
            ..Default::default()
        });
        apply(&mut snap, &second);

        assert_eq!(snap.metrics.loss, vec![0.9, 0.4]);
    }

    #[test]
    fn test_apply_clamps_progress_overflow() {
        let mut snap = running_snapshot();
        apply(&mut snap, &status(250, true));
        assert_eq!(snap.progress_percent, 100);
    }
}
