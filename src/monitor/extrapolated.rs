use crate::events::{Severity, ViewBridge};
use crate::monitor::task::{SharedTask, TaskPhase, TaskSnapshot};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Drive a task by elapsed-time estimation: on every tick, progress is
/// `floor(elapsed / estimated * 100)` clamped to 100. This is a pure
/// client-side estimate with no server confirmation, so it deliberately
/// tolerates the real job finishing earlier or later than estimated.
///
/// The worker emits a terminal `Completed` update exactly once and then
/// stops its own timer.
pub(crate) fn spawn(
    state: SharedTask,
    tx: mpsc::UnboundedSender<TaskSnapshot>,
    tick: Duration,
    estimated: Duration,
    bridge: Arc<dyn ViewBridge>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let started = Instant::now();
        let mut interval = tokio::time::interval(tick);

        loop {
            interval.tick().await;

            let percent = extrapolate(started.elapsed(), estimated);
            let update = {
                let mut snap = state.write();
                if snap.phase.is_terminal() {
                    // Stopped out from under us; the stop path already
                    // emitted the terminal update.
                    return;
                }
                if percent > snap.progress_percent {
                    snap.progress_percent = percent;
                }
                if snap.progress_percent >= 100 {
                    snap.phase = TaskPhase::Completed;
                }
                snap.clone()
            };

            let done = update.phase.is_terminal();
            if tx.send(update).is_err() {
                return;
            }
            if done {
                log::info!("task reached 100% by elapsed-time estimate, timer stopped");
                bridge.notify(
                    "Training Complete",
                    "The model has been successfully trained!",
                    Severity::Success,
                );
                return;
            }
        }
    })
}

pub(crate) fn extrapolate(elapsed: Duration, estimated: Duration) -> u8 {
    if estimated.is_zero() {
        return 100;
    }
    let percent = (elapsed.as_secs_f64() / estimated.as_secs_f64() * 100.0).floor();
    percent.min(100.0) as u8
}
