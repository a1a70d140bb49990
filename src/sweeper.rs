//! Background task that periodically evicts idle slots.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::config::SweeperConfig;
use crate::ratelimit::Limiter;

/// Shortest interval the sweeper will tick at.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Spawns the periodic sweep for a limiter.
pub struct Sweeper;

impl Sweeper {
    /// Start sweeping `limiter` on the current tokio runtime.
    ///
    /// The first sweep runs one interval after spawning. The task stops when
    /// [`SweeperHandle::shutdown`] is called or the handle is dropped.
    pub fn spawn(limiter: Arc<Limiter>, config: SweeperConfig) -> SweeperHandle {
        let interval = config.interval().max(MIN_INTERVAL);
        let max_idle = config.max_idle();
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        info!(
            interval_ms = interval.as_millis() as u64,
            max_idle_ms = max_idle.as_millis() as u64,
            "Starting slot sweeper"
        );

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let evicted = limiter.sweep(max_idle);
                        debug!(
                            evicted = evicted,
                            slots = limiter.slot_count(),
                            "Sweep complete"
                        );
                    }
                    _ = shutdown_rx.changed() => break,
                }
            }

            info!("Slot sweeper stopped");
        });

        SweeperHandle {
            shutdown: shutdown_tx,
            task,
        }
    }
}

/// Handle to a running sweeper task.
pub struct SweeperHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Stop the sweeper and wait for its task to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            warn!(error = %e, "Slot sweeper task failed");
        }
    }

    /// Whether the sweeper task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
