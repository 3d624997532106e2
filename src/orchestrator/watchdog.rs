//! Lifecycle watchdog for hosted deployment records.
//!
//! Periodically re-evaluates every non-terminal record against the
//! staleness window and expiration timestamp, persists the resulting
//! transitions, and publishes them on an mpsc channel for the expiry
//! guard (and, operationally, the external reaper that tears down
//! containers — that part is out of process).
//!
//! Staleness and expiry are scheduled transitions, not errors: a missed
//! heartbeat surfaces only through the record's status field.

use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::models::deployment::DeploymentStatus;
use crate::persistence::deployment_repo::DeploymentRepo;

/// Lifecycle transitions observed by the watchdog.
#[derive(Debug, Clone)]
pub enum LifecycleEvent {
    /// Staleness window elapsed with no heartbeat.
    WentStale {
        /// Record identifier.
        id: String,
        /// Model the record hosts.
        model_uid: String,
    },
    /// Expiration timestamp reached; the owning session must stop.
    Expired {
        /// Record identifier.
        id: String,
        /// Model the record hosts.
        model_uid: String,
    },
    /// A late heartbeat brought a stale record back to running.
    Recovered {
        /// Record identifier.
        id: String,
        /// Model the record hosts.
        model_uid: String,
    },
}

/// Builder for the background lifecycle evaluator.
///
/// Call [`spawn`](Self::spawn) to start the timer task.
pub struct Watchdog {
    repo: DeploymentRepo,
    poll_interval: Duration,
    staleness_window: chrono::Duration,
    event_tx: mpsc::Sender<LifecycleEvent>,
    cancel: CancellationToken,
}

impl Watchdog {
    /// Construct a new watchdog (does not start the timer yet).
    #[must_use]
    pub fn new(
        repo: DeploymentRepo,
        poll_interval: Duration,
        staleness_window: chrono::Duration,
        event_tx: mpsc::Sender<LifecycleEvent>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            repo,
            poll_interval,
            staleness_window,
            event_tx,
            cancel,
        }
    }

    /// Spawn the background evaluator and return a handle for it.
    #[must_use]
    pub fn spawn(self) -> WatchdogHandle {
        let cancel = self.cancel.clone();
        let task_handle =
            tokio::spawn(self.run().instrument(info_span!("lifecycle_watchdog")));
        WatchdogHandle {
            join_handle: Some(task_handle),
            cancel,
        }
    }

    /// Core evaluation loop.
    async fn run(self) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    debug!("lifecycle watchdog cancelled");
                    return;
                }
                _ = ticker.tick() => {}
            }

            let records = match self.repo.list_non_terminal().await {
                Ok(records) => records,
                Err(err) => {
                    warn!(%err, "lifecycle scan failed");
                    continue;
                }
            };

            let now = Utc::now();
            for record in records {
                let target = record.effective_status(now, self.staleness_window);
                if target == record.status || !record.can_transition_to(target) {
                    continue;
                }

                if let Err(err) = self.repo.update_status(&record.id, target).await {
                    warn!(id = record.id, %err, "lifecycle transition write failed");
                    continue;
                }
                info!(
                    id = record.id,
                    model_uid = record.model_uid,
                    from = ?record.status,
                    to = ?target,
                    "lifecycle transition"
                );

                let event = match (record.status, target) {
                    (_, DeploymentStatus::Expired) => LifecycleEvent::Expired {
                        id: record.id,
                        model_uid: record.model_uid,
                    },
                    (_, DeploymentStatus::Stale) => LifecycleEvent::WentStale {
                        id: record.id,
                        model_uid: record.model_uid,
                    },
                    (DeploymentStatus::Stale, DeploymentStatus::Running) => {
                        LifecycleEvent::Recovered {
                            id: record.id,
                            model_uid: record.model_uid,
                        }
                    }
                    _ => continue,
                };
                let _ = self.event_tx.send(event).await;
            }
        }
    }
}

/// Handle returned from [`Watchdog::spawn`].
pub struct WatchdogHandle {
    join_handle: Option<JoinHandle<()>>,
    cancel: CancellationToken,
}

impl WatchdogHandle {
    /// Signal the evaluator to stop and wait for it to exit.
    pub async fn await_completion(mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.join_handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for WatchdogHandle {
    /// Cancel the background task when the handle is dropped.
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
