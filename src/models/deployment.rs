//! Deployment records and the hosted-instance lifecycle state machine.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A bot owner registered with the service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct Trainer {
    /// Unique record identifier.
    pub id: String,
    /// Chat platform user ID of the trainer.
    pub platform_user_id: i64,
    /// Display name at registration time.
    pub user_name: String,
    /// Registration timestamp.
    pub time_registered: DateTime<Utc>,
    /// Whether the trainer holds an active subscription.
    pub subscribed: bool,
}

/// An encrypted trained model deployed either by the service or by the
/// trainer themselves.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct Deployment {
    /// Unique record identifier.
    pub id: String,
    /// Reference to the trained model blob.
    pub model_uid: String,
    /// Key used for model encryption.
    pub secret_key: String,
    /// Owning trainer; immutable after creation.
    pub trainer_id: String,
    /// True when the service runs the bot; false for self-hosted.
    pub hosted: bool,
}

/// Lifecycle status for a running hosted instance.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentStatus {
    /// Record created, no heartbeat received yet.
    Provisioning,
    /// Heartbeat received within the staleness window.
    Running,
    /// Staleness window elapsed without a heartbeat; recoverable.
    Stale,
    /// Expiration reached; the session must be stopped and cleaned up.
    Expired,
    /// Explicit shutdown or completed expiry cleanup. Terminal.
    Terminated,
}

/// One row per running hosted container, updated by its session's
/// heartbeat ticks and read by the external reaper.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct HostedDeployment {
    /// Unique record identifier.
    pub id: String,
    /// Owning deployment.
    pub deployment_id: String,
    /// Owning trainer (denormalized for reaper queries).
    pub trainer_id: String,
    /// Model reference linking the row to its launch identity.
    pub model_uid: String,
    /// Current lifecycle status.
    pub status: DeploymentStatus,
    /// Last heartbeat timestamp; `None` until the first beat.
    pub heartbeat: Option<DateTime<Utc>>,
    /// Hard expiration timestamp.
    pub expiration: DateTime<Utc>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl HostedDeployment {
    /// Construct a new provisioning record with a generated identifier.
    #[must_use]
    pub fn new(
        deployment_id: String,
        trainer_id: String,
        model_uid: String,
        expiration: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            deployment_id,
            trainer_id,
            model_uid,
            status: DeploymentStatus::Provisioning,
            heartbeat: None,
            expiration,
            created_at: Utc::now(),
        }
    }

    /// Determine whether a lifecycle transition is permitted.
    #[must_use]
    pub fn can_transition_to(&self, next: DeploymentStatus) -> bool {
        matches!(
            (self.status, next),
            (
                DeploymentStatus::Provisioning,
                DeploymentStatus::Running
                    | DeploymentStatus::Expired
                    | DeploymentStatus::Terminated
            ) | (
                DeploymentStatus::Running,
                DeploymentStatus::Stale | DeploymentStatus::Expired | DeploymentStatus::Terminated
            ) | (
                DeploymentStatus::Stale,
                DeploymentStatus::Running
                    | DeploymentStatus::Expired
                    | DeploymentStatus::Terminated
            ) | (DeploymentStatus::Expired, DeploymentStatus::Terminated)
        )
    }

    /// Status the record should read at `now` given the staleness window.
    ///
    /// Expiration takes precedence over everything except explicit
    /// termination; a record with no heartbeat stays provisioning until
    /// the window question even arises.
    #[must_use]
    pub fn effective_status(&self, now: DateTime<Utc>, staleness_window: Duration) -> DeploymentStatus {
        if self.status == DeploymentStatus::Terminated {
            return DeploymentStatus::Terminated;
        }
        if now >= self.expiration {
            return DeploymentStatus::Expired;
        }
        match self.heartbeat {
            None => DeploymentStatus::Provisioning,
            Some(beat) if now - beat <= staleness_window => DeploymentStatus::Running,
            Some(_) => DeploymentStatus::Stale,
        }
    }

    /// Apply a heartbeat observed at `now`.
    ///
    /// Resets the staleness clock and moves the record to running, unless
    /// the expiration has been reached — a heartbeat arriving at the same
    /// instant as expiry loses — or the record is already terminated.
    /// Heartbeats never move the expiration timestamp.
    pub fn observe_heartbeat(&mut self, now: DateTime<Utc>) {
        if self.status == DeploymentStatus::Terminated {
            return;
        }
        self.heartbeat = Some(now);
        if now >= self.expiration {
            self.status = DeploymentStatus::Expired;
        } else {
            self.status = DeploymentStatus::Running;
        }
    }

    /// Whether the record is in a terminal state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.status == DeploymentStatus::Terminated
    }
}
