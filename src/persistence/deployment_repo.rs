//! Repository for trainer, deployment, and hosted-deployment records.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::models::deployment::{Deployment, DeploymentStatus, HostedDeployment, Trainer};
use crate::{AppError, Result};

/// Repository wrapper around `SQLite` for deployment lifecycle records.
#[derive(Clone)]
pub struct DeploymentRepo {
    pool: SqlitePool,
}

/// Internal row struct for `SQLite` deserialization.
#[derive(sqlx::FromRow)]
struct HostedRow {
    id: String,
    deployment_id: String,
    trainer_id: String,
    model_uid: String,
    status: String,
    heartbeat: Option<String>,
    expiration: String,
    created_at: String,
}

impl HostedRow {
    /// Convert a database row into the domain model.
    fn into_hosted(self) -> Result<HostedDeployment> {
        let status = parse_status(&self.status)?;
        let heartbeat = self
            .heartbeat
            .as_deref()
            .map(parse_timestamp)
            .transpose()?;
        Ok(HostedDeployment {
            id: self.id,
            deployment_id: self.deployment_id,
            trainer_id: self.trainer_id,
            model_uid: self.model_uid,
            status,
            heartbeat,
            expiration: parse_timestamp(&self.expiration)?,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|err| AppError::Db(format!("invalid timestamp: {err}")))
}

fn parse_status(raw: &str) -> Result<DeploymentStatus> {
    match raw {
        "provisioning" => Ok(DeploymentStatus::Provisioning),
        "running" => Ok(DeploymentStatus::Running),
        "stale" => Ok(DeploymentStatus::Stale),
        "expired" => Ok(DeploymentStatus::Expired),
        "terminated" => Ok(DeploymentStatus::Terminated),
        other => Err(AppError::Db(format!("invalid deployment status: {other}"))),
    }
}

fn status_str(status: DeploymentStatus) -> &'static str {
    match status {
        DeploymentStatus::Provisioning => "provisioning",
        DeploymentStatus::Running => "running",
        DeploymentStatus::Stale => "stale",
        DeploymentStatus::Expired => "expired",
        DeploymentStatus::Terminated => "terminated",
    }
}

impl DeploymentRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a trainer record.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the insert fails.
    pub async fn create_trainer(&self, trainer: &Trainer) -> Result<()> {
        sqlx::query(
            "INSERT INTO trainers (id, platform_user_id, user_name, time_registered, subscribed)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&trainer.id)
        .bind(trainer.platform_user_id)
        .bind(&trainer.user_name)
        .bind(trainer.time_registered.to_rfc3339())
        .bind(trainer.subscribed)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Insert a deployment record.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the insert fails.
    pub async fn create_deployment(&self, deployment: &Deployment) -> Result<()> {
        sqlx::query(
            "INSERT INTO deployments (id, model_uid, secret_key, trainer_id, hosted)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&deployment.id)
        .bind(&deployment.model_uid)
        .bind(&deployment.secret_key)
        .bind(&deployment.trainer_id)
        .bind(deployment.hosted)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Insert a hosted deployment record.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the insert fails.
    pub async fn create_hosted(&self, hosted: &HostedDeployment) -> Result<()> {
        sqlx::query(
            "INSERT INTO hosted_deployments
             (id, deployment_id, trainer_id, model_uid, status, heartbeat, expiration, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )
        .bind(&hosted.id)
        .bind(&hosted.deployment_id)
        .bind(&hosted.trainer_id)
        .bind(&hosted.model_uid)
        .bind(status_str(hosted.status))
        .bind(hosted.heartbeat.map(|ts| ts.to_rfc3339()))
        .bind(hosted.expiration.to_rfc3339())
        .bind(hosted.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Retrieve a hosted deployment by its ID.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn get_hosted(&self, id: &str) -> Result<Option<HostedDeployment>> {
        let row: Option<HostedRow> =
            sqlx::query_as("SELECT * FROM hosted_deployments WHERE id = ?1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(HostedRow::into_hosted).transpose()
    }

    /// Retrieve the hosted deployment running a given model.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn find_hosted_by_model_uid(
        &self,
        model_uid: &str,
    ) -> Result<Option<HostedDeployment>> {
        let row: Option<HostedRow> = sqlx::query_as(
            "SELECT * FROM hosted_deployments WHERE model_uid = ?1 \
             AND status != 'terminated' LIMIT 1",
        )
        .bind(model_uid)
        .fetch_optional(&self.pool)
        .await?;
        row.map(HostedRow::into_hosted).transpose()
    }

    /// Apply a heartbeat to a hosted deployment, respecting expiration
    /// precedence, and persist the result.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the record does not exist, or
    /// `AppError::Db` if persistence fails.
    pub async fn record_heartbeat(
        &self,
        id: &str,
        now: DateTime<Utc>,
    ) -> Result<HostedDeployment> {
        let mut hosted = self
            .get_hosted(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("hosted deployment {id} not found")))?;

        hosted.observe_heartbeat(now);

        sqlx::query("UPDATE hosted_deployments SET status = ?1, heartbeat = ?2 WHERE id = ?3")
            .bind(status_str(hosted.status))
            .bind(hosted.heartbeat.map(|ts| ts.to_rfc3339()))
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(hosted)
    }

    /// Update a hosted deployment's status, respecting the state machine.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the record does not exist, or
    /// `AppError::Db` if the transition is invalid or persistence fails.
    pub async fn update_status(
        &self,
        id: &str,
        status: DeploymentStatus,
    ) -> Result<HostedDeployment> {
        let mut hosted = self
            .get_hosted(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("hosted deployment {id} not found")))?;

        if !hosted.can_transition_to(status) {
            return Err(AppError::Db(format!(
                "invalid transition {:?} -> {status:?}",
                hosted.status
            )));
        }
        hosted.status = status;

        sqlx::query("UPDATE hosted_deployments SET status = ?1 WHERE id = ?2")
            .bind(status_str(status))
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(hosted)
    }

    /// List all hosted deployments not yet terminated.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list_non_terminal(&self) -> Result<Vec<HostedDeployment>> {
        let rows: Vec<HostedRow> =
            sqlx::query_as("SELECT * FROM hosted_deployments WHERE status != 'terminated'")
                .fetch_all(&self.pool)
                .await?;
        rows.into_iter().map(HostedRow::into_hosted).collect()
    }

    /// List hosted deployments that are live (provisioning, running, or
    /// stale) — the set a graceful shutdown must mark terminated.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list_live(&self) -> Result<Vec<HostedDeployment>> {
        let rows: Vec<HostedRow> = sqlx::query_as(
            "SELECT * FROM hosted_deployments \
             WHERE status IN ('provisioning', 'running', 'stale')",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(HostedRow::into_hosted).collect()
    }

    /// Mark a hosted deployment terminated from any non-terminal state.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the record does not exist, or
    /// `AppError::Db` if persistence fails.
    pub async fn set_terminated(&self, id: &str) -> Result<HostedDeployment> {
        self.update_status(id, DeploymentStatus::Terminated).await
    }
}
