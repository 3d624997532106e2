//! `SQLite` schema bootstrap logic.
//!
//! All table definitions use `CREATE TABLE IF NOT EXISTS` — safe to
//! re-run on every startup. Produces a convergent result.

use sqlx::SqlitePool;

use crate::Result;

/// Apply all table definitions to the connected `SQLite` database.
///
/// # Errors
///
/// Returns `AppError::Db` if any DDL statement fails.
pub async fn bootstrap_schema(pool: &SqlitePool) -> Result<()> {
    let ddl = r"
CREATE TABLE IF NOT EXISTS trainers (
    id                  TEXT PRIMARY KEY NOT NULL,
    platform_user_id    INTEGER NOT NULL UNIQUE,
    user_name           TEXT NOT NULL,
    time_registered     TEXT NOT NULL,
    subscribed          INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS deployments (
    id              TEXT PRIMARY KEY NOT NULL,
    model_uid       TEXT NOT NULL UNIQUE,
    secret_key      TEXT NOT NULL,
    trainer_id      TEXT NOT NULL REFERENCES trainers(id),
    hosted          INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS hosted_deployments (
    id              TEXT PRIMARY KEY NOT NULL,
    deployment_id   TEXT NOT NULL REFERENCES deployments(id),
    trainer_id      TEXT NOT NULL REFERENCES trainers(id),
    model_uid       TEXT NOT NULL,
    status          TEXT NOT NULL CHECK(status IN ('provisioning','running','stale','expired','terminated')),
    heartbeat       TEXT,
    expiration      TEXT NOT NULL,
    created_at      TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_deployment_trainer ON deployments(trainer_id);
CREATE INDEX IF NOT EXISTS idx_hosted_deployment ON hosted_deployments(deployment_id);
CREATE INDEX IF NOT EXISTS idx_hosted_model_uid ON hosted_deployments(model_uid);
CREATE INDEX IF NOT EXISTS idx_hosted_status ON hosted_deployments(status);
";

    sqlx::raw_sql(ddl).execute(pool).await?;
    Ok(())
}
