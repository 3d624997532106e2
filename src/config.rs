//! Global configuration parsing, validation, and credential loading.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{info, warn};

use crate::{AppError, Result};

/// Environment variable naming the TOML config file path.
pub const CONFIG_PATH_ENV: &str = "MIMIC_HOSTD_CONFIG";

/// Keyring service name for stored credentials.
const KEYRING_SERVICE: &str = "mimic-hostd";

/// Remote object-store connectivity settings.
///
/// The endpoint and key pair are loaded at runtime from the OS keychain
/// or environment variables, never from the TOML file.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct RemoteStoreConfig {
    /// Object-store endpoint URL (populated at runtime).
    #[serde(skip)]
    pub endpoint_url: String,
    /// Access key for the object store (populated at runtime).
    #[serde(skip)]
    pub access_key: String,
    /// Secret key for the object store (populated at runtime).
    #[serde(skip)]
    pub secret_key: String,
}

/// Heartbeat and staleness tuning for hosted deployment records.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct LifecycleConfig {
    /// Interval between heartbeat writes from a running session.
    #[serde(default = "default_heartbeat_seconds")]
    pub heartbeat_seconds: u64,
    /// Maximum time between heartbeats before a record reads stale.
    #[serde(default = "default_staleness_window_seconds")]
    pub staleness_window_seconds: u64,
    /// How often the watchdog re-evaluates non-terminal records.
    #[serde(default = "default_watchdog_poll_seconds")]
    pub watchdog_poll_seconds: u64,
}

impl LifecycleConfig {
    /// Staleness window as a chrono duration.
    ///
    /// Values too large for the millisecond-precision representation
    /// saturate instead of panicking inside `chrono::Duration::seconds`.
    #[must_use]
    pub fn staleness_window(&self) -> chrono::Duration {
        i64::try_from(self.staleness_window_seconds)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .unwrap_or(chrono::Duration::MAX)
    }
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            heartbeat_seconds: default_heartbeat_seconds(),
            staleness_window_seconds: default_staleness_window_seconds(),
            watchdog_poll_seconds: default_watchdog_poll_seconds(),
        }
    }
}

fn default_heartbeat_seconds() -> u64 {
    30
}

fn default_staleness_window_seconds() -> u64 {
    60
}

fn default_watchdog_poll_seconds() -> u64 {
    15
}

fn default_max_bots() -> u32 {
    10
}

fn default_tmp_dir() -> PathBuf {
    PathBuf::from("./tmp")
}

fn default_secrets_file() -> PathBuf {
    PathBuf::from("./tmp/secrets.json")
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./tmp/hostd.db")
}

fn default_gateway_url() -> String {
    "http://localhost:8091".into()
}

fn default_generator_url() -> String {
    "http://localhost:8092/generate".into()
}

/// Global configuration parsed from `hostd.toml`.
///
/// Constructed once at process start and passed by reference into the
/// launcher and store constructors. There are no ambient globals.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct GlobalConfig {
    /// Upper bound on concurrently hosted bot sessions.
    #[serde(default = "default_max_bots")]
    pub max_bots: u32,
    /// Directory for local settings blobs and the remote fetch cache.
    #[serde(default = "default_tmp_dir")]
    pub tmp_dir: PathBuf,
    /// Path to the local-mode secrets file.
    #[serde(default = "default_secrets_file")]
    pub secrets_file: PathBuf,
    /// Path to the `SQLite` database file.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    /// Chat gateway base URL.
    #[serde(default = "default_gateway_url")]
    pub gateway_url: String,
    /// Markov generation endpoint URL.
    #[serde(default = "default_generator_url")]
    pub generator_url: String,
    /// Heartbeat and staleness tuning.
    #[serde(default)]
    pub lifecycle: LifecycleConfig,
    /// Remote object-store connectivity (remote mode only).
    #[serde(default = "default_remote_store")]
    pub store: RemoteStoreConfig,
}

fn default_remote_store() -> RemoteStoreConfig {
    RemoteStoreConfig {
        endpoint_url: String::new(),
        access_key: String::new(),
        secret_key: String::new(),
    }
}

impl GlobalConfig {
    /// Load configuration from `MIMIC_HOSTD_CONFIG` (default `hostd.toml`),
    /// falling back to built-in defaults when no file exists.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if an existing file cannot be read or
    /// contains invalid TOML, or if validation fails.
    pub fn load() -> Result<Self> {
        let path = env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| "hostd.toml".into());
        if Path::new(&path).exists() {
            let raw = fs::read_to_string(&path)
                .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
            Self::from_toml_str(&raw)
        } else {
            info!(path, "no config file found, using defaults");
            Self::from_toml_str("")
        }
    }

    /// Parse configuration from a TOML string and validate it.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Load remote object-store credentials from the OS keychain with
    /// env-var fallback.
    ///
    /// The endpoint comes from `MIMIC_STORE_URL`; the key pair is tried
    /// against the `mimic-hostd` keyring service first, then the
    /// `MIMIC_STORE_ACCESS_KEY` / `MIMIC_STORE_SECRET_KEY` variables.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the endpoint or either key is
    /// missing from every source.
    pub async fn load_store_credentials(&mut self) -> Result<()> {
        self.store.endpoint_url = env::var("MIMIC_STORE_URL").map_err(|_| {
            AppError::Config("MIMIC_STORE_URL is required for remote storage".into())
        })?;
        self.store.access_key =
            load_credential("store_access_key", "MIMIC_STORE_ACCESS_KEY").await?;
        self.store.secret_key =
            load_credential("store_secret_key", "MIMIC_STORE_SECRET_KEY").await?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.max_bots == 0 {
            return Err(AppError::Config("max_bots must be greater than zero".into()));
        }
        if self.lifecycle.heartbeat_seconds == 0 {
            return Err(AppError::Config(
                "lifecycle.heartbeat_seconds must be greater than zero".into(),
            ));
        }
        if self.lifecycle.staleness_window_seconds <= self.lifecycle.heartbeat_seconds {
            return Err(AppError::Config(
                "lifecycle.staleness_window_seconds must exceed heartbeat_seconds".into(),
            ));
        }
        Ok(())
    }
}

/// Load a single credential from the OS keychain with env-var fallback.
async fn load_credential(keyring_key: &str, env_key: &str) -> Result<String> {
    let key = keyring_key.to_owned();

    // keyring is synchronous I/O, so it runs on the blocking pool.
    let keychain_result = tokio::task::spawn_blocking(move || {
        keyring::Entry::new(KEYRING_SERVICE, &key).and_then(|entry| entry.get_password())
    })
    .await
    .map_err(|err| AppError::Config(format!("keychain task panicked: {err}")))?;

    match keychain_result {
        Ok(value) if !value.is_empty() => return Ok(value),
        Ok(_) => {
            warn!(key = keyring_key, "keychain entry is empty, trying env var");
        }
        Err(err) => {
            warn!(
                key = keyring_key,
                ?err,
                "keychain lookup failed, trying env var"
            );
        }
    }

    env::var(env_key).map_err(|_| {
        AppError::Config(format!(
            "credential {keyring_key} not found in keychain or {env_key} env var"
        ))
    })
}
