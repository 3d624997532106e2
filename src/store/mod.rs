//! Backend-agnostic storage for per-bot settings blobs.
//!
//! The [`ConfigStore`] trait decouples sessions and the launcher from
//! where blobs actually live (local directory or remote object store).
//! The backend is chosen once at process start; call sites never branch
//! on backend identity.

pub mod local;
pub mod remote;

use std::future::Future;
use std::pin::Pin;

use serde_json::Value;
use tracing::warn;

use crate::models::identity::Identity;
use crate::models::settings::BotSettings;
use crate::{AppError, Result};

pub use local::LocalStore;
pub use remote::RemoteStore;

/// Uniform read/write contract for named configuration blobs.
///
/// Persistence is best-effort: `write_json` reports failure through its
/// return flag and callers continue operating on in-memory state.
pub trait ConfigStore: Send + Sync {
    /// Fetch the raw bytes of a blob, or `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::ConfigUnavailable`](crate::AppError::ConfigUnavailable)
    /// if the backend cannot be reached.
    fn fetch(&self, name: &str) -> Pin<Box<dyn Future<Output = Result<Option<Vec<u8>>>> + Send + '_>>;

    /// Fetch a blob and parse it as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::ConfigCorrupt`](crate::AppError::ConfigCorrupt)
    /// if the blob exists but is not valid JSON (logged as a warning), or
    /// [`AppError::ConfigUnavailable`](crate::AppError::ConfigUnavailable)
    /// if the backend cannot be reached.
    fn fetch_json(&self, name: &str) -> Pin<Box<dyn Future<Output = Result<Option<Value>>> + Send + '_>>;

    /// Serialize and store a JSON value, replacing any prior blob.
    ///
    /// Returns `true` on success. Failures are logged and reported
    /// through the flag, never raised.
    fn write_json(&self, name: &str, value: &Value) -> Pin<Box<dyn Future<Output = bool> + Send + '_>>;
}

/// Parse fetched blob bytes as JSON, logging corruption.
pub(crate) fn parse_json_blob(name: &str, bytes: &[u8]) -> Result<Value> {
    serde_json::from_slice(bytes).map_err(|err| {
        warn!(name, %err, "settings blob is not valid JSON");
        AppError::ConfigCorrupt(format!("{name}: {err}"))
    })
}

/// Load an identity's settings, falling back to defaults.
///
/// Absent, corrupt, unreachable, or invariant-violating blobs all
/// degrade to [`BotSettings::default`] with a warning — behavioral
/// tuning is never allowed to block bot availability.
pub async fn load_settings(store: &dyn ConfigStore, identity: &Identity) -> BotSettings {
    let name = identity.settings_blob_name();
    let value = match store.fetch_json(&name).await {
        Ok(Some(value)) => value,
        Ok(None) => {
            warn!(
                model_uid = identity.model_uid,
                name, "no settings blob found, using defaults"
            );
            return BotSettings::default();
        }
        Err(err) => {
            warn!(
                model_uid = identity.model_uid,
                name, %err, "settings unavailable, using defaults"
            );
            return BotSettings::default();
        }
    };

    match serde_json::from_value::<BotSettings>(value) {
        Ok(settings) => match settings.validate() {
            Ok(()) => settings,
            Err(err) => {
                warn!(
                    model_uid = identity.model_uid,
                    %err, "settings violate invariants, using defaults"
                );
                BotSettings::default()
            }
        },
        Err(err) => {
            warn!(
                model_uid = identity.model_uid,
                %err, "settings blob has unexpected shape, using defaults"
            );
            BotSettings::default()
        }
    }
}

/// Persist an identity's settings through the store.
///
/// Returns `true` on success; failures are already logged by the store.
pub async fn write_settings(
    store: &dyn ConfigStore,
    identity: &Identity,
    settings: &BotSettings,
) -> bool {
    let name = identity.settings_blob_name();
    match serde_json::to_value(settings) {
        Ok(value) => store.write_json(&name, &value).await,
        Err(err) => {
            warn!(model_uid = identity.model_uid, %err, "failed to serialize settings");
            false
        }
    }
}
