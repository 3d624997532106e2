//! Identity secret lookup across environment and file-backed sources.
//!
//! Hosted identities are published as indexed key triples
//! (`MIMIC_MODEL_UID_1`, `MIMIC_MODEL_SECRET_KEY_1`, `MIMIC_BOT_TOKEN_1`,
//! then `_2`, ...). Lookups return `Option` — an absent key is how the
//! launcher's discovery loop terminates, never an error.

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::Path;

use crate::models::identity::Identity;
use crate::{AppError, Result};

/// Key/value source for identity secrets.
///
/// `Env` reads process environment variables (remote mode); `File` reads
/// a flat JSON object loaded once from `secrets.json` (local mode).
#[derive(Debug, Clone)]
pub enum SecretSource {
    /// Ambient process environment.
    Env,
    /// In-memory map loaded from a local secrets file.
    File(HashMap<String, String>),
}

impl SecretSource {
    /// Load a file-backed source from a JSON object of string pairs.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or is not a
    /// flat JSON string map.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path.as_ref()).map_err(|err| {
            AppError::Config(format!(
                "cannot read secrets file {}: {err}",
                path.as_ref().display()
            ))
        })?;
        let map: HashMap<String, String> = serde_json::from_str(&raw)
            .map_err(|err| AppError::Config(format!("invalid secrets file: {err}")))?;
        Ok(Self::File(map))
    }

    /// Build a file-style source from in-memory key/value pairs.
    #[must_use]
    pub fn from_map<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        Self::File(pairs.into_iter().collect())
    }

    /// Look up a single secret value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        match self {
            Self::Env => env::var(key).ok().filter(|v| !v.is_empty()),
            Self::File(map) => map.get(key).cloned().filter(|v| !v.is_empty()),
        }
    }

    /// Resolve the credential triple for a 1-based identity index.
    ///
    /// Returns `None` when any of the three keys is absent — the caller
    /// treats that as "no such identity" and stops discovery.
    #[must_use]
    pub fn identity(&self, index: u32) -> Option<Identity> {
        let model_uid = self.get(&format!("MIMIC_MODEL_UID_{index}"))?;
        let model_key = self.get(&format!("MIMIC_MODEL_SECRET_KEY_{index}"))?;
        let bot_token = self.get(&format!("MIMIC_BOT_TOKEN_{index}"))?;
        Some(Identity {
            index,
            model_uid,
            model_key,
            bot_token,
        })
    }
}
