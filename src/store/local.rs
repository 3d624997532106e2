//! Local-directory settings storage.

use std::future::Future;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::pin::Pin;

use serde_json::Value;
use tracing::warn;
use uuid::Uuid;

use crate::{AppError, Result};

use super::{parse_json_blob, ConfigStore};

/// Config store backed by a single fixed directory.
///
/// Writes are atomic full-file replaces: the payload lands in a
/// temporary sibling file first and is renamed over the target.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    /// Create a store rooted at `root`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Io` if the directory cannot be created.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)
            .map_err(|err| AppError::Io(format!("cannot create {}: {err}", root.display())))?;
        Ok(Self { root })
    }

    fn blob_path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    async fn fetch_inner(&self, name: String) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(self.blob_path(&name)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(AppError::ConfigUnavailable(format!("{name}: {err}"))),
        }
    }

    async fn write_inner(&self, name: String, payload: Vec<u8>) -> Result<()> {
        let target = self.blob_path(&name);
        let staging = self.root.join(format!(".{name}.{}", Uuid::new_v4()));
        tokio::fs::write(&staging, &payload)
            .await
            .map_err(|err| AppError::Io(format!("write {name}: {err}")))?;
        if let Err(err) = tokio::fs::rename(&staging, &target).await {
            // Clean up the orphaned staging file before reporting.
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(AppError::Io(format!("replace {name}: {err}")));
        }
        Ok(())
    }
}

impl ConfigStore for LocalStore {
    fn fetch(&self, name: &str) -> Pin<Box<dyn Future<Output = Result<Option<Vec<u8>>>> + Send + '_>> {
        let name = name.to_owned();
        Box::pin(async move { self.fetch_inner(name).await })
    }

    fn fetch_json(&self, name: &str) -> Pin<Box<dyn Future<Output = Result<Option<Value>>> + Send + '_>> {
        let name = name.to_owned();
        Box::pin(async move {
            match self.fetch_inner(name.clone()).await? {
                Some(bytes) => parse_json_blob(&name, &bytes).map(Some),
                None => Ok(None),
            }
        })
    }

    fn write_json(&self, name: &str, value: &Value) -> Pin<Box<dyn Future<Output = bool> + Send + '_>> {
        let name = name.to_owned();
        let payload = value.to_string().into_bytes();
        Box::pin(async move {
            match self.write_inner(name.clone(), payload).await {
                Ok(()) => true,
                Err(err) => {
                    warn!(name, %err, "local settings write failed");
                    false
                }
            }
        })
    }
}
