//! Markov-chain generation seam.
//!
//! Text generation lives in an external collaborator; only the calling
//! shape is fixed here. The remote implementation posts to a generation
//! endpoint; the canned implementation returns a fixed line and backs
//! tests and dry runs.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::Deserialize;
use serde_json::json;

use crate::{AppError, Result};

/// Text generator bound to a trained model.
pub trait Generator: Send + Sync {
    /// Generate a reply for `context`, at most `max_length` characters.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Generate`](crate::AppError::Generate) if the
    /// collaborator fails or produces no text.
    fn generate(
        &self,
        model_uid: &str,
        context: &str,
        max_length: u32,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + '_>>;
}

#[derive(Debug, Deserialize)]
struct GeneratedText {
    text: String,
}

/// Generator that calls a remote generation endpoint over HTTP.
#[derive(Debug, Clone)]
pub struct RemoteGenerator {
    client: reqwest::Client,
    url: String,
}

impl RemoteGenerator {
    /// Create a generator posting to `url`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the HTTP client cannot be built.
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|err| AppError::Config(format!("http client: {err}")))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

impl Generator for RemoteGenerator {
    fn generate(
        &self,
        model_uid: &str,
        context: &str,
        max_length: u32,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + '_>> {
        let body = json!({
            "model_uid": model_uid,
            "context": context,
            "max_length": max_length,
        });
        Box::pin(async move {
            let response = self
                .client
                .post(&self.url)
                .json(&body)
                .send()
                .await
                .map_err(|err| AppError::Generate(format!("generator unreachable: {err}")))?;
            if !response.status().is_success() {
                return Err(AppError::Generate(format!(
                    "generator returned {}",
                    response.status()
                )));
            }
            let generated: GeneratedText = response
                .json()
                .await
                .map_err(|err| AppError::Generate(format!("bad generator response: {err}")))?;
            if generated.text.is_empty() {
                return Err(AppError::Generate("generator produced no text".into()));
            }
            Ok(generated.text)
        })
    }
}

/// Generator returning a fixed line, truncated to `max_length`.
#[derive(Debug, Clone)]
pub struct CannedGenerator {
    line: String,
}

impl CannedGenerator {
    /// Create a canned generator that always answers with `line`.
    #[must_use]
    pub fn new(line: impl Into<String>) -> Self {
        Self { line: line.into() }
    }
}

impl Generator for CannedGenerator {
    fn generate(
        &self,
        _model_uid: &str,
        _context: &str,
        max_length: u32,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + '_>> {
        let limit = usize::try_from(max_length).unwrap_or(usize::MAX);
        let text: String = self.line.chars().take(limit).collect();
        Box::pin(async move { Ok(text) })
    }
}
