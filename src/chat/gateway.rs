//! HTTP gateway chat transport.
//!
//! Minimal client for a chat gateway fronting the real platform:
//! `POST /sessions` opens a session for a bot token, `GET
//! /sessions/{id}/events` long-polls for inbound messages, and `POST
//! /sessions/{id}/messages` sends. A background reader task feeds the
//! connection's event channel and exits when the channel closes.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::{AppError, Result};

use super::{ChatEvent, Connection, Connector, Sender};

/// Inbound event capacity before the reader applies backpressure.
const EVENT_BUFFER: usize = 64;

#[derive(Debug, Deserialize)]
struct SessionOpened {
    session_id: String,
}

#[derive(Debug, Deserialize)]
struct WireEvent {
    channel: String,
    author: String,
    text: String,
}

/// Connector for an HTTP chat gateway.
#[derive(Debug, Clone)]
pub struct GatewayConnector {
    client: reqwest::Client,
    base_url: String,
}

impl GatewayConnector {
    /// Create a connector for the gateway at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(40))
            .build()
            .map_err(|err| AppError::Config(format!("http client: {err}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
        })
    }

    async fn open_session(&self, token: &str) -> Result<SessionOpened> {
        let response = self
            .client
            .post(format!("{}/sessions", self.base_url))
            .json(&json!({ "token": token }))
            .send()
            .await
            .map_err(|err| AppError::Connect(format!("gateway unreachable: {err}")))?;

        if !response.status().is_success() {
            return Err(AppError::Connect(format!(
                "gateway rejected token: {}",
                response.status()
            )));
        }
        response
            .json()
            .await
            .map_err(|err| AppError::Connect(format!("bad gateway response: {err}")))
    }

    /// Long-poll loop feeding the session's event channel.
    async fn run_reader(
        client: reqwest::Client,
        events_url: String,
        tx: mpsc::Sender<ChatEvent>,
    ) {
        loop {
            let batch: Vec<WireEvent> = match client.get(&events_url).send().await {
                Ok(response) if response.status().is_success() => {
                    match response.json().await {
                        Ok(batch) => batch,
                        Err(err) => {
                            warn!(%err, "gateway event decode failed");
                            continue;
                        }
                    }
                }
                Ok(response) => {
                    warn!(status = %response.status(), "gateway event poll failed, stopping reader");
                    return;
                }
                Err(err) if err.is_timeout() => continue,
                Err(err) => {
                    warn!(%err, "gateway event poll failed, stopping reader");
                    return;
                }
            };

            for event in batch {
                let event = ChatEvent {
                    channel: event.channel,
                    author: event.author,
                    text: event.text,
                };
                // A closed receiver means the session is gone.
                if tx.send(event).await.is_err() {
                    debug!("event channel closed, stopping gateway reader");
                    return;
                }
            }
        }
    }
}

impl Connector for GatewayConnector {
    fn connect(&self, token: &str) -> Pin<Box<dyn Future<Output = Result<Connection>> + Send + '_>> {
        let token = token.to_owned();
        Box::pin(async move {
            let opened = self.open_session(&token).await?;
            debug!(session_id = opened.session_id, "gateway session opened");

            let (tx, rx) = mpsc::channel(EVENT_BUFFER);
            let events_url = format!(
                "{}/sessions/{}/events",
                self.base_url, opened.session_id
            );
            tokio::spawn(Self::run_reader(self.client.clone(), events_url, tx));

            let sender = GatewaySender {
                client: self.client.clone(),
                messages_url: format!(
                    "{}/sessions/{}/messages",
                    self.base_url, opened.session_id
                ),
            };
            Ok(Connection {
                events: rx,
                sender: Arc::new(sender),
            })
        })
    }
}

/// Outbound half of a gateway connection.
#[derive(Debug, Clone)]
struct GatewaySender {
    client: reqwest::Client,
    messages_url: String,
}

impl Sender for GatewaySender {
    fn send(&self, channel: &str, text: &str) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let body = json!({ "channel": channel, "text": text });
        Box::pin(async move {
            let response = self
                .client
                .post(&self.messages_url)
                .json(&body)
                .send()
                .await
                .map_err(|err| AppError::Connect(format!("send failed: {err}")))?;
            if response.status().is_success() {
                Ok(())
            } else {
                Err(AppError::Connect(format!(
                    "send rejected: {}",
                    response.status()
                )))
            }
        })
    }
}
