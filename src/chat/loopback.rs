//! In-process loopback chat transport.
//!
//! Wires each bot token to a pair of channels so tests (and offline
//! runs) can inject inbound events and observe what a session sends,
//! without any network.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};

use crate::{AppError, Result};

use super::{ChatEvent, Connection, Connector, OutboundMessage, Sender};

const CHANNEL_CAPACITY: usize = 64;

/// Peer-side handles for one token: inject events, observe sends.
pub struct LoopbackPeer {
    /// Push inbound events to the connected session.
    pub events: mpsc::Sender<ChatEvent>,
    /// Receive messages the session sends.
    pub outbound: mpsc::Receiver<OutboundMessage>,
}

struct Registered {
    events_rx: mpsc::Receiver<ChatEvent>,
    outbound_tx: mpsc::Sender<OutboundMessage>,
}

/// Connector that hands out channel-backed connections per token.
///
/// Tokens must be registered with [`register`](Self::register) before a
/// session connects; connecting with an unknown token fails the same
/// way a rejected platform token would.
#[derive(Clone, Default)]
pub struct LoopbackConnector {
    registry: Arc<Mutex<HashMap<String, Registered>>>,
}

impl LoopbackConnector {
    /// Create an empty connector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a token and return the peer-side handles for it.
    pub async fn register(&self, token: &str) -> LoopbackPeer {
        let (events_tx, events_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (outbound_tx, outbound_rx) = mpsc::channel(CHANNEL_CAPACITY);
        self.registry.lock().await.insert(
            token.to_owned(),
            Registered {
                events_rx,
                outbound_tx,
            },
        );
        LoopbackPeer {
            events: events_tx,
            outbound: outbound_rx,
        }
    }
}

impl Connector for LoopbackConnector {
    fn connect(&self, token: &str) -> Pin<Box<dyn Future<Output = Result<Connection>> + Send + '_>> {
        let token = token.to_owned();
        Box::pin(async move {
            let registered = self
                .registry
                .lock()
                .await
                .remove(&token)
                .ok_or_else(|| AppError::Connect(format!("unknown loopback token {token}")))?;
            Ok(Connection {
                events: registered.events_rx,
                sender: Arc::new(LoopbackSender {
                    outbound: registered.outbound_tx,
                }),
            })
        })
    }
}

struct LoopbackSender {
    outbound: mpsc::Sender<OutboundMessage>,
}

impl Sender for LoopbackSender {
    fn send(&self, channel: &str, text: &str) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let message = OutboundMessage {
            channel: channel.to_owned(),
            text: text.to_owned(),
        };
        Box::pin(async move {
            self.outbound
                .send(message)
                .await
                .map_err(|_| AppError::Connect("loopback peer dropped".into()))
        })
    }
}
