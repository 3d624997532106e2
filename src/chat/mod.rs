//! Chat-platform connection seam.
//!
//! The [`Connector`] trait decouples bot sessions from the chat
//! platform's transport. Only the shape of the contract is fixed here:
//! `connect(token)` yields a [`Connection`] carrying an inbound event
//! stream and an outbound sender. The gateway implementation speaks
//! HTTP; the loopback implementation wires sessions to in-process
//! channels for tests and offline runs.

pub mod gateway;
pub mod loopback;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::Result;

pub use gateway::GatewayConnector;
pub use loopback::LoopbackConnector;

/// An inbound message observed on a connected channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatEvent {
    /// Channel the message was posted in.
    pub channel: String,
    /// Author display name.
    pub author: String,
    /// Message text.
    pub text: String,
}

/// An outbound message sent by a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    /// Target channel.
    pub channel: String,
    /// Message text.
    pub text: String,
}

/// Outbound half of an established connection.
pub trait Sender: Send + Sync {
    /// Send `text` to `channel`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Connect`](crate::AppError::Connect) if the
    /// platform rejects the message or the transport fails.
    fn send(&self, channel: &str, text: &str) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// A live connection bound to one bot token.
///
/// Dropping the event receiver tears the connection down; transports
/// stop their background readers when the channel closes.
pub struct Connection {
    /// Inbound event stream. Yields `None` when the transport closes.
    pub events: mpsc::Receiver<ChatEvent>,
    /// Outbound sender, shared with in-flight conversation tasks.
    pub sender: Arc<dyn Sender>,
}

/// Chat platform connection factory.
pub trait Connector: Send + Sync {
    /// Establish a connection for the given bot token.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Connect`](crate::AppError::Connect) if the
    /// token is rejected or the transport cannot be established.
    fn connect(&self, token: &str) -> Pin<Box<dyn Future<Output = Result<Connection>> + Send + '_>>;
}
