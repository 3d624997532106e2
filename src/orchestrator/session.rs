//! A single running bot session.
//!
//! Binds one identity/token pair to a live chat connection, replies to
//! inbound messages with human-like timing, occasionally starts its own
//! conversations, and heartbeats its hosted deployment record. All
//! waits are I/O-bound suspension points; the session never spins.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Instrument};

use crate::chat::{ChatEvent, Connection, Connector, Sender};
use crate::markov::Generator;
use crate::models::deployment::DeploymentStatus;
use crate::models::identity::Identity;
use crate::models::settings::{BotSettings, TimingTriple};
use crate::persistence::deployment_repo::DeploymentRepo;
use crate::store::ConfigStore;
use crate::Result;

use super::timing;

/// One hosted bot instance scheduled as an independent task.
pub struct BotSession {
    identity: Identity,
    settings: BotSettings,
    store: Arc<dyn ConfigStore>,
    connector: Arc<dyn Connector>,
    generator: Arc<dyn Generator>,
    repo: DeploymentRepo,
    heartbeat_interval: Duration,
    cancel: CancellationToken,
}

impl BotSession {
    /// Construct a session; nothing runs until [`run`](Self::run).
    #[must_use]
    #[allow(clippy::too_many_arguments)] // Assembled in one place by the launcher.
    pub fn new(
        identity: Identity,
        settings: BotSettings,
        store: Arc<dyn ConfigStore>,
        connector: Arc<dyn Connector>,
        generator: Arc<dyn Generator>,
        repo: DeploymentRepo,
        heartbeat_interval: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            identity,
            settings,
            store,
            connector,
            generator,
            repo,
            heartbeat_interval,
            cancel,
        }
    }

    /// Connect and run the session loop until cancelled or disconnected.
    ///
    /// The first heartbeat strictly follows a successful connection and
    /// precedes any conversational action.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Connect`](crate::AppError::Connect) if the
    /// chat platform rejects the token or the transport fails; the
    /// launcher logs this per identity without touching sibling
    /// sessions.
    pub async fn run(mut self) -> Result<()> {
        let Connection { mut events, sender } =
            self.connector.connect(&self.identity.bot_token).await?;
        info!("connected to chat platform");

        // Absent record means a self-hosted or local run — nothing to
        // heartbeat, the session still serves traffic.
        let record_id = match self
            .repo
            .find_hosted_by_model_uid(&self.identity.model_uid)
            .await
        {
            Ok(Some(record)) => Some(record.id),
            Ok(None) => {
                debug!("no hosted deployment record, heartbeats disabled");
                None
            }
            Err(err) => {
                warn!(%err, "lifecycle record lookup failed, heartbeats disabled");
                None
            }
        };

        self.emit_heartbeat(record_id.as_deref()).await;

        let mut heartbeat = tokio::time::interval(self.heartbeat_interval);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The interval's immediate first tick is covered by the initial
        // heartbeat above.
        heartbeat.tick().await;

        let cancel = self.cancel.clone();
        let mut next_start = Instant::now()
            + timing::conversation_wait(
                self.settings.new_conversation_min_wait,
                self.settings.new_conversation_max_wait,
            );
        let mut last_channel: Option<String> = None;

        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    info!("session cancelled");
                    break;
                }
                _ = heartbeat.tick() => {
                    self.emit_heartbeat(record_id.as_deref()).await;
                }
                event = events.recv() => match event {
                    Some(event) => {
                        last_channel = Some(event.channel.clone());
                        self.handle_event(&sender, &event);
                    }
                    None => {
                        warn!("event stream closed");
                        break;
                    }
                },
                () = tokio::time::sleep_until(next_start) => {
                    self.refresh_settings().await;
                    if let Some(channel) = last_channel.clone() {
                        self.maybe_start_conversation(&sender, &channel);
                    }
                    next_start = Instant::now()
                        + timing::conversation_wait(
                            self.settings.new_conversation_min_wait,
                            self.settings.new_conversation_max_wait,
                        );
                }
            }
        }

        Ok(())
    }

    /// React to an inbound message, gated by the reply probability.
    fn handle_event(&self, sender: &Arc<dyn Sender>, event: &ChatEvent) {
        if !should_act(self.settings.reply_probability) {
            return;
        }
        self.spawn_conversation(sender, &event.channel, &event.text);
    }

    /// Possibly open an unsolicited conversation on the last seen channel.
    fn maybe_start_conversation(&self, sender: &Arc<dyn Sender>, channel: &str) {
        if self.settings.quiet_mode {
            return;
        }
        if !should_act(self.settings.reply_probability) {
            return;
        }
        self.spawn_conversation(sender, channel, "");
    }

    /// Run one conversation as its own task.
    ///
    /// Reply delay and typing simulation can hold a message in flight
    /// for minutes, so conversations must never occupy the session loop:
    /// heartbeat ticks keep firing while the task sleeps. The task is
    /// tied to the session's cancellation token.
    fn spawn_conversation(&self, sender: &Arc<dyn Sender>, channel: &str, context: &str) {
        let conversation = Conversation {
            generator: Arc::clone(&self.generator),
            sender: Arc::clone(sender),
            model_uid: self.identity.model_uid.clone(),
            channel: channel.to_owned(),
            context: context.to_owned(),
            reply_delay: self.settings.reply_delay(),
            typing_speed: self.settings.typing_speed(),
            max_sentence_length: self.settings.max_sentence_length,
        };
        let cancel = self.cancel.clone();
        tokio::spawn(
            async move {
                tokio::select! {
                    () = cancel.cancelled() => {}
                    () = conversation.run() => {}
                }
            }
            .instrument(tracing::Span::current()),
        );
    }

    /// Write a heartbeat to the lifecycle record, best-effort.
    ///
    /// An expired record means the session has outlived its lease and
    /// cancels itself; a failed write only warns — persistence never
    /// blocks availability.
    async fn emit_heartbeat(&self, record_id: Option<&str>) {
        let Some(id) = record_id else { return };
        match self.repo.record_heartbeat(id, Utc::now()).await {
            Ok(record) if record.status == DeploymentStatus::Expired => {
                warn!("hosted deployment expired, stopping session");
                self.cancel.cancel();
            }
            Ok(_) => debug!("heartbeat recorded"),
            Err(err) => warn!(%err, "heartbeat write failed"),
        }
    }

    /// Opportunistically re-read settings from the store.
    ///
    /// Invalid or unreachable blobs keep the current in-memory copy.
    async fn refresh_settings(&mut self) {
        let name = self.identity.settings_blob_name();
        match self.store.fetch_json(&name).await {
            Ok(Some(value)) => match serde_json::from_value::<BotSettings>(value) {
                Ok(settings) if settings.validate().is_ok() => {
                    self.settings = settings;
                }
                _ => warn!("refreshed settings invalid, keeping current"),
            },
            Ok(None) => {}
            Err(err) => debug!(%err, "settings refresh failed, keeping current"),
        }
    }
}

/// One in-flight reply or self-started message, detached from the
/// session loop.
struct Conversation {
    generator: Arc<dyn Generator>,
    sender: Arc<dyn Sender>,
    model_uid: String,
    channel: String,
    context: String,
    reply_delay: TimingTriple,
    typing_speed: TimingTriple,
    max_sentence_length: u32,
}

impl Conversation {
    /// Generate and send one message with simulated human timing.
    async fn run(self) {
        let delay = timing::sample_delay(self.reply_delay);
        tokio::time::sleep(delay).await;

        let text = match self
            .generator
            .generate(&self.model_uid, &self.context, self.max_sentence_length)
            .await
        {
            Ok(text) => text,
            Err(err) => {
                warn!(%err, "generation failed");
                return;
            }
        };

        let typing = timing::typing_duration(text.chars().count(), self.typing_speed);
        tokio::time::sleep(typing).await;

        if let Err(err) = self.sender.send(&self.channel, &text).await {
            warn!(%err, channel = self.channel, "send failed");
        }
    }
}

/// Probability gate for conversational actions.
///
/// Exactly 0 never acts and exactly 1 always acts, independent of the
/// random source.
#[must_use]
pub fn should_act(probability: f64) -> bool {
    if probability <= 0.0 {
        return false;
    }
    if probability >= 1.0 {
        return true;
    }
    rand::Rng::gen_bool(&mut rand::thread_rng(), probability)
}
