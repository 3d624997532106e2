//! Identity discovery and session launch.
//!
//! Turns the set of configured bot identities into running sessions,
//! bounded by `max_bots`. Discovery assumes contiguous 1-based indices:
//! the first missing index ends the scan, so a caller that wants five
//! bots must supply indices 1–5 with no skipped numbers — a gap
//! silently truncates the set, it is not an error.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, warn, Instrument};

use crate::chat::Connector;
use crate::markov::Generator;
use crate::models::identity::Identity;
use crate::persistence::deployment_repo::DeploymentRepo;
use crate::secrets::SecretSource;
use crate::store::{self, ConfigStore};
use crate::GlobalConfig;

use super::session::BotSession;
use super::watchdog::LifecycleEvent;

/// Shared collaborators handed to every launched session.
pub struct LauncherDeps {
    /// Settings blob storage.
    pub store: Arc<dyn ConfigStore>,
    /// Chat platform connection factory.
    pub connector: Arc<dyn Connector>,
    /// Text generation collaborator.
    pub generator: Arc<dyn Generator>,
    /// Lifecycle record repository.
    pub repo: DeploymentRepo,
}

/// Handle to one launched session task.
pub struct SessionHandle {
    /// Discovery index of the identity.
    pub index: u32,
    /// Model the session impersonates.
    pub model_uid: String,
    /// Per-session cancellation token.
    pub cancel: CancellationToken,
    /// Task handle for the session loop.
    pub join: JoinHandle<()>,
}

/// Scan the secret source for contiguous identity indices.
///
/// Stops at the first index whose credential triple is incomplete;
/// later indices are never inspected.
#[must_use]
pub fn discover_identities(secrets: &SecretSource, max_bots: u32) -> Vec<Identity> {
    let mut found = Vec::new();
    for index in 1..=max_bots {
        match secrets.identity(index) {
            Some(identity) => found.push(identity),
            // Contiguous indices only: the first gap ends discovery.
            None => break,
        }
    }
    found
}

/// Discover identities and spawn one session task per identity.
///
/// Each session gets its own child cancellation token; a failed session
/// logs with identity context and never disturbs its siblings. Emits
/// one summary line with the launched count.
pub async fn launch_sessions(
    config: &GlobalConfig,
    secrets: &SecretSource,
    deps: &LauncherDeps,
    cancel: &CancellationToken,
) -> Vec<SessionHandle> {
    let identities = discover_identities(secrets, config.max_bots);
    let heartbeat_interval = Duration::from_secs(config.lifecycle.heartbeat_seconds);

    let mut handles = Vec::with_capacity(identities.len());
    for identity in identities {
        let settings = store::load_settings(deps.store.as_ref(), &identity).await;
        let session_cancel = cancel.child_token();

        let session = BotSession::new(
            identity.clone(),
            settings,
            Arc::clone(&deps.store),
            Arc::clone(&deps.connector),
            Arc::clone(&deps.generator),
            deps.repo.clone(),
            heartbeat_interval,
            session_cancel.clone(),
        );

        let span = info_span!(
            "bot_session",
            index = identity.index,
            model_uid = %identity.model_uid
        );
        let join = tokio::spawn(
            async move {
                if let Err(err) = session.run().await {
                    error!(%err, "bot session failed");
                }
            }
            .instrument(span),
        );

        handles.push(SessionHandle {
            index: identity.index,
            model_uid: identity.model_uid,
            cancel: session_cancel,
            join,
        });
    }

    info!(count = handles.len(), "launched bot sessions");
    handles
}

/// Consume watchdog events and cancel sessions whose records expired.
///
/// Stale events are informational; only expiry forces a stop. Runs
/// until the root token is cancelled or the event channel closes.
#[must_use]
pub fn spawn_expiry_guard(
    mut events: mpsc::Receiver<LifecycleEvent>,
    handles: &[SessionHandle],
    cancel: CancellationToken,
) -> JoinHandle<()> {
    let tokens: HashMap<String, CancellationToken> = handles
        .iter()
        .map(|handle| (handle.model_uid.clone(), handle.cancel.clone()))
        .collect();

    tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                () = cancel.cancelled() => return,
                event = events.recv() => match event {
                    Some(event) => event,
                    None => return,
                },
            };

            match event {
                LifecycleEvent::Expired { model_uid, .. } => {
                    if let Some(token) = tokens.get(&model_uid) {
                        warn!(model_uid, "deployment expired, stopping session");
                        token.cancel();
                    }
                }
                LifecycleEvent::WentStale { model_uid, .. } => {
                    warn!(model_uid, "deployment went stale");
                }
                LifecycleEvent::Recovered { model_uid, .. } => {
                    info!(model_uid, "deployment recovered");
                }
            }
        }
    })
}
