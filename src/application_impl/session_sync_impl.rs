use crate::application_impl::{ResponseCache, SessionStore};
use crate::domain_model::*;
use crate::domain_port::*;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::sync::broadcast::Receiver;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

/// Applies session changes announced by other contexts. Updates are
/// reconciled by reloading the persisted copy, never by merging fields.
///
/// A logout from any context, this one included, also empties the attached
/// response cache so the next user never sees the previous user's data.
pub struct SessionSynchronizer {
    session: Arc<SessionStore>,
    cache: Option<Arc<ResponseCache>>,
    // Subscribed at construction so nothing published before `run` is lost.
    receiver: Mutex<Receiver<SessionMessage>>,
}

impl SessionSynchronizer {
    pub fn new(session: Arc<SessionStore>, channel: Arc<dyn SessionChannel>) -> Self {
        Self {
            session,
            cache: None,
            receiver: Mutex::new(channel.subscribe()),
        }
    }

    pub fn clearing_cache(mut self, cache: Arc<ResponseCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Returns whether the message came from another context and was applied.
    pub fn apply(&self, message: &SessionMessage) -> bool {
        if message.event == SessionEvent::LoggedOut {
            if let Some(cache) = &self.cache {
                tracing::debug!("logout: dropping {} cached responses", cache.len());
                cache.clear();
            }
        }
        if &message.origin == self.session.origin() {
            return false;
        }
        match message.event {
            SessionEvent::Updated => {
                tracing::debug!("session updated by context {}", message.origin);
                self.session.reload_from_storage();
            }
            SessionEvent::LoggedOut => {
                tracing::info!("session logged out by context {}", message.origin);
                self.session.apply_remote_logout();
            }
        }
        true
    }

    pub async fn run(&self, cancellation_token: CancellationToken) {
        let mut receiver = self.receiver.lock().await;
        loop {
            tokio::select! {
                biased;

                _ = cancellation_token.cancelled() => {
                    tracing::info!("session synchronizer shutting down...");
                    break;
                }
                received = receiver.recv() => match received {
                    Ok(message) => {
                        self.apply(&message);
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!("missed {} session messages, reloading", skipped);
                        self.session.reload_from_storage();
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }
    }
}
