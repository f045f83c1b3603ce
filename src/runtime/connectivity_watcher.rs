use crate::application_impl::*;
use crate::application_port::*;
use crate::domain_model::AuthMode;
use crate::domain_port::*;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::sync::watch::Receiver;
use tokio_util::sync::CancellationToken;

/// Catches the client up after connectivity returns: replays queued writes,
/// then renews a session that expired or is about to while offline.
pub struct ConnectivityWatcher {
    pipeline: Arc<ApiPipeline>,
    refresher: Arc<RefreshCoordinator>,
    auth_service: Arc<dyn AuthService>,
    session: Arc<SessionStore>,
    // Subscribed at construction so toggles before `run` still register.
    online: Mutex<Receiver<bool>>,
    initially_online: bool,
    cancellation_token: CancellationToken,
}

impl ConnectivityWatcher {
    pub fn new(
        environment: Arc<dyn NetworkEnvironment>,
        pipeline: Arc<ApiPipeline>,
        refresher: Arc<RefreshCoordinator>,
        auth_service: Arc<dyn AuthService>,
        session: Arc<SessionStore>,
        cancellation_token: CancellationToken,
    ) -> Self {
        let online = environment.watch_online();
        let initially_online = *online.borrow();
        Self {
            pipeline,
            refresher,
            auth_service,
            session,
            online: Mutex::new(online),
            initially_online,
            cancellation_token,
        }
    }

    pub async fn on_reconnect(&self) {
        match self.pipeline.flush_offline_queue().await {
            Ok(report) if report.flushed > 0 || report.remaining > 0 => {
                tracing::info!(
                    "reconnected: flushed {} queued writes, {} left",
                    report.flushed,
                    report.remaining
                );
            }
            Ok(_) => {}
            Err(e) => tracing::error!("offline queue replay failed: {:#?}", e),
        }

        self.resume_session().await;
    }

    /// Brings the session up to date after the client was away: renews a
    /// bearer token inside its lead window, or re-reads the identity in
    /// cookie mode.
    pub async fn resume_session(&self) {
        if self.session.auth_mode() == AuthMode::Cookie {
            if let Err(e) = self.auth_service.refresh_identity().await {
                tracing::warn!("identity refresh on resume failed: {}", e);
            }
        } else if let Err(e) = self.refresher.refresh_if_expiring().await {
            tracing::warn!("renewal on resume failed: {}", e);
        }
    }

    pub async fn run(&self) -> anyhow::Result<()> {
        let mut online = self.online.lock().await;
        let mut was_online = self.initially_online;
        loop {
            tokio::select! {
                biased;

                _ = self.cancellation_token.cancelled() => {
                    tracing::info!("connectivity watcher shutting down...");
                    break;
                }
                changed = online.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let now_online = *online.borrow_and_update();
                    // An offline spell shorter than one poll coalesces into a
                    // single `true`; pending writes still mark the reconnect.
                    let pending = self.pipeline.offline_queue().queued_count() > 0;
                    if now_online && (!was_online || pending) {
                        self.on_reconnect().await;
                    }
                    was_online = now_online;
                }
            }
        }
        Ok(())
    }
}
