use crate::application_impl::SessionStore;
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const MIN_LEAD_SECS: i64 = 30;
pub const MAX_LEAD_SECS: i64 = 120;
pub const MIN_SCHEDULE_SECS: i64 = 5;

type RenewalFuture = Shared<BoxFuture<'static, Result<(), SessionError>>>;

struct Inflight {
    generation: u64,
    future: RenewalFuture,
}

#[derive(Default)]
struct Slot {
    next_generation: u64,
    current: Option<Inflight>,
}

/// Lead time before expiry at which a proactive renewal fires:
/// 10% of the remaining lifetime, clamped to 30..=120 seconds.
pub fn lead_seconds(remaining: i64) -> i64 {
    (remaining.max(0) / 10).clamp(MIN_LEAD_SECS, MAX_LEAD_SECS)
}

/// Seconds from now until the proactive renewal should fire.
pub fn renewal_delay_secs(expires_at: i64, now: i64) -> i64 {
    let remaining = (expires_at - now).max(0);
    (remaining - lead_seconds(remaining)).max(MIN_SCHEDULE_SECS)
}

/// Keeps at most one renewal in flight. Concurrent callers share the
/// pending outcome; the renewal itself runs on its own task so dropping
/// every waiter does not abandon it.
pub struct RefreshCoordinator {
    session: Arc<SessionStore>,
    endpoints: Arc<dyn AuthEndpoints>,
    slot: Arc<Mutex<Slot>>,
}

impl RefreshCoordinator {
    pub fn new(session: Arc<SessionStore>, endpoints: Arc<dyn AuthEndpoints>) -> Self {
        Self {
            session,
            endpoints,
            slot: Arc::new(Mutex::new(Slot::default())),
        }
    }

    pub fn state(&self) -> RefreshState {
        let slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.current.is_some() {
            RefreshState::Refreshing
        } else {
            RefreshState::Idle
        }
    }

    pub async fn refresh_now(&self) -> Result<(), SessionError> {
        let future = {
            let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
            match &slot.current {
                Some(inflight) => inflight.future.clone(),
                None => {
                    let generation = slot.next_generation;
                    slot.next_generation += 1;
                    let future = self.start(generation);
                    slot.current = Some(Inflight {
                        generation,
                        future: future.clone(),
                    });
                    future
                }
            }
        };
        future.await
    }

    fn start(&self, generation: u64) -> RenewalFuture {
        let session = self.session.clone();
        let endpoints = self.endpoints.clone();
        let slot = self.slot.clone();

        let task = tokio::spawn(async move {
            tracing::debug!("session renewal started");
            let result = renew(&session, endpoints.as_ref()).await;
            match &result {
                Ok(()) => tracing::info!("session renewed"),
                Err(e) => {
                    tracing::warn!("session renewal failed, logging out: {}", e);
                    session.clear();
                }
            }
            let mut slot = slot.lock().unwrap_or_else(PoisonError::into_inner);
            if slot
                .current
                .as_ref()
                .is_some_and(|inflight| inflight.generation == generation)
            {
                slot.current = None;
            }
            result
        });

        async move {
            match task.await {
                Ok(result) => result,
                Err(e) => Err(SessionError::Transport(format!("renewal task failed: {e}"))),
            }
        }
        .boxed()
        .shared()
    }

    /// Renews only when the remaining lifetime is inside the lead window.
    /// Returns whether a renewal ran.
    pub async fn refresh_if_expiring(&self) -> Result<bool, SessionError> {
        if !self.session.auth_mode().sends_bearer() || self.session.access_token().is_none() {
            return Ok(false);
        }
        let Some(remaining) = self.session.seconds_to_expiry() else {
            return Ok(false);
        };
        if remaining > lead_seconds(remaining) {
            return Ok(false);
        }
        self.refresh_now().await?;
        Ok(true)
    }

    /// Proactive renewal loop, re-armed whenever the session publishes a new
    /// expiry.
    pub async fn run_scheduler(&self, cancellation_token: CancellationToken) {
        let mut expiry = self.session.subscribe_expiry();
        loop {
            let armed = *expiry.borrow_and_update();
            let delay = armed.map(|exp| {
                let secs = renewal_delay_secs(exp, self.session.now_unix());
                tracing::debug!("proactive renewal armed in {}s", secs);
                Duration::from_secs(secs as u64)
            });

            tokio::select! {
                biased;

                _ = cancellation_token.cancelled() => {
                    tracing::info!("refresh scheduler shutting down...");
                    break;
                }
                changed = expiry.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = sleep_or_forever(delay) => {
                    if let Err(e) = self.refresh_now().await {
                        tracing::warn!("proactive renewal failed: {}", e);
                    }
                }
            }
        }
    }
}

async fn sleep_or_forever(delay: Option<Duration>) {
    match delay {
        Some(delay) => tokio::time::sleep(delay).await,
        None => std::future::pending().await,
    }
}

async fn renew(session: &SessionStore, endpoints: &dyn AuthEndpoints) -> Result<(), SessionError> {
    let mode = session.auth_mode();
    let refresh_token = session.refresh_token();
    if refresh_token.is_none() && mode == AuthMode::Token {
        return Err(SessionError::NoRefreshToken);
    }
    let access_token = if mode.sends_bearer() {
        session.access_token()
    } else {
        None
    };

    let grant = endpoints
        .renew(refresh_token.as_deref(), access_token.as_deref())
        .await?;
    match grant.access_token.as_deref() {
        Some(token) if !token.is_empty() => {
            session.set_credentials(token, grant.refresh_token.as_deref(), None);
        }
        // The server rotated the session cookie.
        _ if mode == AuthMode::Cookie => {}
        _ => return Err(SessionError::MissingAccessToken),
    }
    if grant.role.is_some() || grant.permissions.is_some() {
        session.apply_identity(&Identity {
            id: None,
            role: grant.role,
            permissions: grant.permissions,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lead_time_is_clamped() {
        assert_eq!(lead_seconds(3600), 120);
        assert_eq!(lead_seconds(600), 60);
        assert_eq!(lead_seconds(100), 30);
        assert_eq!(lead_seconds(0), 30);
    }

    #[test]
    fn renewal_never_scheduled_sooner_than_five_seconds() {
        assert_eq!(renewal_delay_secs(3600, 0), 3480);
        assert_eq!(renewal_delay_secs(40, 0), 10);
        assert_eq!(renewal_delay_secs(20, 0), 5);
        assert_eq!(renewal_delay_secs(0, 100), 5);
    }
}
