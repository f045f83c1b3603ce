use crate::domain_model::HttpMethod;
use crate::domain_port::*;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct ProbeConfig {
    pub health_url: String,
    pub timeout: Duration,
    pub idle_threshold: Duration,
    pub failure_window: Duration,
}

impl ProbeConfig {
    pub fn new(health_url: impl Into<String>) -> Self {
        Self {
            health_url: health_url.into(),
            timeout: Duration::from_secs(4),
            idle_threshold: Duration::from_secs(600),
            failure_window: Duration::from_secs(15),
        }
    }
}

#[derive(Debug, Default)]
struct Contact {
    last_success: Option<Instant>,
    last_failure: Option<Instant>,
}

/// Best-effort health ping for backends that suspend when idle. A probe
/// never fails its caller.
pub struct ColdStartProbe {
    transport: Arc<dyn Transport>,
    config: ProbeConfig,
    contact: Mutex<Contact>,
}

impl ColdStartProbe {
    pub fn new(transport: Arc<dyn Transport>, config: ProbeConfig) -> Self {
        Self {
            transport,
            config,
            contact: Mutex::new(Contact::default()),
        }
    }

    fn contact(&self) -> MutexGuard<'_, Contact> {
        self.contact.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn record_success(&self) {
        self.contact().last_success = Some(Instant::now());
    }

    pub fn record_failure(&self) {
        self.contact().last_failure = Some(Instant::now());
    }

    /// Due when the backend was never reached, has been idle past the
    /// threshold, or failed within the recent window.
    pub fn is_due(&self) -> bool {
        let contact = self.contact();
        let now = Instant::now();
        let recently_failed = contact
            .last_failure
            .is_some_and(|at| now.duration_since(at) < self.config.failure_window);
        let idle = match contact.last_success {
            None => true,
            Some(at) => now.duration_since(at) >= self.config.idle_threshold,
        };
        recently_failed || idle
    }

    /// Pings the health endpoint. Returns whether it answered with success.
    pub async fn probe(&self) -> bool {
        let request = TransportRequest::json(
            HttpMethod::Get,
            self.config.health_url.as_str(),
            self.config.timeout,
        );
        let started = Instant::now();
        match self.transport.execute(request).await {
            Ok(response) if response.is_success() => {
                tracing::debug!("backend awake after {:?}", started.elapsed());
                self.record_success();
                true
            }
            Ok(response) => {
                tracing::debug!("health probe answered {}", response.status);
                false
            }
            Err(e) => {
                tracing::debug!("health probe failed: {}", e);
                false
            }
        }
    }

    pub async fn warm_if_due(&self) -> bool {
        if self.is_due() { self.probe().await } else { false }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra_http::{FakeReply, FakeTransport};

    fn probe(fake: Arc<FakeTransport>) -> ColdStartProbe {
        ColdStartProbe::new(fake, ProbeConfig::new("http://api.test/healthz"))
    }

    #[tokio::test(start_paused = true)]
    async fn due_until_first_contact_then_after_idle() {
        let fake = Arc::new(FakeTransport::new());
        fake.on("/healthz", FakeReply::status(200));
        let probe = probe(fake.clone());

        assert!(probe.is_due());
        assert!(probe.warm_if_due().await);
        assert!(!probe.is_due());

        tokio::time::advance(Duration::from_secs(601)).await;
        assert!(probe.is_due());
    }

    #[tokio::test(start_paused = true)]
    async fn recent_failure_makes_probe_due() {
        let fake = Arc::new(FakeTransport::new());
        let probe = probe(fake);
        probe.record_success();
        probe.record_failure();
        assert!(probe.is_due());

        tokio::time::advance(Duration::from_secs(16)).await;
        assert!(!probe.is_due());
    }

    #[tokio::test(start_paused = true)]
    async fn probe_failure_is_swallowed() {
        let fake = Arc::new(FakeTransport::new());
        fake.on("/healthz", FakeReply::status(200).after(Duration::from_secs(30)));
        let probe = probe(fake.clone());

        let started = Instant::now();
        assert!(!probe.probe().await);
        assert_eq!(started.elapsed(), Duration::from_secs(4));
    }
}
