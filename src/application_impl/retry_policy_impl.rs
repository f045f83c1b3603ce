use crate::domain_model::HttpMethod;
use chrono::{DateTime, Utc};
use rand::Rng;
use std::time::Duration;

pub const RETRYABLE_STATUSES: [u16; 7] = [408, 425, 429, 500, 502, 503, 504];

/// Longest server-requested wait honoured between attempts.
const RETRY_AFTER_CAP: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub read_retries: u32,
    pub write_retries: u32,
    /// Upper bound of the random extra delay, as a fraction of the computed one.
    pub jitter_ratio: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(300),
            max_delay: Duration::from_secs(8),
            read_retries: 3,
            write_retries: 0,
            jitter_ratio: 0.4,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn is_retryable_status(status: u16) -> bool {
        RETRYABLE_STATUSES.contains(&status)
    }

    /// Retries allowed after the first attempt.
    pub fn budget_for(&self, method: HttpMethod, requested: Option<u32>) -> u32 {
        requested.unwrap_or(if method.is_read() {
            self.config.read_retries
        } else {
            self.config.write_retries
        })
    }

    /// `base * 2^attempt`, capped at `max_delay`. `attempt` is zero-based.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let base_ms = self.config.base_delay.as_millis() as u64;
        let max_ms = self.config.max_delay.as_millis() as u64;
        let delay_ms = base_ms.saturating_mul(1u64 << attempt.min(16));
        Duration::from_millis(delay_ms.min(max_ms).max(1))
    }

    /// Wait before retry number `attempt + 1`: the server's `Retry-After`
    /// when it sent one, the jittered backoff otherwise.
    pub fn delay_for(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        if let Some(wait) = retry_after {
            return wait.min(RETRY_AFTER_CAP);
        }
        let delay = self.backoff(attempt);
        let ratio = self.config.jitter_ratio.clamp(0.0, 1.0);
        if ratio == 0.0 {
            return delay;
        }
        let extra = rand::rng().random_range(0.0..=ratio);
        delay + delay.mul_f64(extra)
    }

    /// `Retry-After` as delta-seconds or an HTTP date.
    pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
        let value = value.trim();
        if let Ok(seconds) = value.parse::<u64>() {
            return Some(Duration::from_secs(seconds));
        }
        let at = DateTime::parse_from_rfc2822(value).ok()?.with_timezone(&Utc);
        Some((at - now).to_std().unwrap_or(Duration::ZERO))
    }
}
