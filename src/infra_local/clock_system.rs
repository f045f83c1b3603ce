use crate::domain_port::*;
use chrono::Utc;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_unix(&self) -> i64 {
        Utc::now().timestamp()
    }
}

/// Wall clock derived from the tokio timer, so it follows paused and
/// auto-advanced time in tests.
#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
    base_unix: i64,
    started: Instant,
}

impl TokioClock {
    pub fn starting_at(base_unix: i64) -> Self {
        Self {
            base_unix,
            started: Instant::now(),
        }
    }
}

impl Clock for TokioClock {
    fn now_unix(&self) -> i64 {
        self.base_unix + self.started.elapsed().as_secs() as i64
    }
}
