use crate::domain_model::*;
use crate::domain_port::*;
use std::sync::Arc;
use std::time::Duration;

/// Picks request timeouts from the connection hints the host exposes.
pub struct NetworkQualityEstimator {
    environment: Arc<dyn NetworkEnvironment>,
    baseline: Duration,
}

impl NetworkQualityEstimator {
    pub fn new(environment: Arc<dyn NetworkEnvironment>, baseline: Duration) -> Self {
        Self {
            environment,
            baseline,
        }
    }

    pub fn multiplier(hints: &NetworkHints) -> f64 {
        if hints.save_data {
            return 2.0;
        }
        match hints.connection {
            ConnectionType::Slow2g | ConnectionType::TwoG => 2.0,
            ConnectionType::ThreeG => 1.5,
            ConnectionType::FourG | ConnectionType::Unknown => 1.0,
        }
    }

    pub fn timeout(&self) -> Duration {
        let hints = self.environment.hints();
        self.baseline.mul_f64(Self::multiplier(&hints))
    }

    pub fn save_data(&self) -> bool {
        self.environment.hints().save_data
    }

    pub fn is_online(&self) -> bool {
        self.environment.is_online()
    }
}
