use crate::domain_model::*;
use crate::domain_port::*;
use std::sync::{PoisonError, RwLock};
use tokio::sync::watch::{self, Receiver, Sender};

/// Connectivity and connection hints set by the host rather than sensed.
pub struct ManualNetworkEnvironment {
    online: Sender<bool>,
    hints: RwLock<NetworkHints>,
}

impl ManualNetworkEnvironment {
    pub fn new(online: bool, hints: NetworkHints) -> Self {
        let (online, _) = watch::channel(online);
        Self {
            online,
            hints: RwLock::new(hints),
        }
    }

    pub fn online() -> Self {
        Self::new(true, NetworkHints::default())
    }

    pub fn set_online(&self, online: bool) {
        let changed = self.online.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
        if changed {
            tracing::info!("connectivity changed: online={}", online);
        }
    }

    pub fn set_hints(&self, hints: NetworkHints) {
        *self.hints.write().unwrap_or_else(PoisonError::into_inner) = hints;
    }
}

impl NetworkEnvironment for ManualNetworkEnvironment {
    fn is_online(&self) -> bool {
        *self.online.borrow()
    }

    fn hints(&self) -> NetworkHints {
        *self.hints.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn watch_online(&self) -> Receiver<bool> {
        self.online.subscribe()
    }
}
