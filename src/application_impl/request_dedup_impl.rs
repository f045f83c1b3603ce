use crate::domain_model::RequestKey;
use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio_util::sync::CancellationToken;

type InflightMap = DashMap<RequestKey, (u64, CancellationToken)>;

/// Last-writer-wins registry of in-flight requests: registering a key that
/// is already in flight cancels the older request.
#[derive(Default)]
pub struct RequestDeduplicator {
    inflight: Arc<InflightMap>,
    next_id: AtomicU64,
}

/// Registration of one in-flight request, released on drop.
pub struct InflightGuard {
    key: RequestKey,
    id: u64,
    token: CancellationToken,
    inflight: Arc<InflightMap>,
}

impl InflightGuard {
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_superseded(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        self.inflight
            .remove_if(&self.key, |_, (id, _)| *id == self.id);
    }
}

impl RequestDeduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, key: RequestKey) -> InflightGuard {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        if let Some((_, previous)) = self.inflight.insert(key.clone(), (id, token.clone())) {
            tracing::debug!("superseding in-flight request {}", key);
            previous.cancel();
        }
        InflightGuard {
            key,
            id,
            token,
            inflight: self.inflight.clone(),
        }
    }

    pub fn in_flight(&self) -> usize {
        self.inflight.len()
    }
}
