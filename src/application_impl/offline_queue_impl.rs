use crate::application_port::ApiError;
use crate::domain_model::*;
use crate::domain_port::*;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;

pub const OFFLINE_QUEUE_KEY: &str = "http:offline-queue:v1";

/// Writes recorded while offline, kept as a JSON array in the durable store
/// and replayed oldest first. The in-memory list is authoritative; a job the
/// store refuses to persist still replays while this process lives.
pub struct OfflineQueue {
    store: Arc<dyn KeyValueStore>,
    jobs: Mutex<Vec<QueuedWrite>>,
    // Only one replay at a time.
    replay: tokio::sync::Mutex<()>,
    count: watch::Sender<usize>,
}

impl OfflineQueue {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        let restored = Self::load(store.as_ref());
        if !restored.is_empty() {
            tracing::info!("offline queue restored with {} pending writes", restored.len());
        }
        let (count, _) = watch::channel(restored.len());
        Self {
            store,
            jobs: Mutex::new(restored),
            replay: tokio::sync::Mutex::new(()),
            count,
        }
    }

    fn load(store: &dyn KeyValueStore) -> Vec<QueuedWrite> {
        match store.get(OFFLINE_QUEUE_KEY) {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                tracing::warn!("discarding unreadable offline queue: {}", e);
                Vec::new()
            }),
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::warn!("failed to read offline queue: {}", e);
                Vec::new()
            }
        }
    }

    fn persist(&self, jobs: &[QueuedWrite]) -> Result<(), ApiError> {
        let result = if jobs.is_empty() {
            self.store.remove(OFFLINE_QUEUE_KEY)
        } else {
            let raw =
                serde_json::to_string(jobs).map_err(|e| ApiError::Storage(e.to_string()))?;
            self.store.set(OFFLINE_QUEUE_KEY, &raw)
        };
        result.map_err(|e| ApiError::Storage(e.to_string()))
    }

    /// Applies `f` to the in-memory list, then writes it through. The edit
    /// stands even when the write fails.
    fn edit<T>(
        &self,
        f: impl FnOnce(&mut Vec<QueuedWrite>) -> T,
    ) -> (T, Result<(), ApiError>) {
        let mut jobs = self.jobs.lock().unwrap_or_else(PoisonError::into_inner);
        let out = f(&mut jobs);
        self.count.send_replace(jobs.len());
        let persisted = self.persist(&jobs);
        (out, persisted)
    }

    /// Never fails: a job that cannot be persisted is kept in memory only.
    pub fn enqueue(&self, job: QueuedWrite) -> JobId {
        let id = job.id;
        tracing::info!("queued offline {} {} as {}", job.method, job.target, id);
        let ((), persisted) = self.edit(|jobs| jobs.push(job));
        if let Err(e) = persisted {
            tracing::warn!("offline write {} kept in memory only: {}", id, e);
        }
        id
    }

    pub fn jobs(&self) -> Vec<QueuedWrite> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn queued_count(&self) -> usize {
        *self.count.borrow()
    }

    pub fn subscribe_count(&self) -> watch::Receiver<usize> {
        self.count.subscribe()
    }

    pub fn discard(&self, id: JobId) -> Result<bool, ApiError> {
        let (removed, persisted) = self.edit(|jobs| {
            let before = jobs.len();
            jobs.retain(|job| job.id != id);
            before != jobs.len()
        });
        persisted?;
        Ok(removed)
    }

    /// Sends queued jobs in enqueue order. Each job leaves the queue only
    /// after `send` succeeded; the first failure stops the replay and keeps
    /// it and everything after it queued.
    pub async fn replay<F, Fut>(&self, send: F) -> Result<ReplayReport, ApiError>
    where
        F: Fn(QueuedWrite) -> Fut,
        Fut: Future<Output = Result<(), ApiError>>,
    {
        let _replaying = self.replay.lock().await;
        let pending = self.jobs();
        let mut flushed = 0;

        for job in pending {
            let id = job.id;
            match send(job).await {
                Ok(()) => {
                    let ((), persisted) = self.edit(|jobs| jobs.retain(|job| job.id != id));
                    if let Err(e) = persisted {
                        tracing::warn!("replayed {} but could not persist the queue: {}", id, e);
                    }
                    flushed += 1;
                }
                Err(e) => {
                    tracing::warn!("offline replay halted at {}: {}", id, e);
                    break;
                }
            }
        }

        let report = ReplayReport {
            flushed,
            remaining: self.queued_count(),
        };
        tracing::info!(
            "offline replay flushed {} writes, {} remaining",
            report.flushed,
            report.remaining
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra_local::MemoryStore;
    use serde_json::json;

    fn job(name: &str) -> QueuedWrite {
        QueuedWrite::new(
            format!("/orders/{name}"),
            HttpMethod::Post,
            Some(json!({ "name": name })),
            vec![],
        )
    }

    #[tokio::test]
    async fn queue_survives_restart() {
        let store = Arc::new(MemoryStore::new());
        let first = OfflineQueue::new(store.clone());
        first.enqueue(job("a"));
        first.enqueue(job("b"));

        let second = OfflineQueue::new(store.clone());
        assert_eq!(second.queued_count(), 2);
        assert_eq!(second.jobs()[0].target, "/orders/a");
        assert!(store.get(OFFLINE_QUEUE_KEY).unwrap().unwrap().starts_with('['));
    }

    #[tokio::test]
    async fn discard_removes_one_job() {
        let queue = OfflineQueue::new(Arc::new(MemoryStore::new()));
        let a = queue.enqueue(job("a"));
        queue.enqueue(job("b"));

        assert!(queue.discard(a).unwrap());
        assert!(!queue.discard(a).unwrap());
        assert_eq!(queue.queued_count(), 1);
    }

    #[tokio::test]
    async fn count_is_observable() {
        let queue = OfflineQueue::new(Arc::new(MemoryStore::new()));
        let mut count = queue.subscribe_count();
        queue.enqueue(job("a"));
        count.changed().await.unwrap();
        assert_eq!(*count.borrow(), 1);

        let report = queue.replay(|_| async { Ok(()) }).await.unwrap();
        assert_eq!(report, ReplayReport { flushed: 1, remaining: 0 });
        assert_eq!(*count.borrow(), 0);
    }

    struct ReadOnlyStore;

    impl KeyValueStore for ReadOnlyStore {
        fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
            Ok(None)
        }

        fn set(&self, _key: &str, _value: &str) -> Result<(), StoreError> {
            Err(StoreError::Io("disk full".to_owned()))
        }

        fn remove(&self, _key: &str) -> Result<(), StoreError> {
            Err(StoreError::Io("disk full".to_owned()))
        }
    }

    #[tokio::test]
    async fn unpersisted_jobs_still_replay() {
        let queue = OfflineQueue::new(Arc::new(ReadOnlyStore));
        queue.enqueue(job("a"));
        queue.enqueue(job("b"));
        assert_eq!(queue.queued_count(), 2);

        let sent = Mutex::new(Vec::new());
        let report = queue
            .replay(|job| {
                sent.lock().unwrap().push(job.target);
                async { Ok(()) }
            })
            .await
            .unwrap();

        assert_eq!(report, ReplayReport { flushed: 2, remaining: 0 });
        assert_eq!(*sent.lock().unwrap(), vec!["/orders/a", "/orders/b"]);
    }

    #[tokio::test]
    async fn unreadable_queue_starts_empty() {
        let store = Arc::new(MemoryStore::new());
        store.set(OFFLINE_QUEUE_KEY, "{broken").unwrap();
        let queue = OfflineQueue::new(store);
        assert_eq!(queue.queued_count(), 0);
    }
}
