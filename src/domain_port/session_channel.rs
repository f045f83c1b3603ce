use crate::domain_model::SessionMessage;
use tokio::sync::broadcast::Receiver;

/// Pub/sub between contexts sharing one origin. Subscribers see every
/// message, their own context's included, and filter on
/// `SessionMessage::origin`.
pub trait SessionChannel: Send + Sync {
    fn publish(&self, message: SessionMessage);
    fn subscribe(&self) -> Receiver<SessionMessage>;
}
