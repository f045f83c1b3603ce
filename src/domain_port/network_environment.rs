use crate::domain_model::NetworkHints;
use tokio::sync::watch::Receiver;

pub trait NetworkEnvironment: Send + Sync {
    fn is_online(&self) -> bool;
    fn hints(&self) -> NetworkHints;
    fn watch_online(&self) -> Receiver<bool>;
}
