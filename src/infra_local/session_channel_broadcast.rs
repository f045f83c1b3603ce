use crate::domain_model::SessionMessage;
use crate::domain_port::*;
use tokio::sync::broadcast::{self, Receiver, Sender};

const CHANNEL_CAP: usize = 64;

/// In-process stand-in for a same-origin broadcast channel. Clones share
/// the same bus, so one clone per context wires several contexts together.
#[derive(Debug, Clone)]
pub struct BroadcastSessionChannel {
    sender: Sender<SessionMessage>,
}

impl BroadcastSessionChannel {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAP);
        Self { sender }
    }
}

impl Default for BroadcastSessionChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionChannel for BroadcastSessionChannel {
    fn publish(&self, message: SessionMessage) {
        // No subscribers is not an error: a lone context has nobody to tell.
        if let Err(e) = self.sender.send(message) {
            tracing::trace!("session message dropped: {:?}", e.0.event);
        }
    }

    fn subscribe(&self) -> Receiver<SessionMessage> {
        self.sender.subscribe()
    }
}
