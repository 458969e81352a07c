//! The one task that feeds payloads from the topic into `Hub::broadcast`.
use super::{Hub, Payload};

use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::watch;

/// Create the broadcaster's input queue, holding up to `buffer` waiting payloads.
pub fn broadcast_channel(hub: Arc<Hub>, buffer: usize) -> (BroadcastTx, Broadcaster) {
    let (tx, rx) = mpsc::channel(buffer.max(1));
    (
        BroadcastTx {
            tx,
            hub: Arc::clone(&hub),
        },
        Broadcaster { hub, rx },
    )
}

/// The sending side of the broadcaster's input queue
#[derive(Debug, Clone)]
pub struct BroadcastTx {
    tx: mpsc::Sender<Payload>,
    hub: Arc<Hub>,
}

impl BroadcastTx {
    /// Hand a payload to the broadcaster without waiting.
    ///
    /// When the broadcaster is behind and its queue is full, the payload is dropped and
    /// counted in `Stats::input_dropped`; delivery is best-effort.
    pub fn forward(&self, payload: Payload) -> bool {
        match self.tx.try_send(payload) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.hub.count_input_drop();
                log::warn!("Broadcaster is behind; dropped a message from the topic");
                false
            }
            Err(TrySendError::Closed(_)) => {
                self.hub.count_input_drop();
                log::error!("Broadcaster has stopped; dropped a message from the topic");
                false
            }
        }
    }
}

#[derive(Debug)]
pub struct Broadcaster {
    hub: Arc<Hub>,
    rx: mpsc::Receiver<Payload>,
}

impl Broadcaster {
    /// Drain the input queue until every `BroadcastTx` is gone or shutdown is signalled.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        loop {
            tokio::select! {
                payload = self.rx.recv() => match payload {
                    Some(payload) => {
                        let delivery = self.hub.broadcast(&payload);
                        log::debug!(
                            "Broadcast to {} client(s), dropped for {}",
                            delivery.delivered,
                            delivery.dropped
                        );
                    }
                    None => break,
                },
                _ = shutdown.changed() => break,
            }
        }
        log::info!("Broadcaster stopped");
    }
}
