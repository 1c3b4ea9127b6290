//! In-process bus

use super::{BusError, BusMessage, MessageBus};
use async_trait::async_trait;
use tokio::sync::broadcast;

/// In-process bus hub built on a broadcast channel
#[derive(Debug, Clone)]
pub struct LocalBus {
    tx: broadcast::Sender<String>,
}

/// One participant on a [`LocalBus`]
#[derive(Debug)]
pub struct LocalBusHandle {
    tx: broadcast::Sender<String>,
    rx: broadcast::Receiver<String>,
}

impl LocalBus {
    /// Create a bus buffering up to `capacity` messages per participant
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Join the bus. The handle only sees messages published after this call.
    pub fn handle(&self) -> LocalBusHandle {
        LocalBusHandle {
            tx: self.tx.clone(),
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for LocalBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl LocalBusHandle {
    /// Publish a raw payload without validation
    pub fn publish_raw(&self, payload: &str) {
        let _ = self.tx.send(payload.to_string());
    }

    /// Take an already delivered payload without waiting
    pub fn try_next(&mut self) -> Option<String> {
        loop {
            match self.rx.try_recv() {
                Ok(payload) => return Some(payload),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Local bus receiver lagged");
                }
                Err(_) => return None,
            }
        }
    }
}

#[async_trait]
impl MessageBus for LocalBusHandle {
    async fn publish(&mut self, message: &BusMessage) -> Result<(), BusError> {
        self.publish_raw(&message.encode());
        Ok(())
    }

    async fn next_payload(&mut self) -> Result<Option<String>, BusError> {
        loop {
            match self.rx.recv().await {
                Ok(payload) => return Ok(Some(payload)),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Local bus receiver lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return Ok(None),
            }
        }
    }
}
