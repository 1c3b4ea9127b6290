//! Bus client speaking newline-delimited JSON over TCP

use super::codec::PayloadCodec;
use super::{BusError, BusMessage, MessageBus};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_util::codec::Framed;

/// TCP bus connection
pub struct TcpBus {
    addr: String,
    framed: Framed<TcpStream, PayloadCodec>,
}

impl TcpBus {
    /// Connect to a bus relay
    pub async fn connect(addr: &str, timeout: Duration) -> Result<Self, BusError> {
        let stream = tokio::time::timeout(timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| BusError::ConnectionFailed(format!("{addr}: timed out")))?
            .map_err(|e| BusError::ConnectionFailed(format!("{addr}: {e}")))?;

        stream.set_nodelay(true)?;
        tracing::info!(addr, "Connected to bus");

        Ok(Self {
            addr: addr.to_string(),
            framed: Framed::new(stream, PayloadCodec::new()),
        })
    }
}

#[async_trait]
impl MessageBus for TcpBus {
    async fn publish(&mut self, message: &BusMessage) -> Result<(), BusError> {
        self.framed.send(message.encode()).await
    }

    async fn next_payload(&mut self) -> Result<Option<String>, BusError> {
        loop {
            match self.framed.next().await {
                None => return Ok(None),
                Some(Ok(line)) if line.trim().is_empty() => {}
                Some(Ok(line)) => return Ok(Some(line)),
                Some(Err(e)) => {
                    tracing::warn!(addr = %self.addr, error = %e, "Bus receive failed");
                    return Err(e);
                }
            }
        }
    }
}
