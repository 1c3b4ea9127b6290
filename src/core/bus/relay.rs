//! TCP fan-out hub: every line from one client goes to all clients

use super::codec::PayloadCodec;
use super::BusError;
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;

/// Pause after a failed accept, so a full descriptor table does not spin
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Bus relay server
pub struct BusRelay {
    listener: TcpListener,
    tx: broadcast::Sender<String>,
}

impl BusRelay {
    /// Bind the relay
    pub async fn bind(addr: &str) -> Result<Self, BusError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| BusError::ConnectionFailed(format!("{addr}: {e}")))?;
        let (tx, _) = broadcast::channel(1024);
        Ok(Self { listener, tx })
    }

    /// Address the relay listens on
    pub fn local_addr(&self) -> Result<SocketAddr, BusError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept clients until cancelled. Accept failures are logged and the
    /// relay keeps listening.
    pub async fn run(self, cancel: CancellationToken) {
        tracing::info!(addr = ?self.listener.local_addr().ok(), "Bus relay listening");
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                accepted = self.listener.accept() => self.admit(accepted, &cancel).await,
            }
        }
        tracing::info!("Bus relay stopped");
    }

    async fn admit(
        &self,
        accepted: std::io::Result<(TcpStream, SocketAddr)>,
        cancel: &CancellationToken,
    ) {
        let (stream, peer) = match accepted {
            Ok(client) => client,
            Err(e) => {
                tracing::warn!(error = %e, "Accept failed");
                tokio::time::sleep(ACCEPT_BACKOFF).await;
                return;
            }
        };

        tracing::info!(%peer, "Bus client connected");
        let tx = self.tx.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(e) = serve_client(stream, tx, cancel).await {
                tracing::warn!(%peer, error = %e, "Bus client failed");
            }
            tracing::info!(%peer, "Bus client disconnected");
        });
    }
}

async fn serve_client(
    stream: TcpStream,
    tx: broadcast::Sender<String>,
    cancel: CancellationToken,
) -> Result<(), BusError> {
    stream.set_nodelay(true)?;
    let mut rx = tx.subscribe();
    let mut framed = Framed::new(stream, PayloadCodec::new());

    loop {
        tokio::select! {
            () = cancel.cancelled() => return Ok(()),
            incoming = framed.next() => match incoming {
                Some(Ok(line)) if line.trim().is_empty() => {}
                Some(Ok(line)) => {
                    let _ = tx.send(line);
                }
                Some(Err(e)) => return Err(e),
                None => return Ok(()),
            },
            outgoing = rx.recv() => match outgoing {
                Ok(line) => framed.send(line).await?,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Bus client lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return Ok(()),
            },
        }
    }
}
