//! WebSocket client for the collaborative session channel.
//!
//! The client never reconnects on its own. Callers watch
//! [`CollabClient::status`] and decide what to do when the link is lost.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{
    client::IntoClientRequest,
    http::{header::AUTHORIZATION, HeaderValue},
    Message,
};
use tracing::debug;

use crate::error::{CollabError, Result};

/// Connectivity of a [`CollabClient`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connected,
    /// The transport failed or the server went away.
    Lost,
    /// Closed by [`CollabClient::close`] or by a close frame.
    Closed,
}

enum Outgoing {
    Snapshot(String),
    Close,
}

/// One participant connection.
pub struct CollabClient {
    outgoing: mpsc::UnboundedSender<Outgoing>,
    incoming: mpsc::UnboundedReceiver<String>,
    status_tx: Arc<watch::Sender<ConnectionStatus>>,
    status_rx: watch::Receiver<ConnectionStatus>,
    writer: JoinHandle<()>,
    reader: JoinHandle<()>,
}

impl CollabClient {
    /// Connect to `ws://host:port/ws/{project}[/{file}]`.
    pub async fn connect(url: &str) -> Result<Self> {
        let request = url
            .into_client_request()
            .map_err(|e| CollabError::ConnectionRejected(e.to_string()))?;
        Self::open(request).await
    }

    /// Connect with a bearer token in the Authorization header.
    pub async fn connect_with_token(url: &str, token: &str) -> Result<Self> {
        let mut request = url
            .into_client_request()
            .map_err(|e| CollabError::ConnectionRejected(e.to_string()))?;
        let value = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|e| CollabError::ConnectionRejected(e.to_string()))?;
        request.headers_mut().insert(AUTHORIZATION, value);
        Self::open(request).await
    }

    async fn open(
        request: tokio_tungstenite::tungstenite::handshake::client::Request,
    ) -> Result<Self> {
        let uri = request.uri().to_string();
        let (stream, _) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| CollabError::ConnectionRejected(e.to_string()))?;
        debug!(url = %uri, "connected");

        let (mut sink, mut source) = stream.split();
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::Connected);
        let status_tx = Arc::new(status_tx);
        let (outgoing, mut outgoing_rx) = mpsc::unbounded_channel();
        let (incoming_tx, incoming) = mpsc::unbounded_channel();

        let status = Arc::clone(&status_tx);
        let writer = tokio::spawn(async move {
            while let Some(out) = outgoing_rx.recv().await {
                let result = match out {
                    Outgoing::Snapshot(content) => sink.send(Message::Text(content.into())).await,
                    Outgoing::Close => {
                        let _ = sink.close().await;
                        break;
                    }
                };
                if let Err(e) = result {
                    debug!(error = %e, "send failed");
                    mark(&status, ConnectionStatus::Lost);
                    break;
                }
            }
        });

        let status = Arc::clone(&status_tx);
        let reader = tokio::spawn(async move {
            let end = loop {
                match source.next().await {
                    Some(Ok(Message::Text(text))) => {
                        let _ = incoming_tx.send(text.as_str().to_owned());
                    }
                    Some(Ok(Message::Close(_))) => break ConnectionStatus::Closed,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!(error = %e, "receive failed");
                        break ConnectionStatus::Lost;
                    }
                    None => break ConnectionStatus::Lost,
                }
            };
            mark(&status, end);
        });

        Ok(Self {
            outgoing,
            incoming,
            status_tx,
            status_rx,
            writer,
            reader,
        })
    }

    /// Send a full document snapshot.
    pub fn send(&self, content: impl Into<String>) -> Result<()> {
        if *self.status_rx.borrow() != ConnectionStatus::Connected {
            return Err(CollabError::ConnectionLost("client is not connected".into()));
        }
        self.outgoing
            .send(Outgoing::Snapshot(content.into()))
            .map_err(|_| CollabError::ConnectionLost("writer stopped".into()))
    }

    /// Next snapshot from the server; `None` once the connection is gone
    /// and everything received has been read.
    pub async fn recv(&mut self) -> Option<String> {
        self.incoming.recv().await
    }

    /// Current connectivity.
    pub fn status(&self) -> ConnectionStatus {
        *self.status_rx.borrow()
    }

    /// Receiver notified on every status change.
    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status_rx.clone()
    }

    /// Close the connection with a close frame.
    pub async fn close(mut self) {
        mark(&self.status_tx, ConnectionStatus::Closed);
        if self.outgoing.send(Outgoing::Close).is_ok() {
            let _ = (&mut self.writer).await;
        }
    }
}

impl Drop for CollabClient {
    fn drop(&mut self) {
        self.reader.abort();
        self.writer.abort();
    }
}

/// Leave `Connected` once; later transitions are ignored.
fn mark(status: &watch::Sender<ConnectionStatus>, to: ConnectionStatus) {
    status.send_if_modified(|current| {
        if *current == ConnectionStatus::Connected {
            *current = to;
            true
        } else {
            false
        }
    });
}
