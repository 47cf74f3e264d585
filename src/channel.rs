//! Text-message channel abstraction.
//!
//! The command layers only ever see [`Incoming`] values: frame types are
//! decided once here, at the transport boundary. [`WsChannel`] adapts a
//! server-side WebSocket stream; tests use an in-memory implementation.

use crate::error::SessionError;
use futures_util::{SinkExt, StreamExt};
use std::future::Future;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tracing::trace;

/// A message received from the peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Incoming {
    /// UTF-8 text frame
    Text(String),
    /// Any other frame (binary, ping, pong). Ignored by the protocol.
    Other,
}

/// Duplex channel carrying text messages for one connection.
///
/// `recv` yields `Err(SessionError::Closed)` once the peer has gone away.
pub trait MessageChannel {
    fn recv(&mut self) -> impl Future<Output = Result<Incoming, SessionError>> + Send;

    fn send(&mut self, text: &str) -> impl Future<Output = Result<(), SessionError>> + Send;

    /// Close the channel. Errors are ignored; the connection is over anyway.
    fn close(&mut self) -> impl Future<Output = ()> + Send;
}

/// Server side of an accepted WebSocket connection.
pub struct WsChannel {
    ws: WebSocketStream<TcpStream>,
    idle_timeout: Option<Duration>,
}

impl WsChannel {
    pub fn new(ws: WebSocketStream<TcpStream>, idle_timeout: Option<Duration>) -> Self {
        Self { ws, idle_timeout }
    }
}

impl MessageChannel for WsChannel {
    async fn recv(&mut self) -> Result<Incoming, SessionError> {
        let next = match self.idle_timeout {
            Some(limit) => tokio::time::timeout(limit, self.ws.next())
                .await
                .map_err(|_| SessionError::IdleTimeout(limit))?,
            None => self.ws.next().await,
        };

        match next {
            Some(Ok(Message::Text(text))) => {
                trace!(len = text.len(), "Text frame");
                Ok(Incoming::Text(text))
            }
            Some(Ok(Message::Close(frame))) => {
                trace!(?frame, "Close frame");
                Err(SessionError::Closed)
            }
            Some(Ok(other)) => {
                trace!(len = other.len(), "Ignoring non-text frame");
                Ok(Incoming::Other)
            }
            Some(Err(e)) => Err(e.into()),
            None => Err(SessionError::Closed),
        }
    }

    async fn send(&mut self, text: &str) -> Result<(), SessionError> {
        self.ws.send(Message::Text(text.to_owned())).await?;
        Ok(())
    }

    async fn close(&mut self) {
        if let Err(e) = self.ws.close(None).await {
            trace!(error = %e, "Close after shutdown");
        }
    }
}
