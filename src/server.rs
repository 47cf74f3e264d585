//! WebSocket server for calendar connections.
//!
//! Accepts TCP connections, performs the WebSocket handshake on the
//! configured path and hands each connection to its own dispatcher task.

use crate::channel::WsChannel;
use crate::config::Config;
use crate::dispatcher;
use crate::error::SessionError;
use crate::registry::ConnectionRegistry;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tracing::{debug, error, info, trace, warn};

/// Listen backlog
const BACKLOG: i32 = 1024;

/// Server instance
pub struct Server {
    config: Config,
    registry: Arc<ConnectionRegistry>,
    connection_limit: Arc<Semaphore>,
}

impl Server {
    /// Create a new server instance
    pub fn new(config: Config) -> Self {
        let connection_limit = Arc::new(Semaphore::new(config.max_connections));

        Server {
            config,
            registry: ConnectionRegistry::new(),
            connection_limit,
        }
    }

    /// Active connection registry
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Bind the configured address and serve until Ctrl-C.
    pub async fn run(&self) -> Result<(), Box<dyn std::error::Error>> {
        let addr: SocketAddr = self
            .config
            .listen
            .parse()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        let listener = TcpListener::from_std(create_listener(addr)?)?;
        info!(address = %addr, path = %self.config.path, "Server listening");

        tokio::select! {
            result = self.serve(listener) => result.map_err(|e| e as Box<dyn std::error::Error>),
            _ = tokio::signal::ctrl_c() => {
                let active = self.registry.snapshot();
                info!(active = active.len(), "Shutting down");
                for connection in active {
                    debug!(conn = %connection.id, peer = %connection.peer, "Dropping active connection");
                }
                Ok(())
            }
        }
    }

    /// Accept connections from `listener` forever.
    pub async fn serve(
        &self,
        listener: TcpListener,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let idle_timeout = self.config.idle_timeout();
        let path: Arc<str> = Arc::from(self.config.path.as_str());

        loop {
            // Wait for a connection slot
            let permit = self.connection_limit.clone().acquire_owned().await?;

            match listener.accept().await {
                Ok((stream, peer)) => {
                    debug!(peer = %peer, "New connection");

                    let registry = Arc::clone(&self.registry);
                    let path = Arc::clone(&path);

                    tokio::spawn(async move {
                        handle_connection(stream, peer, registry, path, idle_timeout).await;
                        drop(permit);
                    });
                }
                Err(e) => {
                    error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }
}

/// Upgrade one TCP connection and run its command loop.
async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    registry: Arc<ConnectionRegistry>,
    path: Arc<str>,
    idle_timeout: Option<Duration>,
) {
    let handshake = accept_hdr_async(stream, |req: &Request, resp: Response| {
        route(&path, req, resp)
    });
    // The idle limit also bounds the upgrade, so a silent peer cannot hold
    // a connection slot.
    let result = match idle_timeout {
        Some(limit) => match tokio::time::timeout(limit, handshake).await {
            Ok(result) => result,
            Err(_) => {
                warn!(peer = %peer, timeout = ?limit, "WebSocket handshake timed out");
                return;
            }
        },
        None => handshake.await,
    };
    let ws = match result {
        Ok(ws) => ws,
        Err(e) => {
            warn!(peer = %peer, error = %e, "WebSocket handshake failed");
            return;
        }
    };

    let connection = registry.connection(peer);
    let id = connection.id;
    let channel = WsChannel::new(ws, idle_timeout);

    match dispatcher::run(channel, connection, registry).await {
        Ok(()) => debug!(conn = %id, "Client quit"),
        Err(SessionError::Closed) => trace!(conn = %id, "Connection closed by client"),
        Err(e) => debug!(conn = %id, error = %e, "Connection error"),
    }
}

/// Accept the upgrade only on the configured path.
fn route(path: &str, req: &Request, resp: Response) -> Result<Response, ErrorResponse> {
    if req.uri().path() == path {
        return Ok(resp);
    }

    debug!(requested = %req.uri().path(), "Rejecting upgrade on unknown path");
    let mut rejection = ErrorResponse::new(Some(format!("no route for {}", req.uri().path())));
    *rejection.status_mut() = StatusCode::NOT_FOUND;
    Err(rejection)
}

/// Create a TCP listener with SO_REUSEADDR.
pub fn create_listener(addr: SocketAddr) -> io::Result<std::net::TcpListener> {
    let socket = socket2::Socket::new(
        match addr {
            SocketAddr::V4(_) => socket2::Domain::IPV4,
            SocketAddr::V6(_) => socket2::Domain::IPV6,
        },
        socket2::Type::STREAM,
        Some(socket2::Protocol::TCP),
    )?;

    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(BACKLOG)?;

    Ok(socket.into())
}
