//! TCP listener for the parking reservation protocol
//!
//! One tokio task per accepted connection. Each connection carries exactly
//! one request and one reply, after which the server closes it.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use super::codec::{read_request, write_reply, FrameError};
use crate::application::{Reply, RequestDispatcher};
use crate::config::ServerConfig;
use crate::support::errors::ReservationError;
use crate::support::shutdown::ShutdownSignal;

/// Per-connection limits
#[derive(Debug, Clone, Copy)]
pub struct ConnectionLimits {
    pub max_request_bytes: usize,
    pub request_timeout: Duration,
}

impl From<&ServerConfig> for ConnectionLimits {
    fn from(config: &ServerConfig) -> Self {
        Self {
            max_request_bytes: config.max_request_bytes,
            request_timeout: config.request_timeout(),
        }
    }
}

pub struct ParkingServer {
    listener: TcpListener,
    dispatcher: RequestDispatcher,
    limits: ConnectionLimits,
    shutdown_signal: ShutdownSignal,
    drain_timeout: Duration,
}

impl ParkingServer {
    /// Bind the listening socket. Port 0 picks a free port.
    pub async fn bind(
        addr: &str,
        dispatcher: RequestDispatcher,
        limits: ConnectionLimits,
    ) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            dispatcher,
            limits,
            shutdown_signal: ShutdownSignal::new(),
            drain_timeout: Duration::from_secs(30),
        })
    }

    /// Set the shutdown signal for graceful shutdown
    pub fn with_shutdown(mut self, signal: ShutdownSignal, drain_timeout: Duration) -> Self {
        self.shutdown_signal = signal;
        self.drain_timeout = drain_timeout;
        self
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until shutdown is triggered, then give in-flight
    /// connections `drain_timeout` to finish.
    pub async fn run(self) -> std::io::Result<()> {
        info!("🅿️  Parking reservation server listening on {}", self.local_addr()?);

        let mut connections = JoinSet::new();
        let shutdown = self.shutdown_signal.clone();

        loop {
            tokio::select! {
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, peer)) => {
                            let dispatcher = self.dispatcher.clone();
                            let limits = self.limits;
                            connections.spawn(handle_connection(stream, peer, dispatcher, limits));
                        }
                        Err(e) => {
                            error!("Failed to accept connection: {}", e);
                        }
                    }
                }
                Some(joined) = connections.join_next(), if !connections.is_empty() => {
                    if let Err(e) = joined {
                        error!("Connection task failed: {}", e);
                    }
                }
                _ = shutdown.wait() => {
                    info!("🛑 Parking server received shutdown signal");
                    break;
                }
            }
        }

        let Self {
            listener,
            drain_timeout,
            ..
        } = self;
        drop(listener);
        drain(connections, drain_timeout).await;
        Ok(())
    }
}

async fn drain(mut connections: JoinSet<()>, timeout: Duration) {
    let pending = connections.len();
    if pending > 0 {
        info!("⏳ Waiting for {} in-flight connection(s)...", pending);
        let drained = tokio::time::timeout(timeout, async {
            while connections.join_next().await.is_some() {}
        })
        .await;

        if drained.is_err() {
            warn!(
                remaining = connections.len(),
                "⚠️ Connections still open after {:?}, aborting them", timeout
            );
            connections.abort_all();
        }
    }
    info!("✅ Parking server shutdown complete");
}

async fn handle_connection(
    mut stream: TcpStream,
    peer: SocketAddr,
    dispatcher: RequestDispatcher,
    limits: ConnectionLimits,
) {
    debug!(%peer, "Connection accepted");

    let reply = match read_request(&mut stream, limits.max_request_bytes, limits.request_timeout)
        .await
    {
        Ok(request) => dispatcher.dispatch(&request).await,
        Err(e) if e.is_answerable() => {
            warn!(%peer, error = %e, "Rejecting unreadable request");
            metrics::counter!(
                "parking_requests_total",
                "action" => "unparsed",
                "outcome" => "invalid_request"
            )
            .increment(1);
            Reply::failure(&ReservationError::InvalidRequest(e.to_string()))
        }
        Err(FrameError::Empty) => {
            debug!(%peer, "Connection closed without a request");
            return;
        }
        Err(e) => {
            warn!(%peer, error = %e, "Failed to read request");
            return;
        }
    };

    if let Err(e) = write_reply(&mut stream, &reply).await {
        warn!(%peer, error = %e, "Failed to send reply");
    }
}
