//! Session-typed mediation proxy.
//!
//! The proxy sits between a message client and a message-oriented
//! server and enforces that their exchange follows the session-type
//! protocols the server declares, validating every payload against its
//! declared structural type before forwarding it.
//!
//! # Architecture
//!
//! ```text
//! Client                    STP Proxy                       Server
//!    |                          |                              |
//!    |                          |<==== protocol definitions ===|
//!    |                          |  (Session: Def ... / End)    |
//!    |                          |                              |
//!    |--- "Protocol: A" ------->|                              |
//!    |--- action (+ payload) -->|-- validate --> forward ----->|
//!    |<------ forward <-- validate --<------------- payload ---|
//!    |<-- status codes ---------|--------------- status codes->|
//!    |                          |                              |
//! ```
//!
//! Each accepted client connection owns exactly one upstream
//! connection and one [`Mediator`] instance; mediators are fully
//! independent and run concurrently as tasks. A fault tears down one
//! connection's two legs, never the listener.
//!
//! # Usage
//!
//! ```rust,ignore
//! use stp::proxy::{ProxyConfig, ProxyServer};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ProxyConfig {
//!         listen_addr: "127.0.0.1:7891".parse().unwrap(),
//!         upstream_addr: "127.0.0.1:7890".to_string(),
//!         ..Default::default()
//!     };
//!     ProxyServer::new(config).run().await.unwrap();
//! }
//! ```

mod mediator;
mod status;

pub use mediator::{Mediator, MessageHooks, PayloadHook};
pub use status::{Status, SUCCESS_TEXT};

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tracing::Instrument;

use crate::error::{Result, StpError};
use crate::transport::RECV_TIMEOUT_SECS;

/// Proxy server configuration.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Address to accept clients on.
    pub listen_addr: SocketAddr,
    /// Upstream server address (`host:port`).
    pub upstream_addr: String,
    /// Bound on every blocking receive.
    pub recv_timeout: Duration,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:7891".parse().expect("valid default addr"),
            upstream_addr: "127.0.0.1:7890".to_string(),
            recv_timeout: Duration::from_secs(RECV_TIMEOUT_SECS),
        }
    }
}

/// STP proxy server: accept loop plus one mediator task per client.
pub struct ProxyServer {
    config: ProxyConfig,
}

impl ProxyServer {
    /// Create a proxy server.
    pub fn new(config: ProxyConfig) -> Self {
        Self { config }
    }

    /// Accept clients forever, mediating each connection in its own
    /// task.
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(self.config.listen_addr)
            .await
            .map_err(|e| {
                StpError::Internal(format!(
                    "failed to bind {}: {e}",
                    self.config.listen_addr
                ))
            })?;
        tracing::info!("STP proxy listening on {}", self.config.listen_addr);
        tracing::info!("Upstream: {}", self.config.upstream_addr);

        loop {
            let (client_stream, peer_addr) = listener.accept().await?;
            let config = self.config.clone();
            let conn_id = uuid::Uuid::new_v4();
            let span = tracing::info_span!("connection", id = %conn_id, peer = %peer_addr);
            tokio::spawn(
                async move {
                    if let Err(e) = handle_connection(client_stream, &config).await {
                        tracing::warn!(error = %e, "connection closed with fault");
                    }
                }
                .instrument(span),
            );
        }
    }
}

/// Connect upstream and mediate one client connection to completion.
async fn handle_connection(client_stream: TcpStream, config: &ProxyConfig) -> Result<()> {
    let server_stream = TcpStream::connect(&config.upstream_addr)
        .await
        .map_err(|e| {
            StpError::Internal(format!(
                "failed to connect upstream {}: {e}",
                config.upstream_addr
            ))
        })?;
    Mediator::new(server_stream, client_stream, config.recv_timeout)
        .run()
        .await
}
