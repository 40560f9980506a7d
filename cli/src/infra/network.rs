//! Network infrastructure: implements `NetworkProbe` with tokio sockets.

use std::time::Duration;

use anyhow::Result;
use tokio::net::TcpStream;

use crate::application::ports::NetworkProbe;

/// Production probe: a TCP connect with a per-attempt timeout.
pub struct TokioNetworkProbe {
    connect_timeout: Duration,
}

impl TokioNetworkProbe {
    #[must_use]
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl NetworkProbe for TokioNetworkProbe {
    async fn check_tcp_connectivity(&self, host: &str, port: u16) -> Result<bool> {
        match tokio::time::timeout(self.connect_timeout, TcpStream::connect((host, port))).await {
            Ok(Ok(_)) => Ok(true),
            Ok(Err(e)) => {
                tracing::trace!(host, port, error = %e, "connect failed");
                Ok(false)
            }
            Err(_) => Ok(false),
        }
    }
}
