//! HTTP server implementation.

use std::future::Future;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{error, info};

use super::service::{router, ServiceState};
use crate::error::{Result, ThrottleError};

/// HTTP server for the throttle service.
pub struct ThrottleServer {
    /// Address to bind to
    addr: SocketAddr,
    /// Throttle profiles and shared store
    state: ServiceState,
}

impl ThrottleServer {
    /// Create a new server.
    pub fn new(addr: SocketAddr, state: ServiceState) -> Self {
        Self { addr, state }
    }

    /// Bind the configured address and serve until `signal` resolves.
    pub async fn serve_with_shutdown<F>(self, signal: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.addr).await.map_err(|e| {
            error!(addr = %self.addr, error = %e, "Failed to bind HTTP listener");
            ThrottleError::Server(format!("failed to bind {}: {}", self.addr, e))
        })?;

        Self::serve_on(listener, self.state, signal).await
    }

    /// Serve on an already bound listener until `signal` resolves.
    pub async fn serve_on<F>(listener: TcpListener, state: ServiceState, signal: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;

        info!(addr = %addr, "Starting HTTP server for the throttle service");

        axum::serve(listener, router(state))
            .with_graceful_shutdown(signal)
            .await
            .map_err(|e| {
                error!(error = %e, "HTTP server failed");
                ThrottleError::Io(e)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ThrottlingConfig;
    use crate::throttle::{SystemClock, ThrottleStore};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_server_stops_on_signal() {
        let state = ServiceState::from_config(
            &ThrottlingConfig::default(),
            Arc::new(ThrottleStore::new()),
            Arc::new(SystemClock),
        );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();

        let result = ThrottleServer::serve_on(listener, state, async {}).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_bind_failure_is_reported() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = taken.local_addr().unwrap();

        let state = ServiceState::from_config(
            &ThrottlingConfig::default(),
            Arc::new(ThrottleStore::new()),
            Arc::new(SystemClock),
        );
        let result = ThrottleServer::new(addr, state)
            .serve_with_shutdown(async {})
            .await;

        assert!(matches!(result, Err(ThrottleError::Server(_))));
    }
}
