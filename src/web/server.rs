//! HTTP server for warden.

use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;

use crate::cache;
use crate::config::Config;
use crate::{Result, WardenError};

use super::router::create_router;
use super::state::AppState;

/// How often idle rate limiter keys are dropped.
const RATE_LIMIT_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

/// How often expired revocation entries are dropped.
const CACHE_PURGE_INTERVAL: Duration = Duration::from_secs(60);

/// HTTP server.
pub struct WebServer {
    addr: SocketAddr,
    state: AppState,
    cors_origins: Vec<String>,
}

impl WebServer {
    /// Create a server bound to the configured address.
    pub fn new(config: &Config, state: AppState) -> Result<Self> {
        let addr = format!("{}:{}", config.server.host, config.server.port)
            .parse()
            .map_err(|e| WardenError::Config(format!("invalid server address: {e}")))?;

        Ok(Self {
            addr,
            state,
            cors_origins: config.server.cors_origins.clone(),
        })
    }

    /// Get the configured address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    async fn bind(self) -> Result<(TcpListener, Router)> {
        self.state
            .governor
            .clone()
            .start_cleanup_task(RATE_LIMIT_CLEANUP_INTERVAL);
        cache::start_purge_task(self.state.cache.clone(), CACHE_PURGE_INTERVAL);

        let router = create_router(self.state, &self.cors_origins);
        let listener = TcpListener::bind(self.addr).await?;
        tracing::info!("Listening on http://{}", listener.local_addr()?);
        Ok((listener, router))
    }

    /// Run the server until it fails.
    pub async fn run(self) -> Result<()> {
        let (listener, router) = self.bind().await?;
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await?;
        Ok(())
    }

    /// Run the server in the background and return the bound address.
    ///
    /// Bind to port 0 to get a free port.
    pub async fn run_with_addr(self) -> Result<SocketAddr> {
        let (listener, router) = self.bind().await?;
        let local_addr = listener.local_addr()?;

        tokio::spawn(async move {
            if let Err(e) = axum::serve(
                listener,
                router.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            {
                tracing::error!("Server error: {}", e);
            }
        });

        Ok(local_addr)
    }
}
