//! TCP status server
//!
//! Binds the configured address and serves the status router until its
//! cancellation token fires.

use crate::api::{ApiState, create_router};
use anyhow::{Context, Result};
use axum::Router;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;
use warden_core::{StateCell, StatusApiConfig};

/// HTTP status server bound to its listener
pub struct StatusServer {
    listener: TcpListener,
    router: Router,
    local_addr: SocketAddr,
}

impl StatusServer {
    /// Bind the configured address; port 0 picks an ephemeral port
    pub async fn bind(config: &StatusApiConfig, state: StateCell) -> Result<Self> {
        let router = create_router(ApiState {
            state,
            message: config.message.clone(),
        });

        let addr = config.bind_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("failed to bind status server to {addr}"))?;
        let local_addr = listener
            .local_addr()
            .context("failed to read bound address")?;
        info!(%local_addr, "status server listening");

        Ok(Self {
            listener,
            router,
            local_addr,
        })
    }

    /// Address the server actually bound, with the resolved port
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serve until the token is cancelled
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown.cancelled_owned())
            .await
            .context("status server failed")?;

        info!("status server stopped");
        Ok(())
    }
}
