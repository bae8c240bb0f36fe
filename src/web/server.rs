//! HTTP server for arbor.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::bucket::LocalBucket;
use crate::config::ServerConfig;
use crate::{ArborError, Result};

use super::handlers::AppState;
use super::router::{create_health_router, create_router};

/// HTTP server: the signed `/file` endpoint when the Local bucket is in use,
/// otherwise only `/health`.
pub struct WebServer {
    addr: SocketAddr,
    router: Router,
}

impl WebServer {
    /// Create a new web server.
    pub fn new(config: &ServerConfig, local_bucket: Option<Arc<LocalBucket>>) -> Result<Self> {
        let addr = format!("{}:{}", config.host, config.port)
            .parse()
            .map_err(|e| ArborError::Config(format!("invalid server address: {e}")))?;

        let router = match local_bucket {
            Some(bucket) => create_router(Arc::new(AppState::new(bucket))),
            None => create_health_router().layer(TraceLayer::new_for_http()),
        };

        Ok(Self { addr, router })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Serve until the process is stopped.
    pub async fn run(self) -> Result<()> {
        let listener = TcpListener::bind(self.addr).await?;
        info!("HTTP server listening on {}", self.addr);
        axum::serve(listener, self.router).await?;
        Ok(())
    }
}
