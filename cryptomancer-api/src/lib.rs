//! # ProCryptomancer API Server
//!
//! REST API in front of the cached market data service.
//!
//! ## Endpoints
//!
//! - `GET /` - Liveness probe
//! - `GET /api/health` - Health and cache statistics
//! - `GET /api/prices?currency=usd&limit=20&page=1` - Cached market listings
//! - `GET /api/cache/stats` - Cache statistics
//! - `GET /api/contest` - Contest descriptor
//! - `POST /api/contest/submit` - Submit a contest entry
//! - `GET /api/contest/submissions?limit=50&page=1` - Newest entries first
//!
//! ## Example
//!
//! ```rust,ignore
//! use cryptomancer_api::{ApiServer, ApiConfig};
//!
//! let config = ApiConfig::from_env();
//! let server = ApiServer::new(config)?;
//! server.run(([0, 0, 0, 0], 10000)).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod dto;
mod error;
mod handlers;
mod routes;
mod state;

pub use error::ApiError;
pub use routes::create_router;
pub use state::{ApiConfig, AppState};

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use cryptomancer_core::error::Result;

/// API server for ProCryptomancer.
pub struct ApiServer {
    state: Arc<AppState>,
}

impl ApiServer {
    /// Creates a new API server with the given configuration.
    pub fn new(config: ApiConfig) -> Result<Self> {
        Ok(Self::with_state(AppState::new(config)?))
    }

    /// Creates a server around prepared state.
    pub fn with_state(state: AppState) -> Self {
        Self {
            state: Arc::new(state),
        }
    }

    /// Creates the router with all routes configured.
    pub fn router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        create_router(self.state.clone())
            .layer(cors)
            .layer(TraceLayer::new_for_http())
    }

    /// Runs the server on the given address.
    pub async fn run(self, addr: impl Into<SocketAddr>) -> std::io::Result<()> {
        let addr = addr.into();
        let listener = tokio::net::TcpListener::bind(addr).await?;

        info!(
            %addr,
            source = self.state.prices.source_name(),
            ttl_seconds = self.state.config.cache.ttl_seconds,
            "ProCryptomancer API server listening"
        );

        axum::serve(listener, self.router()).await
    }
}
