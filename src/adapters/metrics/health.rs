//! Health Check Server - Liveness, Readiness and Metrics
//!
//! Exposes /live, /ready and /metrics via axum 0.7. Readiness requires
//! at least one live chain connection.

use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::get;
use tokio::sync::broadcast;
use tracing::{error, info, instrument};

use super::prometheus::OracleMetrics;
use crate::adapters::chain::ConnectionRegistry;

/// State shared with the probe handlers.
#[derive(Clone)]
pub struct HealthState {
    pub registry: Arc<ConnectionRegistry>,
    pub metrics: Arc<OracleMetrics>,
}

impl HealthState {
    pub fn new(registry: Arc<ConnectionRegistry>, metrics: Arc<OracleMetrics>) -> Self {
        Self { registry, metrics }
    }

    /// Ready once any chain is connected.
    pub fn is_ready(&self) -> bool {
        !self.registry.connected_chains().is_empty()
    }
}

/// Axum-based health and metrics HTTP server.
pub struct HealthServer {
    state: HealthState,
    bind_address: String,
}

impl HealthServer {
    pub fn new(state: HealthState, bind_address: impl Into<String>) -> Self {
        Self {
            state,
            bind_address: bind_address.into(),
        }
    }

    /// Serve until `shutdown_rx` fires.
    #[instrument(skip(self, shutdown_rx), fields(address = %self.bind_address))]
    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) -> anyhow::Result<()> {
        let app = Router::new()
            .route("/live", get(Self::liveness))
            .route("/ready", get(Self::readiness))
            .route("/metrics", get(Self::metrics))
            .with_state(self.state);

        let listener = tokio::net::TcpListener::bind(&self.bind_address).await?;
        info!(address = %self.bind_address, "Health server started");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
            })
            .await?;

        Ok(())
    }

    /// Liveness probe: always 200 while the process runs.
    async fn liveness() -> impl IntoResponse {
        (StatusCode::OK, "OK")
    }

    async fn readiness(State(state): State<HealthState>) -> impl IntoResponse {
        if state.is_ready() {
            (StatusCode::OK, "READY")
        } else {
            (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
        }
    }

    async fn metrics(State(state): State<HealthState>) -> impl IntoResponse {
        match state.metrics.render() {
            Ok(body) => (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
                body,
            ),
            Err(e) => {
                error!(error = %e, "Failed to encode metrics");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    [(header::CONTENT_TYPE, "text/plain")],
                    String::new(),
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::adapters::chain::provider::build_provider;
    use crate::usecases::journal::Journal;

    fn state() -> HealthState {
        let metrics = Arc::new(OracleMetrics::new().unwrap());
        let registry = Arc::new(ConnectionRegistry::new(
            Arc::new(Journal::new(10)),
            Arc::clone(&metrics),
            Duration::from_millis(100),
        ));
        HealthState::new(registry, metrics)
    }

    #[tokio::test]
    async fn test_readiness_follows_connected_chains() {
        let state = state();
        let resp = HealthServer::readiness(State(state.clone())).await.into_response();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);

        let provider = build_provider("http://127.0.0.1:8545").await.unwrap();
        state
            .registry
            .register("ethereum", "http://127.0.0.1:8545", Some(1), Some(provider), true);
        let resp = HealthServer::readiness(State(state)).await.into_response();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_metrics_endpoint_ok() {
        let resp = HealthServer::metrics(State(state())).await.into_response();
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
