//! HTTP server hosting the paywall.
//!
//! - [`paywall`] - admission/recording interceptor for the protected resource
//! - [`settlement`] - the settlement collaborator boundary
//!
//! The router exposes exactly two routes: the configured protected resource
//! path and a `/health` liveness probe.

pub mod paywall;
pub mod settlement;

use axum::routing::{any, get};
use axum::Router;
use tracing::info;

pub use paywall::{health_handler, paywall_handler, PaywallState};
pub use settlement::{
    decode_receipt, encode_receipt, FixedSettler, HttpSettler, SettlementResult, Settler,
    SETTLEMENT_RESPONSE_HEADER,
};

/// Errors from binding or running the HTTP server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The listen address could not be bound.
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        /// Address that failed to bind.
        addr: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The server loop failed.
    #[error("Server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// Builds the paywall router over `state`.
#[must_use]
pub fn router(state: PaywallState) -> Router {
    let resource_path = state.resource_path.clone();
    Router::new()
        .route("/health", get(health_handler))
        .route(&resource_path, any(paywall_handler))
        .with_state(state)
}

/// Binds `listen_addr` and serves the paywall until SIGINT or SIGTERM.
///
/// # Errors
///
/// Returns [`ServerError`] if the address cannot be bound or the accept
/// loop fails.
pub async fn run(listen_addr: &str, state: PaywallState) -> Result<(), ServerError> {
    let listener = tokio::net::TcpListener::bind(listen_addr)
        .await
        .map_err(|source| ServerError::Bind {
            addr: listen_addr.to_string(),
            source,
        })?;
    let addr = listener.local_addr()?;
    info!(%addr, resource = %state.resource_path, "paywall listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server stopped");
    Ok(())
}

/// Resolves when the process receives SIGINT (ctrl-c) or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install ctrl-c handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => tracing::error!(error = %e, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received ctrl-c, shutting down"),
        () = terminate => info!("received SIGTERM, shutting down"),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used, clippy::unwrap_used)]

    use super::*;
    use axum::http::{Request, StatusCode};
    use paygate_core::types::MicroUsd;
    use paygate_policy::clock::SystemClock;
    use paygate_policy::engine::PolicyEvaluator;
    use paygate_policy::ledger::SpendingLedger;
    use paygate_policy::ratelimit::RateLimiter;
    use paygate_policy::store::MemoryStore;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn test_state() -> PaywallState {
        let clock = Arc::new(SystemClock);
        let ledger = SpendingLedger::new(Arc::new(MemoryStore::new()), clock.clone());
        let rate_limiter = RateLimiter::new(clock);
        PaywallState {
            price: MicroUsd::from_usd(0.01).unwrap(),
            resource_path: "/paid/resource".to_string(),
            evaluator: Arc::new(PolicyEvaluator::new(vec![], ledger, rate_limiter)),
            settler: Arc::new(FixedSettler::accepting("0xpayer")),
            audit: None,
        }
    }

    #[tokio::test]
    async fn test_health_route() {
        let app = router(test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(axum::body::Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let app = router(test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/other")
                    .body(axum::body::Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_server_error_display() {
        let err = ServerError::Bind {
            addr: "127.0.0.1:8402".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::AddrInUse, "in use"),
        };
        assert!(err.to_string().contains("127.0.0.1:8402"));
    }
}
