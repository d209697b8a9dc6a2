//! Test utilities for paygate integration tests.
//!
//! This module provides helpers for assembling in-process paywall routers
//! with scripted settlers and a controllable clock, and for driving them
//! through tower without binding a socket.

#![allow(clippy::expect_used, clippy::unwrap_used, dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use paygate::server::{router, FixedSettler, PaywallState, Settler};
use paygate_core::config::PolicyGroup;
use paygate_core::types::MicroUsd;
use paygate_policy::clock::ManualClock;
use paygate_policy::engine::PolicyEvaluator;
use paygate_policy::ledger::SpendingLedger;
use paygate_policy::ratelimit::RateLimiter;
use paygate_policy::store::MemoryStore;
use tower::ServiceExt;

/// Resource path every test router protects.
pub const RESOURCE_PATH: &str = "/paid/resource";

/// Price of the protected resource: one cent.
pub const PRICE_USD: f64 = 0.01;

/// Well-known test identities.
pub mod parties {
    /// The payer address scripted settlers attribute payments to.
    pub const PAYER: &str = "0xa11ce00000000000000000000000000000000001";

    /// A sender domain on test allow lists.
    pub const TRUSTED_DOMAIN: &str = "agent.example.org";

    /// A sender domain on test block lists.
    pub const BLOCKED_DOMAIN: &str = "bad.example.com";
}

/// A paywall router plus handles into its collaborators.
pub struct TestGateway {
    /// The router under test.
    pub app: Router,
    /// Shared evaluator, for inspecting ledger state after requests.
    pub evaluator: Arc<PolicyEvaluator>,
    /// The scripted settler, for asserting on call counts.
    pub settler: Arc<FixedSettler>,
    /// The clock driving windows.
    pub clock: Arc<ManualClock>,
}

/// Builds an in-process gateway over `groups` with the given settler.
pub fn gateway(groups: Vec<PolicyGroup>, settler: FixedSettler) -> TestGateway {
    let clock = Arc::new(ManualClock::new(1_000_000));
    let ledger = SpendingLedger::new(Arc::new(MemoryStore::new()), clock.clone());
    let rate_limiter = RateLimiter::new(clock.clone());
    let evaluator = Arc::new(PolicyEvaluator::new(groups, ledger, rate_limiter));
    let settler = Arc::new(settler);

    let state = PaywallState {
        price: MicroUsd::from_usd(PRICE_USD).unwrap(),
        resource_path: RESOURCE_PATH.to_string(),
        evaluator: evaluator.clone(),
        settler: settler.clone() as Arc<dyn Settler>,
        audit: None,
    };

    TestGateway {
        app: router(state),
        evaluator,
        settler,
        clock,
    }
}

/// Builds a gateway whose settler accepts everything from [`parties::PAYER`].
pub fn paying_gateway(groups: Vec<PolicyGroup>) -> TestGateway {
    gateway(groups, FixedSettler::accepting(parties::PAYER))
}

impl TestGateway {
    /// Sends a GET for the protected resource with the given headers.
    pub async fn request(&self, headers: &[(&str, &str)]) -> Response<Body> {
        let mut builder = Request::builder().uri(RESOURCE_PATH);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        self.app
            .clone()
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .expect("infallible router")
    }

    /// Sends a bare GET for the protected resource.
    pub async fn request_anonymous(&self) -> Response<Body> {
        self.request(&[]).await
    }

    /// Lets spawned recording tasks run before the next assertion.
    pub async fn settle_recording(&self) {
        for _ in 0..16 {
            tokio::task::yield_now().await;
        }
    }
}

/// Reads a response body as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body collects")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("body is JSON")
}
