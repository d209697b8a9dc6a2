//! End-to-end paywall tests: request -> policy -> settlement -> recording.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use axum::http::StatusCode;
use paygate::server::{decode_receipt, FixedSettler, SETTLEMENT_RESPONSE_HEADER};
use paygate_core::config::{Limit, LimitsConfig, PolicyGroup, RateLimitConfig};
use paygate_core::types::{Direction, MicroUsd};
use paygate_policy::store::LedgerKey;

use super::test_utils::{body_json, gateway, parties, paying_gateway, PRICE_USD, RESOURCE_PATH};

// =========================================================================
// Happy path
// =========================================================================

#[tokio::test]
async fn test_open_policy_serves_resource() {
    let gw = paying_gateway(vec![]);

    let response = gw.request_anonymous().await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["resource"], RESOURCE_PATH);
    assert_eq!(body["paid"], true);
    assert_eq!(
        body["amount"],
        MicroUsd::from_usd(PRICE_USD).unwrap().micros()
    );
    assert_eq!(gw.settler.calls(), 1);
}

#[tokio::test]
async fn test_settlement_confirmation_header_decodes() {
    let gw = paying_gateway(vec![]);

    let response = gw.request_anonymous().await;
    let header = response
        .headers()
        .get(SETTLEMENT_RESPONSE_HEADER)
        .expect("confirmation header present")
        .to_str()
        .expect("header is ASCII");

    let receipt = decode_receipt(header).expect("header decodes");
    assert_eq!(receipt.payer.as_deref(), Some(parties::PAYER));
    assert_eq!(receipt.amount, MicroUsd::from_usd(PRICE_USD).unwrap());
}

#[tokio::test]
async fn test_settlement_recorded_into_ledger() {
    let group = PolicyGroup::new("revenue").with_incoming_limits(
        LimitsConfig::new().with_global(Limit::new().with_max_total_usd(100.0)),
    );
    let gw = paying_gateway(vec![group]);

    let response = gw.request_anonymous().await;
    assert_eq!(response.status(), StatusCode::OK);
    gw.settle_recording().await;

    let key = LedgerKey::new("revenue", "global", Direction::Incoming);
    let total = gw
        .evaluator
        .ledger()
        .current_total(&key, None)
        .expect("ledger read");
    assert_eq!(total, MicroUsd::from_usd(PRICE_USD).unwrap());
}

// =========================================================================
// Denials
// =========================================================================

#[tokio::test]
async fn test_denial_body_contract() {
    let group = PolicyGroup::new("screening")
        .with_blocked_senders(vec![parties::BLOCKED_DOMAIN.to_string()]);
    let gw = paying_gateway(vec![group]);

    let response = gw
        .request(&[("origin", "https://bad.example.com")])
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    // A denied request must never reach the facilitator.
    assert_eq!(gw.settler.calls(), 0);

    let body = body_json(response).await;
    let error = body.get("error").expect("error object");
    assert_eq!(error["code"], "policy_violation");
    assert_eq!(error["groupName"], "screening");
    assert!(error["message"]
        .as_str()
        .unwrap()
        .contains(parties::BLOCKED_DOMAIN));
}

#[tokio::test]
async fn test_block_list_wins_over_allow_list() {
    let group = PolicyGroup::new("screening")
        .with_allowed_senders(vec![parties::BLOCKED_DOMAIN.to_string()])
        .with_blocked_senders(vec![parties::BLOCKED_DOMAIN.to_string()]);
    let gw = paying_gateway(vec![group]);

    let response = gw
        .request(&[("origin", "https://bad.example.com")])
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_allow_list_rejects_unknown_sender() {
    let group = PolicyGroup::new("partners")
        .with_allowed_senders(vec![parties::TRUSTED_DOMAIN.to_string()]);
    let gw = paying_gateway(vec![group]);

    let allowed = gw
        .request(&[("origin", "https://agent.example.org")])
        .await;
    assert_eq!(allowed.status(), StatusCode::OK);

    let denied = gw
        .request(&[("origin", "https://stranger.example.net")])
        .await;
    assert_eq!(denied.status(), StatusCode::FORBIDDEN);

    // Anonymous senders cannot prove membership either.
    let anonymous = gw.request_anonymous().await;
    assert_eq!(anonymous.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_windowed_budget_exhausts_across_requests() {
    // Budget fits two one-cent payments, not three.
    let group = PolicyGroup::new("daily").with_incoming_limits(
        LimitsConfig::new().with_global(
            Limit::new()
                .with_max_total_usd(0.025)
                .with_window_ms(86_400_000),
        ),
    );
    let gw = paying_gateway(vec![group]);

    for _ in 0..2 {
        let response = gw.request_anonymous().await;
        assert_eq!(response.status(), StatusCode::OK);
        gw.settle_recording().await;
    }

    let response = gw.request_anonymous().await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = body_json(response).await;
    assert_eq!(body["error"]["groupName"], "daily");
    assert_eq!(gw.settler.calls(), 2);
}

#[tokio::test]
async fn test_budget_restored_after_window_expires() {
    let group = PolicyGroup::new("hourly").with_incoming_limits(
        LimitsConfig::new().with_global(
            Limit::new()
                .with_max_total_usd(PRICE_USD)
                .with_window_ms(3_600_000),
        ),
    );
    let gw = paying_gateway(vec![group]);

    assert_eq!(gw.request_anonymous().await.status(), StatusCode::OK);
    gw.settle_recording().await;
    assert_eq!(
        gw.request_anonymous().await.status(),
        StatusCode::FORBIDDEN
    );

    gw.clock.advance(3_600_001);
    assert_eq!(gw.request_anonymous().await.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_rate_limit_caps_attempts() {
    let group = PolicyGroup::new("burst").with_rate_limits(RateLimitConfig::new(2, 60_000));
    let gw = paying_gateway(vec![group]);

    assert_eq!(gw.request_anonymous().await.status(), StatusCode::OK);
    assert_eq!(gw.request_anonymous().await.status(), StatusCode::OK);

    let response = gw.request_anonymous().await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = body_json(response).await;
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("rate limit exceeded"));

    // The window rolls; a fresh slot opens once the first attempt ages out.
    gw.clock.advance(60_001);
    assert_eq!(gw.request_anonymous().await.status(), StatusCode::OK);
}

// =========================================================================
// Settlement failures
// =========================================================================

#[tokio::test]
async fn test_rejected_settlement_is_402() {
    let gw = gateway(vec![], FixedSettler::rejecting("insufficient funds"));

    let response = gw.request_anonymous().await;
    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);

    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "settlement_rejected");
    assert_eq!(gw.settler.calls(), 1);
}

#[tokio::test]
async fn test_unreachable_facilitator_is_502() {
    let gw = gateway(vec![], FixedSettler::unreachable());

    let response = gw.request_anonymous().await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "internal_error");
}

#[tokio::test]
async fn test_failed_settlement_leaves_ledger_untouched() {
    let group = PolicyGroup::new("revenue").with_incoming_limits(
        LimitsConfig::new().with_global(Limit::new().with_max_total_usd(100.0)),
    );
    let gw = gateway(vec![group], FixedSettler::rejecting("declined"));

    gw.request_anonymous().await;
    gw.settle_recording().await;

    let key = LedgerKey::new("revenue", "global", Direction::Incoming);
    let total = gw
        .evaluator
        .ledger()
        .current_total(&key, None)
        .expect("ledger read");
    assert!(total.is_zero());
}

#[tokio::test]
async fn test_anonymous_settlement_has_no_payer() {
    let gw = gateway(vec![], FixedSettler::accepting_anonymous());

    let response = gw.request_anonymous().await;
    assert_eq!(response.status(), StatusCode::OK);

    let header = response
        .headers()
        .get(SETTLEMENT_RESPONSE_HEADER)
        .unwrap()
        .to_str()
        .unwrap();
    let receipt = decode_receipt(header).expect("header decodes");
    assert!(receipt.payer.is_none());
}
