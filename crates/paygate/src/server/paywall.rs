//! The paywall interceptor: admission before settlement, recording after.
//!
//! One protected resource path sits behind this handler. Every request is
//! evaluated against the configured policy groups *before* any money moves;
//! a denial costs nothing and returns the policy violation contract body.
//! Admitted requests are settled through the [`Settler`] collaborator, the
//! confirmation is attached as a response header, and the realized amount is
//! recorded into the spending ledger from a spawned task so recording never
//! delays the response.
//!
//! Failure postures differ on purpose: admission fails closed (a broken
//! spend store denies the request), recording fails open (a broken store
//! logs a warning and the response already went out).

use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Json;
use paygate_core::error::ErrorCode;
use paygate_core::types::{MicroUsd, TransferRequest, Verdict};
use paygate_policy::engine::PolicyEvaluator;
use paygate_policy::scope::resolve_domain;
use serde_json::json;
use tracing::{error, info, warn};

use crate::audit::{AuditEvent, AuditLogger, AuditOutcome};
use crate::server::settlement::{
    encode_receipt, SettlementResult, Settler, SETTLEMENT_RESPONSE_HEADER,
};

/// Shared state behind the paywall routes.
#[derive(Clone)]
pub struct PaywallState {
    /// Declared price of the protected resource, in base units.
    pub price: MicroUsd,

    /// Path of the protected resource.
    pub resource_path: String,

    /// The policy evaluator admission and recording go through.
    pub evaluator: Arc<PolicyEvaluator>,

    /// Settlement collaborator.
    pub settler: Arc<dyn Settler>,

    /// Optional tamper-evident audit log.
    pub audit: Option<Arc<AuditLogger>>,
}

impl PaywallState {
    fn audit_event(&self, event: AuditEvent) {
        if let Some(logger) = &self.audit {
            if let Err(e) = logger.log_event(event) {
                warn!(error = %e, "failed to write audit entry");
            }
        }
    }

    /// Feeds a settled payment back into the ledger and audit log.
    ///
    /// Runs post-response; every failure here is logged and swallowed.
    fn record_settlement(
        &self,
        settled: &SettlementResult,
        domain: Option<String>,
        request_url: Option<String>,
    ) {
        let mut request = TransferRequest::incoming(settled.amount);
        if let Some(payer) = &settled.payer {
            request = request.with_counterparty(payer.clone());
        }
        if let Some(domain) = &domain {
            request = request.with_domain(domain.clone());
        }
        if let Some(url) = &request_url {
            request = request.with_request_url(url.clone());
        }

        self.evaluator.record_settlement(&request);
        self.audit_event(AuditEvent {
            direction: request.direction,
            counterparty: settled.payer.clone(),
            domain,
            request_url,
            amount: settled.amount,
            outcome: AuditOutcome::Settled,
        });
    }
}

impl std::fmt::Debug for PaywallState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaywallState")
            .field("price", &self.price)
            .field("resource_path", &self.resource_path)
            .field("audit_enabled", &self.audit.is_some())
            .finish_non_exhaustive()
    }
}

/// Handler for the protected resource.
///
/// Admission runs with whatever identifies the caller before settlement:
/// the sender domain from `Origin`/`Referer` and the full resource URL
/// reconstructed from the `Host` header. The payer address only becomes
/// known after settlement and feeds recording, not admission.
pub async fn paywall_handler(
    State(state): State<PaywallState>,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let domain = resolve_domain(
        header_str(&headers, header::ORIGIN),
        header_str(&headers, header::REFERER),
    );
    let request_url = full_request_url(&headers, uri.path());

    let mut request = TransferRequest::incoming(state.price);
    if let Some(domain) = &domain {
        request = request.with_domain(domain.clone());
    }
    if let Some(url) = &request_url {
        request = request.with_request_url(url.clone());
    }

    // Admission fails closed: a store error means no money moves.
    let verdict = match state.evaluator.evaluate(&request) {
        Ok(verdict) => verdict,
        Err(e) => {
            error!(error = %e, "policy evaluation failed; denying admission");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorCode::InternalError,
                "policy evaluation failed",
            );
        }
    };

    if let Verdict::Denied { group, reason } = verdict {
        info!(group = %group, reason = %reason, "admission denied");
        state.audit_event(AuditEvent {
            direction: request.direction,
            counterparty: None,
            domain: domain.clone(),
            request_url: request_url.clone(),
            amount: state.price,
            outcome: AuditOutcome::Denied {
                rule: group.clone(),
                reason: reason.clone(),
            },
        });
        return denial_response(&group, &reason);
    }

    let settled = match state.settler.settle(state.price).await {
        Ok(settled) => settled,
        Err(e @ paygate_core::error::SettleError::Rejected { .. }) => {
            info!(error = %e, "settlement rejected");
            return error_response(
                StatusCode::PAYMENT_REQUIRED,
                ErrorCode::SettlementRejected,
                &e.to_string(),
            );
        }
        Err(e) => {
            error!(error = %e, "settlement facilitator unavailable");
            return error_response(
                StatusCode::BAD_GATEWAY,
                ErrorCode::InternalError,
                &e.to_string(),
            );
        }
    };

    let mut response = resource_response(&state.resource_path, &settled);
    if let Ok(value) = HeaderValue::from_str(&encode_receipt(&settled)) {
        response.headers_mut().insert(
            HeaderName::from_static(SETTLEMENT_RESPONSE_HEADER),
            value,
        );
    }

    // Recording is fire-and-forget; the response must not wait on it.
    let record_state = state.clone();
    tokio::spawn(async move {
        record_state.record_settlement(&settled, domain, request_url);
    });

    response
}

/// Liveness probe handler.
pub async fn health_handler() -> Response {
    Json(json!({ "status": "ok" })).into_response()
}

/// The response body served once payment has settled.
fn resource_response(resource_path: &str, settled: &SettlementResult) -> Response {
    Json(json!({
        "resource": resource_path,
        "paid": true,
        "amount": settled.amount,
    }))
    .into_response()
}

/// The 403 policy-violation contract body.
fn denial_response(group: &str, reason: &str) -> Response {
    (
        StatusCode::FORBIDDEN,
        Json(json!({
            "error": {
                "code": ErrorCode::PolicyViolation.as_str(),
                "message": reason,
                "groupName": group,
            }
        })),
    )
        .into_response()
}

fn error_response(status: StatusCode, code: ErrorCode, message: &str) -> Response {
    (
        status,
        Json(json!({
            "error": {
                "code": code.as_str(),
                "message": message,
            }
        })),
    )
        .into_response()
}

fn header_str(headers: &HeaderMap, name: HeaderName) -> Option<&str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// Reconstructs the full resource URL from the `Host` header and path.
///
/// Absent or unreadable `Host` degrades to `None`; per-endpoint limits then
/// simply don't match, they never fail the request.
fn full_request_url(headers: &HeaderMap, path: &str) -> Option<String> {
    let host = headers.get(header::HOST)?.to_str().ok()?;
    Some(format!("http://{host}{path}"))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used, clippy::unwrap_used)]

    use super::*;

    fn headers_with(entries: &[(&str, &str)]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (name, value) in entries {
            headers.insert(
                HeaderName::from_bytes(name.as_bytes()).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }
        headers
    }

    #[test]
    fn test_full_request_url_from_host() {
        let headers = headers_with(&[("host", "gateway.local:8402")]);
        assert_eq!(
            full_request_url(&headers, "/paid/resource").as_deref(),
            Some("http://gateway.local:8402/paid/resource")
        );
    }

    #[test]
    fn test_full_request_url_without_host() {
        assert!(full_request_url(&HeaderMap::new(), "/paid/resource").is_none());
    }

    #[test]
    fn test_header_str_skips_non_utf8() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::ORIGIN,
            HeaderValue::from_bytes(&[0xff, 0xfe]).unwrap(),
        );
        assert!(header_str(&headers, header::ORIGIN).is_none());
    }

    #[test]
    fn test_denial_response_status() {
        let response = denial_response("daily", "over budget");
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
