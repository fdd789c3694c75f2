use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::HeaderMap,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::{Instrument, error, info, info_span, warn};

use crate::error::AppError;
use crate::metrics::{
    FORWARD_FAILURES_TOTAL, FORWARD_LATENCY, FORWARDED_TOTAL, SUBMISSIONS_TOTAL, THROTTLED_TOTAL,
};
use crate::models::{BookingRequest, SubmitResponse};
use crate::rate_limit::{UNKNOWN_IP, fingerprint};
use crate::state::AppState;

// Proxy headers consulted for the client address, first match wins
const CLIENT_IP_HEADERS: &[&str] = &["x-forwarded-for", "x-real-ip"];

// Client address from the proxy headers (first X-Forwarded-For hop).
// No usable header means the shared "unknown" key
pub fn client_ip(headers: &HeaderMap) -> String {
    CLIENT_IP_HEADERS
        .iter()
        .filter_map(|name| headers.get(*name))
        .filter_map(|value| value.to_str().ok())
        .filter_map(|value| value.split(',').next())
        .map(str::trim)
        .find(|ip| !ip.is_empty())
        .unwrap_or(UNKNOWN_IP)
        .to_string()
}

pub async fn submit_booking_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<SubmitResponse>, AppError> {
    SUBMISSIONS_TOTAL.inc();

    let ip = client_ip(&headers);
    let span = info_span!("submit_booking", client_ip = %ip);

    submit(&state, &ip, &body).instrument(span).await
}

async fn submit(state: &AppState, ip: &str, body: &[u8]) -> Result<Json<SubmitResponse>, AppError> {
    let request = BookingRequest::from_json(body).map_err(|e| {
        warn!("rejecting unparseable booking: {}", e);
        AppError::InvalidPayload(e)
    })?;

    let email = request.normalized_email();
    // log a short fingerprint, never the address
    let email_key = email.as_deref().map(fingerprint);
    let email_tag = email_key.as_deref().map(|k| &k[..12]);

    if let Err(throttle) = state.limiter.check(ip, email.as_deref()) {
        THROTTLED_TOTAL.with_label_values(&[throttle.rule()]).inc();
        warn!(rule = throttle.rule(), email = email_tag, "submission throttled");
        return Err(AppError::Throttled(throttle));
    }

    info!(email = email_tag, "submission passed rate limits");

    let payload = request.into_payload();
    let start_time = Instant::now();
    let outcome = state.forwarder.forward(&payload).await;
    FORWARD_LATENCY.observe(start_time.elapsed().as_secs_f64());

    match outcome {
        Ok(classification) => {
            FORWARDED_TOTAL.with_label_values(&[classification.label()]).inc();
            info!(outcome = classification.label(), "booking saved");
            Ok(Json(SubmitResponse { success: true }))
        }
        Err(e) => {
            FORWARD_FAILURES_TOTAL.inc();
            error!("error saving booking: {}", e);
            Err(AppError::Forward(e))
        }
    }
}
