use std::collections::HashMap;
use std::time::Duration;

use reqwest::{StatusCode, header::HeaderMap};
use serde_json::Value;
use thiserror::Error;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::models::SheetsPayload;

// Cap on how much of a webhook body ends up in errors returned to callers
const MAX_DETAIL_BODY: usize = 1024;

// Body fragments that mark a 200 page as an error report
const HARD_FAILURE_MARKERS: &[&str] = &[
    "<title>Error</title>",
    "Script function not found",
    "Exception:",
];

const REDIRECT_MARKERS: &[&str] = &["Moved Temporarily", "redirect"];

#[derive(Debug, Clone)]
pub struct ForwarderConfig {
    pub url: String,
    pub timeout: Duration,
    pub user_agent: String,
    pub max_redirects: usize, // 0 = hand redirects back to us
}

// Verdict on a webhook response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Success, // JSON body without success: false
    AmbiguousSuccess(AmbiguousReason), // no usable body, no sign of an error either
    Failure(FailureReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmbiguousReason {
    Redirect,     // 301 / 302
    RedirectPage, // 200 HTML saying "moved"
    OpaqueBody,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    ReportedFailure, // JSON with success: false
    ErrorPage,
    UnexpectedStatus,
}

impl Classification {
    // Metric label for accepted outcomes
    pub fn label(&self) -> &'static str {
        match self {
            Classification::Success => "success",
            Classification::AmbiguousSuccess(_) => "ambiguous_success",
            Classification::Failure(_) => "failure",
        }
    }
}

#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("failed to build webhook client: {0}")]
    Client(String),

    #[error("webhook request failed: {0}")]
    Network(String),

    #[error("webhook request timed out after {0:?}")]
    Timeout(Duration),

    #[error("failed to read webhook response: {0}")]
    Body(String),

    #[error("webhook responded with status {status}: {body}")]
    Rejected {
        status: u16,
        reason: FailureReason,
        body: String,
    },
}

pub fn classify(status: StatusCode, body: &str) -> Classification {
    if status == StatusCode::MOVED_PERMANENTLY || status == StatusCode::FOUND {
        return Classification::AmbiguousSuccess(AmbiguousReason::Redirect);
    }

    let code = status.as_u16();
    if !(200..400).contains(&code) {
        return Classification::Failure(FailureReason::UnexpectedStatus);
    }

    if let Ok(json) = serde_json::from_str::<Value>(body) {
        return match json.get("success") {
            Some(Value::Bool(false)) => Classification::Failure(FailureReason::ReportedFailure),
            _ => Classification::Success,
        };
    }

    // non-JSON bodies are only trusted on 2xx
    if !status.is_success() {
        return Classification::Failure(FailureReason::UnexpectedStatus);
    }

    if REDIRECT_MARKERS.iter().any(|m| body.contains(m)) {
        return Classification::AmbiguousSuccess(AmbiguousReason::RedirectPage);
    }
    if HARD_FAILURE_MARKERS.iter().any(|m| body.contains(m)) {
        return Classification::Failure(FailureReason::ErrorPage);
    }

    Classification::AmbiguousSuccess(AmbiguousReason::OpaqueBody)
}

// One shared client pointed at the webhook, no retries
#[derive(Debug, Clone)]
pub struct SheetsForwarder {
    client: reqwest::Client,
    config: ForwarderConfig,
}

impl SheetsForwarder {
    pub fn new(config: ForwarderConfig) -> Result<Self, ForwardError> {
        let redirect = if config.max_redirects == 0 {
            reqwest::redirect::Policy::none()
        } else {
            reqwest::redirect::Policy::limited(config.max_redirects)
        };

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .redirect(redirect)
            .build()
            .map_err(|e| ForwardError::Client(e.to_string()))?;

        Ok(Self { client, config })
    }

    pub async fn forward(&self, payload: &SheetsPayload) -> Result<Classification, ForwardError> {
        let span = info_span!("forward_booking", url = %self.config.url);

        async move {
            debug!(?payload, "sending booking to webhook");

            let response = self
                .client
                .post(&self.config.url)
                .header(reqwest::header::ACCEPT, "application/json")
                .json(payload)
                .send()
                .await
                .map_err(|e| {
                    warn!("webhook request failed: {}", e);
                    if e.is_timeout() {
                        ForwardError::Timeout(self.config.timeout)
                    } else {
                        ForwardError::Network(e.to_string())
                    }
                })?;

            let status = response.status();
            info!(status = status.as_u16(), "webhook responded");
            debug!(headers = ?extract_headers(response.headers()), "webhook response headers");

            let body = response.text().await.map_err(|e| {
                if e.is_timeout() {
                    ForwardError::Timeout(self.config.timeout)
                } else {
                    ForwardError::Body(e.to_string())
                }
            })?;
            debug!(%body, "webhook response body");

            match classify(status, &body) {
                Classification::Failure(reason) => {
                    warn!(status = status.as_u16(), ?reason, "webhook did not accept booking");
                    Err(ForwardError::Rejected {
                        status: status.as_u16(),
                        reason,
                        body: truncate(&body, MAX_DETAIL_BODY),
                    })
                }
                accepted => {
                    if let Classification::AmbiguousSuccess(reason) = accepted {
                        info!(?reason, "treating webhook response as success");
                    }
                    Ok(accepted)
                }
            }
        }
        .instrument(span)
        .await
    }
}

fn extract_headers(header_map: &HeaderMap) -> HashMap<String, String> {
    header_map
        .iter()
        .filter_map(|(key, value)| {
            value
                .to_str()
                .ok()
                .map(|value| (key.to_string(), value.to_string()))
        })
        .collect()
}

// Cut at a char boundary
fn truncate(body: &str, max: usize) -> String {
    if body.len() <= max {
        return body.to_string();
    }
    let mut end = max;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... (truncated)", &body[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redirects_are_accepted_without_a_body() {
        assert_eq!(
            classify(StatusCode::FOUND, ""),
            Classification::AmbiguousSuccess(AmbiguousReason::Redirect)
        );
        assert_eq!(
            classify(StatusCode::MOVED_PERMANENTLY, "<html>whatever</html>"),
            Classification::AmbiguousSuccess(AmbiguousReason::Redirect)
        );
    }

    #[test]
    fn json_bodies_decide_by_success_flag() {
        assert_eq!(classify(StatusCode::OK, r#"{"success":true}"#), Classification::Success);
        assert_eq!(classify(StatusCode::OK, r#"{"row":17}"#), Classification::Success);
        assert_eq!(classify(StatusCode::OK, "null"), Classification::Success);
        assert_eq!(
            classify(StatusCode::OK, r#"{"success":false,"error":"sheet locked"}"#),
            Classification::Failure(FailureReason::ReportedFailure)
        );
        // 3xx with JSON is judged like 2xx
        assert_eq!(
            classify(StatusCode::SEE_OTHER, r#"{"result":"ok"}"#),
            Classification::Success
        );
    }

    #[test]
    fn non_json_2xx_is_ambiguous_unless_it_is_an_error_page() {
        assert_eq!(
            classify(StatusCode::OK, "<HTML><HEAD><TITLE>Moved Temporarily</TITLE></HEAD></HTML>"),
            Classification::AmbiguousSuccess(AmbiguousReason::RedirectPage)
        );
        assert_eq!(
            classify(StatusCode::OK, "ok"),
            Classification::AmbiguousSuccess(AmbiguousReason::OpaqueBody)
        );
        assert_eq!(
            classify(StatusCode::OK, ""),
            Classification::AmbiguousSuccess(AmbiguousReason::OpaqueBody)
        );
        assert_eq!(
            classify(
                StatusCode::OK,
                "<html><head><title>Error</title></head><body>TypeError: Exception: bad row</body></html>"
            ),
            Classification::Failure(FailureReason::ErrorPage)
        );
        assert_eq!(
            classify(StatusCode::OK, "Script function not found: doPost"),
            Classification::Failure(FailureReason::ErrorPage)
        );
    }

    #[test]
    fn error_statuses_fail() {
        assert_eq!(
            classify(StatusCode::INTERNAL_SERVER_ERROR, "Internal error"),
            Classification::Failure(FailureReason::UnexpectedStatus)
        );
        assert_eq!(
            classify(StatusCode::NOT_FOUND, r#"{"success":true}"#),
            Classification::Failure(FailureReason::UnexpectedStatus)
        );
        // other redirects need a JSON body to count
        assert_eq!(
            classify(StatusCode::TEMPORARY_REDIRECT, "moved"),
            Classification::Failure(FailureReason::UnexpectedStatus)
        );
    }

    #[test]
    fn long_bodies_are_truncated_on_char_boundaries() {
        let body = "ж".repeat(1000);
        let cut = truncate(&body, 11);
        assert!(cut.starts_with("жжжжж"));
        assert!(cut.ends_with("... (truncated)"));
        assert_eq!(truncate("short", 11), "short");
    }

    #[test]
    fn rejected_error_mentions_status_and_body() {
        let err = ForwardError::Rejected {
            status: 500,
            reason: FailureReason::UnexpectedStatus,
            body: "boom".to_string(),
        };
        assert_eq!(err.to_string(), "webhook responded with status 500: boom");
    }

    #[test]
    fn timeout_error_keeps_sub_second_precision() {
        let err = ForwardError::Timeout(Duration::from_millis(200));
        assert_eq!(err.to_string(), "webhook request timed out after 200ms");
        let err = ForwardError::Timeout(Duration::from_secs(15));
        assert_eq!(err.to_string(), "webhook request timed out after 15s");
    }
}
