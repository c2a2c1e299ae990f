//! Provider client
//!
//! One outbound call = one call ledger row, success or failure. Wall-clock
//! duration is measured around the transport; the ledger write happens after
//! the call completes so the recorded outcome is final.

use serde::Serialize;
use serde_json::Value;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::call_ledger::{CallLedger, LedgerError, NewCall, NewRetryAttempt};
use crate::config::ProviderConfig;

use super::error::{CallError, RetryError};
use super::transport::{HttpMethod, ProviderTransport, TransportResponse};

/// Outcome of one manual or scheduled retry
#[derive(Debug, Clone, Serialize)]
pub struct RetryOutcome {
    pub call_log_id: i64,
    pub attempt_number: i32,
    pub success: bool,
    pub response_status: Option<i32>,
    pub message: String,
}

/// Result of the provider status probe. Offline is a report, not an error.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderHealth {
    pub healthy: bool,
    pub response_status: Option<i32>,
    pub latency_ms: i64,
    pub message: Option<String>,
}

pub struct ProviderClient {
    transport: Arc<dyn ProviderTransport>,
    ledger: Arc<CallLedger>,
    timeout: Duration,
    health_timeout: Duration,
    health_endpoint: String,
    movements_endpoint: String,
    claim_stale_secs: i64,
}

impl ProviderClient {
    pub fn new(
        transport: Arc<dyn ProviderTransport>,
        ledger: Arc<CallLedger>,
        config: &ProviderConfig,
        claim_stale_secs: i64,
    ) -> Self {
        Self {
            transport,
            ledger,
            timeout: Duration::from_millis(config.timeout_ms),
            health_timeout: Duration::from_millis(config.health_timeout_ms),
            health_endpoint: config.health_endpoint.clone(),
            movements_endpoint: config.movements_endpoint.clone(),
            claim_stale_secs,
        }
    }

    /// Perform one outbound call and log it unconditionally.
    ///
    /// No internal retries: failed calls are recorded and surface as
    /// `CallError`; the retry queue coordinator decides what is retried.
    pub async fn call(
        &self,
        endpoint: &str,
        method: HttpMethod,
        payload: Option<Value>,
    ) -> Result<Value, CallError> {
        let started = Instant::now();
        let result = self
            .transport
            .execute(method, endpoint, payload.as_ref(), self.timeout)
            .await;
        let duration_ms = started.elapsed().as_millis() as i64;

        let (outcome, record) = Self::classify(endpoint, method, payload, result, duration_ms);
        let call_log_id = self.ledger.record(&record).await?;

        match &outcome {
            Ok(_) => {
                info!(call_log_id, endpoint, %method, duration_ms, "Provider call succeeded");
            }
            Err(e) => {
                warn!(call_log_id, endpoint, %method, duration_ms, error = %e, "Provider call failed");
            }
        }

        outcome
    }

    /// Re-issue a previously failed call identically and append one retry attempt.
    ///
    /// Serialized against concurrent retries of the same entry by the
    /// conditional claim on `retry_claimed_at`: the loser observes
    /// `AlreadyRetried` and never touches the provider.
    pub async fn retry_failed_call(&self, call_log_id: i64) -> Result<RetryOutcome, RetryError> {
        let entry = self
            .ledger
            .get(call_log_id)
            .await?
            .ok_or(RetryError::NotFound(call_log_id))?;

        if self.ledger.has_successful_attempt(call_log_id).await? {
            return Err(RetryError::AlreadySucceeded(call_log_id));
        }

        let method = HttpMethod::from_str(&entry.http_method)
            .map_err(RetryError::BadStoredMethod)?;

        if !self
            .ledger
            .claim_for_retry(call_log_id, self.claim_stale_secs)
            .await?
        {
            return Err(RetryError::AlreadyRetried(call_log_id));
        }

        // Identical request: same endpoint, method, payload
        let started = Instant::now();
        let result = self
            .transport
            .execute(method, &entry.endpoint, entry.request_payload.as_ref(), self.timeout)
            .await;
        let duration_ms = started.elapsed().as_millis() as i64;

        let attempt = match &result {
            Ok(resp) => NewRetryAttempt {
                response_status: Some(resp.status as i32),
                success: (200..300).contains(&resp.status),
                error_message: if (200..300).contains(&resp.status) {
                    None
                } else {
                    Some(format!("HTTP {}", resp.status))
                },
                duration_ms,
                response_payload: resp.body.clone(),
            },
            Err(msg) => NewRetryAttempt {
                response_status: None,
                success: false,
                error_message: Some(msg.clone()),
                duration_ms,
                response_payload: None,
            },
        };

        let appended = self.ledger.append_retry_attempt(call_log_id, &attempt).await;

        // The claim is released even when the append fails; the unique
        // constraint on (call_log_id, attempt_number) remains the backstop.
        if let Err(e) = self.ledger.release_retry_claim(call_log_id).await {
            warn!(call_log_id, error = %e, "Failed to release retry claim");
        }

        let attempt_number = match appended {
            Ok((_, number)) => number,
            Err(LedgerError::Conflict(_)) => {
                return Err(RetryError::AlreadyRetried(call_log_id));
            }
            Err(e) => return Err(e.into()),
        };

        info!(
            call_log_id,
            attempt_number,
            success = attempt.success,
            "Retry attempt recorded"
        );

        Ok(RetryOutcome {
            call_log_id,
            attempt_number,
            success: attempt.success,
            response_status: attempt.response_status,
            message: attempt
                .error_message
                .clone()
                .unwrap_or_else(|| "retry succeeded".to_string()),
        })
    }

    /// Probe the provider status endpoint.
    ///
    /// Uses its own (shorter) timeout and is not written to the call ledger:
    /// the probe runs on every health poll and a failed probe is a status
    /// report, not a retryable integration failure.
    pub async fn health_check(&self) -> ProviderHealth {
        let started = Instant::now();
        let result = self
            .transport
            .execute(HttpMethod::Get, &self.health_endpoint, None, self.health_timeout)
            .await;
        let latency_ms = started.elapsed().as_millis() as i64;

        match result {
            Ok(resp) if (200..300).contains(&resp.status) => ProviderHealth {
                healthy: true,
                response_status: Some(resp.status as i32),
                latency_ms,
                message: None,
            },
            Ok(resp) => ProviderHealth {
                healthy: false,
                response_status: Some(resp.status as i32),
                latency_ms,
                message: Some(format!("status endpoint returned HTTP {}", resp.status)),
            },
            Err(msg) => ProviderHealth {
                healthy: false,
                response_status: None,
                latency_ms,
                message: Some(msg),
            },
        }
    }

    /// Fetch one page of the movement listing, optionally since a checkpoint
    /// cursor.
    ///
    /// Items are returned raw: one malformed movement must not sink the whole
    /// page, so interpretation is left to the import worker.
    pub async fn list_movements(
        &self,
        since: Option<chrono::DateTime<chrono::Utc>>,
        page_size: u32,
    ) -> Result<Vec<Value>, CallError> {
        let endpoint = match since {
            Some(cursor) => format!(
                "{}?since={}&limit={}",
                self.movements_endpoint,
                cursor.to_rfc3339(),
                page_size
            ),
            None => format!("{}?limit={}", self.movements_endpoint, page_size),
        };

        let body = self.call(&endpoint, HttpMethod::Get, None).await?;

        match body.get("movements") {
            Some(Value::Array(items)) => Ok(items.clone()),
            Some(other) => Err(CallError::Decode(format!(
                "expected 'movements' array, got {}",
                other
            ))),
            None => Ok(Vec::new()),
        }
    }

    fn classify(
        endpoint: &str,
        method: HttpMethod,
        payload: Option<Value>,
        result: Result<TransportResponse, String>,
        duration_ms: i64,
    ) -> (Result<Value, CallError>, NewCall) {
        match result {
            Ok(resp) => {
                let status = resp.status;
                let record = NewCall {
                    endpoint: endpoint.to_string(),
                    http_method: method.to_string(),
                    request_payload: payload,
                    response_payload: resp.body.clone(),
                    response_status: Some(status as i32),
                    success: (200..300).contains(&status),
                    error_message: if (200..300).contains(&status) {
                        None
                    } else {
                        Some(format!("HTTP {}", status))
                    },
                    duration_ms,
                };

                let outcome = if (200..300).contains(&status) {
                    Ok(resp.body.unwrap_or(Value::Null))
                } else if (400..500).contains(&status) {
                    Err(CallError::Rejected { status })
                } else {
                    Err(CallError::Provider { status })
                };

                (outcome, record)
            }
            Err(msg) => {
                let record = NewCall {
                    endpoint: endpoint.to_string(),
                    http_method: method.to_string(),
                    request_payload: payload,
                    response_payload: None,
                    response_status: None,
                    success: false,
                    error_message: Some(msg.clone()),
                    duration_ms,
                };

                (Err(CallError::Transport(msg)), record)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_success() {
        let resp = TransportResponse {
            status: 200,
            body: Some(serde_json::json!({"ok": true})),
        };
        let (outcome, record) =
            ProviderClient::classify("/v1/x", HttpMethod::Get, None, Ok(resp), 15);

        assert!(outcome.is_ok());
        assert!(record.success);
        assert_eq!(record.response_status, Some(200));
        assert!(record.error_message.is_none());
    }

    #[test]
    fn test_classify_rejected_is_permanent() {
        let resp = TransportResponse {
            status: 422,
            body: None,
        };
        let (outcome, record) =
            ProviderClient::classify("/v1/x", HttpMethod::Post, None, Ok(resp), 15);

        assert!(matches!(outcome, Err(CallError::Rejected { status: 422 })));
        assert!(!record.success);
        assert_eq!(record.error_message.as_deref(), Some("HTTP 422"));
    }

    #[test]
    fn test_classify_provider_error_is_transient() {
        let resp = TransportResponse {
            status: 503,
            body: None,
        };
        let (outcome, _) = ProviderClient::classify("/v1/x", HttpMethod::Post, None, Ok(resp), 15);

        match outcome {
            Err(e) => assert!(e.is_transient()),
            Ok(_) => panic!("503 must not be a success"),
        }
    }

    #[test]
    fn test_classify_transport_failure_records_error() {
        let (outcome, record) = ProviderClient::classify(
            "/v1/x",
            HttpMethod::Get,
            None,
            Err("Request to /v1/x timed out".to_string()),
            10_000,
        );

        assert!(matches!(outcome, Err(CallError::Transport(_))));
        assert!(!record.success);
        assert!(record.response_status.is_none());
        assert_eq!(
            record.error_message.as_deref(),
            Some("Request to /v1/x timed out")
        );
        assert_eq!(record.duration_ms, 10_000);
    }
}
