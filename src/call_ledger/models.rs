use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

/// One outbound provider API call, recorded regardless of outcome.
///
/// Immutable once written except `retry_claimed_at`, which serializes
/// concurrent retries of the same entry.
#[derive(Debug, Clone, Serialize)]
pub struct CallLogEntry {
    pub id: i64,
    pub endpoint: String,
    pub http_method: String,
    pub request_payload: Option<Value>,
    pub response_payload: Option<Value>,
    pub response_status: Option<i32>,
    pub success: bool,
    pub error_message: Option<String>,
    pub duration_ms: i64,
    pub retry_claimed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl CallLogEntry {
    /// Provider 4xx responses indicate a bad request or auth failure and are
    /// excluded from automatic retry.
    pub fn is_permanent_failure(&self) -> bool {
        matches!(self.response_status, Some(s) if (400..500).contains(&s))
    }
}

/// Insert payload for a new call log entry
#[derive(Debug, Clone)]
pub struct NewCall {
    pub endpoint: String,
    pub http_method: String,
    pub request_payload: Option<Value>,
    pub response_payload: Option<Value>,
    pub response_status: Option<i32>,
    pub success: bool,
    pub error_message: Option<String>,
    pub duration_ms: i64,
}

/// One retry of a previously failed call. Append-only.
#[derive(Debug, Clone, Serialize)]
pub struct RetryAttempt {
    pub id: i64,
    pub call_log_id: i64,
    pub attempt_number: i32,
    pub response_status: Option<i32>,
    pub success: bool,
    pub error_message: Option<String>,
    pub duration_ms: i64,
    pub response_payload: Option<Value>,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for a retry attempt; attempt_number is assigned by the store.
#[derive(Debug, Clone)]
pub struct NewRetryAttempt {
    pub response_status: Option<i32>,
    pub success: bool,
    pub error_message: Option<String>,
    pub duration_ms: i64,
    pub response_payload: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry_with_status(status: Option<i32>) -> CallLogEntry {
        CallLogEntry {
            id: 1,
            endpoint: "/v1/movements".to_string(),
            http_method: "GET".to_string(),
            request_payload: None,
            response_payload: None,
            response_status: status,
            success: false,
            error_message: None,
            duration_ms: 12,
            retry_claimed_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_permanent_failure_is_4xx_only() {
        assert!(entry_with_status(Some(400)).is_permanent_failure());
        assert!(entry_with_status(Some(401)).is_permanent_failure());
        assert!(entry_with_status(Some(422)).is_permanent_failure());
        // 5xx and transport failures (no status) are transient
        assert!(!entry_with_status(Some(500)).is_permanent_failure());
        assert!(!entry_with_status(Some(503)).is_permanent_failure());
        assert!(!entry_with_status(None).is_permanent_failure());
        // Successful statuses are not failures at all
        assert!(!entry_with_status(Some(200)).is_permanent_failure());
    }
}
