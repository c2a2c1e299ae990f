use thiserror::Error;

use crate::call_ledger::LedgerError;

#[derive(Debug, Error)]
pub enum CallError {
    /// Network-level failure: timeout, connection refused, TLS. Transient.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Provider 5xx. Transient, eligible for automatic retry.
    #[error("Provider error: HTTP {status}")]
    Provider { status: u16 },

    /// Provider 4xx. Permanent: bad request or auth failure, manual fix required.
    #[error("Provider rejected request: HTTP {status}")]
    Rejected { status: u16 },

    /// Response body did not match the expected shape
    #[error("Malformed provider response: {0}")]
    Decode(String),

    #[error("Call ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

impl CallError {
    /// Transient errors are eligible for automatic retry
    pub fn is_transient(&self) -> bool {
        matches!(self, CallError::Transport(_) | CallError::Provider { .. })
    }
}

#[derive(Debug, Error)]
pub enum RetryError {
    #[error("Call log entry not found: {0}")]
    NotFound(i64),

    #[error("Call {0} already succeeded; nothing to retry")]
    AlreadySucceeded(i64),

    #[error("Call {0} is already being retried by another worker")]
    AlreadyRetried(i64),

    #[error("Stored http_method is not valid: {0}")]
    BadStoredMethod(String),

    #[error("Call ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(CallError::Transport("timed out".to_string()).is_transient());
        assert!(CallError::Provider { status: 502 }.is_transient());
        assert!(!CallError::Rejected { status: 401 }.is_transient());
        assert!(!CallError::Decode("bad json".to_string()).is_transient());
    }
}
