use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::Row;
use std::fmt;
use std::str::FromStr;

/// Lifecycle of a staged movement.
///
/// Transitions are monotonic forward except failed→pending (manual retry)
/// and failed→processed (retry success). `Processing` is the transient
/// claim state a worker holds while reconciling a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementStatus {
    Pending,
    Approved,
    Rejected,
    Processing,
    Processed,
    Failed,
}

impl MovementStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementStatus::Pending => "pending",
            MovementStatus::Approved => "approved",
            MovementStatus::Rejected => "rejected",
            MovementStatus::Processing => "processing",
            MovementStatus::Processed => "processed",
            MovementStatus::Failed => "failed",
        }
    }

    /// Terminal states are never overwritten by a re-import
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            MovementStatus::Processing | MovementStatus::Processed | MovementStatus::Failed
        )
    }
}

impl fmt::Display for MovementStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for MovementStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(MovementStatus::Pending),
            "approved" => Ok(MovementStatus::Approved),
            "rejected" => Ok(MovementStatus::Rejected),
            "processing" => Ok(MovementStatus::Processing),
            "processed" => Ok(MovementStatus::Processed),
            "failed" => Ok(MovementStatus::Failed),
            _ => Err(format!("Invalid movement status: {}", s)),
        }
    }
}

/// A movement imported from the provider, not yet reconciled
#[derive(Debug, Clone, Serialize)]
pub struct StagedMovement {
    pub id: i64,
    pub external_id: String,
    pub raw_payload: Value,
    pub status: MovementStatus,
    pub amount_minor: Option<i64>,
    pub currency: Option<String>,
    pub account_reference: Option<String>,
    pub imported_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub error_detail: Option<String>,
}

pub(crate) fn row_to_staged(row: &sqlx::postgres::PgRow) -> Result<StagedMovement, String> {
    let status_str: String = row.get("status");
    let status = MovementStatus::from_str(&status_str)?;

    Ok(StagedMovement {
        id: row.get("id"),
        external_id: row.get("external_id"),
        raw_payload: row.get("raw_payload"),
        status,
        amount_minor: row.get("amount_minor"),
        currency: row.get("currency"),
        account_reference: row.get("account_reference"),
        imported_at: row.get("imported_at"),
        processed_at: row.get("processed_at"),
        error_detail: row.get("error_detail"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip() {
        for status in [
            MovementStatus::Pending,
            MovementStatus::Approved,
            MovementStatus::Rejected,
            MovementStatus::Processing,
            MovementStatus::Processed,
            MovementStatus::Failed,
        ] {
            let parsed: MovementStatus = status.as_str().parse().unwrap();
            assert_eq!(parsed, status);
        }
        assert!("shipped".parse::<MovementStatus>().is_err());
    }

    #[test]
    fn test_terminal_states() {
        assert!(MovementStatus::Processed.is_terminal());
        assert!(MovementStatus::Failed.is_terminal());
        assert!(MovementStatus::Processing.is_terminal());
        assert!(!MovementStatus::Pending.is_terminal());
        assert!(!MovementStatus::Approved.is_terminal());
        assert!(!MovementStatus::Rejected.is_terminal());
    }
}
