//! Webhook delivery processing
//!
//! State machine per delivery: received → processing → succeeded | failed.
//! The row is written before verification; a `succeeded` delivery is only
//! ever re-run through the explicit reprocess path, and that path is a
//! no-op for it.

use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::{info, warn};

use crate::processing::SOURCE_WEBHOOK;
use crate::provider::amount_to_minor;

use super::signature::verify_signature;

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("Webhook delivery not found: {0}")]
    NotFound(i64),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Received,
    Processing,
    Succeeded,
    Failed,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Received => "received",
            DeliveryStatus::Processing => "processing",
            DeliveryStatus::Succeeded => "succeeded",
            DeliveryStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for DeliveryStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "received" => Ok(DeliveryStatus::Received),
            "processing" => Ok(DeliveryStatus::Processing),
            "succeeded" => Ok(DeliveryStatus::Succeeded),
            "failed" => Ok(DeliveryStatus::Failed),
            _ => Err(format!("Invalid delivery status: {}", s)),
        }
    }
}

/// Structured outcome returned to the webhook endpoint and ops tooling
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryOutcome {
    pub delivery_id: i64,
    pub status: DeliveryStatus,
    pub success: bool,
    pub message: String,
}

/// Expected shape of a provider notification body
#[derive(Debug, Deserialize)]
struct WebhookEvent {
    #[allow(dead_code)]
    event_type: String,
    amount: String,
    currency: String,
    account_reference: String,
}

pub struct WebhookProcessor {
    pool: PgPool,
    signing_secret: String,
}

impl WebhookProcessor {
    pub fn new(pool: PgPool, signing_secret: String) -> Self {
        Self {
            pool,
            signing_secret,
        }
    }

    /// Accept one inbound delivery: persist, verify, apply.
    ///
    /// Persisting happens before verification so even forged deliveries are
    /// auditable. Duplicates (same external_delivery_id) of a succeeded
    /// delivery short-circuit as already applied.
    pub async fn receive(
        &self,
        external_delivery_id: &str,
        signature: &str,
        raw_payload: &[u8],
    ) -> Result<DeliveryOutcome, WebhookError> {
        let payload_text = String::from_utf8_lossy(raw_payload).into_owned();

        let inserted = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO webhook_deliveries_tb (external_delivery_id, signature, payload, status)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (external_delivery_id) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(external_delivery_id)
        .bind(signature)
        .bind(&payload_text)
        .bind(DeliveryStatus::Received.as_str())
        .fetch_optional(&self.pool)
        .await?;

        let delivery_id = match inserted {
            Some(id) => {
                info!(delivery_id = id, external_delivery_id, "Webhook delivery persisted");
                id
            }
            None => {
                // Redelivery: the provider retries until it sees success
                let row = sqlx::query(
                    "SELECT id, status FROM webhook_deliveries_tb WHERE external_delivery_id = $1",
                )
                .bind(external_delivery_id)
                .fetch_one(&self.pool)
                .await?;

                let id: i64 = row.get("id");
                let status_str: String = row.get("status");
                if status_str == DeliveryStatus::Succeeded.as_str() {
                    return Ok(DeliveryOutcome {
                        delivery_id: id,
                        status: DeliveryStatus::Succeeded,
                        success: true,
                        message: "already applied".to_string(),
                    });
                }
                info!(delivery_id = id, external_delivery_id, "Webhook redelivery");
                id
            }
        };

        self.run_delivery(delivery_id, false).await
    }

    /// Manually re-run a delivery by id.
    ///
    /// A succeeded delivery is reported as already applied without touching
    /// processed_at; anything else re-runs verification and application. The
    /// manual path may reclaim a delivery stuck in `processing` (a worker
    /// that crashed between claim and completion).
    pub async fn reprocess_delivery(&self, id: i64) -> Result<DeliveryOutcome, WebhookError> {
        let row = sqlx::query("SELECT status FROM webhook_deliveries_tb WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(WebhookError::NotFound(id))?;

        let status_str: String = row.get("status");
        if status_str == DeliveryStatus::Succeeded.as_str() {
            return Ok(DeliveryOutcome {
                delivery_id: id,
                status: DeliveryStatus::Succeeded,
                success: true,
                message: "already applied".to_string(),
            });
        }

        info!(delivery_id = id, "Reprocessing webhook delivery");
        self.run_delivery(id, true).await
    }

    /// Verification + application for one persisted delivery
    async fn run_delivery(
        &self,
        id: i64,
        reclaim_processing: bool,
    ) -> Result<DeliveryOutcome, WebhookError> {
        let row = sqlx::query(
            r#"
            SELECT external_delivery_id, signature, payload, status
            FROM webhook_deliveries_tb
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(WebhookError::NotFound(id))?;

        let external_delivery_id: String = row.get("external_delivery_id");
        let signature: String = row.get("signature");
        let payload: String = row.get("payload");

        if !verify_signature(&self.signing_secret, payload.as_bytes(), &signature) {
            warn!(delivery_id = id, %external_delivery_id, "Webhook signature mismatch");
            return self
                .finish(id, DeliveryStatus::Failed, false, false, "invalid signature")
                .await;
        }

        // Claim: only one worker applies a delivery at a time, and a
        // succeeded delivery is never reclaimed
        let claimed = sqlx::query(
            r#"
            UPDATE webhook_deliveries_tb
            SET status = $1, verified = TRUE
            WHERE id = $2 AND status <> $3 AND (status <> $1 OR $4)
            "#,
        )
        .bind(DeliveryStatus::Processing.as_str())
        .bind(id)
        .bind(DeliveryStatus::Succeeded.as_str())
        .bind(reclaim_processing)
        .execute(&self.pool)
        .await?;

        if claimed.rows_affected() == 0 {
            return Ok(DeliveryOutcome {
                delivery_id: id,
                status: DeliveryStatus::Processing,
                success: true,
                message: "delivery is already being processed".to_string(),
            });
        }

        match self.apply(id, &external_delivery_id, &payload).await {
            Ok(message) => {
                self.finish(id, DeliveryStatus::Succeeded, true, true, &message)
                    .await
            }
            Err(ApplyError::Invalid(message)) => {
                warn!(delivery_id = id, %message, "Webhook application rejected");
                self.finish(id, DeliveryStatus::Failed, true, false, &message)
                    .await
            }
            Err(ApplyError::Database(e)) => {
                // Leave the failure recorded; the delivery can be reprocessed
                warn!(delivery_id = id, error = %e, "Webhook application errored");
                self.finish(
                    id,
                    DeliveryStatus::Failed,
                    true,
                    false,
                    &format!("database error: {}", e),
                )
                .await
            }
        }
    }

    /// Apply the event's effect exactly once, keyed on the delivery id
    async fn apply(
        &self,
        id: i64,
        external_delivery_id: &str,
        payload: &str,
    ) -> Result<String, ApplyError> {
        let event: WebhookEvent = serde_json::from_str(payload)
            .map_err(|e| ApplyError::Invalid(format!("malformed payload: {}", e)))?;

        let amount_minor = amount_to_minor(&event.amount, &event.currency)
            .map_err(|e| ApplyError::Invalid(e.to_string()))?;

        let result = sqlx::query(
            r#"
            INSERT INTO confirmed_transactions_tb
                (source, source_reference, amount_minor, currency, account_reference)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (source, source_reference) DO NOTHING
            "#,
        )
        .bind(SOURCE_WEBHOOK)
        .bind(external_delivery_id)
        .bind(amount_minor)
        .bind(&event.currency)
        .bind(&event.account_reference)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            Ok("already applied".to_string())
        } else {
            info!(
                delivery_id = id,
                external_delivery_id, amount_minor, "Webhook effect applied"
            );
            Ok("applied".to_string())
        }
    }

    async fn finish(
        &self,
        id: i64,
        status: DeliveryStatus,
        verified: bool,
        success: bool,
        message: &str,
    ) -> Result<DeliveryOutcome, WebhookError> {
        sqlx::query(
            r#"
            UPDATE webhook_deliveries_tb
            SET status = $1, verified = $2, result_message = $3, processed_at = NOW()
            WHERE id = $4
            "#,
        )
        .bind(status.as_str())
        .bind(verified)
        .bind(message)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(DeliveryOutcome {
            delivery_id: id,
            status,
            success,
            message: message.to_string(),
        })
    }
}

enum ApplyError {
    Invalid(String),
    Database(sqlx::Error),
}

impl From<sqlx::Error> for ApplyError {
    fn from(e: sqlx::Error) -> Self {
        ApplyError::Database(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delivery_status_roundtrip() {
        for status in [
            DeliveryStatus::Received,
            DeliveryStatus::Processing,
            DeliveryStatus::Succeeded,
            DeliveryStatus::Failed,
        ] {
            let parsed: DeliveryStatus = status.as_str().parse().unwrap();
            assert_eq!(parsed, status);
        }
        assert!("delivered".parse::<DeliveryStatus>().is_err());
    }

    #[test]
    fn test_webhook_event_deserialize() {
        let json = r#"{
            "event_type": "movement.settled",
            "amount": "42.50",
            "currency": "EUR",
            "account_reference": "acct_9"
        }"#;

        let event: WebhookEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.amount, "42.50");
        assert_eq!(event.currency, "EUR");
    }

    #[test]
    fn test_webhook_event_rejects_missing_amount() {
        let json = r#"{"event_type": "movement.settled", "currency": "EUR", "account_reference": "a"}"#;
        assert!(serde_json::from_str::<WebhookEvent>(json).is_err());
    }
}
