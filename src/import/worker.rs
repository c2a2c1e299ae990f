//! Import worker
//!
//! One pass = one page of provider movements since the checkpoint cursor,
//! upserted item by item. Per-item failures are collected into the report;
//! partial success is the normal completion mode. The checkpoint only
//! advances after the batch completes.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use sqlx::PgPool;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::provider::{CallError, ProviderClient, ProviderMovement};

use super::models::MovementStatus;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Provider error: {0}")]
    Provider(#[from] CallError),
}

/// One movement that could not be staged
#[derive(Debug, Clone, Serialize)]
pub struct ImportItemError {
    /// Provider external id when present, otherwise the page index
    pub reference: String,
    pub message: String,
}

#[derive(Debug, Default, Serialize)]
pub struct ImportReport {
    pub imported: u32,
    pub updated: u32,
    pub skipped: u32,
    pub errors: Vec<ImportItemError>,
}

pub struct ImportWorker {
    pool: PgPool,
    client: Arc<ProviderClient>,
    page_size: u32,
}

impl ImportWorker {
    pub fn new(pool: PgPool, client: Arc<ProviderClient>, page_size: u32) -> Self {
        Self {
            pool,
            client,
            page_size,
        }
    }

    /// Import one page of movements since the last successful checkpoint.
    ///
    /// No checkpoint row means a full import from the provider's history.
    pub async fn import_movements(&self) -> Result<ImportReport, ImportError> {
        let checkpoint = self.get_checkpoint().await?;
        let items = self.client.list_movements(checkpoint, self.page_size).await?;

        info!(
            count = items.len(),
            checkpoint = ?checkpoint,
            "Importing provider movements"
        );

        let mut report = ImportReport::default();
        let mut max_seen: Option<DateTime<Utc>> = checkpoint;

        for (index, item) in items.iter().enumerate() {
            let movement: ProviderMovement = match serde_json::from_value(item.clone()) {
                Ok(m) => m,
                Err(e) => {
                    let reference = item
                        .get("external_id")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                        .unwrap_or_else(|| format!("item#{}", index));
                    warn!(%reference, error = %e, "Skipping malformed movement");
                    report.errors.push(ImportItemError {
                        reference,
                        message: format!("malformed movement: {}", e),
                    });
                    continue;
                }
            };

            match self.upsert_movement(&movement, item).await {
                Ok(outcome) => {
                    match outcome {
                        UpsertOutcome::Inserted => report.imported += 1,
                        UpsertOutcome::Updated => report.updated += 1,
                        UpsertOutcome::Unchanged => report.skipped += 1,
                    }
                    if max_seen.is_none_or(|seen| movement.occurred_at > seen) {
                        max_seen = Some(movement.occurred_at);
                    }
                }
                Err(e) => {
                    warn!(external_id = %movement.external_id, error = %e, "Failed to stage movement");
                    report.errors.push(ImportItemError {
                        reference: movement.external_id.clone(),
                        message: e,
                    });
                }
            }
        }

        if let Some(cursor) = max_seen
            && checkpoint != Some(cursor)
        {
            self.update_checkpoint(cursor).await?;
        }

        info!(
            imported = report.imported,
            updated = report.updated,
            skipped = report.skipped,
            errors = report.errors.len(),
            "Import pass complete"
        );

        Ok(report)
    }

    /// Idempotent upsert keyed on external_id.
    ///
    /// A new movement is inserted with the provider-reported status; an
    /// existing one is updated only when the provider status differs and the
    /// row has not reached a terminal state.
    async fn upsert_movement(
        &self,
        movement: &ProviderMovement,
        raw: &Value,
    ) -> Result<UpsertOutcome, String> {
        let status = MovementStatus::from_str(&movement.status)?;
        if status.is_terminal() {
            return Err(format!(
                "provider reported internal status '{}'",
                movement.status
            ));
        }

        // A movement with a missing or unparseable amount is still staged for
        // audit; the processing worker rejects it at reconciliation time.
        let amount_minor = movement.amount_minor().ok();

        let existing = sqlx::query_scalar::<_, String>(
            "SELECT status FROM staged_movements_tb WHERE external_id = $1",
        )
        .bind(&movement.external_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| e.to_string())?;

        match existing {
            None => {
                let result = sqlx::query(
                    r#"
                    INSERT INTO staged_movements_tb
                        (external_id, raw_payload, status, amount_minor, currency, account_reference)
                    VALUES ($1, $2, $3, $4, $5, $6)
                    ON CONFLICT (external_id) DO NOTHING
                    "#,
                )
                .bind(&movement.external_id)
                .bind(raw)
                .bind(status.as_str())
                .bind(amount_minor)
                .bind(&movement.currency)
                .bind(&movement.account_reference)
                .execute(&self.pool)
                .await
                .map_err(|e| e.to_string())?;

                // 0 rows: a concurrent import won the insert race
                if result.rows_affected() > 0 {
                    Ok(UpsertOutcome::Inserted)
                } else {
                    Ok(UpsertOutcome::Unchanged)
                }
            }
            Some(current_str) => {
                let current = MovementStatus::from_str(&current_str)?;
                if current.is_terminal() || current == status {
                    return Ok(UpsertOutcome::Unchanged);
                }

                // CAS on the previously observed status so a concurrent
                // processing claim is never overwritten
                let result = sqlx::query(
                    r#"
                    UPDATE staged_movements_tb
                    SET raw_payload = $1, status = $2, amount_minor = $3,
                        currency = $4, account_reference = $5
                    WHERE external_id = $6 AND status = $7
                    "#,
                )
                .bind(raw)
                .bind(status.as_str())
                .bind(amount_minor)
                .bind(&movement.currency)
                .bind(&movement.account_reference)
                .bind(&movement.external_id)
                .bind(current.as_str())
                .execute(&self.pool)
                .await
                .map_err(|e| e.to_string())?;

                if result.rows_affected() > 0 {
                    Ok(UpsertOutcome::Updated)
                } else {
                    Ok(UpsertOutcome::Unchanged)
                }
            }
        }
    }

    /// List staged movements for ops tooling, newest first
    pub async fn list_staged(
        &self,
        status: Option<MovementStatus>,
        limit: i64,
    ) -> Result<Vec<super::models::StagedMovement>, ImportError> {
        const COLUMNS: &str = "id, external_id, raw_payload, status, amount_minor, currency, \
                               account_reference, imported_at, processed_at, error_detail";

        let rows = match status {
            Some(s) => {
                sqlx::query(&format!(
                    "SELECT {} FROM staged_movements_tb WHERE status = $1 ORDER BY id DESC LIMIT $2",
                    COLUMNS
                ))
                .bind(s.as_str())
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(&format!(
                    "SELECT {} FROM staged_movements_tb ORDER BY id DESC LIMIT $1",
                    COLUMNS
                ))
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.iter()
            .map(|r| {
                super::models::row_to_staged(r)
                    .map_err(|e| ImportError::Database(sqlx::Error::Protocol(e)))
            })
            .collect()
    }

    async fn get_checkpoint(&self) -> Result<Option<DateTime<Utc>>, ImportError> {
        let cursor = sqlx::query_scalar::<_, DateTime<Utc>>(
            "SELECT cursor FROM import_checkpoint_tb WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(cursor)
    }

    async fn update_checkpoint(&self, cursor: DateTime<Utc>) -> Result<(), ImportError> {
        sqlx::query(
            r#"
            INSERT INTO import_checkpoint_tb (id, cursor)
            VALUES (1, $1)
            ON CONFLICT (id) DO UPDATE
            SET cursor = GREATEST(import_checkpoint_tb.cursor, EXCLUDED.cursor),
                updated_at = NOW()
            "#,
        )
        .bind(cursor)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

enum UpsertOutcome {
    Inserted,
    Updated,
    Unchanged,
}
