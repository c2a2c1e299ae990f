use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::call_ledger::RetryAttempt;
use crate::import::{ImportReport, MovementStatus, StagedMovement};
use crate::processing::{ProcessError, ProcessReport};
use crate::provider::{ProviderHealth, RetryError, RetryOutcome};
use crate::retry_queue::RetryScanReport;
use crate::webhook::DeliveryOutcome;

use super::state::AppState;
use super::types::{ApiResponse, error_codes};

type HandlerError = (StatusCode, Json<ApiResponse<()>>);

fn internal_error(msg: impl Into<String>) -> HandlerError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ApiResponse::<()>::error(error_codes::INTERNAL_ERROR, msg)),
    )
}

// --- Requests ---

#[derive(Debug, Deserialize)]
pub struct ProcessRequest {
    #[serde(default)]
    pub force: bool,
    pub movement_ids: Option<Vec<i64>>,
}

#[derive(Debug, Deserialize)]
pub struct ListMovementsQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
}

// --- Responses ---

#[derive(Debug, Serialize)]
pub struct RetryCallData {
    pub executed: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<RetryOutcome>,
}

#[derive(Debug, Serialize)]
pub struct HealthData {
    pub database: &'static str,
    pub provider: ProviderHealth,
}

// --- Handlers ---

/// Inbound provider webhook
/// POST /webhooks/provider
///
/// Returns 200 with a structured outcome even for failed deliveries: the
/// delivery is persisted either way, and a verification failure is terminal,
/// so the provider must not redeliver it.
pub async fn receive_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ApiResponse<DeliveryOutcome>>, HandlerError> {
    let delivery_id = headers
        .get("X-Provider-Delivery")
        .and_then(|v| v.to_str().ok())
        .ok_or((
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::<()>::error(
                error_codes::INVALID_PARAMETER,
                "Missing X-Provider-Delivery header",
            )),
        ))?;

    let signature = headers
        .get("X-Provider-Signature")
        .and_then(|v| v.to_str().ok())
        .ok_or((
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::<()>::error(
                error_codes::INVALID_PARAMETER,
                "Missing X-Provider-Signature header",
            )),
        ))?;

    let outcome = state
        .webhooks
        .receive(delivery_id, signature, &body)
        .await
        .map_err(|e| internal_error(e.to_string()))?;

    Ok(Json(ApiResponse::success(outcome)))
}

/// Trigger a movement import pass
/// POST /internal/ops/import
pub async fn trigger_import(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<ImportReport>>, HandlerError> {
    match state.importer.import_movements().await {
        Ok(report) => Ok(Json(ApiResponse::success(report))),
        Err(e) => Err((
            StatusCode::BAD_GATEWAY,
            Json(ApiResponse::<()>::error(
                error_codes::PROVIDER_ERROR,
                e.to_string(),
            )),
        )),
    }
}

/// Process approved movements, full batch or selective
/// POST /internal/ops/process
pub async fn process_movements(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ProcessRequest>,
) -> Result<Json<ApiResponse<ProcessReport>>, HandlerError> {
    let report = state
        .processor
        .process_approved_movements(req.force, req.movement_ids.as_deref())
        .await
        .map_err(|e| match e {
            ProcessError::EmptySelection => (
                StatusCode::BAD_REQUEST,
                Json(ApiResponse::<()>::error(
                    error_codes::INVALID_PARAMETER,
                    e.to_string(),
                )),
            ),
            ProcessError::Database(_) => internal_error(e.to_string()),
        })?;

    Ok(Json(ApiResponse::success(report)))
}

/// Manually retry one failed provider call
/// POST /internal/ops/calls/{id}/retry
pub async fn retry_call(
    State(state): State<Arc<AppState>>,
    Path(call_log_id): Path<i64>,
) -> Result<Json<ApiResponse<RetryCallData>>, HandlerError> {
    match state.provider.retry_failed_call(call_log_id).await {
        Ok(outcome) => Ok(Json(ApiResponse::success(RetryCallData {
            executed: true,
            message: outcome.message.clone(),
            outcome: Some(outcome),
        }))),
        // Success-equivalent no-ops: the effect is already achieved or
        // another worker owns the retry
        Err(e @ RetryError::AlreadySucceeded(_)) | Err(e @ RetryError::AlreadyRetried(_)) => {
            Ok(Json(ApiResponse::success(RetryCallData {
                executed: false,
                message: e.to_string(),
                outcome: None,
            })))
        }
        Err(RetryError::NotFound(id)) => Err((
            StatusCode::NOT_FOUND,
            Json(ApiResponse::<()>::error(
                error_codes::NOT_FOUND,
                format!("Call log entry not found: {}", id),
            )),
        )),
        Err(e) => Err(internal_error(e.to_string())),
    }
}

/// Retry history for one call, attempt order
/// GET /internal/ops/calls/{id}/retries
pub async fn retry_history(
    State(state): State<Arc<AppState>>,
    Path(call_log_id): Path<i64>,
) -> Result<Json<ApiResponse<Vec<RetryAttempt>>>, HandlerError> {
    let entry = state
        .ledger
        .get(call_log_id)
        .await
        .map_err(|e| internal_error(e.to_string()))?;

    if entry.is_none() {
        return Err((
            StatusCode::NOT_FOUND,
            Json(ApiResponse::<()>::error(
                error_codes::NOT_FOUND,
                format!("Call log entry not found: {}", call_log_id),
            )),
        ));
    }

    let history = state
        .ledger
        .list_retry_history(call_log_id)
        .await
        .map_err(|e| internal_error(e.to_string()))?;

    Ok(Json(ApiResponse::success(history)))
}

/// Staged movement listing for admin tooling
/// GET /internal/ops/movements
pub async fn list_movements(
    State(state): State<Arc<AppState>>,
    axum::extract::Query(query): axum::extract::Query<ListMovementsQuery>,
) -> Result<Json<ApiResponse<Vec<StagedMovement>>>, HandlerError> {
    let status = match query.status.as_deref() {
        Some(s) => Some(s.parse::<MovementStatus>().map_err(|e| {
            (
                StatusCode::BAD_REQUEST,
                Json(ApiResponse::<()>::error(error_codes::INVALID_PARAMETER, e)),
            )
        })?),
        None => None,
    };

    let movements = state
        .importer
        .list_staged(status, query.limit.unwrap_or(100).clamp(1, 1000))
        .await
        .map_err(|e| internal_error(e.to_string()))?;

    Ok(Json(ApiResponse::success(movements)))
}

/// Manually reprocess a webhook delivery
/// POST /internal/ops/webhooks/{id}/reprocess
pub async fn reprocess_webhook(
    State(state): State<Arc<AppState>>,
    Path(delivery_id): Path<i64>,
) -> Result<Json<ApiResponse<DeliveryOutcome>>, HandlerError> {
    match state.webhooks.reprocess_delivery(delivery_id).await {
        Ok(outcome) => Ok(Json(ApiResponse::success(outcome))),
        Err(crate::webhook::WebhookError::NotFound(id)) => Err((
            StatusCode::NOT_FOUND,
            Json(ApiResponse::<()>::error(
                error_codes::NOT_FOUND,
                format!("Webhook delivery not found: {}", id),
            )),
        )),
        Err(e) => Err(internal_error(e.to_string())),
    }
}

/// Trigger one retry-queue scan pass (same path as the timer)
/// POST /internal/ops/retry-scan
pub async fn trigger_retry_scan(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<RetryScanReport>>, HandlerError> {
    let report = state
        .retry_queue
        .scan_once()
        .await
        .map_err(|e| internal_error(e.to_string()))?;

    Ok(Json(ApiResponse::success(report)))
}

/// Integration health: DB ping plus provider status probe
/// GET /api/v1/health
pub async fn health_check(
    State(state): State<Arc<AppState>>,
) -> Json<ApiResponse<HealthData>> {
    let database = match state.db.health_check().await {
        Ok(()) => "ok",
        Err(_) => "error",
    };

    // Offline provider is a report, not a failure of this endpoint
    let provider = state.provider.health_check().await;

    Json(ApiResponse::success(HealthData { database, provider }))
}
