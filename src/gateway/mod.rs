pub mod handlers;
pub mod state;
pub mod types;

use axum::{
    Json, Router,
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::{Next, from_fn_with_state},
    response::Response,
    routing::{get, post},
};
use std::sync::Arc;
use tokio::net::TcpListener;

use state::AppState;
use types::{ApiResponse, error_codes};

/// Shared-secret gate for operator and scheduler endpoints.
///
/// Operator authentication proper is an external collaborator; this gate
/// only keeps the internal surface off the open internet.
async fn ops_auth_middleware(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, (StatusCode, Json<ApiResponse<()>>)> {
    let supplied = request
        .headers()
        .get("X-Ops-Secret")
        .and_then(|v| v.to_str().ok())
        .ok_or((
            StatusCode::UNAUTHORIZED,
            Json(ApiResponse::<()>::error(
                error_codes::MISSING_AUTH,
                "Missing X-Ops-Secret header",
            )),
        ))?;

    if supplied != state.ops_secret {
        return Err((
            StatusCode::FORBIDDEN,
            Json(ApiResponse::<()>::error(
                error_codes::AUTH_FAILED,
                "Invalid ops secret",
            )),
        ));
    }

    Ok(next.run(request).await)
}

/// Build the full application router
pub fn build_router(state: Arc<AppState>) -> Router {
    let ops_routes = Router::new()
        .route("/import", post(handlers::trigger_import))
        .route("/process", post(handlers::process_movements))
        .route("/movements", get(handlers::list_movements))
        .route("/retry-scan", post(handlers::trigger_retry_scan))
        .route("/calls/{id}/retry", post(handlers::retry_call))
        .route("/calls/{id}/retries", get(handlers::retry_history))
        .route("/webhooks/{id}/reprocess", post(handlers::reprocess_webhook))
        .layer(from_fn_with_state(state.clone(), ops_auth_middleware));

    Router::new()
        // Webhook ingestion authenticates by signature, not by ops secret
        .route("/webhooks/provider", post(handlers::receive_webhook))
        .route("/api/v1/health", get(handlers::health_check))
        .nest("/internal/ops", ops_routes)
        .with_state(state)
}

/// Start the HTTP gateway server
pub async fn run_server(host: &str, port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = build_router(state);

    let addr = format!("{}:{}", host, port);
    let listener = TcpListener::bind(&addr).await?;

    tracing::info!("Gateway listening on http://{}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
