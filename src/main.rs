//! paybridge - Payment Provider Integration Pipeline
//!
//! Startup order matters: configuration and logging first (missing required
//! configuration is fatal here, never per-request), then the database pool
//! and schema, then the components, then the background retry loop and the
//! HTTP gateway.

use std::sync::Arc;

use paybridge::call_ledger::CallLedger;
use paybridge::db::{Database, schema};
use paybridge::gateway::{self, state::AppState};
use paybridge::import::ImportWorker;
use paybridge::processing::ProcessingWorker;
use paybridge::provider::{HttpTransport, ProviderClient};
use paybridge::retry_queue::RetryCoordinator;
use paybridge::webhook::WebhookProcessor;

fn get_env() -> String {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if (args[i] == "--env" || args[i] == "-e") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    "dev".to_string()
}

/// Get port override from command line (--port argument)
fn get_port_override() -> Option<u16> {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if args[i] == "--port" && i + 1 < args.len() {
            return args[i + 1].parse().ok();
        }
    }
    None
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = get_env();
    let config = paybridge::config::AppConfig::load(&env);
    let _log_guard = paybridge::logging::init_logging(&config);

    tracing::info!("Starting paybridge in {} mode", env);

    let db = Arc::new(Database::connect(&config.postgres_url).await?);
    schema::init_schema(db.pool()).await?;

    let ledger = Arc::new(CallLedger::new(db.pool().clone()));

    let transport = HttpTransport::new(
        config.provider.base_url.clone(),
        config.provider.api_token.clone(),
    )
    .map_err(anyhow::Error::msg)?;

    let provider = Arc::new(ProviderClient::new(
        Arc::new(transport),
        ledger.clone(),
        &config.provider,
        config.retry.claim_stale_secs,
    ));

    let importer = Arc::new(ImportWorker::new(
        db.pool().clone(),
        provider.clone(),
        config.import.page_size,
    ));
    let processor = Arc::new(ProcessingWorker::new(db.pool().clone()));
    let webhooks = Arc::new(WebhookProcessor::new(
        db.pool().clone(),
        config.webhook.signing_secret.clone(),
    ));
    let retry_queue = Arc::new(RetryCoordinator::new(
        ledger.clone(),
        provider.clone(),
        config.retry.clone(),
    ));

    // Background scan loop; the ops endpoint drives the same pass for
    // externally scheduled deployments
    let retry_loop = retry_queue.clone();
    tokio::spawn(async move {
        retry_loop.run().await;
    });

    let state = Arc::new(AppState {
        db,
        ledger,
        provider,
        importer,
        processor,
        webhooks,
        retry_queue,
        ops_secret: config.ops_secret.clone(),
    });

    let port = get_port_override().unwrap_or(config.gateway.port);
    gateway::run_server(&config.gateway.host, port, state).await
}
