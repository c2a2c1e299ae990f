//! Shared gateway state

use std::sync::Arc;

use crate::call_ledger::CallLedger;
use crate::db::Database;
use crate::import::ImportWorker;
use crate::processing::ProcessingWorker;
use crate::provider::ProviderClient;
use crate::retry_queue::RetryCoordinator;
use crate::webhook::WebhookProcessor;

/// Process-wide state, initialized once at startup and passed by reference
/// into handlers; components never reach through ambient globals.
pub struct AppState {
    pub db: Arc<Database>,
    pub ledger: Arc<CallLedger>,
    pub provider: Arc<ProviderClient>,
    pub importer: Arc<ImportWorker>,
    pub processor: Arc<ProcessingWorker>,
    pub webhooks: Arc<WebhookProcessor>,
    pub retry_queue: Arc<RetryCoordinator>,
    pub ops_secret: String,
}
