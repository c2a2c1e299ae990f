//! paybridge - Payment Provider Integration Pipeline
//!
//! Moves money-movement records from an external payment provider into the
//! internal ledger, consumes asynchronous provider webhooks, and keeps an
//! auditable, retryable log of every outbound API call.
//!
//! # Modules
//!
//! - [`call_ledger`] - Audit log of outbound calls and retry attempts
//! - [`provider`] - Logged HTTP client for the provider API
//! - [`import`] - Movement import with checkpoint cursor
//! - [`processing`] - Staged-movement reconciliation into confirmed transactions
//! - [`webhook`] - Inbound delivery verification and exactly-once application
//! - [`retry_queue`] - Interval scan-and-retry over failed calls
//! - [`gateway`] - HTTP surface: webhook ingestion, ops triggers, health

pub mod call_ledger;
pub mod config;
pub mod db;
pub mod gateway;
pub mod import;
pub mod logging;
pub mod processing;
pub mod provider;
pub mod retry_queue;
pub mod webhook;

// Convenient re-exports at crate root
pub use call_ledger::{CallLedger, CallLogEntry, LedgerError, RetryAttempt};
pub use db::Database;
pub use import::{ImportReport, ImportWorker, MovementStatus, StagedMovement};
pub use processing::{ProcessReport, ProcessingWorker};
pub use provider::{CallError, HttpMethod, ProviderClient, RetryError, RetryOutcome};
pub use retry_queue::{RetryCoordinator, RetryScanReport};
pub use webhook::{DeliveryOutcome, DeliveryStatus, WebhookProcessor};
