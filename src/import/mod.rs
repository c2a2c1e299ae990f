//! Import Worker
//!
//! Pulls money-movement records from the provider and upserts them into the
//! staging store, deduplicated by provider-assigned external id. A persisted
//! checkpoint cursor keeps repeated invocations from re-scanning the full
//! provider history.

pub mod models;
pub mod worker;

pub use models::{MovementStatus, StagedMovement};
pub use worker::{ImportError, ImportItemError, ImportReport, ImportWorker};
