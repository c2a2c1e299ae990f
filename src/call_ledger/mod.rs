//! Call Ledger
//!
//! Audit log of every outbound provider API call and the retry attempts
//! made against failed calls. Storage and ordering guarantees only; retry
//! policy lives in the provider client and the retry queue coordinator.

pub mod models;
pub mod store;

pub use models::{CallLogEntry, NewCall, NewRetryAttempt, RetryAttempt};
pub use store::{CallLedger, LedgerError};
