//! Provider Client
//!
//! Wraps outbound HTTP calls to the payment provider. Every call is written
//! to the call ledger regardless of outcome; retries are never performed
//! internally (the retry queue coordinator owns retry policy, so that
//! non-idempotent provider endpoints are never double-executed by accident).

pub mod client;
pub mod error;
pub mod movement;
pub mod transport;

pub use client::{ProviderClient, ProviderHealth, RetryOutcome};
pub use error::{CallError, RetryError};
pub use movement::{MovementParseError, ProviderMovement, amount_to_minor};
pub use transport::{HttpMethod, HttpTransport, ProviderTransport, TransportResponse};
