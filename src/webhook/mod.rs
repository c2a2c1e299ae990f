//! Webhook Processor
//!
//! Inbound provider notifications. Every delivery is persisted before
//! verification so forged or malformed payloads still leave a forensic
//! trace; effects are applied exactly once, keyed on the provider delivery
//! id against the confirmed ledger.

pub mod processor;
pub mod signature;

pub use processor::{DeliveryOutcome, DeliveryStatus, WebhookError, WebhookProcessor};
pub use signature::{compute_signature, verify_signature};
