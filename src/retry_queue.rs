//! Retry Queue Coordinator
//!
//! Interval-driven scan of the call ledger for failed calls eligible for
//! retry. One retry per eligible entry per pass, so the worst-case pass
//! duration stays bounded. The in-process running flag only stops
//! overlapping ticks inside this process; cross-process safety comes from
//! the per-call claim in the ledger, which the provider client takes before
//! touching the network.

use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::time::{Duration, sleep};
use tracing::{info, warn};

use crate::call_ledger::CallLedger;
use crate::config::RetryConfig;
use crate::provider::{ProviderClient, RetryError};

#[derive(Debug, Default, Serialize)]
pub struct RetryScanReport {
    /// A concurrent pass was running; nothing was scanned
    pub pass_skipped: bool,
    pub scanned: u32,
    pub retried: u32,
    pub succeeded: u32,
    /// Lost claims and already-resolved entries
    pub skipped: u32,
    pub errors: u32,
}

pub struct RetryCoordinator {
    ledger: Arc<CallLedger>,
    client: Arc<ProviderClient>,
    config: RetryConfig,
    running: AtomicBool,
}

impl RetryCoordinator {
    pub fn new(ledger: Arc<CallLedger>, client: Arc<ProviderClient>, config: RetryConfig) -> Self {
        Self {
            ledger,
            client,
            config,
            running: AtomicBool::new(false),
        }
    }

    /// Run the scan loop forever on the configured interval
    pub async fn run(&self) {
        let interval = Duration::from_secs(self.config.scan_interval_secs);
        info!(
            interval_secs = self.config.scan_interval_secs,
            max_attempts = self.config.max_attempts,
            max_age_hours = self.config.max_age_hours,
            "Retry queue coordinator starting"
        );

        loop {
            if let Err(e) = self.scan_once().await.map(|report| {
                if report.retried > 0 || report.errors > 0 {
                    info!(
                        retried = report.retried,
                        succeeded = report.succeeded,
                        skipped = report.skipped,
                        errors = report.errors,
                        "Retry scan pass complete"
                    );
                }
            }) {
                warn!(error = %e, "Retry scan pass failed");
            }

            sleep(interval).await;
        }
    }

    /// One scan-and-retry pass. Reentrant-safe: a pass that starts while
    /// another is still running is a no-op.
    pub async fn scan_once(&self) -> Result<RetryScanReport, crate::call_ledger::LedgerError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Ok(RetryScanReport {
                pass_skipped: true,
                ..Default::default()
            });
        }

        let result = self.scan_pass().await;
        self.running.store(false, Ordering::SeqCst);
        result
    }

    async fn scan_pass(&self) -> Result<RetryScanReport, crate::call_ledger::LedgerError> {
        let eligible = self
            .ledger
            .list_failed_eligible_for_retry(
                self.config.max_age_hours * 3600,
                self.config.max_attempts,
                self.config.claim_stale_secs,
                self.config.scan_batch_size,
            )
            .await?;

        let mut report = RetryScanReport {
            scanned: eligible.len() as u32,
            ..Default::default()
        };

        for entry in eligible {
            match self.client.retry_failed_call(entry.id).await {
                Ok(outcome) => {
                    report.retried += 1;
                    if outcome.success {
                        report.succeeded += 1;
                    }
                }
                // Another trigger beat this pass to it: success-equivalent
                Err(RetryError::AlreadyRetried(_)) | Err(RetryError::AlreadySucceeded(_)) => {
                    report.skipped += 1;
                }
                Err(e) => {
                    warn!(call_log_id = entry.id, error = %e, "Retry attempt errored");
                    report.errors += 1;
                }
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_defaults() {
        let report = RetryScanReport::default();
        assert!(!report.pass_skipped);
        assert_eq!(report.scanned, 0);
        assert_eq!(report.retried, 0);
    }
}
