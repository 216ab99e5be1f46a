use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info, warn};

use tarif_core::clock::Clock;
use tarif_core::errors::ApplicationError;
use tarif_db::{QuoteRepository, RepositoryError};

use crate::context::OperationContext;
use crate::scheduler::RecurringTask;

pub const SWEEP_TASK_NAME: &str = "quote-expiration-sweep";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub examined: usize,
    pub expired: usize,
    /// Quotes that changed underneath the sweep and were left alone.
    pub skipped: usize,
    pub failed: usize,
}

/// Flips pending quotes whose validity window has closed to `expired`.
///
/// Failures on individual records are logged and counted; the sweep carries on with the
/// remaining quotes. Only a failure to list quotes aborts it.
pub struct QuoteExpirer {
    quotes: Arc<dyn QuoteRepository>,
    clock: Arc<dyn Clock>,
}

impl QuoteExpirer {
    pub fn new(quotes: Arc<dyn QuoteRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { quotes, clock }
    }

    pub async fn sweep(&self, ctx: &OperationContext) -> Result<SweepReport, ApplicationError> {
        let now = self.clock.now();
        let quotes = self.quotes.find_all().await?;
        let mut report = SweepReport { examined: quotes.len(), ..SweepReport::default() };

        for mut quote in quotes.into_iter().filter(|quote| quote.is_sweepable(now)) {
            let expected_version = quote.version;
            let quote_id = quote.id.clone();
            if quote.expire(now).is_err() {
                report.skipped += 1;
                continue;
            }

            match self.quotes.update_if_version(quote, expected_version).await {
                Ok(_) => {
                    report.expired += 1;
                    debug!(
                        event_name = "quote.lifecycle.expired",
                        quote_id = %quote_id,
                        correlation_id = %ctx.correlation_id,
                        "quote expired"
                    );
                }
                Err(RepositoryError::VersionConflict { .. }) => {
                    report.skipped += 1;
                    debug!(
                        event_name = "quote.sweep.skipped",
                        quote_id = %quote_id,
                        correlation_id = %ctx.correlation_id,
                        "quote changed during sweep"
                    );
                }
                Err(error) => {
                    report.failed += 1;
                    warn!(
                        event_name = "quote.sweep.record_failed",
                        quote_id = %quote_id,
                        correlation_id = %ctx.correlation_id,
                        error = %error,
                        "failed to expire quote"
                    );
                }
            }
        }

        info!(
            event_name = "quote.sweep.completed",
            correlation_id = %ctx.correlation_id,
            examined = report.examined,
            expired = report.expired,
            skipped = report.skipped,
            failed = report.failed,
            "expiration sweep finished"
        );
        Ok(report)
    }
}

#[async_trait]
impl RecurringTask for QuoteExpirer {
    fn name(&self) -> &str {
        SWEEP_TASK_NAME
    }

    async fn run_once(&self) -> Result<(), ApplicationError> {
        self.sweep(&OperationContext::system("sweep")).await.map(|_| ())
    }
}
