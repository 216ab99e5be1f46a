use std::sync::Arc;

use crate::commands::{
    runtime, CommandResult, EXIT_CONFIG, EXIT_DB_CONNECTIVITY, EXIT_MIGRATION, EXIT_SWEEP,
};
use tarif_core::clock::SystemClock;
use tarif_core::config::{AppConfig, LoadOptions};
use tarif_db::{connect, migrations, SqlQuoteRepository};
use tarif_lifecycle::{OperationContext, QuoteExpirer};

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "sweep",
                "config_validation",
                format!("configuration issue: {error}"),
                EXIT_CONFIG,
            );
        }
    };

    let runtime = match runtime("sweep") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = connect(&config.database)
            .await
            .map_err(|error| ("db_connectivity", error.to_string(), EXIT_DB_CONNECTIVITY))?;
        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), EXIT_MIGRATION))?;

        let expirer =
            QuoteExpirer::new(Arc::new(SqlQuoteRepository::new(pool.clone())), Arc::new(SystemClock));
        let report = expirer
            .sweep(&OperationContext::system("cli-sweep"))
            .await
            .map_err(|error| ("sweep", error.to_string(), EXIT_SWEEP))?;
        pool.close().await;
        Ok::<_, (&'static str, String, u8)>(report)
    });

    match result {
        Ok(report) => CommandResult::success_with_data(
            "sweep",
            format!(
                "expired {} of {} quotes ({} skipped, {} failed)",
                report.expired, report.examined, report.skipped, report.failed
            ),
            serde_json::to_value(report).ok(),
        ),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("sweep", error_class, message, exit_code)
        }
    }
}
