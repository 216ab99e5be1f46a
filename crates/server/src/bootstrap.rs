use std::sync::Arc;
use std::time::Duration;

use tarif_core::clock::SystemClock;
use tarif_core::config::{AppConfig, ConfigError, LoadOptions};
use tarif_core::pricing::PricingCalculator;
use tarif_db::{connect, migrations, DbPool, SqlQuoteRepository};
use tarif_lifecycle::QuoteLifecycleService;
use tarif_upstream::{GatewayError, HttpDemandeGateway, HttpItineraryGateway};
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub service: Arc<QuoteLifecycleService>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("upstream client setup failed: {0}")]
    Gateway(#[source] GatewayError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool = connect(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let timeout = Duration::from_secs(config.upstream.timeout_secs);
    let demandes = HttpDemandeGateway::new(config.upstream.demande_base_url.clone(), timeout)
        .map_err(BootstrapError::Gateway)?;
    let itineraries = HttpItineraryGateway::new(config.upstream.itinerary_base_url.clone(), timeout)
        .map_err(BootstrapError::Gateway)?;
    info!(
        event_name = "system.bootstrap.upstream_ready",
        correlation_id = "bootstrap",
        demande_base_url = %demandes.base_url(),
        itinerary_url = %itineraries.routes_url(),
        timeout_secs = config.upstream.timeout_secs,
        "upstream clients configured"
    );

    let calculator = PricingCalculator::new(config.pricing.effective_coefficients());
    let service = QuoteLifecycleService::new(
        Arc::new(SqlQuoteRepository::new(db_pool.clone())),
        Arc::new(demandes),
        Arc::new(itineraries),
        calculator,
        Arc::new(SystemClock),
    );

    Ok(Application { config, db_pool, service: Arc::new(service) })
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use tarif_core::config::{ConfigOverrides, LoadOptions};

    use crate::bootstrap::bootstrap;

    fn overrides(database_url: &str) -> ConfigOverrides {
        ConfigOverrides {
            database_url: Some(database_url.to_string()),
            ..ConfigOverrides::default()
        }
    }

    #[tokio::test]
    async fn bootstrap_fails_fast_on_invalid_upstream_url() {
        let result = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                demande_base_url: Some("ftp://demandes.internal".to_string()),
                ..overrides("sqlite::memory:")
            },
            ..LoadOptions::default()
        })
        .await;

        let message = result.err().expect("error").to_string();
        assert!(message.contains("upstream.demande_base_url"), "{message}");
    }

    #[tokio::test]
    async fn bootstrap_migrates_and_wires_the_service() {
        let app = bootstrap(LoadOptions { overrides: overrides("sqlite::memory:"), ..LoadOptions::default() })
            .await
            .expect("bootstrap should succeed with an in-memory database");

        let (table_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'quote'",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("query schema");
        assert_eq!(table_count, 1);

        assert!(app.service.list_quotes().await.expect("list quotes").is_empty());
        assert_eq!(app.service.calculator().coefficients().base, Decimal::from(500));

        app.db_pool.close().await;
    }
}
