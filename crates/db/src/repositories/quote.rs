use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use tarif_core::domain::quote::{Quote, QuoteId, QuoteStatus};
use tarif_core::domain::route::{DriverId, RouteId, RouteType};
use tarif_core::domain::shipment::{ClientId, ShipmentId};

use super::{QuoteRepository, RepositoryError};
use crate::DbPool;

const QUOTE_COLUMNS: &str = "id, version, shipment_id, route_id, client_id, driver_id, volume, \
     weight, distance_km, cargo_nature, fragile, required_temperature, client_price, \
     provider_price, service_margin, currency, calculation_detail, route_type, include_return, \
     status, created_at, expires_at, validated_at, paid_at, updated_at";

pub struct SqlQuoteRepository {
    pool: DbPool,
}

impl SqlQuoteRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn fetch_many(
        &self,
        filter: &str,
        bind: Option<QueryArg<'_>>,
    ) -> Result<Vec<Quote>, RepositoryError> {
        let sql = format!("SELECT {QUOTE_COLUMNS} FROM quote {filter} ORDER BY created_at ASC, id ASC");
        let query = sqlx::query(&sql);
        let query = match bind {
            Some(QueryArg::Int(value)) => query.bind(value),
            Some(QueryArg::Text(value)) => query.bind(value),
            None => query,
        };
        let rows: Vec<SqliteRow> = query.fetch_all(&self.pool).await?;
        rows.iter().map(row_to_quote).collect()
    }
}

enum QueryArg<'a> {
    Int(i64),
    Text(&'a str),
}

/// Fixed-width UTC rendering so that text comparison matches time order.
fn format_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(column: &str, raw: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("{column}: {e}")))
}

fn parse_decimal(column: &str, raw: &str) -> Result<Decimal, RepositoryError> {
    Decimal::from_str(raw).map_err(|e| RepositoryError::Decode(format!("{column}: {e}")))
}

fn get<'r, T>(row: &'r SqliteRow, column: &str) -> Result<T, RepositoryError>
where
    T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(column).map_err(|e| RepositoryError::Decode(e.to_string()))
}

fn row_to_quote(row: &SqliteRow) -> Result<Quote, RepositoryError> {
    let version: i64 = get(row, "version")?;
    let version = u32::try_from(version)
        .map_err(|_| RepositoryError::Decode(format!("version out of range: {version}")))?;

    let status_raw: String = get(row, "status")?;
    let status = QuoteStatus::parse(&status_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown quote status `{status_raw}`")))?;
    let route_type_raw: String = get(row, "route_type")?;
    let route_type = RouteType::parse(&route_type_raw).ok_or_else(|| {
        RepositoryError::Decode(format!("unknown route type `{route_type_raw}`"))
    })?;

    let validated_at: Option<String> = get(row, "validated_at")?;
    let paid_at: Option<String> = get(row, "paid_at")?;

    Ok(Quote {
        id: QuoteId(get(row, "id")?),
        version,
        shipment_id: ShipmentId(get(row, "shipment_id")?),
        route_id: RouteId(get(row, "route_id")?),
        client_id: ClientId(get(row, "client_id")?),
        driver_id: DriverId(get(row, "driver_id")?),
        volume: parse_decimal("volume", &get::<String>(row, "volume")?)?,
        weight: parse_decimal("weight", &get::<String>(row, "weight")?)?,
        distance_km: parse_decimal("distance_km", &get::<String>(row, "distance_km")?)?,
        cargo_nature: get(row, "cargo_nature")?,
        fragile: get(row, "fragile")?,
        required_temperature: get(row, "required_temperature")?,
        client_price: parse_decimal("client_price", &get::<String>(row, "client_price")?)?,
        provider_price: parse_decimal("provider_price", &get::<String>(row, "provider_price")?)?,
        service_margin: parse_decimal("service_margin", &get::<String>(row, "service_margin")?)?,
        currency: get(row, "currency")?,
        calculation_detail: get(row, "calculation_detail")?,
        route_type,
        include_return: get(row, "include_return")?,
        status,
        created_at: parse_timestamp("created_at", &get::<String>(row, "created_at")?)?,
        expires_at: parse_timestamp("expires_at", &get::<String>(row, "expires_at")?)?,
        validated_at: validated_at.map(|raw| parse_timestamp("validated_at", &raw)).transpose()?,
        paid_at: paid_at.map(|raw| parse_timestamp("paid_at", &raw)).transpose()?,
        updated_at: parse_timestamp("updated_at", &get::<String>(row, "updated_at")?)?,
    })
}

fn map_write_error(error: sqlx::Error, quote: &Quote) -> RepositoryError {
    if let sqlx::Error::Database(db) = &error {
        if db.is_unique_violation() {
            return RepositoryError::DuplicateLiveQuote {
                shipment_id: quote.shipment_id,
                route_id: quote.route_id.clone(),
            };
        }
    }
    RepositoryError::Database(error)
}

#[async_trait::async_trait]
impl QuoteRepository for SqlQuoteRepository {
    async fn find_by_id(&self, id: &QuoteId) -> Result<Option<Quote>, RepositoryError> {
        let sql = format!("SELECT {QUOTE_COLUMNS} FROM quote WHERE id = ?");
        let row = sqlx::query(&sql).bind(&id.0).fetch_optional(&self.pool).await?;

        match row {
            Some(ref r) => Ok(Some(row_to_quote(r)?)),
            None => Ok(None),
        }
    }

    async fn find_by_shipment_and_route(
        &self,
        shipment_id: ShipmentId,
        route_id: &RouteId,
    ) -> Result<Option<Quote>, RepositoryError> {
        let sql = format!(
            "SELECT {QUOTE_COLUMNS} FROM quote WHERE shipment_id = ? AND route_id = ?
             ORDER BY created_at DESC, id DESC LIMIT 1"
        );
        let row = sqlx::query(&sql)
            .bind(shipment_id.0)
            .bind(&route_id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_quote).transpose()
    }

    async fn find_by_shipment_id(
        &self,
        shipment_id: ShipmentId,
    ) -> Result<Vec<Quote>, RepositoryError> {
        self.fetch_many("WHERE shipment_id = ?", Some(QueryArg::Int(shipment_id.0))).await
    }

    async fn find_by_client_id(&self, client_id: ClientId) -> Result<Vec<Quote>, RepositoryError> {
        self.fetch_many("WHERE client_id = ?", Some(QueryArg::Int(client_id.0))).await
    }

    async fn find_by_driver_id(
        &self,
        driver_id: &DriverId,
    ) -> Result<Vec<Quote>, RepositoryError> {
        self.fetch_many("WHERE driver_id = ?", Some(QueryArg::Text(&driver_id.0))).await
    }

    async fn find_all(&self) -> Result<Vec<Quote>, RepositoryError> {
        self.fetch_many("", None).await
    }

    async fn save(&self, quote: Quote) -> Result<Quote, RepositoryError> {
        sqlx::query(
            "INSERT INTO quote (id, version, shipment_id, route_id, client_id, driver_id, volume,
                                weight, distance_km, cargo_nature, fragile, required_temperature,
                                client_price, provider_price, service_margin, currency,
                                calculation_detail, route_type, include_return, status,
                                created_at, expires_at, validated_at, paid_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 version = excluded.version,
                 shipment_id = excluded.shipment_id,
                 route_id = excluded.route_id,
                 client_id = excluded.client_id,
                 driver_id = excluded.driver_id,
                 volume = excluded.volume,
                 weight = excluded.weight,
                 distance_km = excluded.distance_km,
                 cargo_nature = excluded.cargo_nature,
                 fragile = excluded.fragile,
                 required_temperature = excluded.required_temperature,
                 client_price = excluded.client_price,
                 provider_price = excluded.provider_price,
                 service_margin = excluded.service_margin,
                 currency = excluded.currency,
                 calculation_detail = excluded.calculation_detail,
                 route_type = excluded.route_type,
                 include_return = excluded.include_return,
                 status = excluded.status,
                 created_at = excluded.created_at,
                 expires_at = excluded.expires_at,
                 validated_at = excluded.validated_at,
                 paid_at = excluded.paid_at,
                 updated_at = excluded.updated_at",
        )
        .bind(&quote.id.0)
        .bind(i64::from(quote.version))
        .bind(quote.shipment_id.0)
        .bind(&quote.route_id.0)
        .bind(quote.client_id.0)
        .bind(&quote.driver_id.0)
        .bind(quote.volume.to_string())
        .bind(quote.weight.to_string())
        .bind(quote.distance_km.to_string())
        .bind(&quote.cargo_nature)
        .bind(quote.fragile)
        .bind(&quote.required_temperature)
        .bind(quote.client_price.to_string())
        .bind(quote.provider_price.to_string())
        .bind(quote.service_margin.to_string())
        .bind(&quote.currency)
        .bind(&quote.calculation_detail)
        .bind(quote.route_type.as_str())
        .bind(quote.include_return)
        .bind(quote.status.as_str())
        .bind(format_timestamp(quote.created_at))
        .bind(format_timestamp(quote.expires_at))
        .bind(quote.validated_at.map(format_timestamp))
        .bind(quote.paid_at.map(format_timestamp))
        .bind(format_timestamp(quote.updated_at))
        .execute(&self.pool)
        .await
        .map_err(|error| map_write_error(error, &quote))?;

        Ok(quote)
    }

    async fn update_if_version(
        &self,
        quote: Quote,
        expected_version: u32,
    ) -> Result<Quote, RepositoryError> {
        // Snapshot columns are immutable, so only lifecycle columns are written.
        let result = sqlx::query(
            "UPDATE quote
             SET version = ?, status = ?, validated_at = ?, paid_at = ?, updated_at = ?
             WHERE id = ? AND version = ?",
        )
        .bind(i64::from(quote.version))
        .bind(quote.status.as_str())
        .bind(quote.validated_at.map(format_timestamp))
        .bind(quote.paid_at.map(format_timestamp))
        .bind(format_timestamp(quote.updated_at))
        .bind(&quote.id.0)
        .bind(i64::from(expected_version))
        .execute(&self.pool)
        .await
        .map_err(|error| map_write_error(error, &quote))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::VersionConflict {
                id: quote.id.0.clone(),
                expected_version,
            });
        }

        Ok(quote)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal::Decimal;

    use tarif_core::domain::quote::{Quote, QuoteId, QuoteStatus};
    use tarif_core::domain::route::{DriverId, RouteId, RouteType};
    use tarif_core::domain::shipment::{ClientId, ShipmentId};

    use super::SqlQuoteRepository;
    use crate::repositories::{QuoteRepository, RepositoryError};
    use crate::{connect_with_settings, migrations};

    async fn setup() -> SqlQuoteRepository {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        SqlQuoteRepository::new(pool)
    }

    fn sample_quote(id: &str, shipment: i64, route: &str, minutes: i64) -> Quote {
        let created_at = Utc.with_ymd_and_hms(2026, 4, 2, 8, 0, 0).single().expect("timestamp")
            + Duration::minutes(minutes);
        Quote {
            id: QuoteId(id.to_string()),
            version: 1,
            shipment_id: ShipmentId(shipment),
            route_id: RouteId(route.to_string()),
            client_id: ClientId(42),
            driver_id: DriverId("driver-7".to_string()),
            volume: Decimal::new(25, 1),
            weight: Decimal::from(50),
            distance_km: Decimal::from(180),
            cargo_nature: "pallets".to_string(),
            fragile: true,
            required_temperature: "2-8C".to_string(),
            client_price: Decimal::new(335400, 2),
            provider_price: Decimal::new(251550, 2),
            service_margin: Decimal::new(83850, 2),
            currency: "MAD".to_string(),
            calculation_detail: "Base: 500.00 ...".to_string(),
            route_type: RouteType::Highway,
            include_return: true,
            status: QuoteStatus::Pending,
            created_at,
            expires_at: created_at + Duration::days(7),
            validated_at: None,
            paid_at: None,
            updated_at: created_at,
        }
    }

    #[tokio::test]
    async fn save_and_find_by_id_round_trips_every_field() {
        let repo = setup().await;
        let quote = sample_quote("Q-1", 7, "R-1", 0);

        repo.save(quote.clone()).await.expect("save");
        let found = repo.find_by_id(&quote.id).await.expect("find").expect("exists");

        assert_eq!(found, quote);
        assert_eq!(found.provider_price.to_string(), "2515.50");
    }

    #[tokio::test]
    async fn find_by_id_returns_none_for_unknown_quote() {
        let repo = setup().await;
        let found = repo.find_by_id(&QuoteId("missing".to_string())).await.expect("find");
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn listings_filter_by_shipment_client_and_driver() {
        let repo = setup().await;
        repo.save(sample_quote("Q-1", 7, "R-1", 0)).await.expect("save 1");
        repo.save(sample_quote("Q-2", 7, "R-2", 1)).await.expect("save 2");
        let mut other = sample_quote("Q-3", 8, "R-1", 2);
        other.client_id = ClientId(99);
        other.driver_id = DriverId("driver-8".to_string());
        repo.save(other).await.expect("save 3");

        let by_shipment = repo.find_by_shipment_id(ShipmentId(7)).await.expect("by shipment");
        let ids: Vec<_> = by_shipment.iter().map(|q| q.id.0.as_str()).collect();
        assert_eq!(ids, vec!["Q-1", "Q-2"]);

        assert_eq!(repo.find_by_client_id(ClientId(99)).await.expect("by client").len(), 1);
        assert_eq!(
            repo.find_by_driver_id(&DriverId("driver-7".to_string()))
                .await
                .expect("by driver")
                .len(),
            2
        );
        assert_eq!(repo.find_all().await.expect("all").len(), 3);
    }

    #[tokio::test]
    async fn find_by_shipment_and_route_returns_latest() {
        let repo = setup().await;
        let mut old = sample_quote("Q-old", 7, "R-1", 0);
        old.status = QuoteStatus::Expired;
        repo.save(old).await.expect("save old");
        repo.save(sample_quote("Q-new", 7, "R-1", 30)).await.expect("save new");

        let found = repo
            .find_by_shipment_and_route(ShipmentId(7), &RouteId("R-1".to_string()))
            .await
            .expect("find")
            .expect("exists");
        assert_eq!(found.id.0, "Q-new");
    }

    #[tokio::test]
    async fn second_live_quote_for_same_pair_is_rejected() {
        let repo = setup().await;
        repo.save(sample_quote("Q-1", 7, "R-1", 0)).await.expect("save first");

        let error = repo.save(sample_quote("Q-2", 7, "R-1", 1)).await.expect_err("duplicate");
        assert!(matches!(error, RepositoryError::DuplicateLiveQuote { .. }));

        let mut expired = sample_quote("Q-3", 7, "R-1", 2);
        expired.status = QuoteStatus::Expired;
        repo.save(expired).await.expect("terminal quotes do not count as live");
    }

    #[tokio::test]
    async fn update_if_version_rejects_stale_writer() {
        let repo = setup().await;
        let quote = sample_quote("Q-1", 7, "R-1", 0);
        repo.save(quote.clone()).await.expect("save");

        let now = quote.created_at + Duration::hours(1);
        let mut first = quote.clone();
        first.validate(now).expect("validate");
        let mut second = quote.clone();
        second.validate(now).expect("validate");

        repo.update_if_version(first, 1).await.expect("first writer wins");
        let error = repo.update_if_version(second, 1).await.expect_err("stale writer");
        assert!(matches!(error, RepositoryError::VersionConflict { expected_version: 1, .. }));

        let stored = repo.find_by_id(&quote.id).await.expect("find").expect("exists");
        assert_eq!(stored.status, QuoteStatus::Validated);
        assert_eq!(stored.version, 2);
        assert_eq!(stored.validated_at, Some(now));
    }
}
