use async_trait::async_trait;
use thiserror::Error;

use tarif_core::domain::quote::{Quote, QuoteId};
use tarif_core::domain::route::{DriverId, RouteId};
use tarif_core::domain::shipment::{ClientId, ShipmentId};
use tarif_core::errors::ApplicationError;

pub mod memory;
pub mod quote;

pub use memory::InMemoryQuoteRepository;
pub use quote::SqlQuoteRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("quote `{id}` changed since version {expected_version}")]
    VersionConflict { id: String, expected_version: u32 },
    #[error("a live quote already exists for shipment {shipment_id} and route `{route_id}`")]
    DuplicateLiveQuote { shipment_id: ShipmentId, route_id: RouteId },
}

impl From<RepositoryError> for ApplicationError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::VersionConflict { .. } | RepositoryError::DuplicateLiveQuote { .. } => {
                Self::Conflict(value.to_string())
            }
            RepositoryError::Database(_) | RepositoryError::Decode(_) => {
                Self::Persistence(value.to_string())
            }
        }
    }
}

/// Persistence for quotes. Every write replaces the whole record.
///
/// Listing methods return quotes oldest first; `find_by_shipment_and_route` returns the most
/// recently created quote for the pair.
#[async_trait]
pub trait QuoteRepository: Send + Sync {
    async fn find_by_id(&self, id: &QuoteId) -> Result<Option<Quote>, RepositoryError>;

    async fn find_by_shipment_and_route(
        &self,
        shipment_id: ShipmentId,
        route_id: &RouteId,
    ) -> Result<Option<Quote>, RepositoryError>;

    async fn find_by_shipment_id(
        &self,
        shipment_id: ShipmentId,
    ) -> Result<Vec<Quote>, RepositoryError>;

    async fn find_by_client_id(&self, client_id: ClientId) -> Result<Vec<Quote>, RepositoryError>;

    async fn find_by_driver_id(&self, driver_id: &DriverId)
        -> Result<Vec<Quote>, RepositoryError>;

    async fn find_all(&self) -> Result<Vec<Quote>, RepositoryError>;

    /// Insert or overwrite keyed by id. Fails with `DuplicateLiveQuote` when the write would
    /// leave two live quotes on the same shipment/route pair.
    async fn save(&self, quote: Quote) -> Result<Quote, RepositoryError>;

    /// Overwrite only if the stored version still equals `expected_version`.
    async fn update_if_version(
        &self,
        quote: Quote,
        expected_version: u32,
    ) -> Result<Quote, RepositoryError>;
}
