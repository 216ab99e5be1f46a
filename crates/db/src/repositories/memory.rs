use std::collections::HashMap;

use tokio::sync::RwLock;

use tarif_core::domain::quote::{Quote, QuoteId};
use tarif_core::domain::route::{DriverId, RouteId};
use tarif_core::domain::shipment::{ClientId, ShipmentId};

use super::{QuoteRepository, RepositoryError};

/// Map-backed store with the same uniqueness and version rules as the SQL store.
#[derive(Default)]
pub struct InMemoryQuoteRepository {
    quotes: RwLock<HashMap<String, Quote>>,
}

impl InMemoryQuoteRepository {
    async fn collect<F>(&self, keep: F) -> Vec<Quote>
    where
        F: Fn(&Quote) -> bool,
    {
        let quotes = self.quotes.read().await;
        let mut matching: Vec<Quote> = quotes.values().filter(|q| keep(*q)).cloned().collect();
        matching.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.0.cmp(&b.id.0)));
        matching
    }
}

fn conflicts_with_live_pair(existing: &Quote, incoming: &Quote) -> bool {
    existing.id != incoming.id
        && existing.shipment_id == incoming.shipment_id
        && existing.route_id == incoming.route_id
        && existing.status.is_live()
        && incoming.status.is_live()
}

#[async_trait::async_trait]
impl QuoteRepository for InMemoryQuoteRepository {
    async fn find_by_id(&self, id: &QuoteId) -> Result<Option<Quote>, RepositoryError> {
        let quotes = self.quotes.read().await;
        Ok(quotes.get(&id.0).cloned())
    }

    async fn find_by_shipment_and_route(
        &self,
        shipment_id: ShipmentId,
        route_id: &RouteId,
    ) -> Result<Option<Quote>, RepositoryError> {
        let matching =
            self.collect(|q| q.shipment_id == shipment_id && &q.route_id == route_id).await;
        Ok(matching.into_iter().last())
    }

    async fn find_by_shipment_id(
        &self,
        shipment_id: ShipmentId,
    ) -> Result<Vec<Quote>, RepositoryError> {
        Ok(self.collect(|q| q.shipment_id == shipment_id).await)
    }

    async fn find_by_client_id(&self, client_id: ClientId) -> Result<Vec<Quote>, RepositoryError> {
        Ok(self.collect(|q| q.client_id == client_id).await)
    }

    async fn find_by_driver_id(
        &self,
        driver_id: &DriverId,
    ) -> Result<Vec<Quote>, RepositoryError> {
        Ok(self.collect(|q| &q.driver_id == driver_id).await)
    }

    async fn find_all(&self) -> Result<Vec<Quote>, RepositoryError> {
        Ok(self.collect(|_| true).await)
    }

    async fn save(&self, quote: Quote) -> Result<Quote, RepositoryError> {
        let mut quotes = self.quotes.write().await;
        if quotes.values().any(|existing| conflicts_with_live_pair(existing, &quote)) {
            return Err(RepositoryError::DuplicateLiveQuote {
                shipment_id: quote.shipment_id,
                route_id: quote.route_id.clone(),
            });
        }
        quotes.insert(quote.id.0.clone(), quote.clone());
        Ok(quote)
    }

    async fn update_if_version(
        &self,
        quote: Quote,
        expected_version: u32,
    ) -> Result<Quote, RepositoryError> {
        let mut quotes = self.quotes.write().await;
        let current_version = quotes.get(&quote.id.0).map(|stored| stored.version);
        if current_version != Some(expected_version) {
            return Err(RepositoryError::VersionConflict {
                id: quote.id.0.clone(),
                expected_version,
            });
        }
        quotes.insert(quote.id.0.clone(), quote.clone());
        Ok(quote)
    }
}
