use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use tarif_core::domain::route::{Route, RouteId};
use tarif_core::domain::shipment::{Shipment, ShipmentId};

use crate::credential::BearerCredential;
use crate::demande::DemandeGateway;
use crate::error::GatewayError;
use crate::itinerary::ItineraryGateway;

/// Fixed set of shipments, for tests and offline runs. Any non-empty credential is accepted.
#[derive(Default)]
pub struct StaticDemandeGateway {
    shipments: RwLock<Vec<Shipment>>,
    failure: RwLock<Option<GatewayError>>,
}

impl StaticDemandeGateway {
    pub fn new(shipments: Vec<Shipment>) -> Self {
        Self { shipments: RwLock::new(shipments), failure: RwLock::new(None) }
    }

    pub async fn insert(&self, shipment: Shipment) {
        let mut shipments = self.shipments.write().await;
        shipments.retain(|existing| existing.id != shipment.id);
        shipments.push(shipment);
    }

    /// Every subsequent call fails with `error` until cleared with `None`.
    pub async fn fail_with(&self, error: Option<GatewayError>) {
        *self.failure.write().await = error;
    }
}

#[async_trait]
impl DemandeGateway for StaticDemandeGateway {
    async fn fetch_by_id(
        &self,
        id: ShipmentId,
        _credential: &BearerCredential,
    ) -> Result<Shipment, GatewayError> {
        if let Some(error) = self.failure.read().await.clone() {
            return Err(error);
        }
        let shipments = self.shipments.read().await;
        shipments
            .iter()
            .find(|shipment| shipment.id == id)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound { resource: "shipment", id: id.to_string() })
    }

    async fn fetch_all(&self, _credential: &BearerCredential) -> Result<Vec<Shipment>, GatewayError> {
        if let Some(error) = self.failure.read().await.clone() {
            return Err(error);
        }
        Ok(self.shipments.read().await.clone())
    }
}

/// Fixed set of routes. Individual routes can be made to fail.
#[derive(Default)]
pub struct StaticItineraryGateway {
    routes: RwLock<HashMap<String, Route>>,
    failures: RwLock<HashMap<String, GatewayError>>,
}

impl StaticItineraryGateway {
    pub fn new(routes: Vec<Route>) -> Self {
        let routes = routes.into_iter().map(|route| (route.id.0.clone(), route)).collect();
        Self { routes: RwLock::new(routes), failures: RwLock::default() }
    }

    pub async fn insert(&self, route: Route) {
        self.routes.write().await.insert(route.id.0.clone(), route);
    }

    pub async fn fail_route(&self, id: &RouteId, error: GatewayError) {
        self.failures.write().await.insert(id.0.clone(), error);
    }
}

#[async_trait]
impl ItineraryGateway for StaticItineraryGateway {
    async fn fetch_by_id(
        &self,
        id: &RouteId,
        _credential: &BearerCredential,
    ) -> Result<Route, GatewayError> {
        if let Some(error) = self.failures.read().await.get(&id.0).cloned() {
            return Err(error);
        }
        self.routes
            .read()
            .await
            .get(&id.0)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound { resource: "route", id: id.0.clone() })
    }
}
