use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use tarif_core::clock::Clock;
use tarif_core::domain::quote::{Quote, QuoteId};
use tarif_core::domain::route::{DriverId, Route, RouteId, RouteType};
use tarif_core::domain::shipment::{ClientId, Shipment, ShipmentId};
use tarif_core::errors::{ApplicationError, TransitionError};
use tarif_core::pricing::PricingCalculator;
use tarif_db::{QuoteRepository, RepositoryError};
use tarif_upstream::{BearerCredential, DemandeGateway, ItineraryGateway};

use crate::context::OperationContext;
use crate::expirer::{QuoteExpirer, SweepReport};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreateQuoteRequest {
    pub shipment_id: ShipmentId,
    pub route_id: RouteId,
    pub route_type: RouteType,
    pub include_return: bool,
}

impl CreateQuoteRequest {
    fn validate(&self) -> Result<(), ApplicationError> {
        if self.shipment_id.0 <= 0 {
            return Err(ApplicationError::Validation(format!(
                "shipment id must be positive (got {})",
                self.shipment_id
            )));
        }
        if self.route_id.0.trim().is_empty() {
            return Err(ApplicationError::Validation("route id must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Result of `create_quote`. `created` is false when a live quote for the pair was returned.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct QuoteCreation {
    pub quote: Quote,
    pub created: bool,
}

/// One row of the shipment listing, joined with its route and any existing quote.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ShipmentWithRoute {
    pub shipment: Shipment,
    pub route: Option<Route>,
    pub route_exists: bool,
    pub quote: Option<Quote>,
    pub quote_exists: bool,
}

impl ShipmentWithRoute {
    fn without_route(shipment: Shipment) -> Self {
        Self { shipment, route: None, route_exists: false, quote: None, quote_exists: false }
    }
}

#[derive(Clone, Copy, Debug)]
enum Transition {
    Validate,
    Pay,
}

impl Transition {
    fn apply(self, quote: &mut Quote, now: DateTime<Utc>) -> Result<(), TransitionError> {
        match self {
            Self::Validate => quote.validate(now),
            Self::Pay => quote.pay(now),
        }
    }

    fn guard(self, quote: &Quote, now: DateTime<Utc>) -> Result<(), TransitionError> {
        match self {
            Self::Validate => quote.ensure_validatable(now),
            Self::Pay => quote.ensure_payable(now),
        }
    }

    fn event_name(self) -> &'static str {
        match self {
            Self::Validate => "quote.lifecycle.validated",
            Self::Pay => "quote.lifecycle.paid",
        }
    }

    fn noun(self) -> &'static str {
        match self {
            Self::Validate => "validation",
            Self::Pay => "payment",
        }
    }
}

/// Creates quotes from upstream shipment and route data and drives them through
/// pending -> validated -> paid.
///
/// Transitions are read-modify-write against the store guarded by the quote's version, so two
/// concurrent attempts on one quote cannot both succeed.
pub struct QuoteLifecycleService {
    quotes: Arc<dyn QuoteRepository>,
    demandes: Arc<dyn DemandeGateway>,
    itineraries: Arc<dyn ItineraryGateway>,
    calculator: PricingCalculator,
    clock: Arc<dyn Clock>,
}

impl QuoteLifecycleService {
    pub fn new(
        quotes: Arc<dyn QuoteRepository>,
        demandes: Arc<dyn DemandeGateway>,
        itineraries: Arc<dyn ItineraryGateway>,
        calculator: PricingCalculator,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { quotes, demandes, itineraries, calculator, clock }
    }

    pub fn calculator(&self) -> &PricingCalculator {
        &self.calculator
    }

    pub fn expirer(&self) -> QuoteExpirer {
        QuoteExpirer::new(self.quotes.clone(), self.clock.clone())
    }

    pub async fn create_quote(
        &self,
        ctx: &OperationContext,
        request: CreateQuoteRequest,
        credential: &BearerCredential,
    ) -> Result<QuoteCreation, ApplicationError> {
        request.validate()?;

        let shipment = self.demandes.fetch_by_id(request.shipment_id, credential).await?;
        let route = self.itineraries.fetch_by_id(&request.route_id, credential).await?;
        let now = self.clock.now();

        if let Some(existing) = self.quotes.find_by_shipment_and_route(shipment.id, &route.id).await? {
            if existing.is_sweepable(now) {
                self.retire_stale(ctx, existing, now).await?;
            } else if existing.status.is_live() {
                info!(
                    event_name = "quote.lifecycle.reused",
                    quote_id = %existing.id,
                    correlation_id = %ctx.correlation_id,
                    status = %existing.status,
                    "live quote already exists for shipment and route"
                );
                return Ok(QuoteCreation { quote: existing, created: false });
            }
        }

        let breakdown = self.calculator.compute_price(
            &shipment,
            &route,
            request.route_type,
            request.include_return,
        )?;
        let quote = Quote::from_pricing(
            &shipment,
            &route,
            request.route_type,
            request.include_return,
            &breakdown,
            now,
        );

        match self.quotes.save(quote).await {
            Ok(saved) => {
                info!(
                    event_name = "quote.lifecycle.created",
                    quote_id = %saved.id,
                    correlation_id = %ctx.correlation_id,
                    shipment_id = %saved.shipment_id,
                    route_id = %saved.route_id,
                    client_price = %saved.client_price,
                    "quote created"
                );
                Ok(QuoteCreation { quote: saved, created: true })
            }
            Err(RepositoryError::DuplicateLiveQuote { shipment_id, route_id }) => {
                let winner = self
                    .quotes
                    .find_by_shipment_and_route(shipment_id, &route_id)
                    .await?
                    .filter(|quote| quote.status.is_live())
                    .ok_or_else(|| {
                        ApplicationError::Conflict(format!(
                            "quote for shipment {shipment_id} and route `{route_id}` changed concurrently"
                        ))
                    })?;
                info!(
                    event_name = "quote.lifecycle.reused",
                    quote_id = %winner.id,
                    correlation_id = %ctx.correlation_id,
                    "concurrent creation won by another request"
                );
                Ok(QuoteCreation { quote: winner, created: false })
            }
            Err(error) => Err(error.into()),
        }
    }

    pub async fn get_quote(&self, id: &QuoteId) -> Result<Quote, ApplicationError> {
        self.quotes
            .find_by_id(id)
            .await?
            .ok_or_else(|| ApplicationError::NotFound { entity: "quote", id: id.0.clone() })
    }

    pub async fn list_quotes_for_shipment(
        &self,
        shipment_id: ShipmentId,
    ) -> Result<Vec<Quote>, ApplicationError> {
        Ok(self.quotes.find_by_shipment_id(shipment_id).await?)
    }

    pub async fn list_quotes_for_client(
        &self,
        client_id: ClientId,
    ) -> Result<Vec<Quote>, ApplicationError> {
        Ok(self.quotes.find_by_client_id(client_id).await?)
    }

    pub async fn list_quotes_for_driver(
        &self,
        driver_id: &DriverId,
    ) -> Result<Vec<Quote>, ApplicationError> {
        Ok(self.quotes.find_by_driver_id(driver_id).await?)
    }

    pub async fn list_quotes(&self) -> Result<Vec<Quote>, ApplicationError> {
        Ok(self.quotes.find_all().await?)
    }

    /// Every shipment known upstream, with its associated route and existing quote if any.
    ///
    /// A shipment whose route cannot be fetched is still listed, with `route_exists = false`.
    pub async fn list_shipments_with_routes(
        &self,
        ctx: &OperationContext,
        credential: &BearerCredential,
    ) -> Result<Vec<ShipmentWithRoute>, ApplicationError> {
        let shipments = self.demandes.fetch_all(credential).await?;
        let mut rows = Vec::with_capacity(shipments.len());
        for shipment in shipments {
            rows.push(self.join_route(ctx, shipment, credential).await?);
        }
        Ok(rows)
    }

    pub async fn validate(
        &self,
        ctx: &OperationContext,
        id: &QuoteId,
    ) -> Result<Quote, ApplicationError> {
        self.transition(ctx, id, Transition::Validate).await
    }

    pub async fn pay(&self, ctx: &OperationContext, id: &QuoteId) -> Result<Quote, ApplicationError> {
        self.transition(ctx, id, Transition::Pay).await
    }

    pub async fn sweep_expirations(
        &self,
        ctx: &OperationContext,
    ) -> Result<SweepReport, ApplicationError> {
        self.expirer().sweep(ctx).await
    }

    async fn join_route(
        &self,
        ctx: &OperationContext,
        shipment: Shipment,
        credential: &BearerCredential,
    ) -> Result<ShipmentWithRoute, ApplicationError> {
        let Some(route_id) = shipment.associated_route_id.clone() else {
            return Ok(ShipmentWithRoute::without_route(shipment));
        };

        let route = match self.itineraries.fetch_by_id(&route_id, credential).await {
            Ok(route) => route,
            Err(error) => {
                warn!(
                    event_name = "quote.listing.route_unavailable",
                    correlation_id = %ctx.correlation_id,
                    shipment_id = %shipment.id,
                    route_id = %route_id,
                    error = %error,
                    "route lookup failed; listing shipment without it"
                );
                return Ok(ShipmentWithRoute::without_route(shipment));
            }
        };

        let quote = self.quotes.find_by_shipment_and_route(shipment.id, &route_id).await?;
        Ok(ShipmentWithRoute {
            shipment,
            route: Some(route),
            route_exists: true,
            quote_exists: quote.is_some(),
            quote,
        })
    }

    async fn transition(
        &self,
        ctx: &OperationContext,
        id: &QuoteId,
        transition: Transition,
    ) -> Result<Quote, ApplicationError> {
        let mut quote = self.get_quote(id).await?;
        let expected_version = quote.version;

        if let Err(error) = transition.apply(&mut quote, self.clock.now()) {
            info!(
                event_name = "quote.lifecycle.transition_refused",
                quote_id = %id,
                correlation_id = %ctx.correlation_id,
                transition = transition.noun(),
                reason = %error,
                "transition refused"
            );
            return Err(error.into());
        }

        match self.quotes.update_if_version(quote, expected_version).await {
            Ok(saved) => {
                info!(
                    event_name = transition.event_name(),
                    quote_id = %saved.id,
                    correlation_id = %ctx.correlation_id,
                    version = saved.version,
                    "quote transitioned"
                );
                Ok(saved)
            }
            Err(RepositoryError::VersionConflict { .. }) => {
                warn!(
                    event_name = "quote.lifecycle.conflict",
                    quote_id = %id,
                    correlation_id = %ctx.correlation_id,
                    transition = transition.noun(),
                    "quote changed concurrently"
                );
                let current = self.get_quote(id).await?;
                transition.guard(&current, self.clock.now())?;
                Err(ApplicationError::Conflict(format!(
                    "quote `{id}` changed during {}; retry",
                    transition.noun()
                )))
            }
            Err(error) => Err(error.into()),
        }
    }

    /// Expires a pending quote whose window has closed so a fresh one can take its place.
    async fn retire_stale(
        &self,
        ctx: &OperationContext,
        mut stale: Quote,
        now: DateTime<Utc>,
    ) -> Result<(), ApplicationError> {
        let expected_version = stale.version;
        stale.expire(now)?;
        match self.quotes.update_if_version(stale, expected_version).await {
            Ok(expired) => {
                info!(
                    event_name = "quote.lifecycle.expired",
                    quote_id = %expired.id,
                    correlation_id = %ctx.correlation_id,
                    "stale quote expired before re-quoting"
                );
                Ok(())
            }
            // Another writer got there first; the insert below settles who wins.
            Err(RepositoryError::VersionConflict { .. }) => Ok(()),
            Err(error) => Err(error.into()),
        }
    }
}
