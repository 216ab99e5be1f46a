use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::route::{DriverId, Route, RouteId, RouteType};
use crate::domain::shipment::{ClientId, Shipment, ShipmentId};
use crate::errors::TransitionError;
use crate::pricing::PriceBreakdown;

pub const QUOTE_VALIDITY_DAYS: i64 = 7;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuoteId(pub String);

impl QuoteId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl std::fmt::Display for QuoteId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuoteStatus {
    Pending,
    Validated,
    Paid,
    Rejected,
    Cancelled,
    Expired,
}

impl QuoteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Validated => "validated",
            Self::Paid => "paid",
            Self::Rejected => "rejected",
            Self::Cancelled => "cancelled",
            Self::Expired => "expired",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "validated" => Some(Self::Validated),
            "paid" => Some(Self::Paid),
            "rejected" => Some(Self::Rejected),
            "cancelled" => Some(Self::Cancelled),
            "expired" => Some(Self::Expired),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Paid | Self::Rejected | Self::Cancelled | Self::Expired)
    }

    /// Live quotes block a new quote for the same shipment/route pair.
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Pending | Self::Validated | Self::Paid)
    }
}

impl std::fmt::Display for QuoteStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A priced offer for moving a shipment along a route.
///
/// Shipment and route figures are snapshots taken at quote time and are never refreshed.
/// `version` increases by one on every state change and backs optimistic concurrency in
/// the store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub id: QuoteId,
    pub version: u32,
    pub shipment_id: ShipmentId,
    pub route_id: RouteId,
    pub client_id: ClientId,
    pub driver_id: DriverId,
    pub volume: Decimal,
    pub weight: Decimal,
    pub distance_km: Decimal,
    pub cargo_nature: String,
    pub fragile: bool,
    pub required_temperature: String,
    pub client_price: Decimal,
    pub provider_price: Decimal,
    pub service_margin: Decimal,
    pub currency: String,
    pub calculation_detail: String,
    pub route_type: RouteType,
    pub include_return: bool,
    pub status: QuoteStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub validated_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl Quote {
    pub fn from_pricing(
        shipment: &Shipment,
        route: &Route,
        route_type: RouteType,
        include_return: bool,
        breakdown: &PriceBreakdown,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: QuoteId::generate(),
            version: 1,
            shipment_id: shipment.id,
            route_id: route.id.clone(),
            client_id: shipment.client_id,
            driver_id: route.driver_id.clone(),
            volume: shipment.volume,
            weight: shipment.weight,
            distance_km: breakdown.distance_km,
            cargo_nature: shipment.cargo_nature.clone(),
            fragile: shipment.is_fragile(),
            required_temperature: shipment.required_temperature(),
            client_price: breakdown.client_price,
            provider_price: breakdown.provider_price,
            service_margin: breakdown.service_margin,
            currency: breakdown.currency.clone(),
            calculation_detail: breakdown.summary.clone(),
            route_type,
            include_return,
            status: QuoteStatus::Pending,
            created_at,
            expires_at: created_at + Duration::days(QUOTE_VALIDITY_DAYS),
            validated_at: None,
            paid_at: None,
            updated_at: created_at,
        }
    }

    pub fn can_transition_to(&self, next: QuoteStatus) -> bool {
        matches!(
            (self.status, next),
            (QuoteStatus::Pending, QuoteStatus::Validated)
                | (QuoteStatus::Pending, QuoteStatus::Rejected)
                | (QuoteStatus::Pending, QuoteStatus::Cancelled)
                | (QuoteStatus::Pending, QuoteStatus::Expired)
                | (QuoteStatus::Validated, QuoteStatus::Paid)
                | (QuoteStatus::Validated, QuoteStatus::Cancelled)
        )
    }

    pub fn is_past_expiration(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Pending quotes whose validity window has closed.
    pub fn is_sweepable(&self, now: DateTime<Utc>) -> bool {
        self.status == QuoteStatus::Pending && self.is_past_expiration(now)
    }

    /// Expiration is checked before status.
    pub fn ensure_validatable(&self, now: DateTime<Utc>) -> Result<(), TransitionError> {
        if self.is_past_expiration(now) {
            return Err(TransitionError::Expired { expired_at: self.expires_at });
        }
        match self.status {
            QuoteStatus::Pending => Ok(()),
            status => Err(TransitionError::already(status)),
        }
    }

    pub fn ensure_payable(&self, now: DateTime<Utc>) -> Result<(), TransitionError> {
        if self.status == QuoteStatus::Paid {
            return Err(TransitionError::AlreadyPaid);
        }
        if self.status != QuoteStatus::Validated {
            return Err(TransitionError::NotValidated { status: self.status });
        }
        if self.is_past_expiration(now) {
            return Err(TransitionError::Expired { expired_at: self.expires_at });
        }
        Ok(())
    }

    pub fn validate(&mut self, now: DateTime<Utc>) -> Result<(), TransitionError> {
        self.ensure_validatable(now)?;
        self.apply(QuoteStatus::Validated, now);
        self.validated_at = Some(now);
        Ok(())
    }

    pub fn pay(&mut self, now: DateTime<Utc>) -> Result<(), TransitionError> {
        self.ensure_payable(now)?;
        self.apply(QuoteStatus::Paid, now);
        self.paid_at = Some(now);
        Ok(())
    }

    pub fn expire(&mut self, now: DateTime<Utc>) -> Result<(), TransitionError> {
        if !self.is_sweepable(now) {
            return Err(match self.status {
                QuoteStatus::Pending => TransitionError::NotYetExpired { expires_at: self.expires_at },
                status => TransitionError::already(status),
            });
        }
        self.apply(QuoteStatus::Expired, now);
        Ok(())
    }

    fn apply(&mut self, next: QuoteStatus, now: DateTime<Utc>) {
        debug_assert!(self.can_transition_to(next));
        self.status = next;
        self.version += 1;
        self.updated_at = now;
    }
}


#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::fixtures::quote_at;
    use super::QuoteStatus;
    use crate::errors::TransitionError;

    fn t0() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).single().expect("valid timestamp")
    }

    #[test]
    fn validate_then_pay_walks_the_happy_path() {
        let mut quote = quote_at(t0());
        quote.validate(t0() + Duration::hours(1)).expect("pending -> validated");
        assert_eq!(quote.status, QuoteStatus::Validated);
        assert_eq!(quote.validated_at, Some(t0() + Duration::hours(1)));
        assert_eq!(quote.version, 2);

        quote.pay(t0() + Duration::hours(2)).expect("validated -> paid");
        assert_eq!(quote.status, QuoteStatus::Paid);
        assert_eq!(quote.paid_at, Some(t0() + Duration::hours(2)));
        assert_eq!(quote.version, 3);
    }

    #[test]
    fn second_validation_is_rejected_without_touching_timestamp() {
        let mut quote = quote_at(t0());
        quote.validate(t0()).expect("first validation");
        let error = quote.validate(t0() + Duration::minutes(5)).expect_err("second validation");

        assert_eq!(error, TransitionError::AlreadyValidated);
        assert_eq!(quote.validated_at, Some(t0()));
        assert_eq!(quote.version, 2);
    }

    #[test]
    fn validation_reports_expiry_before_status() {
        let mut quote = quote_at(t0());
        quote.status = QuoteStatus::Rejected;
        let error = quote.validate(t0() + Duration::days(8)).expect_err("expired");
        assert!(matches!(error, TransitionError::Expired { .. }));
        assert_eq!(quote.status, QuoteStatus::Rejected);
    }

    #[test]
    fn validation_guard_names_each_terminal_status() {
        let cases = [
            (QuoteStatus::Rejected, TransitionError::AlreadyRejected),
            (QuoteStatus::Paid, TransitionError::AlreadyPaid),
            (QuoteStatus::Cancelled, TransitionError::AlreadyCancelled),
            (QuoteStatus::Expired, TransitionError::AlreadyExpired),
        ];
        for (status, expected) in cases {
            let mut quote = quote_at(t0());
            quote.status = status;
            assert_eq!(quote.validate(t0()).expect_err("guarded"), expected);
        }
    }

    #[test]
    fn pay_requires_validation_and_reports_paid_distinctly() {
        let mut quote = quote_at(t0());
        let error = quote.pay(t0()).expect_err("pending cannot be paid");
        assert_eq!(error, TransitionError::NotValidated { status: QuoteStatus::Pending });

        quote.status = QuoteStatus::Paid;
        assert_eq!(quote.pay(t0()).expect_err("paid"), TransitionError::AlreadyPaid);
    }

    #[test]
    fn pay_after_expiration_fails_even_when_validated() {
        let mut quote = quote_at(t0());
        quote.validate(t0()).expect("validate");
        let error = quote.pay(t0() + Duration::days(7) + Duration::seconds(1)).expect_err("late");
        assert!(matches!(error, TransitionError::Expired { .. }));
        assert_eq!(quote.status, QuoteStatus::Validated);
    }

    #[test]
    fn expiration_boundary_is_exclusive() {
        let quote = quote_at(t0());
        assert!(!quote.is_sweepable(quote.expires_at));
        assert!(quote.is_sweepable(quote.expires_at + Duration::seconds(1)));
    }

    #[test]
    fn only_pending_quotes_expire() {
        let late = t0() + Duration::days(30);
        let mut quote = quote_at(t0());
        quote.expire(late).expect("pending -> expired");
        assert_eq!(quote.status, QuoteStatus::Expired);

        let mut validated = quote_at(t0());
        validated.status = QuoteStatus::Validated;
        assert_eq!(validated.expire(late).expect_err("validated"), TransitionError::AlreadyValidated);

        let mut fresh = quote_at(t0());
        assert!(matches!(
            fresh.expire(t0()).expect_err("not yet"),
            TransitionError::NotYetExpired { .. }
        ));
    }

    #[test]
    fn no_transition_reenters_pending() {
        let statuses = [
            QuoteStatus::Pending,
            QuoteStatus::Validated,
            QuoteStatus::Paid,
            QuoteStatus::Rejected,
            QuoteStatus::Cancelled,
            QuoteStatus::Expired,
        ];
        for status in statuses {
            let mut quote = quote_at(t0());
            quote.status = status;
            assert!(!quote.can_transition_to(QuoteStatus::Pending));
        }
    }

    #[test]
    fn status_storage_form_round_trips() {
        for status in [QuoteStatus::Pending, QuoteStatus::Paid, QuoteStatus::Expired] {
            assert_eq!(QuoteStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(QuoteStatus::parse("draft"), None);
    }
}
