use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::money::round_money;
use crate::domain::parameter::PricingParameter;
use crate::domain::route::{Route, RouteType};
use crate::domain::shipment::Shipment;

/// Parameter codes understood by [`PricingCoefficients::with_parameters`].
pub const PARAMETER_CODES: [&str; 10] = [
    "base",
    "per_km",
    "per_kg",
    "per_m3",
    "fragile_multiplier",
    "national_road_multiplier",
    "highway_multiplier",
    "urban_multiplier",
    "mixed_multiplier",
    "provider_margin_fraction",
];

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingCoefficients {
    pub currency: String,
    pub base: Decimal,
    pub per_km: Decimal,
    pub per_kg: Decimal,
    pub per_m3: Decimal,
    pub fragile_multiplier: Decimal,
    pub national_road_multiplier: Decimal,
    pub highway_multiplier: Decimal,
    pub urban_multiplier: Decimal,
    pub mixed_multiplier: Decimal,
    /// Share of the client price kept by the platform, in `[0, 1]`.
    pub provider_margin_fraction: Decimal,
}

impl Default for PricingCoefficients {
    fn default() -> Self {
        Self {
            currency: "MAD".to_string(),
            base: Decimal::from(500),
            per_km: Decimal::from(10),
            per_kg: Decimal::from(5),
            per_m3: Decimal::from(15),
            fragile_multiplier: Decimal::new(13, 1),
            national_road_multiplier: Decimal::ONE,
            highway_multiplier: Decimal::ONE,
            urban_multiplier: Decimal::ONE,
            mixed_multiplier: Decimal::ONE,
            provider_margin_fraction: Decimal::new(25, 2),
        }
    }
}

impl PricingCoefficients {
    pub fn route_multiplier(&self, route_type: RouteType) -> Decimal {
        match route_type {
            RouteType::NationalRoad => self.national_road_multiplier,
            RouteType::Highway => self.highway_multiplier,
            RouteType::Urban => self.urban_multiplier,
            RouteType::Mixed => self.mixed_multiplier,
        }
    }

    /// Active parameters replace the coefficient sharing their code; later entries win.
    pub fn with_parameters(mut self, parameters: &[PricingParameter]) -> Self {
        for parameter in parameters.iter().filter(|parameter| parameter.active) {
            if let Some(slot) = self.slot_mut(&parameter.code) {
                *slot = parameter.value;
            }
        }
        self
    }

    pub fn slot_mut(&mut self, code: &str) -> Option<&mut Decimal> {
        match code {
            "base" => Some(&mut self.base),
            "per_km" => Some(&mut self.per_km),
            "per_kg" => Some(&mut self.per_kg),
            "per_m3" => Some(&mut self.per_m3),
            "fragile_multiplier" => Some(&mut self.fragile_multiplier),
            "national_road_multiplier" => Some(&mut self.national_road_multiplier),
            "highway_multiplier" => Some(&mut self.highway_multiplier),
            "urban_multiplier" => Some(&mut self.urban_multiplier),
            "mixed_multiplier" => Some(&mut self.mixed_multiplier),
            "provider_margin_fraction" => Some(&mut self.provider_margin_fraction),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingTraceStep {
    pub stage: String,
    pub detail: String,
    pub amount: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceBreakdown {
    pub client_price: Decimal,
    pub provider_price: Decimal,
    pub service_margin: Decimal,
    pub currency: String,
    pub distance_km: Decimal,
    pub raw_total: Decimal,
    pub multiplier: Decimal,
    pub steps: Vec<PricingTraceStep>,
    /// One-line audit rendering of the steps. Not meant to be parsed.
    pub summary: String,
}

#[derive(Clone, Debug, Default)]
pub struct PricingCalculator {
    coefficients: PricingCoefficients,
}

impl PricingCalculator {
    pub fn new(coefficients: PricingCoefficients) -> Self {
        Self { coefficients }
    }

    pub fn coefficients(&self) -> &PricingCoefficients {
        &self.coefficients
    }

    /// Inputs are expected to be non-negative; callers validate upstream data first. Fails
    /// instead of panicking when a term leaves the `Decimal` range.
    pub fn compute_price(
        &self,
        shipment: &Shipment,
        route: &Route,
        route_type: RouteType,
        include_return: bool,
    ) -> Result<PriceBreakdown, PricingError> {
        let c = &self.coefficients;
        let distance = route.distance_for(include_return);

        let distance_term = checked("distance", distance.checked_mul(c.per_km))?;
        let weight_term = checked("weight", shipment.weight.checked_mul(c.per_kg))?;
        let volume_term = checked("volume", shipment.volume.checked_mul(c.per_m3))?;
        let raw_total = checked(
            "raw_total",
            c.base
                .checked_add(distance_term)
                .and_then(|total| total.checked_add(weight_term))
                .and_then(|total| total.checked_add(volume_term)),
        )?;

        let mut multiplier = Decimal::ONE;
        if shipment.is_fragile() {
            multiplier = checked("multiplier", multiplier.checked_mul(c.fragile_multiplier))?;
        }
        multiplier =
            checked("multiplier", multiplier.checked_mul(c.route_multiplier(route_type)))?;

        let client_price =
            round_money(checked("client_price", raw_total.checked_mul(multiplier))?);
        let provider_price = round_money(checked(
            "provider_price",
            client_price.checked_mul(Decimal::ONE - c.provider_margin_fraction),
        )?);
        let service_margin =
            checked("service_margin", client_price.checked_sub(provider_price))?;

        let steps = vec![
            step("base", "flat base amount".to_string(), c.base),
            step("distance", format!("{distance:.2} km x {}", c.per_km), distance_term),
            step("weight", format!("{:.2} kg x {}", shipment.weight, c.per_kg), weight_term),
            step("volume", format!("{:.2} m3 x {}", shipment.volume, c.per_m3), volume_term),
            step("raw_total", "base + distance + weight + volume".to_string(), raw_total),
            step(
                "multiplier",
                format!("fragile={} route_type={route_type}", shipment.is_fragile()),
                multiplier,
            ),
            step("client_price", "raw_total x multiplier, half-up".to_string(), client_price),
            step(
                "provider_price",
                format!("client_price x (1 - {}), half-up", c.provider_margin_fraction),
                provider_price,
            ),
        ];

        let summary = format!(
            "Base: {:.2} + Distance ({distance:.2} km): {distance_term:.2} + Weight ({:.2} kg): \
             {weight_term:.2} + Volume ({:.2} m3): {volume_term:.2} = {raw_total:.2} x \
             {multiplier:.2} = {client_price:.2} {}",
            c.base, shipment.weight, shipment.volume, c.currency
        );

        Ok(PriceBreakdown {
            client_price,
            provider_price,
            service_margin,
            currency: c.currency.clone(),
            distance_km: distance,
            raw_total,
            multiplier,
            steps,
            summary,
        })
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PricingError {
    #[error("{stage} amount is outside the representable range")]
    Overflow { stage: &'static str },
}

fn checked(stage: &'static str, value: Option<Decimal>) -> Result<Decimal, PricingError> {
    value.ok_or(PricingError::Overflow { stage })
}

fn step(stage: &str, detail: String, amount: Decimal) -> PricingTraceStep {
    PricingTraceStep { stage: stage.to_string(), detail, amount }
}
