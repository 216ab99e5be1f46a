use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterKind {
    Flat,
    PerKilometer,
    PerKilogram,
    PerCubicMeter,
    Multiplier,
    Fraction,
}

impl ParameterKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Flat => "flat",
            Self::PerKilometer => "per_kilometer",
            Self::PerKilogram => "per_kilogram",
            Self::PerCubicMeter => "per_cubic_meter",
            Self::Multiplier => "multiplier",
            Self::Fraction => "fraction",
        }
    }
}

/// A named pricing coefficient. Only active parameters take part in pricing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PricingParameter {
    pub code: String,
    pub label: String,
    pub kind: ParameterKind,
    pub value: Decimal,
    pub active: bool,
}
