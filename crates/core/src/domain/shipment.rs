use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::route::RouteId;

pub const AMBIENT_TEMPERATURE: &str = "ambient";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ShipmentId(pub i64);

impl std::fmt::Display for ShipmentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientId(pub i64);

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CargoCategory {
    pub id: Option<String>,
    pub name: Option<String>,
    pub fragile: bool,
    pub required_temperature: Option<String>,
}

/// A transport request ("demande") as reported by the demande service.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Shipment {
    pub id: ShipmentId,
    pub client_id: ClientId,
    /// Cubic meters.
    pub volume: Decimal,
    /// Kilograms.
    pub weight: Decimal,
    pub cargo_nature: String,
    pub departure_date: Option<NaiveDateTime>,
    pub origin_city: Option<String>,
    pub destination_city: Option<String>,
    pub validation_status: Option<String>,
    pub associated_route_id: Option<RouteId>,
    pub distance_km: Option<Decimal>,
    pub category: Option<CargoCategory>,
}

impl Shipment {
    pub fn is_fragile(&self) -> bool {
        self.category.as_ref().map(|category| category.fragile).unwrap_or(false)
    }

    pub fn required_temperature(&self) -> String {
        self.category
            .as_ref()
            .and_then(|category| category.required_temperature.clone())
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| AMBIENT_TEMPERATURE.to_string())
    }
}
