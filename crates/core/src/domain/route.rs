use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RouteId(pub String);

impl std::fmt::Display for RouteId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DriverId(pub String);

impl std::fmt::Display for DriverId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub address: Option<String>,
    pub city: Option<String>,
}

/// A planned path ("itinéraire") as reported by the itinerary service.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub id: RouteId,
    pub driver_id: DriverId,
    pub origin: Waypoint,
    pub destination: Waypoint,
    pub distance_one_way_km: Decimal,
    pub duration_one_way_min: Option<i64>,
    pub distance_round_trip_km: Decimal,
    pub duration_round_trip_min: Option<i64>,
    pub include_return: bool,
    pub optimized: bool,
    pub optimization_type: Option<String>,
    pub status: Option<String>,
    pub created_at: Option<NaiveDateTime>,
}

impl Route {
    pub fn distance_for(&self, include_return: bool) -> Decimal {
        if include_return {
            self.distance_round_trip_km
        } else {
            self.distance_one_way_km
        }
    }
}

/// Road classification used by the pricing multipliers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RouteType {
    #[default]
    #[serde(rename = "ROUTE_NATIONALE")]
    NationalRoad,
    #[serde(rename = "AUTOROUTE")]
    Highway,
    #[serde(rename = "VILLE")]
    Urban,
    #[serde(rename = "MIXTE")]
    Mixed,
}

impl RouteType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NationalRoad => "ROUTE_NATIONALE",
            Self::Highway => "AUTOROUTE",
            Self::Urban => "VILLE",
            Self::Mixed => "MIXTE",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "ROUTE_NATIONALE" | "NATIONAL_ROAD" => Some(Self::NationalRoad),
            "AUTOROUTE" | "HIGHWAY" => Some(Self::Highway),
            "VILLE" | "URBAN" => Some(Self::Urban),
            "MIXTE" | "MIXED" => Some(Self::Mixed),
            _ => None,
        }
    }
}

impl std::fmt::Display for RouteType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::RouteType;

    #[test]
    fn route_type_accepts_wire_and_english_names() {
        assert_eq!(RouteType::parse("ROUTE_NATIONALE"), Some(RouteType::NationalRoad));
        assert_eq!(RouteType::parse("highway"), Some(RouteType::Highway));
        assert_eq!(RouteType::parse(" ville "), Some(RouteType::Urban));
        assert_eq!(RouteType::parse("teleport"), None);
        assert_eq!(RouteType::default(), RouteType::NationalRoad);
    }

    #[test]
    fn route_type_serializes_with_wire_names() {
        let json = serde_json::to_string(&RouteType::Mixed).expect("serialize");
        assert_eq!(json, "\"MIXTE\"");
    }
}
