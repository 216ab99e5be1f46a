//! Wire schemas for the demande and itinerary services.
//!
//! Field names follow the upstream JSON (`poids`, `natureMarchandise`, `userId`...). English
//! aliases are accepted as well.

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::Deserialize;

use tarif_core::domain::money::decimal_from_f64;
use tarif_core::domain::route::{DriverId, Route, RouteId, Waypoint};
use tarif_core::domain::shipment::{CargoCategory, ClientId, Shipment, ShipmentId};

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DemandePayload {
    pub id: i64,
    pub client_id: i64,
    pub volume: f64,
    #[serde(alias = "weight")]
    pub poids: f64,
    #[serde(default, alias = "cargoNature")]
    pub nature_marchandise: Option<String>,
    #[serde(default, alias = "dateDeparture")]
    pub date_depart: Option<NaiveDateTime>,
    #[serde(default, alias = "cityOrigin")]
    pub ville_depart: Option<String>,
    #[serde(default, alias = "cityDestination")]
    pub ville_destination: Option<String>,
    #[serde(default, alias = "validationStatus")]
    pub statut_validation: Option<String>,
    #[serde(default, alias = "associatedRouteId")]
    pub itineraire_associe_id: Option<String>,
    #[serde(default)]
    pub distance_km: Option<f64>,
    #[serde(default, alias = "category")]
    pub categorie: Option<CategoriePayload>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoriePayload {
    #[serde(default, alias = "id")]
    pub id_categorie: Option<String>,
    #[serde(default, alias = "name")]
    pub nom: Option<String>,
    #[serde(default)]
    pub fragile: Option<bool>,
    #[serde(default, alias = "requiredTemperature")]
    pub temperature_requise: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItinerairePayload {
    pub id: String,
    #[serde(alias = "driverId")]
    pub user_id: String,
    #[serde(default)]
    pub origin_latitude: Option<f64>,
    #[serde(default)]
    pub origin_longitude: Option<f64>,
    #[serde(default)]
    pub origin_address: Option<String>,
    #[serde(default)]
    pub origin_city: Option<String>,
    #[serde(default)]
    pub destination_latitude: Option<f64>,
    #[serde(default)]
    pub destination_longitude: Option<f64>,
    #[serde(default)]
    pub destination_address: Option<String>,
    #[serde(default)]
    pub destination_city: Option<String>,
    pub distance_km: f64,
    #[serde(default)]
    pub duration_min: Option<i64>,
    #[serde(default)]
    pub return_distance_km: Option<f64>,
    #[serde(default)]
    pub return_duration_min: Option<i64>,
    #[serde(default)]
    pub total_distance_km: Option<f64>,
    #[serde(default)]
    pub total_duration_min: Option<i64>,
    #[serde(default)]
    pub include_return: Option<bool>,
    #[serde(default)]
    pub is_optimized: Option<bool>,
    #[serde(default)]
    pub optimization_type: Option<String>,
    #[serde(default)]
    pub created_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Upper bound for any distance, weight or volume read from upstream.
pub const MAX_QUANTITY: f64 = 1e12;

/// Finite, non-negative, bounded quantity or an explanation of why not.
fn quantity(field: &str, value: f64) -> Result<Decimal, String> {
    if value < 0.0 {
        return Err(format!("{field} must not be negative (got {value})"));
    }
    if value > MAX_QUANTITY {
        return Err(format!("{field} exceeds {MAX_QUANTITY} (got {value})"));
    }
    decimal_from_f64(value).ok_or_else(|| format!("{field} is not a finite number"))
}

fn optional_quantity(field: &str, value: Option<f64>) -> Result<Option<Decimal>, String> {
    value.map(|value| quantity(field, value)).transpose()
}

impl DemandePayload {
    pub fn into_shipment(self) -> Result<Shipment, String> {
        Ok(Shipment {
            id: ShipmentId(self.id),
            client_id: ClientId(self.client_id),
            volume: quantity("volume", self.volume)?,
            weight: quantity("poids", self.poids)?,
            cargo_nature: self.nature_marchandise.unwrap_or_default(),
            departure_date: self.date_depart,
            origin_city: self.ville_depart,
            destination_city: self.ville_destination,
            validation_status: self.statut_validation,
            associated_route_id: self
                .itineraire_associe_id
                .filter(|id| !id.trim().is_empty())
                .map(RouteId),
            distance_km: optional_quantity("distanceKm", self.distance_km)?,
            category: self.categorie.map(|categorie| CargoCategory {
                id: categorie.id_categorie,
                name: categorie.nom,
                fragile: categorie.fragile.unwrap_or(false),
                required_temperature: categorie.temperature_requise,
            }),
        })
    }
}

impl ItinerairePayload {
    pub fn into_route(self) -> Result<Route, String> {
        let one_way = quantity("distanceKm", self.distance_km)?;
        let round_trip = match (self.total_distance_km, self.return_distance_km) {
            (Some(total), _) => quantity("totalDistanceKm", total)?,
            (None, Some(back)) => one_way
                .checked_add(quantity("returnDistanceKm", back)?)
                .ok_or_else(|| "round-trip distance is out of range".to_string())?,
            (None, None) => {
                return Err("neither totalDistanceKm nor returnDistanceKm is present".to_string())
            }
        };
        let round_trip_duration = match self.total_duration_min {
            Some(total) => Some(total),
            None => match (self.duration_min, self.return_duration_min) {
                (Some(there), Some(back)) => Some(
                    there
                        .checked_add(back)
                        .ok_or_else(|| "round-trip duration is out of range".to_string())?,
                ),
                _ => None,
            },
        };

        Ok(Route {
            id: RouteId(self.id),
            driver_id: DriverId(self.user_id),
            origin: Waypoint {
                latitude: self.origin_latitude,
                longitude: self.origin_longitude,
                address: self.origin_address,
                city: self.origin_city,
            },
            destination: Waypoint {
                latitude: self.destination_latitude,
                longitude: self.destination_longitude,
                address: self.destination_address,
                city: self.destination_city,
            },
            distance_one_way_km: one_way,
            duration_one_way_min: self.duration_min,
            distance_round_trip_km: round_trip,
            duration_round_trip_min: round_trip_duration,
            include_return: self.include_return.unwrap_or(false),
            optimized: self.is_optimized.unwrap_or(false),
            optimization_type: self.optimization_type,
            status: self.status,
            created_at: self.created_at,
        })
    }
}
