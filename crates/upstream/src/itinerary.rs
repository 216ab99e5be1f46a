use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use tarif_core::domain::route::{Route, RouteId};

use crate::credential::BearerCredential;
use crate::error::GatewayError;
use crate::http::{build_client, get_json, Target};
use crate::payload::ItinerairePayload;

const SERVICE: &str = "itinerary";

#[async_trait]
pub trait ItineraryGateway: Send + Sync {
    async fn fetch_by_id(
        &self,
        id: &RouteId,
        credential: &BearerCredential,
    ) -> Result<Route, GatewayError>;
}

/// `GET {base}/routes/{id}`.
pub struct HttpItineraryGateway {
    client: Client,
    routes_url: String,
}

impl HttpItineraryGateway {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, GatewayError> {
        Ok(Self { client: build_client(SERVICE, timeout)?, routes_url: routes_url(&base_url.into()) })
    }

    pub fn routes_url(&self) -> &str {
        &self.routes_url
    }
}

/// Appends `/routes` unless the last path segment already names that collection.
fn routes_url(base_url: &str) -> String {
    let trimmed = base_url.trim_end_matches('/');
    if trimmed.ends_with("/routes") {
        trimmed.to_string()
    } else {
        format!("{trimmed}/routes")
    }
}

#[async_trait]
impl ItineraryGateway for HttpItineraryGateway {
    async fn fetch_by_id(
        &self,
        id: &RouteId,
        credential: &BearerCredential,
    ) -> Result<Route, GatewayError> {
        let url = format!("{}/{}", self.routes_url, id);
        tracing::debug!(event_name = "upstream.itinerary.fetch", route_id = %id, "fetching route");

        let payload: ItinerairePayload = get_json(
            &self.client,
            &url,
            credential,
            Target { service: SERVICE, resource: "route", id: Some(&id.0) },
        )
        .await?;
        payload
            .into_route()
            .map_err(|reason| GatewayError::InvalidPayload { service: SERVICE, reason })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::extract::Path;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::{Json, Router};
    use rust_decimal::Decimal;
    use serde_json::{json, Value};
    use tokio::net::TcpListener;

    use tarif_core::domain::route::RouteId;

    use super::{routes_url, HttpItineraryGateway, ItineraryGateway};
    use crate::credential::BearerCredential;
    use crate::error::GatewayError;

    #[test]
    fn routes_segment_is_appended_once() {
        assert_eq!(routes_url("http://itn:8082/api"), "http://itn:8082/api/routes");
        assert_eq!(routes_url("http://itn:8082/api/routes/"), "http://itn:8082/api/routes");
        assert_eq!(
            routes_url("http://host/routes-svc/api"),
            "http://host/routes-svc/api/routes"
        );
        assert_eq!(routes_url("http://host/routes/v2"), "http://host/routes/v2/routes");
    }

    async fn route(Path(id): Path<String>) -> Result<Json<Value>, StatusCode> {
        match id.as_str() {
            "R-1" => Ok(Json(json!({
                "id": "R-1",
                "userId": "driver-3",
                "originCity": "Casablanca",
                "destinationCity": "Rabat",
                "distanceKm": 100.0,
                "durationMin": 75,
                "totalDistanceKm": 180.0,
                "totalDurationMin": 140,
                "includeReturn": true,
                "isOptimized": true,
                "optimizationType": "DISTANCE",
                "createdAt": "2026-04-01T10:00:00.123"
            }))),
            "far" => Ok(Json(json!({
                "id": "far",
                "userId": "driver-3",
                "distanceKm": 5e28,
                "returnDistanceKm": 5e28
            }))),
            "slow" => {
                tokio::time::sleep(Duration::from_secs(2)).await;
                Err(StatusCode::NOT_FOUND)
            }
            _ => Err(StatusCode::NOT_FOUND),
        }
    }

    async fn gateway(timeout: Duration) -> HttpItineraryGateway {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        let app = Router::new().route("/api/routes/{id}", get(route));
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        HttpItineraryGateway::new(format!("http://{addr}/api"), timeout).expect("gateway")
    }

    fn credential() -> BearerCredential {
        BearerCredential::new("token-1").expect("credential")
    }

    #[tokio::test]
    async fn fetch_by_id_decodes_route() {
        let gateway = gateway(Duration::from_secs(2)).await;
        let route =
            gateway.fetch_by_id(&RouteId("R-1".to_string()), &credential()).await.expect("route");

        assert_eq!(route.driver_id.0, "driver-3");
        assert_eq!(route.distance_one_way_km, Decimal::from(100));
        assert_eq!(route.distance_round_trip_km, Decimal::from(180));
        assert!(route.optimized);
        assert!(route.created_at.is_some());
    }

    #[tokio::test]
    async fn unknown_route_is_not_found() {
        let gateway = gateway(Duration::from_secs(2)).await;
        let result = gateway.fetch_by_id(&RouteId("R-404".to_string()), &credential()).await;
        assert_eq!(
            result,
            Err(GatewayError::NotFound { resource: "route", id: "R-404".to_string() })
        );
    }

    #[tokio::test]
    async fn out_of_range_distance_is_an_invalid_payload() {
        let gateway = gateway(Duration::from_secs(2)).await;
        let result = gateway.fetch_by_id(&RouteId("far".to_string()), &credential()).await;
        assert!(matches!(result, Err(GatewayError::InvalidPayload { service: "itinerary", .. })));
    }

    #[tokio::test]
    async fn slow_upstream_times_out_as_unavailable() {
        let gateway = gateway(Duration::from_millis(200)).await;
        let result = gateway.fetch_by_id(&RouteId("slow".to_string()), &credential()).await;
        assert!(matches!(result, Err(GatewayError::Unavailable { .. })));
    }
}
