//! JSON API for the quote lifecycle.
//!
//! - `POST /api/tarification/quotes`                  create (or return the live) quote
//! - `GET  /api/tarification/quotes`                  list, optionally `?client_id=` or `?driver_id=`
//! - `GET  /api/tarification/quotes/{id}`             fetch one quote
//! - `PUT  /api/tarification/quotes/{id}/validate`    pending -> validated
//! - `POST /api/tarification/quotes/{id}/payment`     validated -> paid
//! - `GET  /api/tarification/shipments/{id}/quotes`   quotes for one shipment
//! - `GET  /api/tarification/shipments/with-routes`   shipments joined with routes and quotes
//!
//! Calls that reach the demande or itinerary services forward the caller's `Authorization`
//! header and are refused with 401 when it is missing.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use tarif_core::domain::quote::{Quote, QuoteId};
use tarif_core::domain::route::{DriverId, RouteId, RouteType};
use tarif_core::domain::shipment::{ClientId, ShipmentId};
use tarif_core::errors::ApplicationError;
use tarif_lifecycle::{CreateQuoteRequest, OperationContext, QuoteLifecycleService, ShipmentWithRoute};
use tarif_upstream::BearerCredential;

pub const CORRELATION_HEADER: &str = "x-correlation-id";

#[derive(Clone)]
pub struct ApiState {
    service: Arc<QuoteLifecycleService>,
}

#[derive(Debug, Deserialize)]
pub struct CreateQuoteBody {
    #[serde(alias = "shipmentId", alias = "demandeId")]
    pub shipment_id: i64,
    #[serde(alias = "routeId", alias = "itineraireId")]
    pub route_id: String,
    #[serde(default, alias = "routeType", alias = "typeRoute")]
    pub route_type: Option<String>,
    #[serde(default, alias = "includeReturn", alias = "inclureRetour")]
    pub include_return: Option<bool>,
}

impl CreateQuoteBody {
    fn into_request(self) -> Result<CreateQuoteRequest, ApplicationError> {
        let route_type = match self.route_type.as_deref() {
            None => RouteType::default(),
            Some(raw) => RouteType::parse(raw).ok_or_else(|| {
                ApplicationError::Validation(format!(
                    "unknown route type `{raw}` (expected ROUTE_NATIONALE, AUTOROUTE, VILLE or MIXTE)"
                ))
            })?,
        };
        Ok(CreateQuoteRequest {
            shipment_id: ShipmentId(self.shipment_id),
            route_id: RouteId(self.route_id),
            route_type,
            include_return: self.include_return.unwrap_or(true),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct QuoteFilter {
    pub client_id: Option<i64>,
    pub driver_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
    pub details: String,
    pub correlation_id: String,
    pub timestamp: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    fn new(error: ApplicationError, ctx: &OperationContext) -> Self {
        let interface = error.into_interface(ctx.correlation_id.clone());
        let status = StatusCode::from_u16(interface.code.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            error!(
                event_name = "api.request.failed",
                correlation_id = %interface.correlation_id,
                code = interface.code.as_str(),
                status = status.as_u16(),
                detail = %interface.message,
                "request failed"
            );
        } else {
            info!(
                event_name = "api.request.refused",
                correlation_id = %interface.correlation_id,
                code = interface.code.as_str(),
                status = status.as_u16(),
                "request refused"
            );
        }

        Self {
            status,
            body: ErrorBody {
                code: interface.code.as_str(),
                message: interface.user_message().to_string(),
                details: interface.message,
                correlation_id: interface.correlation_id,
                timestamp: Utc::now().to_rfc3339(),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

pub fn router(service: Arc<QuoteLifecycleService>) -> Router {
    Router::new()
        .route("/api/tarification/quotes", post(create_quote).get(list_quotes))
        .route("/api/tarification/quotes/{id}", get(get_quote))
        .route("/api/tarification/quotes/{id}/validate", put(validate_quote))
        .route("/api/tarification/quotes/{id}/payment", post(pay_quote))
        .route("/api/tarification/shipments/with-routes", get(list_shipments_with_routes))
        .route("/api/tarification/shipments/{id}/quotes", get(list_quotes_for_shipment))
        .with_state(ApiState { service })
}

fn context(headers: &HeaderMap) -> OperationContext {
    headers
        .get(CORRELATION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(OperationContext::new)
        .unwrap_or_else(OperationContext::generate)
}

fn credential(headers: &HeaderMap, ctx: &OperationContext) -> ApiResult<BearerCredential> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(BearerCredential::from_header_value)
        .ok_or_else(|| {
            ApiError::new(
                ApplicationError::UpstreamUnauthorized("missing bearer credential".to_string()),
                ctx,
            )
        })
}

fn parse_shipment_id(raw: &str, ctx: &OperationContext) -> ApiResult<ShipmentId> {
    raw.trim().parse::<i64>().map(ShipmentId).map_err(|_| {
        ApiError::new(ApplicationError::Validation(format!("invalid shipment id `{raw}`")), ctx)
    })
}

async fn create_quote(
    State(state): State<ApiState>,
    headers: HeaderMap,
    body: Result<Json<CreateQuoteBody>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Quote>)> {
    let ctx = context(&headers);
    let credential = credential(&headers, &ctx)?;
    let Json(body) = body.map_err(|rejection| {
        ApiError::new(ApplicationError::Validation(rejection.body_text()), &ctx)
    })?;
    let request = body.into_request().map_err(|error| ApiError::new(error, &ctx))?;

    let creation = state
        .service
        .create_quote(&ctx, request, &credential)
        .await
        .map_err(|error| ApiError::new(error, &ctx))?;
    let status = if creation.created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(creation.quote)))
}

async fn list_quotes(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Query(filter): Query<QuoteFilter>,
) -> ApiResult<Json<Vec<Quote>>> {
    let ctx = context(&headers);
    let quotes = match (filter.client_id, filter.driver_id) {
        (Some(client_id), _) => state.service.list_quotes_for_client(ClientId(client_id)).await,
        (None, Some(driver_id)) => state.service.list_quotes_for_driver(&DriverId(driver_id)).await,
        (None, None) => state.service.list_quotes().await,
    };
    quotes.map(Json).map_err(|error| ApiError::new(error, &ctx))
}

async fn get_quote(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<Json<Quote>> {
    let ctx = context(&headers);
    state.service.get_quote(&QuoteId(id)).await.map(Json).map_err(|error| ApiError::new(error, &ctx))
}

async fn validate_quote(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<Json<Quote>> {
    let ctx = context(&headers);
    state
        .service
        .validate(&ctx, &QuoteId(id))
        .await
        .map(Json)
        .map_err(|error| ApiError::new(error, &ctx))
}

async fn pay_quote(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<Json<Quote>> {
    let ctx = context(&headers);
    state.service.pay(&ctx, &QuoteId(id)).await.map(Json).map_err(|error| ApiError::new(error, &ctx))
}

async fn list_quotes_for_shipment(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<Quote>>> {
    let ctx = context(&headers);
    let shipment_id = parse_shipment_id(&id, &ctx)?;
    state
        .service
        .list_quotes_for_shipment(shipment_id)
        .await
        .map(Json)
        .map_err(|error| ApiError::new(error, &ctx))
}

async fn list_shipments_with_routes(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> ApiResult<Json<Vec<ShipmentWithRoute>>> {
    let ctx = context(&headers);
    let credential = credential(&headers, &ctx)?;
    state
        .service
        .list_shipments_with_routes(&ctx, &credential)
        .await
        .map(Json)
        .map_err(|error| ApiError::new(error, &ctx))
}
