use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use tarif_core::domain::shipment::{Shipment, ShipmentId};

use crate::credential::BearerCredential;
use crate::error::GatewayError;
use crate::http::{build_client, get_json, Target};
use crate::payload::DemandePayload;

const SERVICE: &str = "demande";

#[async_trait]
pub trait DemandeGateway: Send + Sync {
    async fn fetch_by_id(
        &self,
        id: ShipmentId,
        credential: &BearerCredential,
    ) -> Result<Shipment, GatewayError>;

    async fn fetch_all(&self, credential: &BearerCredential) -> Result<Vec<Shipment>, GatewayError>;
}

/// `GET {base}/{id}` and `GET {base}`.
pub struct HttpDemandeGateway {
    client: Client,
    base_url: String,
}

impl HttpDemandeGateway {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, GatewayError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { client: build_client(SERVICE, timeout)?, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

fn convert(payload: DemandePayload) -> Result<Shipment, GatewayError> {
    payload
        .into_shipment()
        .map_err(|reason| GatewayError::InvalidPayload { service: SERVICE, reason })
}

#[async_trait]
impl DemandeGateway for HttpDemandeGateway {
    async fn fetch_by_id(
        &self,
        id: ShipmentId,
        credential: &BearerCredential,
    ) -> Result<Shipment, GatewayError> {
        let url = format!("{}/{}", self.base_url, id);
        let id_text = id.to_string();
        tracing::debug!(event_name = "upstream.demande.fetch", shipment_id = %id, "fetching shipment");

        let payload: DemandePayload = get_json(
            &self.client,
            &url,
            credential,
            Target { service: SERVICE, resource: "shipment", id: Some(&id_text) },
        )
        .await?;
        convert(payload)
    }

    async fn fetch_all(&self, credential: &BearerCredential) -> Result<Vec<Shipment>, GatewayError> {
        tracing::debug!(event_name = "upstream.demande.fetch_all", "fetching shipments");

        // A null body is treated as an empty list.
        let payloads: Option<Vec<DemandePayload>> = get_json(
            &self.client,
            &self.base_url,
            credential,
            Target { service: SERVICE, resource: "shipment", id: None },
        )
        .await?;
        payloads.unwrap_or_default().into_iter().map(convert).collect()
    }
}
