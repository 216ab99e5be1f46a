use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;

use crate::credential::BearerCredential;
use crate::error::GatewayError;

pub(crate) fn build_client(service: &'static str, timeout: Duration) -> Result<Client, GatewayError> {
    Client::builder().timeout(timeout).build().map_err(|error| GatewayError::Unavailable {
        service,
        reason: format!("could not build http client: {error}"),
    })
}

/// What a request is about, for error reporting.
pub(crate) struct Target<'a> {
    pub service: &'static str,
    pub resource: &'static str,
    pub id: Option<&'a str>,
}

/// One GET, no retry. The client-level timeout bounds the whole exchange.
pub(crate) async fn get_json<T: DeserializeOwned>(
    client: &Client,
    url: &str,
    credential: &BearerCredential,
    target: Target<'_>,
) -> Result<T, GatewayError> {
    let response = client
        .get(url)
        .header(reqwest::header::AUTHORIZATION, credential.authorization_value())
        .header(reqwest::header::ACCEPT, "application/json")
        .send()
        .await
        .map_err(|error| GatewayError::Unavailable {
            service: target.service,
            reason: if error.is_timeout() {
                "request timed out".to_string()
            } else {
                format!("request failed: {error}")
            },
        })?;

    let status = response.status();
    if !status.is_success() {
        tracing::debug!(
            event_name = "upstream.response.rejected",
            service = target.service,
            status = status.as_u16(),
            "upstream returned non-success status"
        );
        return Err(map_status(status, &target));
    }

    let body = response.text().await.map_err(|error| GatewayError::Unavailable {
        service: target.service,
        reason: format!("could not read response body: {error}"),
    })?;

    serde_json::from_str(&body).map_err(|error| GatewayError::InvalidPayload {
        service: target.service,
        reason: error.to_string(),
    })
}

fn map_status(status: StatusCode, target: &Target<'_>) -> GatewayError {
    match status {
        StatusCode::NOT_FOUND => match target.id {
            Some(id) => GatewayError::NotFound { resource: target.resource, id: id.to_string() },
            None => GatewayError::Unavailable {
                service: target.service,
                reason: "collection endpoint returned 404".to_string(),
            },
        },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            GatewayError::Unauthorized { service: target.service }
        }
        other => GatewayError::Unavailable {
            service: target.service,
            reason: format!("unexpected status {other}"),
        },
    }
}
