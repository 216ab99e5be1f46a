use tarif_core::errors::ApplicationError;
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum GatewayError {
    #[error("{service} service unavailable: {reason}")]
    Unavailable { service: &'static str, reason: String },
    #[error("{resource} `{id}` not found upstream")]
    NotFound { resource: &'static str, id: String },
    #[error("{service} service rejected the credential")]
    Unauthorized { service: &'static str },
    #[error("{service} service returned an invalid payload: {reason}")]
    InvalidPayload { service: &'static str, reason: String },
}

impl From<GatewayError> for ApplicationError {
    fn from(value: GatewayError) -> Self {
        match value {
            GatewayError::NotFound { resource, id } => Self::NotFound { entity: resource, id },
            GatewayError::Unauthorized { .. } => Self::UpstreamUnauthorized(value.to_string()),
            GatewayError::Unavailable { .. } | GatewayError::InvalidPayload { .. } => {
                Self::UpstreamUnavailable(value.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use tarif_core::errors::{ApplicationError, ErrorCode};

    use super::GatewayError;

    #[test]
    fn invalid_payload_is_reported_as_unavailable() {
        let error = ApplicationError::from(GatewayError::InvalidPayload {
            service: "itinerary",
            reason: "missing distanceKm".to_string(),
        });
        assert_eq!(error.code(), ErrorCode::UpstreamUnavailable);
    }

    #[test]
    fn not_found_keeps_resource_and_id() {
        let error = ApplicationError::from(GatewayError::NotFound {
            resource: "shipment",
            id: "12".to_string(),
        });
        assert_eq!(error, ApplicationError::NotFound { entity: "shipment", id: "12".to_string() });
    }
}
