use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::quote::QuoteStatus;
use crate::pricing::PricingError;

/// Guard failures raised by quote state transitions. They never mutate the quote.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("quote is already validated")]
    AlreadyValidated,
    #[error("quote is already rejected")]
    AlreadyRejected,
    #[error("quote is already paid")]
    AlreadyPaid,
    #[error("quote is cancelled")]
    AlreadyCancelled,
    #[error("quote is already expired")]
    AlreadyExpired,
    #[error("quote must be validated before payment (current status: {status})")]
    NotValidated { status: QuoteStatus },
    #[error("quote expired at {expired_at}")]
    Expired { expired_at: DateTime<Utc> },
    #[error("quote is still valid until {expires_at}")]
    NotYetExpired { expires_at: DateTime<Utc> },
}

impl TransitionError {
    /// Refusal for a quote that has already left PENDING.
    pub fn already(status: QuoteStatus) -> Self {
        match status {
            QuoteStatus::Validated => Self::AlreadyValidated,
            QuoteStatus::Rejected => Self::AlreadyRejected,
            QuoteStatus::Paid => Self::AlreadyPaid,
            QuoteStatus::Cancelled => Self::AlreadyCancelled,
            QuoteStatus::Expired => Self::AlreadyExpired,
            QuoteStatus::Pending => Self::NotValidated { status },
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error(transparent)]
    Pricing(#[from] PricingError),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("{entity} `{id}` not found")]
    NotFound { entity: &'static str, id: String },
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),
    #[error("upstream rejected credential: {0}")]
    UpstreamUnauthorized(String),
    #[error("invalid request: {0}")]
    Validation(String),
    #[error("concurrent modification: {0}")]
    Conflict(String),
    #[error("persistence failure: {0}")]
    Persistence(String),
}

impl From<TransitionError> for ApplicationError {
    fn from(value: TransitionError) -> Self {
        Self::Domain(DomainError::Transition(value))
    }
}

impl From<PricingError> for ApplicationError {
    fn from(value: PricingError) -> Self {
        Self::Domain(DomainError::Pricing(value))
    }
}

/// Caller-facing error codes. Each typed failure has its own code so callers can tell a
/// final refusal (`AlreadyPaid`) from one worth retrying with a new quote (`QuoteExpired`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorCode {
    NotFound,
    UpstreamUnavailable,
    UpstreamUnauthorized,
    AlreadyValidated,
    AlreadyRejected,
    AlreadyPaid,
    AlreadyCancelled,
    AlreadyExpired,
    NotValidated,
    QuoteExpired,
    ValidationError,
    Conflict,
    Internal,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "NOT_FOUND",
            Self::UpstreamUnavailable => "UPSTREAM_UNAVAILABLE",
            Self::UpstreamUnauthorized => "UPSTREAM_UNAUTHORIZED",
            Self::AlreadyValidated => "ALREADY_VALIDATED",
            Self::AlreadyRejected => "ALREADY_REJECTED",
            Self::AlreadyPaid => "ALREADY_PAID",
            Self::AlreadyCancelled => "ALREADY_CANCELLED",
            Self::AlreadyExpired => "ALREADY_EXPIRED",
            Self::NotValidated => "NOT_VALIDATED",
            Self::QuoteExpired => "QUOTE_EXPIRED",
            Self::ValidationError => "VALIDATION_ERROR",
            Self::Conflict => "CONFLICT",
            Self::Internal => "INTERNAL_ERROR",
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            Self::NotFound => 404,
            Self::UpstreamUnavailable => 502,
            Self::UpstreamUnauthorized => 401,
            Self::AlreadyValidated
            | Self::AlreadyRejected
            | Self::AlreadyPaid
            | Self::AlreadyCancelled
            | Self::AlreadyExpired
            | Self::Conflict => 409,
            Self::NotValidated | Self::QuoteExpired | Self::ValidationError => 400,
            Self::Internal => 500,
        }
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            Self::NotFound => "The requested record does not exist.",
            Self::UpstreamUnavailable => {
                "A dependent service is temporarily unavailable. Please retry shortly."
            }
            Self::UpstreamUnauthorized => "The supplied credential was rejected.",
            Self::AlreadyValidated => "This quote has already been validated.",
            Self::AlreadyRejected => "This quote has already been rejected.",
            Self::AlreadyPaid => "This quote has already been paid.",
            Self::AlreadyCancelled => "This quote has been cancelled.",
            Self::AlreadyExpired => "This quote has expired.",
            Self::NotValidated => "The quote must be validated before payment.",
            Self::QuoteExpired => "The quote has expired; request a new one.",
            Self::ValidationError => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::Conflict => "The quote was modified concurrently. Reload and try again.",
            Self::Internal => "An unexpected internal error occurred.",
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{}: {message}", code.as_str())]
pub struct InterfaceError {
    pub code: ErrorCode,
    pub message: String,
    pub correlation_id: String,
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        self.code.user_message()
    }
}

impl ApplicationError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Domain(DomainError::Transition(error)) => match error {
                TransitionError::AlreadyValidated => ErrorCode::AlreadyValidated,
                TransitionError::AlreadyRejected => ErrorCode::AlreadyRejected,
                TransitionError::AlreadyPaid => ErrorCode::AlreadyPaid,
                TransitionError::AlreadyCancelled => ErrorCode::AlreadyCancelled,
                TransitionError::AlreadyExpired => ErrorCode::AlreadyExpired,
                TransitionError::NotValidated { .. } => ErrorCode::NotValidated,
                TransitionError::Expired { .. } => ErrorCode::QuoteExpired,
                TransitionError::NotYetExpired { .. } => ErrorCode::Conflict,
            },
            Self::Domain(DomainError::Pricing(_)) => ErrorCode::ValidationError,
            Self::NotFound { .. } => ErrorCode::NotFound,
            Self::UpstreamUnavailable(_) => ErrorCode::UpstreamUnavailable,
            Self::UpstreamUnauthorized(_) => ErrorCode::UpstreamUnauthorized,
            Self::Validation(_) => ErrorCode::ValidationError,
            Self::Conflict(_) => ErrorCode::Conflict,
            Self::Persistence(_) => ErrorCode::Internal,
        }
    }

    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let mut mapped = InterfaceError::from(self);
        mapped.correlation_id = correlation_id.into();
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let code = value.code();
        let message = match code {
            // Storage details stay in the logs.
            ErrorCode::Internal => code.user_message().to_owned(),
            _ => value.to_string(),
        };
        Self { code, message, correlation_id: "unassigned".to_owned() }
    }
}
