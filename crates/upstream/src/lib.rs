//! Clients for the demande and itinerary services.
//!
//! Both services are reached over HTTP with the caller's bearer credential. Payloads are
//! decoded into explicit schemas at this boundary and converted into domain types, so a
//! malformed upstream response surfaces as a typed error instead of a panic further in.

pub mod credential;
pub mod demande;
pub mod error;
mod http;
pub mod itinerary;
pub mod memory;
pub mod payload;

pub use credential::BearerCredential;
pub use demande::{DemandeGateway, HttpDemandeGateway};
pub use error::GatewayError;
pub use itinerary::{HttpItineraryGateway, ItineraryGateway};
pub use memory::{StaticDemandeGateway, StaticItineraryGateway};
