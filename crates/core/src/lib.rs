pub mod clock;
pub mod config;
pub mod domain;
pub mod errors;
pub mod pricing;

pub use clock::{Clock, ManualClock, SystemClock};
pub use domain::parameter::{ParameterKind, PricingParameter};
pub use domain::quote::{Quote, QuoteId, QuoteStatus, QUOTE_VALIDITY_DAYS};
pub use domain::route::{DriverId, Route, RouteId, RouteType, Waypoint};
pub use domain::shipment::{CargoCategory, ClientId, Shipment, ShipmentId};
pub use errors::{ApplicationError, DomainError, ErrorCode, InterfaceError, TransitionError};
pub use pricing::{
    PriceBreakdown, PricingCalculator, PricingCoefficients, PricingError, PricingTraceStep,
};
