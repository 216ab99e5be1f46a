pub mod money;
pub mod parameter;
pub mod quote;
pub mod route;
pub mod shipment;
