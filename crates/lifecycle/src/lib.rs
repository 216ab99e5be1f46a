//! Quote lifecycle: creation from upstream data, the validate/pay state machine, expiration
//! sweeps and the recurring-task scheduler that drives them.

pub mod context;
pub mod expirer;
pub mod scheduler;
pub mod service;

pub use context::OperationContext;
pub use expirer::{QuoteExpirer, SweepReport};
pub use scheduler::{RecurringTask, Scheduler};
pub use service::{CreateQuoteRequest, QuoteCreation, QuoteLifecycleService, ShipmentWithRoute};
