pub mod cancellation;
pub mod manager;
pub mod policy;
pub mod settlement;

pub use cancellation::CancellationEngine;
pub use manager::{BookingManager, BookingRequest};
pub use policy::{parse_event_time, RefundPolicy, RefundQuote, RefundTier};
pub use settlement::{RefundSettlement, SettlementOutcome};
