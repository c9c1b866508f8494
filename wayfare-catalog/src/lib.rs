pub mod inventory;
pub mod ledger;
pub mod pricing;
pub mod status;

pub use inventory::{InventoryError, RoomInventory};
pub use ledger::SeatLedger;
pub use pricing::{CycleReport, DemandTier, DynamicPricingEngine, HolidayCalendar, PriceFactors, PricingConfig};
pub use status::{Delay, DelaySource, FlightStatusBoard, NoDelays, RandomDelaySource};
