pub mod admin;
pub mod state;
pub mod worker;

pub use admin::{CancelRequest, FreezeRequest, PriceAdmin, PriceView, SetBasePriceRequest};
pub use state::AppState;
pub use worker::{start_pricing_worker, start_status_worker};
