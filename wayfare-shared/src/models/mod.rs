pub mod booking;
pub mod events;
pub mod flight;
pub mod hotel;
pub mod seat;

use serde::{de::DeserializeOwned, Serialize};

pub use booking::{Booking, BookingStatus, BookingType, Refund, RefundStatus, SeatLink, UserBookings};
pub use events::{EventPayload, EventType, GroupEvent};
pub use flight::{Flight, FlightState, FlightStatus, PriceHistory};
pub use hotel::Hotel;
pub use seat::{Seat, SeatCategory};

/// A record kept in a keyed document collection.
///
/// An empty id means the document has never been saved; the store assigns one
/// on first save. `version` is bumped by the store on every successful save and
/// is compared on update, so a writer holding a stale copy is rejected.
pub trait Document: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    const COLLECTION: &'static str;

    fn id(&self) -> &str;
    fn set_id(&mut self, id: String);
    fn version(&self) -> u64;
    fn set_version(&mut self, version: u64);
}

macro_rules! impl_document {
    ($ty:ty, $collection:literal) => {
        impl $crate::models::Document for $ty {
            const COLLECTION: &'static str = $collection;

            fn id(&self) -> &str {
                &self.id
            }

            fn set_id(&mut self, id: String) {
                self.id = id;
            }

            fn version(&self) -> u64 {
                self.version
            }

            fn set_version(&mut self, version: u64) {
                self.version = version;
            }
        }
    };
}

pub(crate) use impl_document;

/// Render minor units as a two-decimal amount, e.g. `14050` -> `"140.50"`.
pub fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}
