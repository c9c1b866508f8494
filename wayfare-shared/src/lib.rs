pub mod models;

pub use models::{
    format_cents, Booking, BookingStatus, BookingType, Document, EventPayload, EventType, Flight,
    FlightState, FlightStatus, GroupEvent, Hotel, PriceHistory, Refund, RefundStatus, Seat,
    SeatCategory, SeatLink, UserBookings,
};
