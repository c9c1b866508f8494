use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::impl_document;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingType {
    Flight,
    Hotel,
}

impl BookingType {
    /// Stored form, usable in document filters
    pub fn as_str(self) -> &'static str {
        match self {
            BookingType::Flight => "FLIGHT",
            BookingType::Hotel => "HOTEL",
        }
    }
}

/// Booking lifecycle; `Cancelled` is terminal
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Confirmed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RefundStatus {
    Pending,
    Completed,
    Failed,
}

/// Seat chosen on the seat map when booking a flight
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SeatLink {
    pub seat_id: String,
    pub seat_price_cents: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: String,
    pub user_id: String,
    pub booking_type: BookingType,
    /// Flight or hotel id
    pub resource_ref: String,
    pub quantity: u32,
    pub total_amount_cents: i64,
    pub booking_time: DateTime<Utc>,
    pub status: BookingStatus,
    pub cancellation_reason: Option<String>,
    pub cancellation_time: Option<DateTime<Utc>>,
    pub refund_amount_cents: Option<i64>,
    pub refund_status: Option<RefundStatus>,
    pub seat: Option<SeatLink>,
    #[serde(default)]
    pub version: u64,
}

impl_document!(Booking, "bookings");

impl Booking {
    pub fn new(
        user_id: String,
        booking_type: BookingType,
        resource_ref: String,
        quantity: u32,
        total_amount_cents: i64,
        seat: Option<SeatLink>,
        booked_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: String::new(),
            user_id,
            booking_type,
            resource_ref,
            quantity,
            total_amount_cents,
            booking_time: booked_at,
            status: BookingStatus::Confirmed,
            cancellation_reason: None,
            cancellation_time: None,
            refund_amount_cents: None,
            refund_status: None,
            seat,
            version: 0,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == BookingStatus::Cancelled
    }

    /// Move to `Cancelled` with a pending refund of `refund_cents`
    pub fn cancel(&mut self, reason: &str, at: DateTime<Utc>, refund_cents: i64) {
        self.status = BookingStatus::Cancelled;
        self.cancellation_reason = Some(reason.to_string());
        self.cancellation_time = Some(at);
        self.refund_amount_cents = Some(refund_cents);
        self.refund_status = Some(RefundStatus::Pending);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Refund {
    pub id: String,
    pub booking_id: String,
    pub amount_cents: i64,
    pub status: RefundStatus,
    pub initiated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
    #[serde(default)]
    pub version: u64,
}

impl_document!(Refund, "refunds");

impl Refund {
    pub fn pending(booking_id: &str, amount_cents: i64, at: DateTime<Utc>) -> Self {
        Self {
            id: String::new(),
            booking_id: booking_id.to_string(),
            amount_cents,
            status: RefundStatus::Pending,
            initiated_at: at,
            completed_at: None,
            failure_reason: None,
            version: 0,
        }
    }

    pub fn complete(&mut self, at: DateTime<Utc>) {
        self.status = RefundStatus::Completed;
        self.completed_at = Some(at);
    }

    pub fn fail(&mut self, reason: String) {
        self.status = RefundStatus::Failed;
        self.failure_reason = Some(reason);
    }
}

/// Back-references from a user to their bookings. The document id is the user id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserBookings {
    pub id: String,
    pub booking_ids: Vec<String>,
    #[serde(default)]
    pub version: u64,
}

impl_document!(UserBookings, "user_bookings");

impl UserBookings {
    pub fn new(user_id: &str) -> Self {
        Self {
            id: user_id.to_string(),
            booking_ids: Vec::new(),
            version: 0,
        }
    }

    /// Returns false when the id was already linked
    pub fn link(&mut self, booking_id: &str) -> bool {
        if self.booking_ids.iter().any(|id| id == booking_id) {
            return false;
        }
        self.booking_ids.push(booking_id.to_string());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_sets_pending_refund() {
        let now = Utc::now();
        let mut booking = Booking::new(
            "user-1".to_string(),
            BookingType::Flight,
            "FL1".to_string(),
            1,
            10000,
            None,
            now,
        );
        assert_eq!(booking.status, BookingStatus::Confirmed);

        booking.cancel("plans changed", now, 5000);
        assert!(booking.is_cancelled());
        assert_eq!(booking.refund_amount_cents, Some(5000));
        assert_eq!(booking.refund_status, Some(RefundStatus::Pending));
        assert_eq!(booking.cancellation_reason.as_deref(), Some("plans changed"));
    }

    #[test]
    fn test_booking_type_wire_form() {
        let value = serde_json::to_value(BookingType::Hotel).unwrap();
        assert_eq!(value, serde_json::json!(BookingType::Hotel.as_str()));
    }

    #[test]
    fn test_user_bookings_link_is_idempotent() {
        let mut links = UserBookings::new("user-1");
        assert!(links.link("b1"));
        assert!(!links.link("b1"));
        assert_eq!(links.booking_ids, vec!["b1".to_string()]);
    }
}
