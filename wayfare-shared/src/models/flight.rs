use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::impl_document;

pub const PRODUCT_TYPE_FLIGHT: &str = "flight";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Flight {
    pub id: String,
    pub flight_name: String,
    pub base_price_cents: i64,
    /// Zero until the pricing engine or an admin sets it
    pub current_price_cents: i64,
    pub price_freeze_until: Option<DateTime<Utc>>,
    /// Naive ISO-8601 timestamp, stored as UTC
    pub departure_time: Option<String>,
    pub available_seats: i32,
    #[serde(default)]
    pub version: u64,
}

impl_document!(Flight, "flights");

impl Flight {
    pub fn new(id: &str, flight_name: &str, base_price_cents: i64, departure_time: Option<String>) -> Self {
        Self {
            id: id.to_string(),
            flight_name: flight_name.to_string(),
            base_price_cents,
            current_price_cents: 0,
            price_freeze_until: None,
            departure_time,
            available_seats: 120,
            version: 0,
        }
    }

    pub fn is_frozen_at(&self, now: DateTime<Utc>) -> bool {
        self.price_freeze_until.is_some_and(|until| until > now)
    }

    /// Current price, falling back to the base price while unset
    pub fn effective_price_cents(&self) -> i64 {
        if self.current_price_cents <= 0 {
            self.base_price_cents
        } else {
            self.current_price_cents
        }
    }
}

/// One real change of a product's current price
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceHistory {
    pub id: String,
    pub product_type: String,
    pub product_id: String,
    pub price_cents: i64,
    pub timestamp: DateTime<Utc>,
    pub reason: String,
    #[serde(default)]
    pub version: u64,
}

impl_document!(PriceHistory, "price_history");

impl PriceHistory {
    pub fn for_flight(flight_id: &str, price_cents: i64, at: DateTime<Utc>, reason: String) -> Self {
        Self {
            id: String::new(),
            product_type: PRODUCT_TYPE_FLIGHT.to_string(),
            product_id: flight_id.to_string(),
            price_cents,
            timestamp: at,
            reason,
            version: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlightState {
    OnTime,
    Delayed,
    Arrived,
}

/// Live operational status pushed to flight watchers
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FlightStatus {
    pub flight_id: String,
    pub flight_name: String,
    pub status: FlightState,
    pub delay_minutes: i64,
    pub delay_reason: Option<String>,
    pub estimated_arrival: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl FlightStatus {
    /// On-time status with arrival two hours out
    pub fn on_time(flight_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            flight_id: flight_id.to_string(),
            flight_name: format!("Flight {}", flight_id),
            status: FlightState::OnTime,
            delay_minutes: 0,
            delay_reason: None,
            estimated_arrival: now + Duration::hours(2),
            last_updated: now,
        }
    }

    pub fn delay(&mut self, minutes: i64, reason: String, now: DateTime<Utc>) {
        self.status = FlightState::Delayed;
        self.delay_minutes += minutes;
        self.delay_reason = Some(reason);
        self.estimated_arrival += Duration::minutes(minutes);
        self.last_updated = now;
    }
}
