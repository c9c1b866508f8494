use serde::{Deserialize, Serialize};

use super::impl_document;

pub const SEAT_ROWS: u8 = 20;
pub const SEAT_COLUMNS: [char; 6] = ['A', 'B', 'C', 'D', 'E', 'F'];

/// Cabin category of a seat
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeatCategory {
    Economy,
    Premium,
    Business,
}

impl SeatCategory {
    /// Category of a row in the default layout
    pub fn for_row(row: u8) -> Self {
        if row <= 2 {
            SeatCategory::Business
        } else if row <= 5 {
            SeatCategory::Premium
        } else {
            SeatCategory::Economy
        }
    }

    /// Seat surcharge in cents
    pub fn surcharge_cents(self) -> i64 {
        match self {
            SeatCategory::Business => 7500,
            SeatCategory::Premium => 2500,
            SeatCategory::Economy => 0,
        }
    }
}

/// An individually reservable seat on a flight.
///
/// `reserved` and `reserved_by` move together: a seat is reserved exactly
/// when it has a holder.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Seat {
    pub id: String,
    pub flight_id: String,
    pub row: u8,
    pub col: char,
    pub category: SeatCategory,
    pub window: bool,
    pub aisle: bool,
    pub reserved: bool,
    pub reserved_by: Option<String>,
    pub premium: bool,
    pub premium_price_cents: i64,
    #[serde(default)]
    pub version: u64,
}

impl_document!(Seat, "seats");

impl Seat {
    /// Unreserved seat at `row`/`col` of the default layout
    pub fn seeded(flight_id: &str, row: u8, col: char) -> Self {
        let category = SeatCategory::for_row(row);
        Self {
            id: format!("{}-{}{}", flight_id, row, col),
            flight_id: flight_id.to_string(),
            row,
            col,
            category,
            window: col == 'A' || col == 'F',
            aisle: col == 'C' || col == 'D',
            reserved: false,
            reserved_by: None,
            premium: category != SeatCategory::Economy,
            premium_price_cents: category.surcharge_cents(),
            version: 0,
        }
    }

    /// The 20 x 6 layout every flight starts with
    pub fn default_layout(flight_id: &str) -> Vec<Seat> {
        (1..=SEAT_ROWS)
            .flat_map(|row| SEAT_COLUMNS.iter().map(move |col| Seat::seeded(flight_id, row, *col)))
            .collect()
    }

    /// Seat label as printed on a boarding pass, e.g. `12C`
    pub fn number(&self) -> String {
        format!("{}{}", self.row, self.col)
    }

    pub fn is_held_by(&self, requester_id: &str) -> bool {
        self.reserved && self.reserved_by.as_deref() == Some(requester_id)
    }

    pub fn is_consistent(&self) -> bool {
        self.reserved == self.reserved_by.is_some()
    }

    pub fn hold(&mut self, requester_id: &str) {
        self.reserved = true;
        self.reserved_by = Some(requester_id.to_string());
    }

    pub fn clear(&mut self) {
        self.reserved = false;
        self.reserved_by = None;
    }
}
