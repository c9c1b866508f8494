use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use wayfare_core::{modify, Clock, CoreError, CoreResult, DocumentStore, Filter};
use wayfare_order::CancellationEngine;
use wayfare_shared::{format_cents, Booking, Flight, PriceHistory};

pub const BASE_PRICE_REASON: &str = "admin set base price";

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct SetBasePriceRequest {
    pub base_price_cents: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct FreezeRequest {
    pub minutes: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CancelRequest {
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceView {
    pub flight_id: String,
    pub base_price_cents: i64,
    pub current_price_cents: i64,
    pub price_freeze_until: Option<DateTime<Utc>>,
}

impl From<&Flight> for PriceView {
    fn from(flight: &Flight) -> Self {
        Self {
            flight_id: flight.id.clone(),
            base_price_cents: flight.base_price_cents,
            current_price_cents: flight.effective_price_cents(),
            price_freeze_until: flight.price_freeze_until,
        }
    }
}

// ============================================================================
// Administrative Operations
// ============================================================================

/// The only writer of base prices and freeze windows besides the pricing engine.
///
/// Writes are versioned read-modify-write, so a pricing cycle running at the
/// same moment either sees the change or is retried against it.
pub struct PriceAdmin {
    flights: Arc<dyn DocumentStore<Flight>>,
    price_history: Arc<dyn DocumentStore<PriceHistory>>,
    cancellations: Arc<CancellationEngine>,
    clock: Arc<dyn Clock>,
    default_freeze_minutes: i64,
    max_attempts: u32,
}

impl PriceAdmin {
    pub fn new(
        flights: Arc<dyn DocumentStore<Flight>>,
        price_history: Arc<dyn DocumentStore<PriceHistory>>,
        cancellations: Arc<CancellationEngine>,
        clock: Arc<dyn Clock>,
        default_freeze_minutes: i64,
        max_attempts: u32,
    ) -> Self {
        Self {
            flights,
            price_history,
            cancellations,
            clock,
            default_freeze_minutes,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Set the base price; an unset current price starts at the new base
    pub async fn set_base_price(&self, flight_id: &str, request: SetBasePriceRequest) -> CoreResult<Flight> {
        let base = request.base_price_cents;
        if base < 0 {
            return Err(CoreError::ValidationError("base price cannot be negative".to_string()));
        }

        let (flight, initialised) = modify(self.flights.as_ref(), flight_id, self.max_attempts, |flight| {
            flight.base_price_cents = base;
            let initialise = flight.current_price_cents <= 0 && base > 0;
            if initialise {
                flight.current_price_cents = base;
            }
            Ok(initialise)
        })
        .await
        .map_err(|e| flight_not_found(e, flight_id))?;

        if initialised {
            let entry = PriceHistory::for_flight(
                flight_id,
                flight.current_price_cents,
                self.clock.now(),
                BASE_PRICE_REASON.to_string(),
            );
            self.price_history.save(entry).await?;
        }

        info!("Base price of flight {} set to {}", flight_id, format_cents(base));
        Ok(flight)
    }

    /// Hold the current price for `minutes` (default from config)
    pub async fn freeze(&self, flight_id: &str, request: FreezeRequest) -> CoreResult<PriceView> {
        let minutes = request.minutes.unwrap_or(self.default_freeze_minutes);
        if minutes < 1 {
            return Err(CoreError::ValidationError("freeze must last at least one minute".to_string()));
        }
        let until = self.clock.now() + Duration::minutes(minutes);

        let (flight, _) = modify(self.flights.as_ref(), flight_id, self.max_attempts, |flight| {
            flight.price_freeze_until = Some(until);
            if flight.current_price_cents <= 0 && flight.base_price_cents > 0 {
                flight.current_price_cents = flight.base_price_cents;
            }
            Ok(())
        })
        .await
        .map_err(|e| flight_not_found(e, flight_id))?;

        info!("Price of flight {} frozen until {}", flight_id, until);
        Ok(PriceView::from(&flight))
    }

    pub async fn price_view(&self, flight_id: &str) -> CoreResult<PriceView> {
        let flight = self
            .flights
            .find_by_id(flight_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Flight {}", flight_id)))?;
        Ok(PriceView::from(&flight))
    }

    /// Price changes of a flight, oldest first
    pub async fn price_history(&self, flight_id: &str) -> CoreResult<Vec<PriceHistory>> {
        let filter = Filter::new()
            .eq("product_type", wayfare_shared::models::flight::PRODUCT_TYPE_FLIGHT)
            .eq("product_id", flight_id);
        let mut history = self.price_history.find_by(&filter).await?;
        history.sort_by_key(|h| h.timestamp);
        Ok(history)
    }

    pub async fn cancel_booking(&self, booking_id: &str, request: CancelRequest) -> CoreResult<Booking> {
        self.cancellations.cancel(booking_id, &request.reason).await
    }
}

fn flight_not_found(err: CoreError, flight_id: &str) -> CoreError {
    match err {
        CoreError::NotFound(_) => CoreError::NotFound(format!("Flight {}", flight_id)),
        other => other,
    }
}
