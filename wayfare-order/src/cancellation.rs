use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info};
use wayfare_core::{require_non_blank, Clock, CoreError, CoreResult, DocumentStore, Filter, StoreError};
use wayfare_shared::{Booking, BookingType, Flight, Hotel, Refund};

use crate::policy::{parse_event_time, RefundPolicy};
use crate::settlement::RefundSettlement;

/// Cancels bookings and issues the refund the policy allows.
///
/// Cancellation is terminal: a booking already cancelled is returned as is.
pub struct CancellationEngine {
    bookings: Arc<dyn DocumentStore<Booking>>,
    refunds: Arc<dyn DocumentStore<Refund>>,
    flights: Arc<dyn DocumentStore<Flight>>,
    hotels: Arc<dyn DocumentStore<Hotel>>,
    policy: RefundPolicy,
    settlement: RefundSettlement,
    clock: Arc<dyn Clock>,
}

impl CancellationEngine {
    pub fn new(
        bookings: Arc<dyn DocumentStore<Booking>>,
        refunds: Arc<dyn DocumentStore<Refund>>,
        flights: Arc<dyn DocumentStore<Flight>>,
        hotels: Arc<dyn DocumentStore<Hotel>>,
        policy: RefundPolicy,
        settlement: RefundSettlement,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            bookings,
            refunds,
            flights,
            hotels,
            policy,
            settlement,
            clock,
        }
    }

    pub async fn cancel(&self, booking_id: &str, reason: &str) -> CoreResult<Booking> {
        let booking = self
            .bookings
            .find_by_id(booking_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Booking {}", booking_id)))?;
        require_non_blank("reason", reason)?;

        if booking.is_cancelled() {
            debug!("Booking {} already cancelled", booking_id);
            return Ok(booking);
        }

        let now = self.clock.now();
        let event_at = self.event_time(&booking).await?;
        let quote = self
            .policy
            .quote(booking.total_amount_cents, booking.booking_time, event_at, now)?;

        let mut cancelled = booking;
        cancelled.cancel(reason.trim(), now, quote.amount_cents);

        let cancelled = match self.bookings.save(cancelled).await {
            Ok(saved) => saved,
            Err(StoreError::VersionConflict { .. }) => {
                // Someone else cancelled first; theirs stands
                let current = self
                    .bookings
                    .find_by_id(booking_id)
                    .await?
                    .ok_or_else(|| CoreError::NotFound(format!("Booking {}", booking_id)))?;
                if current.is_cancelled() {
                    return Ok(current);
                }
                return Err(CoreError::Conflict(format!(
                    "Booking {} changed while cancelling",
                    booking_id
                )));
            }
            Err(e) => return Err(e.into()),
        };

        info!(
            "Booking {} cancelled, refund {}% ({} cents)",
            cancelled.id,
            quote.tier.percent(),
            quote.amount_cents
        );

        // The booking is cancelled from here on; refund bookkeeping cannot undo that
        let refund = match self
            .refunds
            .save(Refund::pending(&cancelled.id, quote.amount_cents, now))
            .await
        {
            Ok(refund) => refund,
            Err(e) => {
                error!("Booking {} cancelled but its refund could not be recorded: {}", cancelled.id, e);
                return Ok(cancelled);
            }
        };
        let outcome = self.settlement.settle(refund, cancelled).await;
        Ok(outcome.booking)
    }

    pub async fn refunds_for(&self, booking_id: &str) -> CoreResult<Vec<Refund>> {
        let mut refunds = self
            .refunds
            .find_by(&Filter::new().eq("booking_id", booking_id))
            .await?;
        refunds.sort_by_key(|r| r.initiated_at);
        Ok(refunds)
    }

    /// Departure or check-in of the booked resource, when it can be read
    async fn event_time(&self, booking: &Booking) -> CoreResult<Option<DateTime<Utc>>> {
        let raw = match booking.booking_type {
            BookingType::Flight => self
                .flights
                .find_by_id(&booking.resource_ref)
                .await?
                .and_then(|f| f.departure_time),
            BookingType::Hotel => self
                .hotels
                .find_by_id(&booking.resource_ref)
                .await?
                .and_then(|h| h.check_in_time),
        };

        let parsed = raw.as_deref().and_then(parse_event_time);
        if raw.is_some() && parsed.is_none() {
            debug!("Unreadable event time on {}, using generic refund rules", booking.resource_ref);
        }
        Ok(parsed)
    }
}
