use std::sync::Arc;

use tracing::{error, info, warn};
use wayfare_core::{modify, Clock, CoreResult, DocumentStore, SettlementGateway};
use wayfare_shared::{Booking, Refund, RefundStatus};

#[derive(Debug, Clone)]
pub struct SettlementOutcome {
    pub refund: Refund,
    pub booking: Booking,
}

impl SettlementOutcome {
    pub fn settled(&self) -> bool {
        self.refund.status == RefundStatus::Completed
    }
}

/// Drives a pending refund through the gateway and records the result.
///
/// A gateway failure is recorded on the refund only. The booking keeps its
/// pending refund status and nothing retries the settlement. Settlement never
/// fails the cancellation it belongs to: store errors while recording the
/// result are logged and the outcome carries the last state that was saved.
pub struct RefundSettlement {
    refunds: Arc<dyn DocumentStore<Refund>>,
    bookings: Arc<dyn DocumentStore<Booking>>,
    gateway: Arc<dyn SettlementGateway>,
    clock: Arc<dyn Clock>,
    max_attempts: u32,
}

impl RefundSettlement {
    pub fn new(
        refunds: Arc<dyn DocumentStore<Refund>>,
        bookings: Arc<dyn DocumentStore<Booking>>,
        gateway: Arc<dyn SettlementGateway>,
        clock: Arc<dyn Clock>,
        max_attempts: u32,
    ) -> Self {
        Self {
            refunds,
            bookings,
            gateway,
            clock,
            max_attempts: max_attempts.max(1),
        }
    }

    pub async fn settle(&self, refund: Refund, booking: Booking) -> SettlementOutcome {
        match self.attempt(&refund).await {
            Ok(()) => self.record_success(refund, booking).await,
            Err(failure) => {
                warn!(
                    "Refund {} for booking {} left unsettled, booking stays PENDING: {}",
                    refund.id, booking.id, failure
                );
                let mut failed = refund.clone();
                failed.fail(failure.to_string());
                let refund = match self.refunds.save(failed).await {
                    Ok(saved) => saved,
                    Err(e) => {
                        error!("Could not record failed refund {} for booking {}: {}", refund.id, booking.id, e);
                        refund
                    }
                };
                SettlementOutcome { refund, booking }
            }
        }
    }

    async fn attempt(&self, refund: &Refund) -> CoreResult<()> {
        self.gateway.settle(refund).await?;
        Ok(())
    }

    async fn record_success(&self, refund: Refund, booking: Booking) -> SettlementOutcome {
        let mut completed = refund.clone();
        completed.complete(self.clock.now());
        let refund = match self.refunds.save(completed).await {
            Ok(saved) => saved,
            Err(e) => {
                error!(
                    "Refund {} for booking {} was settled but could not be recorded: {}",
                    refund.id, booking.id, e
                );
                return SettlementOutcome { refund, booking };
            }
        };

        let booking_id = booking.id.clone();
        let booking = match modify(self.bookings.as_ref(), &booking_id, self.max_attempts, |b| {
            b.refund_status = Some(RefundStatus::Completed);
            Ok(())
        })
        .await
        {
            Ok((saved, _)) => saved,
            Err(e) => {
                error!(
                    "Refund {} settled but booking {} still shows it pending: {}",
                    refund.id, booking_id, e
                );
                booking
            }
        };

        info!("Refund {} settled for booking {}", refund.id, booking.id);
        SettlementOutcome { refund, booking }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use wayfare_core::{FixedClock, MockSettlementGateway};
    use wayfare_shared::BookingType;
    use wayfare_store::MemoryStore;

    async fn pending_pair(
        refunds: &MemoryStore<Refund>,
        bookings: &MemoryStore<Booking>,
    ) -> (Refund, Booking) {
        let now = Utc::now();
        let mut booking = Booking::new(
            "u1".to_string(),
            BookingType::Flight,
            "FL1".to_string(),
            1,
            10000,
            None,
            now,
        );
        booking = bookings.save(booking).await.unwrap();
        booking.cancel("plans changed", now, 10000);
        let booking = bookings.save(booking).await.unwrap();
        let refund = refunds.save(Refund::pending(&booking.id, 10000, now)).await.unwrap();
        (refund, booking)
    }

    fn settlement(
        refunds: Arc<MemoryStore<Refund>>,
        bookings: Arc<MemoryStore<Booking>>,
        gateway: Arc<MockSettlementGateway>,
    ) -> RefundSettlement {
        RefundSettlement::new(refunds, bookings, gateway, Arc::new(FixedClock::new(Utc::now())), 3)
    }

    #[tokio::test]
    async fn test_success_completes_both_records() {
        let refunds = Arc::new(MemoryStore::<Refund>::new());
        let bookings = Arc::new(MemoryStore::<Booking>::new());
        let gateway = Arc::new(MockSettlementGateway::new());
        let (refund, booking) = pending_pair(&refunds, &bookings).await;

        let outcome = settlement(refunds.clone(), bookings.clone(), gateway.clone())
            .settle(refund, booking)
            .await;

        assert!(outcome.settled());
        assert!(outcome.refund.completed_at.is_some());
        assert_eq!(outcome.booking.refund_status, Some(RefundStatus::Completed));
        assert_eq!(gateway.settled(), vec![outcome.refund.id.clone()]);
    }

    #[tokio::test]
    async fn test_failure_only_marks_refund() {
        let refunds = Arc::new(MemoryStore::<Refund>::new());
        let bookings = Arc::new(MemoryStore::<Booking>::new());
        let gateway = Arc::new(MockSettlementGateway::failing());
        let (refund, booking) = pending_pair(&refunds, &bookings).await;

        let outcome = settlement(refunds.clone(), bookings.clone(), gateway)
            .settle(refund, booking)
            .await;

        assert!(!outcome.settled());
        assert_eq!(outcome.refund.status, RefundStatus::Failed);
        assert_eq!(
            outcome.refund.failure_reason.as_deref(),
            Some("Settlement failed: Settlement gateway unavailable: simulated gateway outage")
        );

        let stored = bookings.find_by_id(&outcome.booking.id).await.unwrap().unwrap();
        assert!(stored.is_cancelled());
        assert_eq!(stored.refund_status, Some(RefundStatus::Pending));
    }
}
