use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use tokio::sync::watch;
use tokio_stream::StreamExt;
use wayfare_catalog::{Delay, DelaySource};
use wayfare_core::{CoreError, DocumentStore, Filter, FixedClock, MockSettlementGateway, StoreResult};
use wayfare_order::BookingRequest;
use wayfare_server::{start_pricing_worker, AppState, CancelRequest, FreezeRequest, SetBasePriceRequest};
use wayfare_shared::{
    BookingStatus, BookingType, EventPayload, EventType, Flight, FlightState, Hotel, RefundStatus, SeatLink,
};
use wayfare_store::{app_config::Config, in_memory_collections, MemoryStore};

/// Every flight slips 15 minutes on every tick
struct AlwaysLate;

impl DelaySource for AlwaysLate {
    fn next_delay(&self, _flight_id: &str) -> Option<Delay> {
        Some(Delay {
            minutes: 15,
            reason: "Air traffic congestion".to_string(),
        })
    }
}

struct TestApp {
    state: AppState,
    clock: Arc<FixedClock>,
    gateway: Arc<MockSettlementGateway>,
}

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap()
}

async fn test_app() -> TestApp {
    let clock = Arc::new(FixedClock::new(start()));
    let gateway = Arc::new(MockSettlementGateway::new());
    let state = AppState::build(
        Config::default(),
        in_memory_collections(),
        gateway.clone(),
        clock.clone(),
        Arc::new(AlwaysLate),
    )
    .unwrap();

    state
        .collections
        .flights
        .save(Flight::new("FL1", "Morning hop", 10000, Some("2025-03-14T07:30:00".to_string())))
        .await
        .unwrap();
    state
        .collections
        .hotels
        .save(Hotel::new("H1", "Harbour Inn", 3, Some("2025-03-12T14:00:00".to_string())))
        .await
        .unwrap();

    TestApp { state, clock, gateway }
}

fn flight_request(user: &str, seat_id: &str) -> BookingRequest {
    BookingRequest {
        user_id: user.to_string(),
        booking_type: BookingType::Flight,
        resource_ref: "FL1".to_string(),
        quantity: 1,
        total_amount_cents: 17500,
        seat: Some(SeatLink {
            seat_id: seat_id.to_string(),
            seat_price_cents: 7500,
        }),
    }
}

#[tokio::test]
async fn test_reserve_book_and_cancel_flow() {
    let app = test_app().await;
    let state = &app.state;

    let mut seat_updates = state.ledger.subscribe("FL1").await.unwrap();
    assert_eq!(seat_updates.recv().await.unwrap().event_type, EventType::Init);

    state.ledger.reserve("FL1-1A", "alice").await.unwrap();
    let taken = state.ledger.reserve("FL1-1A", "bob").await.unwrap_err();
    assert!(taken.is_retryable());
    assert_eq!(seat_updates.recv().await.unwrap().event_type, EventType::Update);

    let booking = state.bookings.book(flight_request("alice", "FL1-1A")).await.unwrap();
    assert_eq!(booking.status, BookingStatus::Confirmed);

    app.clock.advance(Duration::hours(2));
    let cancelled = state
        .admin
        .cancel_booking(
            &booking.id,
            CancelRequest {
                reason: "change of plans".to_string(),
            },
        )
        .await
        .unwrap();
    assert_eq!(cancelled.status, BookingStatus::Cancelled);
    assert_eq!(cancelled.refund_amount_cents, Some(17500));
    assert_eq!(cancelled.refund_status, Some(RefundStatus::Completed));
    assert_eq!(app.gateway.settled().len(), 1);

    let listed = state.bookings.list_for_user("alice").await.unwrap();
    assert_eq!(listed.len(), 1);
    assert!(listed[0].is_cancelled());
}

#[tokio::test]
async fn test_cancellation_distinguishes_missing_from_departed() {
    let app = test_app().await;
    let state = &app.state;
    let booking = state.bookings.book(flight_request("alice", "FL1-2B")).await.unwrap();

    let missing = state.cancellations.cancel("no-such-booking", "sick").await.unwrap_err();
    assert!(matches!(missing, CoreError::NotFound(_)));

    // past the 07:30 departure on the 14th
    app.clock.set(Utc.with_ymd_and_hms(2025, 3, 14, 8, 0, 0).unwrap());
    let departed = state.cancellations.cancel(&booking.id, "sick").await.unwrap_err();
    assert!(matches!(departed, CoreError::InvalidState(_)));
}

#[tokio::test]
async fn test_hotel_rooms_and_failed_settlement() {
    let app = test_app().await;
    let state = &app.state;

    let request = |user: &str, quantity| BookingRequest {
        user_id: user.to_string(),
        booking_type: BookingType::Hotel,
        resource_ref: "H1".to_string(),
        quantity,
        total_amount_cents: 9999,
        seat: None,
    };

    let booking = state.bookings.book(request("carol", 2)).await.unwrap();
    assert_eq!(state.rooms.available("H1").await.unwrap(), 1);

    let err = state.bookings.book(request("dave", 2)).await.unwrap_err();
    assert!(matches!(err, CoreError::InsufficientInventory { requested: 2, available: 1 }));
    assert_eq!(state.rooms.available("H1").await.unwrap(), 1);

    // 30h later, check-in still a day away: half back, rounded up
    app.gateway.set_failing(true);
    app.clock.advance(Duration::hours(30));
    let cancelled = state.cancellations.cancel(&booking.id, "sick").await.unwrap();
    assert_eq!(cancelled.refund_amount_cents, Some(5000));
    assert_eq!(cancelled.refund_status, Some(RefundStatus::Pending));

    let refunds = state.cancellations.refunds_for(&booking.id).await.unwrap();
    assert_eq!(refunds.len(), 1);
    assert_eq!(refunds[0].status, RefundStatus::Failed);
}

#[tokio::test]
async fn test_pricing_admin_and_freeze() {
    let app = test_app().await;
    let state = &app.state;

    let flight = state
        .admin
        .set_base_price("FL1", SetBasePriceRequest { base_price_cents: 20000 })
        .await
        .unwrap();
    assert_eq!(flight.current_price_cents, 20000);

    // 6 bookings in the last week: light demand, +10%
    for i in 0..6 {
        state
            .bookings
            .book(flight_request(&format!("user-{}", i), &format!("FL1-{}C", i + 1)))
            .await
            .unwrap();
    }

    let frozen = state.admin.freeze("FL1", FreezeRequest::default()).await.unwrap();
    assert_eq!(frozen.price_freeze_until, Some(start() + Duration::minutes(30)));

    let report = state.pricing.run_cycle().await.unwrap();
    assert_eq!(report.skipped_frozen, 1);
    assert_eq!(state.admin.price_view("FL1").await.unwrap().current_price_cents, 20000);

    app.clock.advance(Duration::minutes(45));
    let report = state.pricing.run_cycle().await.unwrap();
    assert_eq!(report.updated, 1);

    let view = state.admin.price_view("FL1").await.unwrap();
    assert_eq!(view.base_price_cents, 20000);
    assert_eq!(view.current_price_cents, 22000);

    let history = state.admin.price_history("FL1").await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].reason, "admin set base price");
    assert!(history[1].reason.starts_with("dynamic pricing: light demand"));
    assert!(history[0].timestamp < history[1].timestamp);

    let err = state
        .admin
        .freeze("FL404", FreezeRequest { minutes: Some(10) })
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::NotFound(_)));
}

#[tokio::test]
async fn test_flight_status_stream() {
    let app = test_app().await;
    let state = &app.state;

    let mut stream = state.status_board.subscribe("FL1").unwrap().into_stream();
    let init = stream.next().await.unwrap();
    assert_eq!(init.event_type, EventType::Init);

    assert_eq!(state.status_board.tick(), 1);
    let update = stream.next().await.unwrap();
    match update.payload {
        EventPayload::FlightStatus(status) => {
            assert_eq!(status.status, FlightState::Delayed);
            assert_eq!(status.delay_minutes, 15);
        }
        other => panic!("unexpected payload: {:?}", other),
    }

    let json = serde_json::to_value(&init).unwrap();
    assert_eq!(json["eventType"], "init");
    assert_eq!(json["payload"]["status"], "ON_TIME");
}

#[tokio::test]
async fn test_pricing_worker_runs_and_stops() {
    let app = test_app().await;
    let state = &app.state;
    state
        .admin
        .set_base_price("FL1", SetBasePriceRequest { base_price_cents: 10000 })
        .await
        .unwrap();
    for i in 0..5 {
        state
            .bookings
            .book(flight_request(&format!("user-{}", i), &format!("FL1-{}D", i + 1)))
            .await
            .unwrap();
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker = start_pricing_worker(state.pricing.clone(), std::time::Duration::from_millis(20), shutdown_rx);

    let mut repriced = false;
    for _ in 0..50 {
        if state.admin.price_view("FL1").await.unwrap().current_price_cents == 11000 {
            repriced = true;
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert!(repriced);

    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(std::time::Duration::from_secs(2), worker)
        .await
        .unwrap()
        .unwrap();
}

/// Flight store where a pricing cycle commits between the admin's read and write
struct RepriceBeforeFreeze {
    inner: MemoryStore<Flight>,
    raced: AtomicBool,
}

#[async_trait]
impl DocumentStore<Flight> for RepriceBeforeFreeze {
    async fn find_by_id(&self, id: &str) -> StoreResult<Option<Flight>> {
        self.inner.find_by_id(id).await
    }

    async fn find_by(&self, filter: &Filter) -> StoreResult<Vec<Flight>> {
        self.inner.find_by(filter).await
    }

    async fn find_all(&self) -> StoreResult<Vec<Flight>> {
        self.inner.find_all().await
    }

    async fn save(&self, doc: Flight) -> StoreResult<Flight> {
        if doc.price_freeze_until.is_some() && !self.raced.swap(true, Ordering::SeqCst) {
            if let Some(mut current) = self.inner.find_by_id(&doc.id).await? {
                current.current_price_cents = 13000;
                self.inner.save(current).await?;
            }
        }
        self.inner.save(doc).await
    }
}

#[tokio::test]
async fn test_freeze_retries_over_concurrent_reprice() {
    let flights = Arc::new(RepriceBeforeFreeze {
        inner: MemoryStore::new(),
        raced: AtomicBool::new(false),
    });
    let mut flight = Flight::new("FL1", "Morning hop", 10000, None);
    flight.current_price_cents = 10000;
    flights.inner.save(flight).await.unwrap();

    let mut collections = in_memory_collections();
    collections.flights = flights.clone();
    let state = AppState::build(
        Config::default(),
        collections,
        Arc::new(MockSettlementGateway::new()),
        Arc::new(FixedClock::new(start())),
        Arc::new(AlwaysLate),
    )
    .unwrap();

    let view = state
        .admin
        .freeze("FL1", FreezeRequest { minutes: Some(20) })
        .await
        .unwrap();
    assert_eq!(view.current_price_cents, 13000);
    assert_eq!(view.price_freeze_until, Some(start() + Duration::minutes(20)));

    let stored = flights.inner.find_by_id("FL1").await.unwrap().unwrap();
    assert_eq!(stored.current_price_cents, 13000);
    assert_eq!(stored.price_freeze_until, Some(start() + Duration::minutes(20)));
}
