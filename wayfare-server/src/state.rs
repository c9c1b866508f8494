use std::sync::Arc;

use anyhow::Context;
use wayfare_catalog::{
    DelaySource, DynamicPricingEngine, FlightStatusBoard, HolidayCalendar, PricingConfig, RandomDelaySource,
    RoomInventory, SeatLedger,
};
use wayfare_core::{Clock, Collections, InstantSettlement, SettlementGateway, SystemClock};
use wayfare_order::{BookingManager, CancellationEngine, RefundPolicy, RefundSettlement};
use wayfare_store::{app_config::Config, in_memory_collections, NotificationHub};

use crate::admin::PriceAdmin;

/// Every service of the booking core, wired over one set of collections
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub collections: Collections,
    pub clock: Arc<dyn Clock>,
    pub seat_events: Arc<NotificationHub>,
    pub status_events: Arc<NotificationHub>,
    pub ledger: Arc<SeatLedger>,
    pub rooms: Arc<RoomInventory>,
    pub bookings: Arc<BookingManager>,
    pub cancellations: Arc<CancellationEngine>,
    pub pricing: Arc<DynamicPricingEngine>,
    pub status_board: Arc<FlightStatusBoard>,
    pub admin: Arc<PriceAdmin>,
}

impl AppState {
    pub fn build(
        config: Config,
        collections: Collections,
        gateway: Arc<dyn SettlementGateway>,
        clock: Arc<dyn Clock>,
        delays: Arc<dyn DelaySource>,
    ) -> anyhow::Result<Self> {
        let timezone = config.business_rules.tz()?;
        let retries = config.pricing.max_conflict_retries;
        let holidays = HolidayCalendar::from_strings(&config.pricing.holidays)
            .context("Invalid pricing.holidays")?;

        // Seat maps and flight status share flight ids as group keys
        let seat_events = Arc::new(NotificationHub::new(config.notifications.channel_capacity));
        let status_events = Arc::new(NotificationHub::new(config.notifications.channel_capacity));

        let ledger = Arc::new(SeatLedger::new(collections.seats.clone(), seat_events.clone()));
        let rooms = Arc::new(RoomInventory::new(collections.hotels.clone(), retries));

        let bookings = Arc::new(BookingManager::new(
            collections.bookings.clone(),
            collections.user_bookings.clone(),
            rooms.clone(),
            clock.clone(),
            retries,
        ));

        let settlement = RefundSettlement::new(
            collections.refunds.clone(),
            collections.bookings.clone(),
            gateway,
            clock.clone(),
            retries,
        );
        let cancellations = Arc::new(CancellationEngine::new(
            collections.bookings.clone(),
            collections.refunds.clone(),
            collections.flights.clone(),
            collections.hotels.clone(),
            RefundPolicy::new(timezone),
            settlement,
            clock.clone(),
        ));

        let pricing = Arc::new(DynamicPricingEngine::new(
            collections.flights.clone(),
            collections.bookings.clone(),
            collections.price_history.clone(),
            clock.clone(),
            PricingConfig {
                holidays,
                timezone,
                max_conflict_retries: retries,
            },
        ));

        let status_board = Arc::new(FlightStatusBoard::new(status_events.clone(), clock.clone(), delays));

        let admin = Arc::new(PriceAdmin::new(
            collections.flights.clone(),
            collections.price_history.clone(),
            cancellations.clone(),
            clock.clone(),
            config.business_rules.default_freeze_minutes,
            retries,
        ));

        Ok(Self {
            config,
            collections,
            clock,
            seat_events,
            status_events,
            ledger,
            rooms,
            bookings,
            cancellations,
            pricing,
            status_board,
            admin,
        })
    }

    /// Production wiring over process-local collections
    pub fn in_memory(config: Config) -> anyhow::Result<Self> {
        Self::build(
            config,
            in_memory_collections(),
            Arc::new(InstantSettlement),
            Arc::new(SystemClock),
            Arc::new(RandomDelaySource::new()),
        )
    }
}
