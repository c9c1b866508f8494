use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, error, info, warn};
use wayfare_catalog::RoomInventory;
use wayfare_core::{require_non_blank, Clock, CoreError, CoreResult, DocumentStore, StoreError};
use wayfare_shared::{format_cents, Booking, BookingType, SeatLink, UserBookings};

#[derive(Debug, Clone, Deserialize)]
pub struct BookingRequest {
    pub user_id: String,
    pub booking_type: BookingType,
    /// Flight or hotel id
    pub resource_ref: String,
    pub quantity: u32,
    pub total_amount_cents: i64,
    #[serde(default)]
    pub seat: Option<SeatLink>,
}

/// Creates bookings and keeps each user's booking list
pub struct BookingManager {
    bookings: Arc<dyn DocumentStore<Booking>>,
    user_bookings: Arc<dyn DocumentStore<UserBookings>>,
    rooms: Arc<RoomInventory>,
    clock: Arc<dyn Clock>,
    max_attempts: u32,
}

impl BookingManager {
    pub fn new(
        bookings: Arc<dyn DocumentStore<Booking>>,
        user_bookings: Arc<dyn DocumentStore<UserBookings>>,
        rooms: Arc<RoomInventory>,
        clock: Arc<dyn Clock>,
        max_attempts: u32,
    ) -> Self {
        Self {
            bookings,
            user_bookings,
            rooms,
            clock,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Record a confirmed booking.
    ///
    /// Hotel bookings take rooms first and give them back if the booking
    /// cannot be written. Flight seats are expected to be held through the
    /// seat ledger before this is called.
    pub async fn book(&self, request: BookingRequest) -> CoreResult<Booking> {
        validate(&request)?;

        let booking = Booking::new(
            request.user_id.trim().to_string(),
            request.booking_type,
            request.resource_ref.trim().to_string(),
            request.quantity,
            request.total_amount_cents,
            request.seat,
            self.clock.now(),
        );

        let saved = match booking.booking_type {
            BookingType::Hotel => self.book_rooms(booking).await?,
            BookingType::Flight => self.bookings.save(booking).await?,
        };

        // The booking stands even if the back-reference cannot be written
        if let Err(e) = self.link_to_user(&saved.user_id, &saved.id).await {
            warn!("Booking {} not linked to user {}: {}", saved.id, saved.user_id, e);
        }

        info!(
            "Booked {} {} for {} ({} x{}, {})",
            saved.booking_type.as_str(),
            saved.resource_ref,
            saved.user_id,
            saved.id,
            saved.quantity,
            format_cents(saved.total_amount_cents)
        );
        Ok(saved)
    }

    async fn book_rooms(&self, booking: Booking) -> CoreResult<Booking> {
        let rooms = i32::try_from(booking.quantity)
            .map_err(|_| CoreError::ValidationError(format!("quantity {} is too large", booking.quantity)))?;
        let hotel_id = booking.resource_ref.clone();

        self.rooms.reserve(&hotel_id, rooms).await?;

        match self.bookings.save(booking).await {
            Ok(saved) => Ok(saved),
            Err(e) => {
                if let Err(restore_err) = self.rooms.restore(&hotel_id, rooms).await {
                    error!(
                        "Failed to restore {} rooms at {} after booking write failed: {}",
                        rooms, hotel_id, restore_err
                    );
                }
                Err(e.into())
            }
        }
    }

    pub async fn find(&self, booking_id: &str) -> CoreResult<Booking> {
        self.bookings
            .find_by_id(booking_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Booking {}", booking_id)))
    }

    /// A user's bookings in the order they were made
    pub async fn list_for_user(&self, user_id: &str) -> CoreResult<Vec<Booking>> {
        let Some(record) = self.user_bookings.find_by_id(user_id).await? else {
            return Ok(Vec::new());
        };

        let mut bookings = Vec::with_capacity(record.booking_ids.len());
        for id in &record.booking_ids {
            match self.bookings.find_by_id(id).await? {
                Some(booking) => bookings.push(booking),
                None => debug!("User {} links missing booking {}", user_id, id),
            }
        }
        Ok(bookings)
    }

    /// Append `booking_id` to the user's list, creating the list on first use
    pub async fn link_to_user(&self, user_id: &str, booking_id: &str) -> CoreResult<()> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let mut record = self
                .user_bookings
                .find_by_id(user_id)
                .await?
                .unwrap_or_else(|| UserBookings::new(user_id));

            if !record.link(booking_id) {
                return Ok(());
            }

            match self.user_bookings.save(record).await {
                Ok(_) => return Ok(()),
                Err(StoreError::VersionConflict { .. }) if attempt < self.max_attempts => {
                    debug!("Booking list for {} changed, retrying link", user_id);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

fn validate(request: &BookingRequest) -> CoreResult<()> {
    require_non_blank("user_id", &request.user_id)?;
    require_non_blank("resource_ref", &request.resource_ref)?;

    if request.quantity < 1 {
        return Err(CoreError::ValidationError("quantity must be at least 1".to_string()));
    }
    if request.total_amount_cents < 0 {
        return Err(CoreError::ValidationError("total amount cannot be negative".to_string()));
    }
    if let Some(seat) = &request.seat {
        require_non_blank("seat_id", &seat.seat_id)?;
        if seat.seat_price_cents < 0 {
            return Err(CoreError::ValidationError("seat price cannot be negative".to_string()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use tokio::task::JoinSet;
    use wayfare_core::{FixedClock, Filter, StoreResult};
    use wayfare_shared::{BookingStatus, Hotel};
    use wayfare_store::MemoryStore;

    struct Harness {
        manager: Arc<BookingManager>,
        hotels: Arc<MemoryStore<Hotel>>,
        bookings: Arc<MemoryStore<Booking>>,
    }

    async fn harness_with(bookings: Arc<dyn DocumentStore<Booking>>, hotel_rooms: i32) -> (Arc<BookingManager>, Arc<MemoryStore<Hotel>>) {
        let hotels = Arc::new(MemoryStore::<Hotel>::new());
        hotels
            .save(Hotel::new("H1", "Harbour Inn", hotel_rooms, None))
            .await
            .unwrap();
        let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap()));
        let manager = BookingManager::new(
            bookings,
            Arc::new(MemoryStore::<UserBookings>::new()),
            Arc::new(RoomInventory::new(hotels.clone(), 50)),
            clock,
            5,
        );
        (Arc::new(manager), hotels)
    }

    async fn harness(hotel_rooms: i32) -> Harness {
        let bookings = Arc::new(MemoryStore::<Booking>::new());
        let (manager, hotels) = harness_with(bookings.clone(), hotel_rooms).await;
        Harness { manager, hotels, bookings }
    }

    fn request(user: &str, booking_type: BookingType, resource: &str, quantity: u32) -> BookingRequest {
        BookingRequest {
            user_id: user.to_string(),
            booking_type,
            resource_ref: resource.to_string(),
            quantity,
            total_amount_cents: 25000,
            seat: None,
        }
    }

    #[tokio::test]
    async fn test_flight_booking_is_confirmed_and_linked() {
        let h = harness(5).await;
        let mut req = request("alice", BookingType::Flight, "FL1", 1);
        req.seat = Some(SeatLink {
            seat_id: "FL1-1A".to_string(),
            seat_price_cents: 7500,
        });

        let booking = h.manager.book(req).await.unwrap();
        assert!(!booking.id.is_empty());
        assert_eq!(booking.status, BookingStatus::Confirmed);
        assert_eq!(booking.booking_time, Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap());
        assert_eq!(booking.seat.as_ref().map(|s| s.seat_price_cents), Some(7500));

        let listed = h.manager.list_for_user("alice").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, booking.id);
        // flight bookings never touch room counters
        assert_eq!(h.hotels.find_by_id("H1").await.unwrap().unwrap().available_rooms, 5);
    }

    #[tokio::test]
    async fn test_hotel_booking_takes_rooms() {
        let h = harness(5).await;

        let booking = h.manager.book(request("bob", BookingType::Hotel, "H1", 2)).await.unwrap();
        assert_eq!(booking.quantity, 2);
        assert_eq!(h.hotels.find_by_id("H1").await.unwrap().unwrap().available_rooms, 3);
        assert_eq!(h.manager.list_for_user("bob").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_hotel_overbooking_writes_nothing() {
        let h = harness(2).await;

        let err = h.manager.book(request("bob", BookingType::Hotel, "H1", 3)).await.unwrap_err();
        assert!(matches!(err, CoreError::InsufficientInventory { requested: 3, available: 2 }));
        assert_eq!(h.hotels.find_by_id("H1").await.unwrap().unwrap().available_rooms, 2);
        assert!(h.bookings.is_empty());
        assert!(h.manager.list_for_user("bob").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_hotel_is_not_found() {
        let h = harness(2).await;
        let err = h.manager.book(request("bob", BookingType::Hotel, "H404", 1)).await.unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_validation() {
        let h = harness(2).await;

        let cases = [
            request(" ", BookingType::Flight, "FL1", 1),
            request("alice", BookingType::Flight, "", 1),
            request("alice", BookingType::Hotel, "H1", 0),
            BookingRequest {
                total_amount_cents: -1,
                ..request("alice", BookingType::Flight, "FL1", 1)
            },
        ];
        for req in cases {
            let err = h.manager.book(req).await.unwrap_err();
            assert!(matches!(err, CoreError::ValidationError(_)), "got {:?}", err);
        }
        assert!(h.bookings.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_hotel_bookings_never_oversell() {
        let h = harness(6).await;

        let mut tasks = JoinSet::new();
        for i in 0..20 {
            let manager = h.manager.clone();
            tasks.spawn(async move {
                manager
                    .book(request(&format!("guest-{}", i), BookingType::Hotel, "H1", 1))
                    .await
            });
        }

        let mut confirmed = 0;
        while let Some(result) = tasks.join_next().await {
            if result.unwrap().is_ok() {
                confirmed += 1;
            }
        }

        assert_eq!(confirmed, 6);
        assert_eq!(h.hotels.find_by_id("H1").await.unwrap().unwrap().available_rooms, 0);
        assert_eq!(h.bookings.len(), 6);
    }

    /// Booking store that refuses every write
    struct ReadOnlyBookings;

    #[async_trait]
    impl DocumentStore<Booking> for ReadOnlyBookings {
        async fn find_by_id(&self, _id: &str) -> StoreResult<Option<Booking>> {
            Ok(None)
        }

        async fn find_by(&self, _filter: &Filter) -> StoreResult<Vec<Booking>> {
            Ok(Vec::new())
        }

        async fn find_all(&self) -> StoreResult<Vec<Booking>> {
            Ok(Vec::new())
        }

        async fn save(&self, _doc: Booking) -> StoreResult<Booking> {
            Err(StoreError::Unavailable("disk full".to_string()))
        }
    }

    #[tokio::test]
    async fn test_failed_write_gives_rooms_back() {
        let (manager, hotels) = harness_with(Arc::new(ReadOnlyBookings), 4).await;

        let err = manager.book(request("bob", BookingType::Hotel, "H1", 2)).await.unwrap_err();
        assert!(matches!(err, CoreError::Storage(StoreError::Unavailable(_))));
        assert_eq!(hotels.find_by_id("H1").await.unwrap().unwrap().available_rooms, 4);
    }

    #[tokio::test]
    async fn test_link_is_idempotent() {
        let h = harness(2).await;
        let booking = h.manager.book(request("alice", BookingType::Flight, "FL1", 1)).await.unwrap();

        h.manager.link_to_user("alice", &booking.id).await.unwrap();
        assert_eq!(h.manager.list_for_user("alice").await.unwrap().len(), 1);
    }
}
