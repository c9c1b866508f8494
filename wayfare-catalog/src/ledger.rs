use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, info};
use wayfare_core::{require_non_blank, CoreError, CoreResult, DocumentStore, Filter, Notifier, Subscription};
use wayfare_shared::{EventPayload, GroupEvent, Seat};

/// Reservation ledger for per-flight seat maps.
///
/// Each seat has its own async mutex kept in a sharded registry. A mutex is
/// only created for a seat that exists and is evicted again once no task
/// holds or waits on it, so the registry tracks in-flight work rather than
/// every id ever requested. Reserve and release on one seat run strictly one
/// after another; seats on the same or different flights never wait on each
/// other. Seeding a flight's default layout takes a per-flight mutex from the
/// same registry so concurrent first reads seed once.
pub struct SeatLedger {
    seats: Arc<dyn DocumentStore<Seat>>,
    notifier: Arc<dyn Notifier>,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl SeatLedger {
    pub fn new(seats: Arc<dyn DocumentStore<Seat>>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            seats,
            notifier,
            locks: DashMap::new(),
        }
    }

    fn lock_for(&self, key: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Hand back a registry mutex, removing the entry if nobody else has it.
    ///
    /// Clones are only taken under the shard lock `remove_if` also holds, so a
    /// count of one means no task is holding or queued on this mutex.
    fn evict(&self, key: &str, lock: Arc<Mutex<()>>) {
        drop(lock);
        self.locks.remove_if(key, |_, lock| Arc::strong_count(lock) == 1);
    }

    /// Seat map of a flight ordered by row, then column
    pub async fn get_map(&self, flight_id: &str) -> CoreResult<Vec<Seat>> {
        require_non_blank("flight_id", flight_id)?;

        let mut seats = self.load_group(flight_id).await?;
        if seats.is_empty() {
            seats = self.seed(flight_id).await?;
        }
        seats.sort_by(|a, b| (a.row, a.col).cmp(&(b.row, b.col)));
        Ok(seats)
    }

    pub async fn seat(&self, seat_id: &str) -> CoreResult<Seat> {
        self.seats
            .find_by_id(seat_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Seat {}", seat_id)))
    }

    /// Hold `seat_id` for `requester_id`.
    ///
    /// Holding a seat the requester already holds succeeds without change.
    pub async fn reserve(&self, seat_id: &str, requester_id: &str) -> CoreResult<Seat> {
        require_non_blank("seat_id", seat_id)?;
        require_non_blank("requester_id", requester_id)?;

        // Unknown seats never get a registry entry
        self.seat(seat_id).await?;

        let lock = self.lock_for(seat_id);
        let outcome = {
            let _guard = lock.lock().await;
            self.hold(seat_id, requester_id).await
        };
        self.evict(seat_id, lock);

        let (seat, changed) = outcome?;
        if changed {
            info!("Seat {} reserved by {}", seat.id, requester_id);
            self.broadcast(&seat);
        }
        Ok(seat)
    }

    /// Give back a seat held by `requester_id`
    pub async fn release(&self, seat_id: &str, requester_id: &str) -> CoreResult<Seat> {
        require_non_blank("seat_id", seat_id)?;
        require_non_blank("requester_id", requester_id)?;

        self.seat(seat_id).await?;

        let lock = self.lock_for(seat_id);
        let outcome = {
            let _guard = lock.lock().await;
            self.clear(seat_id, requester_id).await
        };
        self.evict(seat_id, lock);

        let seat = outcome?;
        info!("Seat {} released by {}", seat.id, requester_id);
        self.broadcast(&seat);
        Ok(seat)
    }

    /// Runs under the seat's mutex. The flag is false when the requester
    /// already held the seat and nothing was written.
    async fn hold(&self, seat_id: &str, requester_id: &str) -> CoreResult<(Seat, bool)> {
        let mut seat = self.seat(seat_id).await?;

        if seat.reserved {
            if seat.is_held_by(requester_id) {
                debug!("Seat {} already held by {}", seat_id, requester_id);
                return Ok((seat, false));
            }
            return Err(CoreError::Conflict(format!("Seat {} is already reserved", seat_id)));
        }

        seat.hold(requester_id);
        Ok((self.seats.save(seat).await?, true))
    }

    async fn clear(&self, seat_id: &str, requester_id: &str) -> CoreResult<Seat> {
        let mut seat = self.seat(seat_id).await?;

        if !seat.reserved {
            return Err(CoreError::InvalidState(format!("Seat {} is not reserved", seat_id)));
        }
        if !seat.is_held_by(requester_id) {
            return Err(CoreError::Conflict(format!(
                "Seat {} is reserved by another user",
                seat_id
            )));
        }

        seat.clear();
        Ok(self.seats.save(seat).await?)
    }

    /// Watch a flight's seat map; the subscription opens with an `init` event
    pub async fn subscribe(&self, flight_id: &str) -> CoreResult<Subscription> {
        let seats = self.get_map(flight_id).await?;
        let init = GroupEvent::init(flight_id, EventPayload::Seats(seats));
        Ok(self.notifier.subscribe(flight_id, Some(init)))
    }

    fn broadcast(&self, seat: &Seat) {
        self.notifier.publish(GroupEvent::update(
            &seat.flight_id,
            EventPayload::Seats(vec![seat.clone()]),
        ));
    }

    async fn load_group(&self, flight_id: &str) -> CoreResult<Vec<Seat>> {
        let filter = Filter::new().eq("flight_id", flight_id);
        Ok(self.seats.find_by(&filter).await?)
    }

    async fn seed(&self, flight_id: &str) -> CoreResult<Vec<Seat>> {
        let key = format!("flight:{}", flight_id);
        let lock = self.lock_for(&key);
        let seeded = {
            let _guard = lock.lock().await;
            self.seed_locked(flight_id).await
        };
        self.evict(&key, lock);
        seeded
    }

    async fn seed_locked(&self, flight_id: &str) -> CoreResult<Vec<Seat>> {
        // Another caller may have seeded while we waited
        let existing = self.load_group(flight_id).await?;
        if !existing.is_empty() {
            return Ok(existing);
        }

        let mut seeded = Vec::new();
        for seat in Seat::default_layout(flight_id) {
            seeded.push(self.seats.save(seat).await?);
        }
        info!("Seeded default seat layout for flight {} ({} seats)", flight_id, seeded.len());
        Ok(seeded)
    }

    #[cfg(test)]
    fn lock_count(&self) -> usize {
        self.locks.len()
    }
}
