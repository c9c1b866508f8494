use std::sync::Arc;

use tracing::{debug, info};
use wayfare_core::{modify, CoreError, CoreResult, DocumentStore};
use wayfare_shared::Hotel;

/// Room counters for hotels.
///
/// Every adjustment is a conditional write on the hotel's version, retried on
/// conflict, so concurrent bookings never take the same room twice.
pub struct RoomInventory {
    hotels: Arc<dyn DocumentStore<Hotel>>,
    max_attempts: u32,
}

impl RoomInventory {
    pub fn new(hotels: Arc<dyn DocumentStore<Hotel>>, max_attempts: u32) -> Self {
        Self {
            hotels,
            max_attempts: max_attempts.max(1),
        }
    }

    pub async fn available(&self, hotel_id: &str) -> Result<i32, InventoryError> {
        let hotel = self
            .hotels
            .find_by_id(hotel_id)
            .await
            .map_err(CoreError::from)?
            .ok_or_else(|| InventoryError::NotFound(hotel_id.to_string()))?;
        Ok(hotel.available_rooms)
    }

    /// Take `quantity` rooms; nothing is written when fewer are available
    pub async fn reserve(&self, hotel_id: &str, quantity: i32) -> Result<Hotel, InventoryError> {
        if quantity < 1 {
            return Err(InventoryError::InvalidQuantity(quantity));
        }

        let (hotel, _) = modify(self.hotels.as_ref(), hotel_id, self.max_attempts, |hotel| {
            if hotel.available_rooms < quantity {
                return Err(CoreError::InsufficientInventory {
                    requested: quantity,
                    available: hotel.available_rooms,
                });
            }
            hotel.available_rooms -= quantity;
            Ok(())
        })
        .await
        .map_err(|e| InventoryError::from_core(e, hotel_id))?;

        debug!("Reserved {} rooms at {}, {} left", quantity, hotel_id, hotel.available_rooms);
        Ok(hotel)
    }

    /// Give rooms back after a failed booking write
    pub async fn restore(&self, hotel_id: &str, quantity: i32) -> Result<Hotel, InventoryError> {
        if quantity < 1 {
            return Err(InventoryError::InvalidQuantity(quantity));
        }

        let (hotel, _) = modify(self.hotels.as_ref(), hotel_id, self.max_attempts, |hotel| {
            hotel.available_rooms += quantity;
            Ok(())
        })
        .await
        .map_err(|e| InventoryError::from_core(e, hotel_id))?;

        info!("Restored {} rooms at {}", quantity, hotel_id);
        Ok(hotel)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InventoryError {
    #[error("Inventory not found: {0}")]
    NotFound(String),

    #[error("Insufficient inventory: requested {requested}, available {available}")]
    InsufficientInventory {
        requested: i32,
        available: i32,
    },

    #[error("Invalid quantity: {0}")]
    InvalidQuantity(i32),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl InventoryError {
    fn from_core(err: CoreError, hotel_id: &str) -> Self {
        match err {
            CoreError::NotFound(_) => InventoryError::NotFound(hotel_id.to_string()),
            CoreError::InsufficientInventory { requested, available } => {
                InventoryError::InsufficientInventory { requested, available }
            }
            other => InventoryError::Core(other),
        }
    }
}

impl From<InventoryError> for CoreError {
    fn from(err: InventoryError) -> Self {
        match err {
            InventoryError::NotFound(id) => CoreError::NotFound(format!("Hotel {}", id)),
            InventoryError::InsufficientInventory { requested, available } => {
                CoreError::InsufficientInventory { requested, available }
            }
            InventoryError::InvalidQuantity(q) => {
                CoreError::ValidationError(format!("quantity must be at least 1, got {}", q))
            }
            InventoryError::Core(inner) => inner,
        }
    }
}
