use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use uuid::Uuid;
use wayfare_core::{Collections, DocumentStore, Filter, StoreError, StoreResult};
use wayfare_shared::{Booking, Document, Flight, Hotel, PriceHistory, Refund, Seat, UserBookings};

/// Process-local document collection.
///
/// Saves are checked and applied under one write lock, so the version compare
/// and the write are atomic with respect to other savers.
pub struct MemoryStore<T: Document> {
    docs: RwLock<HashMap<String, T>>,
}

impl<T: Document> MemoryStore<T> {
    pub fn new() -> Self {
        Self {
            docs: RwLock::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.docs.read().map(|docs| docs.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn poisoned() -> StoreError {
        StoreError::Unavailable(format!("{} collection lock poisoned", T::COLLECTION))
    }
}

impl<T: Document> Default for MemoryStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T: Document> DocumentStore<T> for MemoryStore<T> {
    async fn find_by_id(&self, id: &str) -> StoreResult<Option<T>> {
        let docs = self.docs.read().map_err(|_| Self::poisoned())?;
        Ok(docs.get(id).cloned())
    }

    async fn find_by(&self, filter: &Filter) -> StoreResult<Vec<T>> {
        let docs = self.docs.read().map_err(|_| Self::poisoned())?;
        let mut found = Vec::new();
        for doc in docs.values() {
            if filter.matches(&serde_json::to_value(doc)?) {
                found.push(doc.clone());
            }
        }
        Ok(found)
    }

    async fn find_all(&self) -> StoreResult<Vec<T>> {
        let docs = self.docs.read().map_err(|_| Self::poisoned())?;
        Ok(docs.values().cloned().collect())
    }

    async fn save(&self, mut doc: T) -> StoreResult<T> {
        let mut docs = self.docs.write().map_err(|_| Self::poisoned())?;

        if doc.id().is_empty() {
            doc.set_id(Uuid::new_v4().to_string());
        }

        let found = docs.get(doc.id()).map(|stored| stored.version()).unwrap_or(0);
        if found != doc.version() {
            return Err(StoreError::VersionConflict {
                collection: T::COLLECTION,
                id: doc.id().to_string(),
                expected: doc.version(),
                found,
            });
        }

        doc.set_version(found + 1);
        docs.insert(doc.id().to_string(), doc.clone());
        Ok(doc)
    }
}

/// Fresh in-memory backing for every collection
pub fn in_memory_collections() -> Collections {
    Collections {
        seats: Arc::new(MemoryStore::<Seat>::new()),
        bookings: Arc::new(MemoryStore::<Booking>::new()),
        refunds: Arc::new(MemoryStore::<Refund>::new()),
        flights: Arc::new(MemoryStore::<Flight>::new()),
        hotels: Arc::new(MemoryStore::<Hotel>::new()),
        user_bookings: Arc::new(MemoryStore::<UserBookings>::new()),
        price_history: Arc::new(MemoryStore::<PriceHistory>::new()),
    }
}
