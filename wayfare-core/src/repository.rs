use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;
use wayfare_shared::{Booking, Document, Flight, Hotel, PriceHistory, Refund, Seat, UserBookings};

use crate::{CoreError, CoreResult};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Version conflict on {collection}/{id}: expected {expected}, found {found}")]
    VersionConflict {
        collection: &'static str,
        id: String,
        expected: u64,
        found: u64,
    },
    #[error("Document encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Field-equality filter over a document's serialized form
#[derive(Debug, Clone, Default)]
pub struct Filter {
    fields: Vec<(String, Value)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.push((field.into(), value.into()));
        self
    }

    pub fn fields(&self) -> &[(String, Value)] {
        &self.fields
    }

    /// An empty filter matches every document
    pub fn matches(&self, doc: &Value) -> bool {
        self.fields
            .iter()
            .all(|(field, expected)| doc.get(field) == Some(expected))
    }
}

/// Keyed document collection.
///
/// `save` is an insert when the document has no id (the store assigns one) or
/// when the id is new and the version is 0. Otherwise it is a conditional
/// update: the stored version must equal the document's version or the save
/// fails with [`StoreError::VersionConflict`]. Every successful save returns
/// the document with its bumped version.
#[async_trait]
pub trait DocumentStore<T: Document>: Send + Sync {
    async fn find_by_id(&self, id: &str) -> StoreResult<Option<T>>;

    async fn find_by(&self, filter: &Filter) -> StoreResult<Vec<T>>;

    async fn find_all(&self) -> StoreResult<Vec<T>>;

    async fn save(&self, doc: T) -> StoreResult<T>;
}

/// Every collection the booking core reads or writes
#[derive(Clone)]
pub struct Collections {
    pub seats: Arc<dyn DocumentStore<Seat>>,
    pub bookings: Arc<dyn DocumentStore<Booking>>,
    pub refunds: Arc<dyn DocumentStore<Refund>>,
    pub flights: Arc<dyn DocumentStore<Flight>>,
    pub hotels: Arc<dyn DocumentStore<Hotel>>,
    pub user_bookings: Arc<dyn DocumentStore<UserBookings>>,
    pub price_history: Arc<dyn DocumentStore<PriceHistory>>,
}

/// Read `id`, apply `mutate`, and save conditionally.
///
/// A version conflict means another writer got in between the read and the
/// save; the document is re-read and `mutate` runs again on the fresh copy, up
/// to `max_attempts` times. Errors returned by `mutate` abort without writing.
pub async fn modify<T, R, F>(
    store: &dyn DocumentStore<T>,
    id: &str,
    max_attempts: u32,
    mut mutate: F,
) -> CoreResult<(T, R)>
where
    T: Document,
    R: Send,
    F: FnMut(&mut T) -> CoreResult<R> + Send,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        let mut doc = store
            .find_by_id(id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("{} {}", T::COLLECTION, id)))?;

        let outcome = mutate(&mut doc)?;

        match store.save(doc).await {
            Ok(saved) => return Ok((saved, outcome)),
            Err(StoreError::VersionConflict { .. }) if attempt < max_attempts => {
                debug!("Version conflict on {}/{}, retrying (attempt {})", T::COLLECTION, id, attempt);
            }
            Err(e) => return Err(e.into()),
        }
    }
}
