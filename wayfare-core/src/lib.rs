pub mod clock;
pub mod notify;
pub mod repository;
pub mod settlement;

pub use clock::{Clock, FixedClock, SystemClock};
pub use notify::{Notifier, Subscription};
pub use repository::{modify, Collections, DocumentStore, Filter, StoreError, StoreResult};
pub use settlement::{InstantSettlement, MockSettlementGateway, SettlementError, SettlementGateway};

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("Validation failed: {0}")]
    ValidationError(String),
    #[error("Insufficient inventory: requested {requested}, available {available}")]
    InsufficientInventory { requested: i32, available: i32 },
    #[error("Settlement failed: {0}")]
    SettlementFailure(#[from] SettlementError),
    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl CoreError {
    /// Whether the caller may sensibly retry the same request.
    ///
    /// A seat taken by someone else can free up again; a seat or booking that
    /// does not exist will not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CoreError::Conflict(_) | CoreError::Storage(StoreError::VersionConflict { .. })
        )
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

/// Reject blank identifiers and free-text fields
pub fn require_non_blank(field: &str, value: &str) -> CoreResult<()> {
    if value.trim().is_empty() {
        return Err(CoreError::ValidationError(format!("{} is required", field)));
    }
    Ok(())
}
