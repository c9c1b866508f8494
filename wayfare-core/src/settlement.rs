use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use wayfare_shared::Refund;

#[derive(Debug, thiserror::Error)]
pub enum SettlementError {
    #[error("Settlement rejected: {0}")]
    Rejected(String),
    #[error("Settlement gateway unavailable: {0}")]
    Unavailable(String),
}

/// Finalizes a refund with whoever moves the money
#[async_trait]
pub trait SettlementGateway: Send + Sync {
    async fn settle(&self, refund: &Refund) -> Result<(), SettlementError>;
}

/// Internal settlement: refunds are credited as soon as they are issued
pub struct InstantSettlement;

#[async_trait]
impl SettlementGateway for InstantSettlement {
    async fn settle(&self, refund: &Refund) -> Result<(), SettlementError> {
        tracing::debug!("Settled refund {} for booking {}", refund.id, refund.booking_id);
        Ok(())
    }
}

/// Gateway that records what it settled and can be switched to reject
#[derive(Default)]
pub struct MockSettlementGateway {
    failing: AtomicBool,
    settled: Mutex<Vec<String>>,
}

impl MockSettlementGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let gateway = Self::default();
        gateway.set_failing(true);
        gateway
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Ids of refunds settled so far
    pub fn settled(&self) -> Vec<String> {
        self.settled.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl SettlementGateway for MockSettlementGateway {
    async fn settle(&self, refund: &Refund) -> Result<(), SettlementError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SettlementError::Unavailable("simulated gateway outage".to_string()));
        }
        self.settled
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(refund.id.clone());
        Ok(())
    }
}
