//! Reservation ledger interface

use async_trait::async_trait;
use thiserror::Error;

use super::model::{NewReservation, Reservation, ReservationId};
use crate::domain::slot::SlotId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("Reservation {0} not found")]
    NotFound(ReservationId),

    #[error("Reservation {0} is already cancelled")]
    AlreadyCancelled(ReservationId),

    #[error("Ledger storage error: {0}")]
    Storage(String),

    /// The write was sent but its commit was not acknowledged, so the
    /// record may or may not be durable.
    #[error("Ledger commit unconfirmed: {0}")]
    Unconfirmed(String),
}

/// Durable, append-biased history of reservations.
///
/// Implementations must make `append` durable before returning `Ok`, must
/// never hand out the same id twice, and must let exactly one of several
/// concurrent `cancel` calls on the same reservation succeed.
#[async_trait]
pub trait ReservationLedger: Send + Sync {
    /// Record a new `Active` reservation and return its id
    async fn append(&self, entry: NewReservation) -> Result<ReservationId, LedgerError>;

    /// Flip `Active -> Cancelled`, returning the slot that is now free
    async fn cancel(&self, id: ReservationId) -> Result<SlotId, LedgerError>;

    async fn find_by_id(&self, id: ReservationId) -> Result<Option<Reservation>, LedgerError>;

    /// Reservations of one holder, most recent first
    async fn list_by_holder(&self, holder_name: &str) -> Result<Vec<Reservation>, LedgerError>;

    /// All reservations still holding a slot
    async fn list_active(&self) -> Result<Vec<Reservation>, LedgerError>;
}
