//! Domain layer: slots, reservations and the storage interfaces they need.

pub mod reservation;
pub mod slot;

pub use reservation::{
    LedgerError, NewReservation, Reservation, ReservationId, ReservationLedger, ReservationStatus,
};
pub use slot::{CatalogError, Occupancy, Slot, SlotCatalog, SlotId, SlotRepository};

pub use crate::support::errors::DomainError;

/// Result type for domain operations
pub type DomainResult<T> = Result<T, DomainError>;
