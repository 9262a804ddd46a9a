//! Reservation aggregate
//!
//! Contains the Reservation entity, related types, and the ledger interface.

pub mod ledger;
pub mod model;

pub use ledger::{LedgerError, ReservationLedger};
pub use model::{NewReservation, Reservation, ReservationId, ReservationStatus};
