//! Reservation core
//!
//! The only component allowed to mutate the slot catalog or the reservation
//! ledger. Booking flips occupancy *before* appending to the ledger and rolls
//! the flip back if the append fails; cancelling flips the ledger *before*
//! freeing the slot. With that ordering the catalog never reports a slot as
//! `Available` while an `Active` reservation exists, and never keeps a slot
//! `Occupied` after a failed append.
//!
//! Each two-step critical section runs on its own tokio task, so a caller
//! that goes away mid-request cannot leave the two stores half-updated.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, OnceLock};

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::domain::{
    CatalogError, LedgerError, NewReservation, Occupancy, Reservation, ReservationId,
    ReservationLedger, Slot, SlotCatalog, SlotId, SlotRepository,
};
use crate::support::errors::ReservationError;
use crate::support::shutdown::ShutdownSignal;

/// Result of a successful booking
#[derive(Debug, Clone, PartialEq)]
pub struct BookingReceipt {
    pub reservation_id: ReservationId,
    pub slot_id: SlotId,
    pub slot_label: String,
    pub created_at: DateTime<Utc>,
}

/// Result of a successful cancellation
#[derive(Debug, Clone, PartialEq)]
pub struct CancelReceipt {
    pub reservation_id: ReservationId,
    pub slot_id: SlotId,
    pub slot_label: String,
}

/// A ledger record joined with its slot label
#[derive(Debug, Clone, PartialEq)]
pub struct BookingView {
    pub reservation: Reservation,
    pub slot_label: String,
}

/// Records the first integrity violation and stops further mutations.
struct IntegrityGuard {
    violation: OnceLock<String>,
    shutdown: Option<ShutdownSignal>,
}

impl IntegrityGuard {
    fn new(shutdown: Option<ShutdownSignal>) -> Self {
        Self {
            violation: OnceLock::new(),
            shutdown,
        }
    }

    fn raise(&self, message: String) -> ReservationError {
        error!(violation = %message, "Reservation integrity violated; halting mutations");
        let _ = self.violation.set(message.clone());
        if let Some(shutdown) = &self.shutdown {
            shutdown.trigger();
        }
        ReservationError::Integrity(message)
    }

    fn check(&self) -> Result<(), ReservationError> {
        match self.violation.get() {
            Some(message) => Err(ReservationError::Integrity(format!(
                "reservation core halted: {}",
                message
            ))),
            None => Ok(()),
        }
    }
}

/// Service owning the slot catalog and the reservation ledger
pub struct ReservationService {
    catalog: Arc<SlotCatalog>,
    ledger: Arc<dyn ReservationLedger>,
    integrity: Arc<IntegrityGuard>,
}

impl ReservationService {
    /// Build a core from slots whose occupancy is already known to agree
    /// with `ledger`.
    pub fn new(slots: Vec<Slot>, ledger: Arc<dyn ReservationLedger>) -> Self {
        let catalog = SlotCatalog::new(slots);
        metrics::gauge!("parking_slots_occupied").set(catalog.occupied_ids().len() as f64);
        Self {
            catalog: Arc::new(catalog),
            ledger,
            integrity: Arc::new(IntegrityGuard::new(None)),
        }
    }

    /// Rebuild the core from persisted state. Occupancy is derived from the
    /// ledger's active reservations; a disagreeing persisted slot status is
    /// repaired. Two active reservations on one slot, or one on an unknown
    /// slot, refuse the restore.
    pub async fn restore(
        slots: &dyn SlotRepository,
        ledger: Arc<dyn ReservationLedger>,
    ) -> Result<Self, ReservationError> {
        let persisted = slots.find_all().await?;
        let active = ledger.list_active().await.map_err(ledger_failure)?;

        let known: HashSet<SlotId> = persisted.iter().map(|s| s.id).collect();
        let mut holders: HashMap<SlotId, ReservationId> = HashMap::new();
        for r in &active {
            if !known.contains(&r.slot_id) {
                return Err(ReservationError::Integrity(format!(
                    "booking {} holds unknown slot {}",
                    r.id, r.slot_id
                )));
            }
            if let Some(other) = holders.insert(r.slot_id, r.id) {
                return Err(ReservationError::Integrity(format!(
                    "slot {} is held by bookings {} and {}",
                    r.slot_id, other, r.id
                )));
            }
        }

        let mut restored = Vec::with_capacity(persisted.len());
        for slot in persisted {
            let derived = if holders.contains_key(&slot.id) {
                Occupancy::Occupied
            } else {
                Occupancy::Available
            };
            if slot.occupancy != derived {
                warn!(
                    slot_id = slot.id,
                    slot = %slot.label,
                    persisted = %slot.occupancy,
                    derived = %derived,
                    "Slot status disagrees with ledger, repairing"
                );
                slots.set_occupancy(slot.id, derived).await?;
            }
            restored.push(slot.with_occupancy(derived));
        }

        info!(
            slots = restored.len(),
            active = active.len(),
            "Reservation core restored"
        );
        Ok(Self::new(restored, ledger))
    }

    /// Trigger `signal` when an integrity violation is detected
    pub fn with_shutdown(mut self, signal: ShutdownSignal) -> Self {
        self.integrity = Arc::new(IntegrityGuard::new(Some(signal)));
        self
    }

    /// First integrity violation seen by this core, if any
    pub fn integrity_violation(&self) -> Option<String> {
        self.integrity.violation.get().cloned()
    }

    /// All slots ordered by label
    pub fn list_slots(&self) -> Vec<Slot> {
        self.catalog.list()
    }

    /// Reserve `slot_id` for `holder_name`.
    pub async fn book(
        &self,
        slot_id: SlotId,
        holder_name: &str,
        asset_tag: &str,
    ) -> Result<BookingReceipt, ReservationError> {
        let holder_name = require_non_empty("user_name", holder_name)?;
        let asset_tag = require_non_empty("vehicle_number", asset_tag)?;
        self.integrity.check()?;

        let slot = self.catalog.try_mark_occupied(slot_id).map_err(|e| match e {
            CatalogError::SlotNotFound(_) => ReservationError::SlotNotFound,
            CatalogError::AlreadyOccupied(_) => ReservationError::SlotUnavailable,
        })?;

        let created_at = Utc::now();
        let entry = NewReservation {
            slot_id,
            holder_name: holder_name.to_string(),
            asset_tag: asset_tag.to_string(),
            created_at,
        };

        let catalog = self.catalog.clone();
        let ledger = self.ledger.clone();
        let integrity = self.integrity.clone();
        let task = tokio::spawn(async move {
            match ledger.append(entry).await {
                Ok(id) => Ok(id),
                Err(LedgerError::Unconfirmed(msg)) => Err(integrity.raise(format!(
                    "booking of slot {} may or may not be recorded: {}",
                    slot_id, msg
                ))),
                Err(e) => {
                    warn!(slot_id, error = %e, "Ledger append failed, releasing slot");
                    match catalog.mark_available(slot_id) {
                        Ok(Occupancy::Occupied) => Err(ledger_failure(e)),
                        Ok(Occupancy::Available) => Err(integrity.raise(format!(
                            "slot {} was already available while rolling back a failed booking",
                            slot_id
                        ))),
                        Err(_) => Err(integrity.raise(format!(
                            "slot {} disappeared while rolling back a failed booking",
                            slot_id
                        ))),
                    }
                }
            }
        });
        let reservation_id = self.settle(task, "book").await?;

        metrics::gauge!("parking_slots_occupied").increment(1.0);
        info!(
            booking_id = reservation_id,
            slot_id,
            slot = %slot.label,
            user = holder_name,
            "Slot booked"
        );

        Ok(BookingReceipt {
            reservation_id,
            slot_id,
            slot_label: slot.label,
            created_at,
        })
    }

    /// Cancel an active reservation and free its slot.
    pub async fn cancel(
        &self,
        reservation_id: ReservationId,
    ) -> Result<CancelReceipt, ReservationError> {
        self.integrity.check()?;

        let catalog = self.catalog.clone();
        let ledger = self.ledger.clone();
        let integrity = self.integrity.clone();
        let task = tokio::spawn(async move {
            let slot_id = match ledger.cancel(reservation_id).await {
                Ok(slot_id) => slot_id,
                Err(LedgerError::Unconfirmed(msg)) => {
                    return Err(integrity.raise(format!(
                        "cancellation of booking {} may or may not be recorded: {}",
                        reservation_id, msg
                    )))
                }
                Err(e) => return Err(ledger_failure(e)),
            };
            match catalog.mark_available(slot_id) {
                Ok(Occupancy::Occupied) => Ok(slot_id),
                Ok(Occupancy::Available) => Err(integrity.raise(format!(
                    "cancelling booking {} freed slot {} which was already available",
                    reservation_id, slot_id
                ))),
                Err(_) => Err(integrity.raise(format!(
                    "booking {} references slot {} unknown to the catalog",
                    reservation_id, slot_id
                ))),
            }
        });
        let slot_id = self.settle(task, "cancel").await?;

        metrics::gauge!("parking_slots_occupied").decrement(1.0);
        let slot_label = self.slot_label(slot_id);
        info!(booking_id = reservation_id, slot_id, slot = %slot_label, "Booking cancelled");

        Ok(CancelReceipt {
            reservation_id,
            slot_id,
            slot_label,
        })
    }

    pub async fn find_booking(
        &self,
        reservation_id: ReservationId,
    ) -> Result<Option<BookingView>, ReservationError> {
        let found = self
            .ledger
            .find_by_id(reservation_id)
            .await
            .map_err(ledger_failure)?;
        Ok(found.map(|reservation| self.view(reservation)))
    }

    /// Reservations of `holder_name`, most recent first, cancelled ones included
    pub async fn bookings_for(&self, holder_name: &str) -> Result<Vec<BookingView>, ReservationError> {
        let holder_name = require_non_empty("user_name", holder_name)?;
        let found = self
            .ledger
            .list_by_holder(holder_name)
            .await
            .map_err(ledger_failure)?;
        Ok(found.into_iter().map(|r| self.view(r)).collect())
    }

    /// Check that occupied slots and active reservations describe the same set.
    pub async fn verify_consistency(&self) -> Result<(), ReservationError> {
        let occupied = self.catalog.occupied_ids();
        let active: BTreeSet<SlotId> = self
            .ledger
            .list_active()
            .await
            .map_err(ledger_failure)?
            .into_iter()
            .map(|r| r.slot_id)
            .collect();

        if occupied != active {
            return Err(ReservationError::Integrity(format!(
                "occupied slots {:?} differ from actively booked slots {:?}",
                occupied, active
            )));
        }
        Ok(())
    }

    async fn settle<T>(
        &self,
        task: JoinHandle<Result<T, ReservationError>>,
        operation: &str,
    ) -> Result<T, ReservationError> {
        match task.await {
            Ok(result) => result,
            Err(e) => Err(self
                .integrity
                .raise(format!("{} task did not complete: {}", operation, e))),
        }
    }

    fn view(&self, reservation: Reservation) -> BookingView {
        let slot_label = self.slot_label(reservation.slot_id);
        BookingView {
            reservation,
            slot_label,
        }
    }

    fn slot_label(&self, slot_id: SlotId) -> String {
        self.catalog
            .label_of(slot_id)
            .unwrap_or_else(|| format!("#{}", slot_id))
    }
}

fn require_non_empty<'a>(field: &str, value: &'a str) -> Result<&'a str, ReservationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ReservationError::InvalidRequest(format!(
            "{} must not be empty",
            field
        )));
    }
    Ok(trimmed)
}

fn ledger_failure(e: LedgerError) -> ReservationError {
    match e {
        LedgerError::NotFound(_) => ReservationError::ReservationNotFound,
        LedgerError::AlreadyCancelled(_) => ReservationError::AlreadyCancelled,
        LedgerError::Storage(msg) => ReservationError::Storage(msg),
        LedgerError::Unconfirmed(msg) => ReservationError::Integrity(msg),
    }
}
