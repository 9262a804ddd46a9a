//! Reservation domain entity

use chrono::{DateTime, Utc};

use crate::domain::slot::SlotId;

/// Monotonic reservation identity, never reused.
pub type ReservationId = i32;

/// Reservation status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReservationStatus {
    /// Slot is held by this reservation
    Active,
    /// Released by the holder; terminal
    Cancelled,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "Active",
            Self::Cancelled => "Cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Active" => Some(Self::Active),
            "Cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Fields supplied by the caller when a reservation is appended to the ledger.
#[derive(Debug, Clone)]
pub struct NewReservation {
    pub slot_id: SlotId,
    pub holder_name: String,
    /// Vehicle registration number
    pub asset_tag: String,
    pub created_at: DateTime<Utc>,
}

/// Slot reservation
#[derive(Debug, Clone, PartialEq)]
pub struct Reservation {
    pub id: ReservationId,
    pub slot_id: SlotId,
    pub holder_name: String,
    pub asset_tag: String,
    /// Fixed at creation
    pub created_at: DateTime<Utc>,
    pub status: ReservationStatus,
}

impl Reservation {
    pub fn new(id: ReservationId, entry: NewReservation) -> Self {
        Self {
            id,
            slot_id: entry.slot_id,
            holder_name: entry.holder_name,
            asset_tag: entry.asset_tag,
            created_at: entry.created_at,
            status: ReservationStatus::Active,
        }
    }

    /// Cancel this reservation. Returns `false` if it was already cancelled.
    pub fn cancel(&mut self) -> bool {
        if self.status == ReservationStatus::Cancelled {
            return false;
        }
        self.status = ReservationStatus::Cancelled;
        true
    }

    pub fn is_active(&self) -> bool {
        self.status == ReservationStatus::Active
    }
}

// ── Tests ──────────────────────────────────────────────────────
