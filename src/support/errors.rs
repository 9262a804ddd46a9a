use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Not found: {entity} with {field}={value}")]
    NotFound {
        entity: &'static str,
        field: &'static str,
        value: String,
    },

    #[error("Storage error: {0}")]
    Storage(String),
}

/// Failures surfaced by the reservation core to its callers.
///
/// Every variant except [`ReservationError::Integrity`] is a normal,
/// client-facing outcome. `Integrity` means the slot/ledger agreement has
/// already been broken and the process must not keep serving.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReservationError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Slot not found")]
    SlotNotFound,

    #[error("Slot is already occupied")]
    SlotUnavailable,

    #[error("Booking not found")]
    ReservationNotFound,

    #[error("Booking already cancelled")]
    AlreadyCancelled,

    #[error("Storage failure: {0}")]
    Storage(String),

    #[error("Integrity violation: {0}")]
    Integrity(String),
}

impl ReservationError {
    /// Stable machine-readable error kind used on the wire.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "invalid_request",
            Self::SlotNotFound => "slot_not_found",
            Self::SlotUnavailable => "slot_unavailable",
            Self::ReservationNotFound => "booking_not_found",
            Self::AlreadyCancelled => "already_cancelled",
            Self::Storage(_) => "storage_failure",
            Self::Integrity(_) => "internal_error",
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Integrity(_))
    }
}

impl From<DomainError> for ReservationError {
    fn from(err: DomainError) -> Self {
        Self::Storage(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum InfraError {
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Infra(#[from] InfraError),

    #[error(transparent)]
    Reservation(#[from] ReservationError),
}

impl From<sea_orm::DbErr> for AppError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Infra(InfraError::Database(err))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Infra(InfraError::Io(err))
    }
}
