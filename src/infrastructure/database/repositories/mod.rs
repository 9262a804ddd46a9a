//! Database repository implementations

pub mod booking_ledger;
pub mod slot_repository;

pub use booking_ledger::SeaOrmLedger;
pub use slot_repository::SeaOrmSlotRepository;
