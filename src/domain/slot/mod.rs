//! Slot aggregate
//!
//! Contains the Slot entity, the in-memory catalog and the repository interface.

pub mod catalog;
pub mod model;
pub mod repository;

pub use catalog::{CatalogError, SlotCatalog};
pub use model::{slot_labels, Occupancy, Slot, SlotId};
pub use repository::SlotRepository;
