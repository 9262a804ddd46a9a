//! In-memory storage implementations

mod memory;

pub use memory::{InMemoryLedger, InMemorySlotRepository};
