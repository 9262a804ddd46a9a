//! Slot repository interface

use async_trait::async_trait;

use super::model::{Occupancy, Slot, SlotId};
use crate::domain::DomainResult;

/// Persistent slot relation. Read at startup to build the catalog; the
/// reservation core never goes through it on the request path.
#[async_trait]
pub trait SlotRepository: Send + Sync {
    /// Insert the given labels as `Available` slots if the relation is empty.
    /// Returns the number of slots created.
    async fn seed_if_empty(&self, labels: &[String]) -> DomainResult<usize>;

    /// All slots with their persisted status
    async fn find_all(&self) -> DomainResult<Vec<Slot>>;

    /// Overwrite the persisted status of one slot
    async fn set_occupancy(&self, slot_id: SlotId, occupancy: Occupancy) -> DomainResult<()>;
}
