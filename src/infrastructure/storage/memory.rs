//! In-memory storage implementation

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::domain::{
    DomainError, DomainResult, LedgerError, NewReservation, Occupancy, Reservation,
    ReservationId, ReservationLedger, Slot, SlotId, SlotRepository,
};

/// In-memory ledger for ephemeral runs and testing.
///
/// "Durable" here means visible to every later read of this process.
pub struct InMemoryLedger {
    reservations: DashMap<ReservationId, Reservation>,
    counter: AtomicI32,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self {
            reservations: DashMap::new(),
            counter: AtomicI32::new(1),
        }
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReservationLedger for InMemoryLedger {
    async fn append(&self, entry: NewReservation) -> Result<ReservationId, LedgerError> {
        let id = self.counter.fetch_add(1, Ordering::SeqCst);
        self.reservations.insert(id, Reservation::new(id, entry));
        Ok(id)
    }

    async fn cancel(&self, id: ReservationId) -> Result<SlotId, LedgerError> {
        let mut reservation = self
            .reservations
            .get_mut(&id)
            .ok_or(LedgerError::NotFound(id))?;

        if !reservation.cancel() {
            return Err(LedgerError::AlreadyCancelled(id));
        }
        Ok(reservation.slot_id)
    }

    async fn find_by_id(&self, id: ReservationId) -> Result<Option<Reservation>, LedgerError> {
        Ok(self.reservations.get(&id).map(|r| r.clone()))
    }

    async fn list_by_holder(&self, holder_name: &str) -> Result<Vec<Reservation>, LedgerError> {
        let mut found: Vec<Reservation> = self
            .reservations
            .iter()
            .filter(|e| e.holder_name == holder_name)
            .map(|e| e.value().clone())
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(found)
    }

    async fn list_active(&self) -> Result<Vec<Reservation>, LedgerError> {
        let mut active: Vec<Reservation> = self
            .reservations
            .iter()
            .filter(|e| e.is_active())
            .map(|e| e.value().clone())
            .collect();
        active.sort_by_key(|r| r.id);
        Ok(active)
    }
}

/// In-memory slot relation
pub struct InMemorySlotRepository {
    slots: Mutex<BTreeMap<SlotId, Slot>>,
}

impl InMemorySlotRepository {
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(BTreeMap::new()),
        }
    }

    fn lock(&self) -> DomainResult<std::sync::MutexGuard<'_, BTreeMap<SlotId, Slot>>> {
        self.slots
            .lock()
            .map_err(|_| DomainError::Storage("slot table lock poisoned".into()))
    }
}

impl Default for InMemorySlotRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SlotRepository for InMemorySlotRepository {
    async fn seed_if_empty(&self, labels: &[String]) -> DomainResult<usize> {
        let mut slots = self.lock()?;
        if !slots.is_empty() {
            return Ok(0);
        }
        for (idx, label) in labels.iter().enumerate() {
            let id = idx as SlotId + 1;
            slots.insert(id, Slot::new(id, label.clone()));
        }
        Ok(labels.len())
    }

    async fn find_all(&self) -> DomainResult<Vec<Slot>> {
        Ok(self.lock()?.values().cloned().collect())
    }

    async fn set_occupancy(&self, slot_id: SlotId, occupancy: Occupancy) -> DomainResult<()> {
        let mut slots = self.lock()?;
        let slot = slots.get_mut(&slot_id).ok_or_else(|| DomainError::NotFound {
            entity: "Slot",
            field: "slot_id",
            value: slot_id.to_string(),
        })?;
        slot.occupancy = occupancy;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use std::collections::HashSet;
    use std::sync::Arc;

    fn entry(slot_id: SlotId, holder: &str) -> NewReservation {
        NewReservation {
            slot_id,
            holder_name: holder.into(),
            asset_tag: "CAR-1".into(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_appends_get_distinct_ids() {
        let ledger = Arc::new(InMemoryLedger::new());
        let mut handles = Vec::new();
        for i in 0..64 {
            let ledger = ledger.clone();
            handles.push(tokio::spawn(async move {
                ledger.append(entry(i % 10 + 1, "bob")).await.unwrap()
            }));
        }
        let mut ids = HashSet::new();
        for h in handles {
            assert!(ids.insert(h.await.unwrap()));
        }
        assert_eq!(ids.len(), 64);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_cancels_succeed_once() {
        let ledger = Arc::new(InMemoryLedger::new());
        let id = ledger.append(entry(4, "bob")).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let ledger = ledger.clone();
            handles.push(tokio::spawn(async move { ledger.cancel(id).await }));
        }
        let mut ok = 0;
        for h in handles {
            match h.await.unwrap() {
                Ok(slot_id) => {
                    assert_eq!(slot_id, 4);
                    ok += 1;
                }
                Err(e) => assert_eq!(e, LedgerError::AlreadyCancelled(id)),
            }
        }
        assert_eq!(ok, 1);
    }

    #[tokio::test]
    async fn cancel_unknown() {
        let ledger = InMemoryLedger::new();
        assert_eq!(ledger.cancel(42).await, Err(LedgerError::NotFound(42)));
    }

    #[tokio::test]
    async fn holder_listing_is_most_recent_first() {
        let ledger = InMemoryLedger::new();
        let now = Utc::now();
        let older = NewReservation {
            created_at: now - Duration::minutes(5),
            ..entry(1, "alice")
        };
        let newer = NewReservation {
            created_at: now,
            ..entry(2, "alice")
        };
        let first = ledger.append(older).await.unwrap();
        let second = ledger.append(newer).await.unwrap();
        ledger.append(entry(3, "bob")).await.unwrap();

        let ids: Vec<_> = ledger
            .list_by_holder("alice")
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec![second, first]);
    }

    #[tokio::test]
    async fn seed_runs_once() {
        let repo = InMemorySlotRepository::new();
        let labels = crate::domain::slot::slot_labels("A", 10);
        assert_eq!(repo.seed_if_empty(&labels).await.unwrap(), 10);
        assert_eq!(repo.seed_if_empty(&labels).await.unwrap(), 0);
        assert_eq!(repo.find_all().await.unwrap().len(), 10);
    }
}
