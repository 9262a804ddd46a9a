//! SeaORM implementation of ReservationLedger
//!
//! Every mutation runs in its own database transaction which also mirrors
//! the slot's `status` column, so the persisted relations agree with each
//! other after every commit. `booking_id` is an SQLite `AUTOINCREMENT`
//! key and is therefore never reused, even after a rollback.

use async_trait::async_trait;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, ConnectionTrait, DatabaseConnection,
    DbErr, EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use tracing::debug;

use crate::domain::{
    LedgerError, NewReservation, Occupancy, Reservation, ReservationId, ReservationLedger,
    ReservationStatus, SlotId,
};
use crate::infrastructure::database::entities::{booking, parking_slot};

pub struct SeaOrmLedger {
    db: DatabaseConnection,
}

impl SeaOrmLedger {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

// ── Conversion helpers ──────────────────────────────────────────

fn model_to_domain(m: booking::Model) -> Result<Reservation, LedgerError> {
    let status = ReservationStatus::parse(&m.booking_status).ok_or_else(|| {
        LedgerError::Storage(format!(
            "booking {} has unknown status '{}'",
            m.booking_id, m.booking_status
        ))
    })?;
    Ok(Reservation {
        id: m.booking_id,
        slot_id: m.slot_id,
        holder_name: m.user_name,
        asset_tag: m.vehicle_number,
        created_at: m.start_time,
        status,
    })
}

fn models_to_domain(models: Vec<booking::Model>) -> Result<Vec<Reservation>, LedgerError> {
    models.into_iter().map(model_to_domain).collect()
}

fn ledger_err(e: DbErr) -> LedgerError {
    LedgerError::Storage(format!("Database error: {}", e))
}

fn commit_err(e: DbErr) -> LedgerError {
    LedgerError::Unconfirmed(format!("Commit failed: {}", e))
}

async fn mirror_slot_status<C: ConnectionTrait>(
    conn: &C,
    slot_id: SlotId,
    occupancy: Occupancy,
) -> Result<(), LedgerError> {
    let result = parking_slot::Entity::update_many()
        .col_expr(parking_slot::Column::Status, Expr::value(occupancy.as_str()))
        .filter(parking_slot::Column::SlotId.eq(slot_id))
        .exec(conn)
        .await
        .map_err(ledger_err)?;

    if result.rows_affected == 0 {
        return Err(LedgerError::Storage(format!(
            "slot {} missing from parking_slots",
            slot_id
        )));
    }
    Ok(())
}

// ── ReservationLedger impl ──────────────────────────────────────

#[async_trait]
impl ReservationLedger for SeaOrmLedger {
    async fn append(&self, entry: NewReservation) -> Result<ReservationId, LedgerError> {
        let slot_id = entry.slot_id;
        let txn = self.db.begin().await.map_err(ledger_err)?;

        let model = booking::ActiveModel {
            booking_id: NotSet,
            slot_id: Set(slot_id),
            user_name: Set(entry.holder_name),
            vehicle_number: Set(entry.asset_tag),
            start_time: Set(entry.created_at),
            booking_status: Set(ReservationStatus::Active.as_str().to_string()),
        };
        let inserted = model.insert(&txn).await.map_err(ledger_err)?;
        mirror_slot_status(&txn, slot_id, Occupancy::Occupied).await?;

        txn.commit().await.map_err(commit_err)?;
        debug!(booking_id = inserted.booking_id, slot_id, "Booking committed");
        Ok(inserted.booking_id)
    }

    async fn cancel(&self, id: ReservationId) -> Result<SlotId, LedgerError> {
        let txn = self.db.begin().await.map_err(ledger_err)?;

        // Write first: the conditional UPDATE takes the write lock before any
        // read, so concurrent cancels queue instead of deadlocking on upgrade.
        let flipped = booking::Entity::update_many()
            .col_expr(
                booking::Column::BookingStatus,
                Expr::value(ReservationStatus::Cancelled.as_str()),
            )
            .filter(booking::Column::BookingId.eq(id))
            .filter(booking::Column::BookingStatus.eq(ReservationStatus::Active.as_str()))
            .exec(&txn)
            .await
            .map_err(ledger_err)?;

        let existing = booking::Entity::find_by_id(id)
            .one(&txn)
            .await
            .map_err(ledger_err)?
            .ok_or(LedgerError::NotFound(id))?;

        if flipped.rows_affected == 0 {
            return Err(LedgerError::AlreadyCancelled(id));
        }
        mirror_slot_status(&txn, existing.slot_id, Occupancy::Available).await?;

        txn.commit().await.map_err(commit_err)?;
        debug!(booking_id = id, slot_id = existing.slot_id, "Cancellation committed");
        Ok(existing.slot_id)
    }

    async fn find_by_id(&self, id: ReservationId) -> Result<Option<Reservation>, LedgerError> {
        booking::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(ledger_err)?
            .map(model_to_domain)
            .transpose()
    }

    async fn list_by_holder(&self, holder_name: &str) -> Result<Vec<Reservation>, LedgerError> {
        let models = booking::Entity::find()
            .filter(booking::Column::UserName.eq(holder_name))
            .order_by_desc(booking::Column::StartTime)
            .order_by_desc(booking::Column::BookingId)
            .all(&self.db)
            .await
            .map_err(ledger_err)?;
        models_to_domain(models)
    }

    async fn list_active(&self) -> Result<Vec<Reservation>, LedgerError> {
        let models = booking::Entity::find()
            .filter(booking::Column::BookingStatus.eq(ReservationStatus::Active.as_str()))
            .order_by_asc(booking::Column::BookingId)
            .all(&self.db)
            .await
            .map_err(ledger_err)?;
        models_to_domain(models)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::slot::slot_labels;
    use crate::domain::SlotRepository;
    use crate::infrastructure::database::test_connection;
    use crate::infrastructure::database::SeaOrmSlotRepository;
    use chrono::{Duration, Utc};

    async fn seeded() -> (SeaOrmLedger, SeaOrmSlotRepository) {
        let db = test_connection().await;
        let slots = SeaOrmSlotRepository::new(db.clone());
        slots.seed_if_empty(&slot_labels("A", 10)).await.unwrap();
        (SeaOrmLedger::new(db), slots)
    }

    fn entry(slot_id: SlotId, holder: &str, tag: &str) -> NewReservation {
        NewReservation {
            slot_id,
            holder_name: holder.into(),
            asset_tag: tag.into(),
            created_at: Utc::now(),
        }
    }

    async fn slot_status(slots: &SeaOrmSlotRepository, slot_id: SlotId) -> Occupancy {
        slots
            .find_all()
            .await
            .unwrap()
            .into_iter()
            .find(|s| s.id == slot_id)
            .unwrap()
            .occupancy
    }

    #[tokio::test]
    async fn append_assigns_increasing_ids_and_mirrors_slot() {
        let (ledger, slots) = seeded().await;

        let first = ledger.append(entry(3, "alice", "XYZ1")).await.unwrap();
        let second = ledger.append(entry(4, "bob", "CAR-1")).await.unwrap();
        assert_eq!(first, 1);
        assert!(second > first);
        assert_eq!(slot_status(&slots, 3).await, Occupancy::Occupied);

        let stored = ledger.find_by_id(first).await.unwrap().unwrap();
        assert_eq!(stored.holder_name, "alice");
        assert_eq!(stored.asset_tag, "XYZ1");
        assert!(stored.is_active());
    }

    #[tokio::test]
    async fn cancel_flips_once() {
        let (ledger, slots) = seeded().await;
        let id = ledger.append(entry(5, "alice", "XYZ1")).await.unwrap();

        assert_eq!(ledger.cancel(id).await, Ok(5));
        assert_eq!(ledger.cancel(id).await, Err(LedgerError::AlreadyCancelled(id)));
        assert_eq!(ledger.cancel(999).await, Err(LedgerError::NotFound(999)));

        assert_eq!(slot_status(&slots, 5).await, Occupancy::Available);
        let stored = ledger.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(stored.status, ReservationStatus::Cancelled);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_cancels_on_pooled_file_database() {
        use crate::infrastructure::database::{init_database, migrator::Migrator, DatabaseConfig};
        use sea_orm_migration::MigratorTrait;
        use std::sync::Arc;

        let path = std::env::temp_dir().join(format!(
            "parking-ledger-cancel-{}.db",
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);
        let db = init_database(&DatabaseConfig {
            url: format!("sqlite://{}?mode=rwc", path.display()),
            max_connections: 8,
        })
        .await
        .unwrap();
        Migrator::up(&db, None).await.unwrap();
        SeaOrmSlotRepository::new(db.clone())
            .seed_if_empty(&slot_labels("A", 10))
            .await
            .unwrap();
        let ledger = Arc::new(SeaOrmLedger::new(db.clone()));

        for round in 0..10 {
            let id = ledger
                .append(entry(round % 10 + 1, "alice", "XYZ1"))
                .await
                .unwrap();
            let mut handles = Vec::new();
            for _ in 0..8 {
                let ledger = ledger.clone();
                handles.push(tokio::spawn(async move { ledger.cancel(id).await }));
            }

            let mut succeeded = 0;
            for h in handles {
                match h.await.unwrap() {
                    Ok(_) => succeeded += 1,
                    Err(e) => assert_eq!(e, LedgerError::AlreadyCancelled(id)),
                }
            }
            assert_eq!(succeeded, 1);
        }
        assert!(ledger.list_active().await.unwrap().is_empty());

        db.close().await.unwrap();
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn append_to_unknown_slot_leaves_no_record() {
        let (ledger, _) = seeded().await;
        assert!(matches!(
            ledger.append(entry(999, "alice", "XYZ1")).await,
            Err(LedgerError::Storage(_))
        ));
        assert!(ledger.list_by_holder("alice").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn history_is_kept_most_recent_first() {
        let (ledger, _) = seeded().await;
        let now = Utc::now();
        let old = ledger
            .append(NewReservation {
                created_at: now - Duration::hours(1),
                ..entry(1, "carol", "CAR-2")
            })
            .await
            .unwrap();
        let new = ledger.append(entry(2, "carol", "CAR-2")).await.unwrap();
        ledger.cancel(old).await.unwrap();

        let history = ledger.list_by_holder("carol").await.unwrap();
        let ids: Vec<_> = history.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![new, old]);
        assert_eq!(history[1].status, ReservationStatus::Cancelled);

        let active = ledger.list_active().await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, new);
    }
}
