//! SeaORM implementation of SlotRepository

use async_trait::async_trait;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveValue::NotSet, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use tracing::{debug, warn};

use crate::domain::{DomainError, DomainResult, Occupancy, Slot, SlotId, SlotRepository};
use crate::infrastructure::database::entities::parking_slot;

pub struct SeaOrmSlotRepository {
    db: DatabaseConnection,
}

impl SeaOrmSlotRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

// ── Conversion helpers ──────────────────────────────────────────

fn model_to_domain(m: parking_slot::Model) -> Slot {
    let occupancy = Occupancy::parse(&m.status).unwrap_or_else(|| {
        warn!(slot_id = m.slot_id, status = %m.status, "Unknown slot status in database");
        Occupancy::Available
    });
    Slot::new(m.slot_id, m.slot_number).with_occupancy(occupancy)
}

fn db_err(e: sea_orm::DbErr) -> DomainError {
    DomainError::Storage(format!("Database error: {}", e))
}

// ── SlotRepository impl ─────────────────────────────────────────

#[async_trait]
impl SlotRepository for SeaOrmSlotRepository {
    async fn seed_if_empty(&self, labels: &[String]) -> DomainResult<usize> {
        if labels.is_empty() {
            return Ok(0);
        }

        let txn = self.db.begin().await.map_err(db_err)?;
        let existing = parking_slot::Entity::find()
            .count(&txn)
            .await
            .map_err(db_err)?;
        if existing > 0 {
            debug!(existing, "Parking slots already exist");
            txn.commit().await.map_err(db_err)?;
            return Ok(0);
        }

        let models = labels.iter().map(|label| parking_slot::ActiveModel {
            slot_id: NotSet,
            slot_number: Set(label.clone()),
            status: Set(Occupancy::Available.as_str().to_string()),
        });
        parking_slot::Entity::insert_many(models)
            .exec(&txn)
            .await
            .map_err(db_err)?;
        txn.commit().await.map_err(db_err)?;
        Ok(labels.len())
    }

    async fn find_all(&self) -> DomainResult<Vec<Slot>> {
        let models = parking_slot::Entity::find()
            .order_by_asc(parking_slot::Column::SlotId)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        Ok(models.into_iter().map(model_to_domain).collect())
    }

    async fn set_occupancy(&self, slot_id: SlotId, occupancy: Occupancy) -> DomainResult<()> {
        let result = parking_slot::Entity::update_many()
            .col_expr(parking_slot::Column::Status, Expr::value(occupancy.as_str()))
            .filter(parking_slot::Column::SlotId.eq(slot_id))
            .exec(&self.db)
            .await
            .map_err(db_err)?;

        if result.rows_affected == 0 {
            return Err(DomainError::NotFound {
                entity: "Slot",
                field: "slot_id",
                value: slot_id.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::slot::slot_labels;
    use crate::infrastructure::database::test_connection;

    #[tokio::test]
    async fn seeds_exactly_once() {
        let repo = SeaOrmSlotRepository::new(test_connection().await);
        let labels = slot_labels("A", 10);

        assert_eq!(repo.seed_if_empty(&labels).await.unwrap(), 10);
        assert_eq!(repo.seed_if_empty(&labels).await.unwrap(), 0);

        let slots = repo.find_all().await.unwrap();
        assert_eq!(slots.len(), 10);
        assert_eq!(slots[0].label, "A1");
        assert!(slots.iter().all(|s| s.occupancy.is_available()));
    }

    #[tokio::test]
    async fn set_occupancy_persists() {
        let repo = SeaOrmSlotRepository::new(test_connection().await);
        repo.seed_if_empty(&slot_labels("B", 2)).await.unwrap();
        let id = repo.find_all().await.unwrap()[1].id;

        repo.set_occupancy(id, Occupancy::Occupied).await.unwrap();
        let slot = repo
            .find_all()
            .await
            .unwrap()
            .into_iter()
            .find(|s| s.id == id)
            .unwrap();
        assert_eq!(slot.occupancy, Occupancy::Occupied);

        assert!(matches!(
            repo.set_occupancy(999, Occupancy::Available).await,
            Err(DomainError::NotFound { .. })
        ));
    }
}
