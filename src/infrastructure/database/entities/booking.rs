//! Booking entity (one ledger record)

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "bookings")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub booking_id: i32,

    pub slot_id: i32,
    pub user_name: String,
    pub vehicle_number: String,
    pub start_time: DateTimeUtc,

    /// Booking status: Active, Cancelled
    pub booking_status: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::parking_slot::Entity",
        from = "Column::SlotId",
        to = "super::parking_slot::Column::SlotId"
    )]
    ParkingSlot,
}

impl Related<super::parking_slot::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ParkingSlot.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
