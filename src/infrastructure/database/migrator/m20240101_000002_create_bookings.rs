//! Create bookings table
//!
//! Append-biased reservation history. Rows are never deleted; cancellation
//! only flips `booking_status`.

use sea_orm_migration::prelude::*;

use super::m20240101_000001_create_parking_slots::ParkingSlots;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Bookings::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Bookings::BookingId)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Bookings::SlotId).integer().not_null())
                    .col(ColumnDef::new(Bookings::UserName).string().not_null())
                    .col(ColumnDef::new(Bookings::VehicleNumber).string().not_null())
                    .col(
                        ColumnDef::new(Bookings::StartTime)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Bookings::BookingStatus)
                            .string()
                            .not_null()
                            .default("Active"),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_bookings_parking_slot")
                            .from(Bookings::Table, Bookings::SlotId)
                            .to(ParkingSlots::Table, ParkingSlots::SlotId),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_bookings_user_name")
                    .table(Bookings::Table)
                    .col(Bookings::UserName)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_bookings_status")
                    .table(Bookings::Table)
                    .col(Bookings::BookingStatus)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Bookings::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum Bookings {
    Table,
    BookingId,
    SlotId,
    UserName,
    VehicleNumber,
    StartTime,
    BookingStatus,
}
