//! Database entities module

pub mod booking;
pub mod parking_slot;

pub use booking::Entity as Booking;
pub use parking_slot::Entity as ParkingSlot;
