//! Wire DTOs for the reservation protocol

mod reply;
mod request;

pub use reply::{BookingDetailDto, BookingDto, Payload, Reply, SlotDto};
pub use request::{parse_validated, BookSlotRequest, BookingIdRequest, MyBookingsRequest};
