//! Application services

mod reservation;

pub use reservation::{BookingReceipt, BookingView, CancelReceipt, ReservationService};
