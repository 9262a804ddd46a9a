//! Application layer: the reservation core, its wire DTOs and the request
//! dispatcher.

pub mod dispatcher;
pub mod dto;
pub mod services;

pub use dispatcher::RequestDispatcher;
pub use dto::Reply;
pub use services::{BookingReceipt, BookingView, CancelReceipt, ReservationService};
