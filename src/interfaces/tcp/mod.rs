//! JSON-over-TCP transport

pub mod codec;
mod server;

pub use server::{ConnectionLimits, ParkingServer};
