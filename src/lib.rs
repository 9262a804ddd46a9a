//! # Parking Reservation Service
//!
//! Multi-client parking slot reservation server. Clients send one JSON
//! request per TCP connection to list slots, book, cancel and look up their
//! bookings; every reservation is recorded in a SQLite ledger.
//!
//! ## Architecture
//!
//! - **domain**: slots, reservations, the slot catalog and storage traits
//! - **application**: the reservation core, wire DTOs and request dispatcher
//! - **infrastructure**: SeaORM/SQLite persistence and in-memory storage
//! - **interfaces**: the JSON-over-TCP listener
//! - **server**: start-up and graceful shutdown of the whole service

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod interfaces;
pub mod server;
pub mod support;

pub use config::{default_config_path, AppConfig};

// Re-export database types for easy access
pub use infrastructure::{init_database, DatabaseConfig};
