//! Inbound interfaces

pub mod tcp;
