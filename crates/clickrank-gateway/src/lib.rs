//! Clickrank Gateway - Outward transport
//!
//! This crate provides:
//! - The WebSocket endpoint carrying client events
//! - The administrative user-creation endpoint
//! - Command-line configuration and logging bootstrap

pub mod config;
pub mod telemetry;
pub mod admin;
pub mod ws;
pub mod server;

pub use config::*;
pub use telemetry::*;
pub use server::*;
