//! Clickrank Core - Fundamental types and primitives
//!
//! This crate defines the types shared by every other clickrank crate:
//! - Identifiers (ConnectionId, UserId)
//! - Ranking entries and ordered snapshots
//! - Wire events exchanged with connected clients
//! - Configuration and account validation

pub mod id;
pub mod ranking;
pub mod event;
pub mod config;
pub mod account;
pub mod error;

pub use id::*;
pub use ranking::*;
pub use event::*;
pub use config::*;
pub use account::*;
pub use error::*;
