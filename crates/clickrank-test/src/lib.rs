//! Clickrank Test Harness - Scripted collaborators and scenario testing
//!
//! This crate provides:
//! - An identity verifier whose resolutions can be held back
//! - A score store with injectable failures and stalls
//! - A multi-client harness over the runtime
//! - End-to-end scenarios for the session and broadcast protocol

pub mod collaborators;
pub mod harness;
pub mod scenarios;

pub use collaborators::*;
pub use harness::*;
