//! Shared plumbing for the warehouse engine crates.

pub mod config;
pub mod error;
pub mod observability;
