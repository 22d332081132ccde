//! Sentinel Storage Layer
//!
//! SQLite-backed persistence for the tracking ledger, per-tracker
//! enforcement levels, and engine settings. Every engine mutation is
//! written through here; reads happen once at startup.

mod database;
mod error;
mod migrations;

pub use database::{Database, EnforcementRow};
pub use error::StorageError;

pub type Result<T> = std::result::Result<T, StorageError>;
