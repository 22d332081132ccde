//! Sentinel Core
//!
//! Coordination layer for the Sentinel tracking-protection engine: owns
//! the database and the engine, and is what a host browser embeds.

mod config;
mod error;
mod shield;

pub use config::Config;
pub use error::CoreError;
pub use shield::Shield;

// Re-export core components
pub use sentinel_engine::{
    BlockLevel, CookieCounter, Enforcement, EngineError, Origin, ProtectionConfig,
    ProtectionEngine, ProtectionObserver, RequestContext, TrackerInfo, Verdict,
};
pub use sentinel_storage::{Database, StorageError};

pub type Result<T> = std::result::Result<T, CoreError>;

/// Initialize logging
pub fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt().with_env_filter(filter).with_target(true).init();
}
