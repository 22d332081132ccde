//! Sentinel Tracking Protection Engine
//!
//! Records which third-party tracker domains appear across which
//! first-party sites and escalates enforcement as evidence accumulates:
//! cookie stripping first, connection rejection once a tracker crosses
//! twice the configured threshold. User overrides always win, and every
//! internal failure degrades to accepting the request.

mod domain;
mod error;
mod grace;
mod ledger;
mod pipeline;
mod policy;
mod suppress;

pub use domain::{base_domain, classify_url};
pub use error::EngineError;
pub use grace::GraceWindow;
pub use ledger::TrackingLedger;
pub use pipeline::{
    CookieCounter, ProtectionEngine, ProtectionObserver, RequestContext, TrackerInfo, Verdict,
};
pub use policy::{
    evaluate, BlockLevel, Enforcement, Origin, ProtectionConfig, CONNECTION_MULTIPLIER,
    DEFAULT_THRESHOLD,
};
pub use suppress::CookieSuppression;

pub type Result<T> = std::result::Result<T, EngineError>;
