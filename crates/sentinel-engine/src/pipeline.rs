//! Request evaluation pipeline
//!
//! Every third-party request flows through here: grace window bypass,
//! first-party and allow-list early accepts, ledger update, policy
//! re-evaluation, then either cookie-suppression arming or a reject
//! verdict. A second, independent send-time hook consumes the armed
//! suppression slot. Internal failures degrade to accepting the request;
//! the pipeline fails open, never closed.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use sentinel_storage::Database;

use crate::domain::{base_domain, classify_url};
use crate::grace::GraceWindow;
use crate::ledger::TrackingLedger;
use crate::policy::{self, sanitize_domains, BlockLevel, Enforcement, Origin, ProtectionConfig};
use crate::suppress::CookieSuppression;
use crate::{EngineError, Result};

const THRESHOLD_KEY: &str = "auto_block_threshold";

/// Host-side cookie knowledge: how many cookies a domain has set or sent.
/// A count of zero keeps the policy from ever auto-blocking the domain.
pub trait CookieCounter: Send + Sync {
    fn cookie_count(&self, domain: &str) -> u32;
}

/// Engine events consumed by the UI collaborator. Default methods are
/// empty so observers implement only what they care about.
pub trait ProtectionObserver: Send + Sync {
    /// A new (tracker, site) relationship was recorded.
    fn tracker_observed(&self, _tracker: &str, _site: &str) {}

    /// A tracker's stored enforcement changed.
    fn enforcement_changed(&self, _tracker: &str, _level: BlockLevel) {}
}

/// One intercepted request plus its browsing context.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Full request URL; also the value armed for cookie suppression
    pub url: String,
    /// URL of the page that issued the request
    pub page_url: String,
    /// Top-level document loads are never evaluated
    pub is_top_level: bool,
    /// Private-browsing contexts are never recorded or blocked
    pub is_private: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Accept,
    Reject,
}

/// Per-tracker summary for the UI list page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerInfo {
    pub domain: String,
    pub site_count: usize,
    pub enforcement: Enforcement,
    pub directly_browsed: bool,
}

pub struct ProtectionEngine {
    db: Database,
    ledger: RwLock<TrackingLedger>,
    enforcement: RwLock<HashMap<String, Enforcement>>,
    config: RwLock<ProtectionConfig>,
    suppression: CookieSuppression,
    grace: GraceWindow,
    cookie_counter: Arc<dyn CookieCounter>,
    observers: RwLock<Vec<Arc<dyn ProtectionObserver>>>,
    enabled: AtomicBool,
}

impl ProtectionEngine {
    pub fn new(
        db: Database,
        cookie_counter: Arc<dyn CookieCounter>,
        config: ProtectionConfig,
        grace_secs: i64,
    ) -> Self {
        Self {
            db,
            ledger: RwLock::new(TrackingLedger::new()),
            enforcement: RwLock::new(HashMap::new()),
            config: RwLock::new(config),
            suppression: CookieSuppression::new(),
            grace: GraceWindow::new(grace_secs),
            cookie_counter,
            observers: RwLock::new(Vec::new()),
            enabled: AtomicBool::new(true),
        }
    }

    /// Load persisted state, substituting defaults for anything missing
    /// or unreadable. Never fails: an unavailable store only costs the
    /// previous session's observations.
    pub fn load(&self) {
        match self.db.get_setting(THRESHOLD_KEY) {
            Ok(Some(value)) => match value.parse::<u32>() {
                Ok(threshold) if threshold > 0 => {
                    self.config.write().auto_block_threshold = threshold;
                }
                _ => tracing::warn!(value = %value, "Ignoring invalid persisted threshold"),
            },
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "Failed to read threshold; using default"),
        }

        match self.db.load_tracker_map() {
            Ok(map) => *self.ledger.write() = TrackingLedger::from_map(map),
            Err(e) => tracing::warn!(error = %e, "Failed to load tracker ledger; starting empty"),
        }

        match self.db.load_enforcement() {
            Ok(rows) => {
                let mut enforcement = self.enforcement.write();
                for row in rows {
                    // Malformed rows are skipped individually
                    match (row.level.parse(), row.origin.parse()) {
                        (Ok(level), Ok(origin)) => {
                            enforcement.insert(row.domain, Enforcement { level, origin });
                        }
                        _ => tracing::warn!(domain = %row.domain, "Skipping malformed enforcement row"),
                    }
                }
            }
            Err(e) => tracing::warn!(error = %e, "Failed to load enforcement map; starting empty"),
        }

        tracing::info!(
            trackers = self.ledger.read().tracker_count(),
            threshold = self.config.read().auto_block_threshold,
            "Tracking protection state loaded"
        );
    }

    // === Request hooks ===

    /// Sole entry point for the request-interception hook.
    pub fn evaluate_request(&self, request: &RequestContext) -> Verdict {
        if !self.enabled.load(Ordering::Relaxed) || self.grace.is_active() {
            return Verdict::Accept;
        }

        match self.evaluate_inner(request) {
            Ok(verdict) => verdict,
            Err(e) => {
                tracing::warn!(error = %e, url = %request.url, "Evaluation failed; failing open");
                Verdict::Accept
            }
        }
    }

    fn evaluate_inner(&self, request: &RequestContext) -> Result<Verdict> {
        if request.is_top_level || request.is_private {
            return Ok(Verdict::Accept);
        }

        let tracker = classify_url(&request.url)
            .ok_or_else(|| EngineError::Unclassifiable(request.url.clone()))?;
        let page = classify_url(&request.page_url)
            .ok_or_else(|| EngineError::Unclassifiable(request.page_url.clone()))?;

        // First party
        if tracker == page {
            return Ok(Verdict::Accept);
        }

        if self.config.read().known_not_trackers.contains(&tracker) {
            return Ok(Verdict::Accept);
        }

        let is_new = self.ledger.write().record(&tracker, &page);
        if is_new {
            if let Err(e) = self.db.insert_observation(&tracker, &page) {
                // Fire-and-forget: the in-memory ledger stands
                tracing::warn!(error = %e, tracker = %tracker, "Failed to persist observation");
            }

            for observer in self.observers.read().iter() {
                observer.tracker_observed(&tracker, &page);
            }

            self.reevaluate(&tracker);
        }

        let stored = self.stored_enforcement(&tracker);
        let potential = self.config.read().potential_trackers.contains(&tracker);

        if stored.level == BlockLevel::Cookie || potential {
            self.suppression.arm(&request.url);
            return Ok(Verdict::Accept);
        }

        if stored.level == BlockLevel::Connection {
            tracing::debug!(tracker = %tracker, site = %page, "Rejecting tracker connection");
            return Ok(Verdict::Reject);
        }

        Ok(Verdict::Accept)
    }

    /// Send-time hook: `true` means the caller must strip the cookie
    /// header from this request entirely.
    pub fn on_request_send(&self, url: &str) -> bool {
        self.suppression.consume(url)
    }

    // === Enforcement ===

    fn stored_enforcement(&self, tracker: &str) -> Enforcement {
        self.enforcement
            .read()
            .get(tracker)
            .copied()
            .unwrap_or_default()
    }

    /// Re-run the policy for one tracker; persist and notify on change.
    /// User-origin entries are left untouched.
    fn reevaluate(&self, tracker: &str) {
        let current = self.stored_enforcement(tracker);
        if current.origin == Origin::User {
            return;
        }

        let threshold = self.config.read().auto_block_threshold;
        let cookie_count = self.cookie_counter.cookie_count(tracker);
        let next = {
            let ledger = self.ledger.read();
            policy::evaluate(tracker, &ledger, threshold, cookie_count, current)
        };

        if next != current {
            self.store_enforcement(tracker, next);
        }
    }

    fn store_enforcement(&self, tracker: &str, enforcement: Enforcement) {
        let previous_level = self.stored_enforcement(tracker).level;

        if enforcement == Enforcement::NONE {
            // Absence encodes None/auto
            self.enforcement.write().remove(tracker);
            if let Err(e) = self.db.delete_enforcement(tracker) {
                tracing::warn!(error = %e, tracker = %tracker, "Failed to clear enforcement");
            }
        } else {
            self.enforcement
                .write()
                .insert(tracker.to_string(), enforcement);
            if let Err(e) = self.db.upsert_enforcement(
                tracker,
                enforcement.level.as_str(),
                enforcement.origin.as_str(),
            ) {
                tracing::warn!(error = %e, tracker = %tracker, "Failed to persist enforcement");
            }
        }

        // Origin-only flips (user pin released to the same auto level)
        // are persisted above but are not a level change
        if enforcement.level == previous_level {
            return;
        }

        tracing::info!(tracker = %tracker, level = %enforcement.level, "Enforcement level changed");

        for observer in self.observers.read().iter() {
            observer.enforcement_changed(tracker, enforcement.level);
        }
    }

    /// Pin a level chosen by the user. Sticky until explicitly cleared.
    pub fn set_user_level(&self, tracker: &str, level: BlockLevel) {
        let tracker = base_domain(tracker);
        self.store_enforcement(&tracker, Enforcement::user(level));
    }

    /// Drop every user override and re-evaluate those trackers from
    /// current evidence.
    pub fn clear_user_overrides(&self) {
        let user_domains: Vec<String> = self
            .enforcement
            .read()
            .iter()
            .filter(|(_, e)| e.origin == Origin::User)
            .map(|(domain, _)| domain.clone())
            .collect();

        for domain in user_domains {
            let threshold = self.config.read().auto_block_threshold;
            let cookie_count = self.cookie_counter.cookie_count(&domain);
            let next = {
                let ledger = self.ledger.read();
                policy::evaluate(&domain, &ledger, threshold, cookie_count, Enforcement::NONE)
            };
            self.store_enforcement(&domain, next);
        }
    }

    // === Configuration ===

    /// Change the auto-block threshold and re-run the policy over every
    /// known tracker, so levels downgrade gracefully when the bar rises.
    pub fn set_threshold(&self, threshold: u32) -> Result<()> {
        if threshold == 0 {
            return Err(EngineError::InvalidThreshold(threshold));
        }

        self.config.write().auto_block_threshold = threshold;
        if let Err(e) = self.db.set_setting(THRESHOLD_KEY, &threshold.to_string()) {
            // Fire-and-forget like every other write: the in-memory
            // threshold stands and the re-evaluation pass still runs
            tracing::warn!(error = %e, "Failed to persist threshold");
        }

        let trackers = self.ledger.read().tracker_domains();
        for tracker in trackers {
            self.reevaluate(&tracker);
        }

        tracing::info!(threshold, "Auto-block threshold changed");
        Ok(())
    }

    pub fn threshold(&self) -> u32 {
        self.config.read().auto_block_threshold
    }

    pub fn set_known_not_trackers<I>(&self, domains: I)
    where
        I: IntoIterator<Item = String>,
    {
        let sanitized = sanitize_domains(domains);
        tracing::debug!(count = sanitized.len(), "Loaded known-not-tracker list");
        self.config.write().known_not_trackers = sanitized;
    }

    pub fn set_potential_trackers<I>(&self, domains: I)
    where
        I: IntoIterator<Item = String>,
    {
        let sanitized = sanitize_domains(domains);
        tracing::debug!(count = sanitized.len(), "Loaded potential-tracker list");
        self.config.write().potential_trackers = sanitized;
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Open the enforcement bypass around a user-initiated reload.
    pub fn trigger_grace(&self) {
        self.grace.trigger();
    }

    pub fn add_observer(&self, observer: Arc<dyn ProtectionObserver>) {
        self.observers.write().push(observer);
    }

    // === Reporting ===

    pub fn site_count(&self, tracker: &str) -> usize {
        self.ledger.read().site_count(tracker)
    }

    /// Snapshot of every known tracker, sorted by domain.
    pub fn tracker_report(&self) -> Vec<TrackerInfo> {
        let ledger = self.ledger.read();
        let enforcement = self.enforcement.read();

        let mut report: Vec<TrackerInfo> = ledger
            .as_map()
            .iter()
            .map(|(domain, sites)| TrackerInfo {
                domain: domain.clone(),
                site_count: sites.len(),
                enforcement: enforcement.get(domain).copied().unwrap_or_default(),
                directly_browsed: ledger.is_directly_browsed(domain),
            })
            .collect();

        report.sort_by(|a, b| a.domain.cmp(&b.domain));
        report
    }

    /// Shutdown maintenance: prune single-site trackers from what gets
    /// persisted for the next run.
    pub fn shutdown(&self) {
        let removed = self.ledger.write().prune_singletons();
        if !removed.is_empty() {
            tracing::info!(pruned = removed.len(), "Pruned singleton trackers");
        }

        let map = self.ledger.read().as_map().clone();
        if let Err(e) = self.db.replace_tracker_map(&map) {
            tracing::warn!(error = %e, "Failed to persist pruned ledger");
        }
    }
}
