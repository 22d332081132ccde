//! Auto-block policy
//!
//! Escalation ladder per tracker:
//! ```text
//! None
//!   ↓ observed on `threshold` sites
//! Cookie
//!   ↓ observed on `threshold * 2` sites
//! Connection
//! ```
//! Severing connections needs a materially higher bar than stripping
//! cookies, and a tracker the user also browses directly never climbs past
//! Cookie, so the policy cannot break the user's own login sessions.
//! User-set levels are sticky: the policy returns them untouched.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::ledger::TrackingLedger;

/// Connection blocking kicks in at `threshold * CONNECTION_MULTIPLIER`.
pub const CONNECTION_MULTIPLIER: u32 = 2;

pub const DEFAULT_THRESHOLD: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockLevel {
    /// No enforcement
    None,
    /// Strip cookies from requests to the tracker
    Cookie,
    /// Reject the connection outright
    Connection,
}

impl BlockLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockLevel::None => "none",
            BlockLevel::Cookie => "cookie",
            BlockLevel::Connection => "connection",
        }
    }
}

impl std::fmt::Display for BlockLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for BlockLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" => Ok(BlockLevel::None),
            "cookie" => Ok(BlockLevel::Cookie),
            "connection" => Ok(BlockLevel::Connection),
            _ => Err(format!("Unknown block level: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    /// Chosen by the policy
    Auto,
    /// Explicit user action; exempt from auto evaluation
    User,
}

impl Origin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Origin::Auto => "auto",
            Origin::User => "user",
        }
    }
}

impl std::str::FromStr for Origin {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(Origin::Auto),
            "user" => Ok(Origin::User),
            _ => Err(format!("Unknown origin: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enforcement {
    pub level: BlockLevel,
    pub origin: Origin,
}

impl Enforcement {
    pub const NONE: Enforcement = Enforcement {
        level: BlockLevel::None,
        origin: Origin::Auto,
    };

    pub fn auto(level: BlockLevel) -> Self {
        Self {
            level,
            origin: Origin::Auto,
        }
    }

    pub fn user(level: BlockLevel) -> Self {
        Self {
            level,
            origin: Origin::User,
        }
    }
}

impl Default for Enforcement {
    fn default() -> Self {
        Self::NONE
    }
}

/// Hot-reloadable engine configuration.
#[derive(Debug, Clone)]
pub struct ProtectionConfig {
    pub auto_block_threshold: u32,
    /// Domains always accepted, never treated as trackers
    pub known_not_trackers: HashSet<String>,
    /// Domains cookie-suppressed even below the threshold
    pub potential_trackers: HashSet<String>,
}

impl ProtectionConfig {
    pub fn new(auto_block_threshold: u32) -> Self {
        Self {
            auto_block_threshold,
            known_not_trackers: HashSet::new(),
            potential_trackers: HashSet::new(),
        }
    }
}

impl Default for ProtectionConfig {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}

/// Normalize a user-supplied domain list, skipping entries that don't
/// classify. Invalid entries are dropped individually, never fatal.
pub fn sanitize_domains<I>(domains: I) -> HashSet<String>
where
    I: IntoIterator<Item = String>,
{
    domains
        .into_iter()
        .filter_map(|entry| {
            let trimmed = entry.trim();
            if trimmed.is_empty() || !trimmed.contains('.') || trimmed.contains(char::is_whitespace)
            {
                tracing::debug!(entry = %entry, "Skipping malformed domain list entry");
                return None;
            }
            Some(crate::domain::base_domain(trimmed))
        })
        .collect()
}

/// Compute the enforcement level for `tracker` from current evidence.
///
/// Pure; invoked after each new ledger observation and after threshold
/// changes. `cookie_count` is the host's count of cookies the tracker has
/// set or sent: a tracker that never touches cookies is never auto-blocked
/// since blocking would not change user exposure.
pub fn evaluate(
    tracker: &str,
    ledger: &TrackingLedger,
    threshold: u32,
    cookie_count: u32,
    current: Enforcement,
) -> Enforcement {
    if current.origin == Origin::User {
        return current;
    }

    if cookie_count == 0 {
        return Enforcement::NONE;
    }

    let n = ledger.site_count(tracker);
    let lo = threshold as usize;
    let hi = threshold.saturating_mul(CONNECTION_MULTIPLIER) as usize;

    let level = if n >= hi {
        if ledger.is_directly_browsed(tracker) {
            // The user visits this domain first party; a hard block would
            // break that, so cookie stripping is the ceiling.
            BlockLevel::Cookie
        } else {
            BlockLevel::Connection
        }
    } else if n >= lo {
        BlockLevel::Cookie
    } else {
        BlockLevel::None
    };

    Enforcement::auto(level)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger_with_sites(tracker: &str, count: usize) -> TrackingLedger {
        let mut ledger = TrackingLedger::new();
        for i in 0..count {
            ledger.record(tracker, &format!("site{}.example", i));
        }
        ledger
    }

    #[test]
    fn test_escalation_ladder() {
        let tracker = "tracker.example";

        let ledger = ledger_with_sites(tracker, 4);
        assert_eq!(
            evaluate(tracker, &ledger, 5, 3, Enforcement::NONE).level,
            BlockLevel::None
        );

        let ledger = ledger_with_sites(tracker, 5);
        assert_eq!(
            evaluate(tracker, &ledger, 5, 3, Enforcement::NONE).level,
            BlockLevel::Cookie
        );

        let ledger = ledger_with_sites(tracker, 9);
        assert_eq!(
            evaluate(tracker, &ledger, 5, 3, Enforcement::NONE).level,
            BlockLevel::Cookie
        );

        let ledger = ledger_with_sites(tracker, 10);
        assert_eq!(
            evaluate(tracker, &ledger, 5, 3, Enforcement::NONE).level,
            BlockLevel::Connection
        );
    }

    #[test]
    fn test_cookieless_tracker_never_blocked() {
        let tracker = "tracker.example";
        let ledger = ledger_with_sites(tracker, 50);

        let result = evaluate(tracker, &ledger, 5, 0, Enforcement::NONE);
        assert_eq!(result.level, BlockLevel::None);
    }

    #[test]
    fn test_directly_browsed_caps_at_cookie() {
        let tracker = "tracker.example";
        let mut ledger = ledger_with_sites(tracker, 10);

        // The tracker's own domain appears as a tracked site
        ledger.record("other.example", tracker);

        let result = evaluate(tracker, &ledger, 5, 3, Enforcement::NONE);
        assert_eq!(result.level, BlockLevel::Cookie);
    }

    #[test]
    fn test_user_override_is_sticky() {
        let tracker = "tracker.example";
        let ledger = ledger_with_sites(tracker, 50);

        let current = Enforcement::user(BlockLevel::None);
        let result = evaluate(tracker, &ledger, 5, 3, current);
        assert_eq!(result, current);
    }

    #[test]
    fn test_raising_threshold_downgrades() {
        let tracker = "tracker.example";
        let ledger = ledger_with_sites(tracker, 10);

        // Connection at threshold 5, downgraded as the bar rises
        assert_eq!(
            evaluate(tracker, &ledger, 5, 3, Enforcement::NONE).level,
            BlockLevel::Connection
        );
        assert_eq!(
            evaluate(tracker, &ledger, 8, 3, Enforcement::NONE).level,
            BlockLevel::Cookie
        );
        assert_eq!(
            evaluate(tracker, &ledger, 11, 3, Enforcement::NONE).level,
            BlockLevel::None
        );
    }

    #[test]
    fn test_huge_threshold_does_not_overflow() {
        let tracker = "tracker.example";
        let ledger = ledger_with_sites(tracker, 10);

        let result = evaluate(tracker, &ledger, u32::MAX, 3, Enforcement::NONE);
        assert_eq!(result.level, BlockLevel::None);
    }

    #[test]
    fn test_sanitize_domains() {
        let sanitized = sanitize_domains(vec![
            "Tracker.Example".to_string(),
            "".to_string(),
            "   ".to_string(),
            "nodot".to_string(),
            "has space.example".to_string(),
            "cdn.ads.example".to_string(),
        ]);

        assert_eq!(sanitized.len(), 2);
        assert!(sanitized.contains("tracker.example"));
        assert!(sanitized.contains("ads.example"));
    }

    #[test]
    fn test_level_string_roundtrip() {
        for level in [BlockLevel::None, BlockLevel::Cookie, BlockLevel::Connection] {
            assert_eq!(level.as_str().parse::<BlockLevel>().unwrap(), level);
        }
        assert!("banana".parse::<BlockLevel>().is_err());
    }
}
