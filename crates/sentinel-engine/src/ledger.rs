//! Tracking ledger
//!
//! Maps each tracker domain to the set of first-party sites it has been
//! observed on. Presence is what matters, not counts: a site is either
//! recorded as embedding a tracker or it is not. The derived browsed set
//! holds every domain that has appeared on the tracked-site side, i.e.
//! domains the user actually visits first party.

use std::collections::{HashMap, HashSet};

#[derive(Debug, Default)]
pub struct TrackingLedger {
    /// tracker -> sites it was observed on
    trackers: HashMap<String, HashSet<String>>,
    /// every domain that has appeared as a tracked site
    browsed: HashSet<String>,
}

impl TrackingLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from persisted state, dropping empty entries.
    pub fn from_map(map: HashMap<String, HashSet<String>>) -> Self {
        let mut browsed = HashSet::new();
        let trackers: HashMap<String, HashSet<String>> = map
            .into_iter()
            .filter(|(_, sites)| !sites.is_empty())
            .collect();

        for sites in trackers.values() {
            browsed.extend(sites.iter().cloned());
        }

        Self { trackers, browsed }
    }

    /// Record one tracker/site observation.
    ///
    /// Returns `true` only when the pair is new; callers re-run the
    /// auto-block policy only on `true`, which bounds re-evaluation to
    /// once per unique pair for the process lifetime.
    pub fn record(&mut self, tracker: &str, site: &str) -> bool {
        let sites = self.trackers.entry(tracker.to_string()).or_default();
        if !sites.insert(site.to_string()) {
            return false;
        }

        self.browsed.insert(site.to_string());
        true
    }

    /// Number of distinct sites this tracker was observed on; 0 if absent.
    pub fn site_count(&self, tracker: &str) -> usize {
        self.trackers.get(tracker).map_or(0, |s| s.len())
    }

    /// Whether the user visits this domain directly as a first party.
    pub fn is_directly_browsed(&self, domain: &str) -> bool {
        self.browsed.contains(domain)
    }

    pub fn tracker_count(&self) -> usize {
        self.trackers.len()
    }

    pub fn tracker_domains(&self) -> Vec<String> {
        self.trackers.keys().cloned().collect()
    }

    /// Shutdown-only maintenance: drop every tracker seen on exactly one
    /// site. Keeps persisted storage from accumulating one-off noise.
    /// Returns the removed tracker domains.
    pub fn prune_singletons(&mut self) -> Vec<String> {
        let removed: Vec<String> = self
            .trackers
            .iter()
            .filter(|(_, sites)| sites.len() == 1)
            .map(|(tracker, _)| tracker.clone())
            .collect();

        for tracker in &removed {
            self.trackers.remove(tracker);
        }

        removed
    }

    pub fn as_map(&self) -> &HashMap<String, HashSet<String>> {
        &self.trackers
    }
}
