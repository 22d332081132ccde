//! Host-facing facade
//!
//! `Shield` owns the database and the protection engine and exposes the
//! surface a browser shell wires its hooks and settings UI to.

use std::sync::Arc;

use sentinel_engine::{
    BlockLevel, CookieCounter, ProtectionConfig, ProtectionEngine, ProtectionObserver,
    RequestContext, TrackerInfo, Verdict,
};
use sentinel_storage::Database;

use crate::config::Config;
use crate::Result;

pub struct Shield {
    config: Config,
    db: Database,
    engine: ProtectionEngine,
}

impl Shield {
    /// Open the database and build the engine. `cookie_counter` is the
    /// host's view of which domains have set or sent cookies.
    pub fn new(config: Config, cookie_counter: Arc<dyn CookieCounter>) -> Result<Self> {
        if let Some(parent) = config.database_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::open(&config.database_path)?;

        let engine = ProtectionEngine::new(
            db.clone(),
            cookie_counter,
            ProtectionConfig::new(config.auto_block_threshold),
            config.grace_window_secs,
        );

        Ok(Self { config, db, engine })
    }

    /// Load persisted state and apply configuration. Persisted settings
    /// win over the config's starting values.
    pub fn initialize(&self) -> Result<()> {
        self.engine.load();
        self.engine.set_enabled(self.config.tracking_protection);

        tracing::info!("Sentinel initialized");

        Ok(())
    }

    /// Shutdown maintenance: prune and persist the ledger.
    pub fn shutdown(&self) {
        self.engine.shutdown();
    }

    // === Request hooks ===

    pub fn evaluate_request(&self, request: &RequestContext) -> Verdict {
        self.engine.evaluate_request(request)
    }

    pub fn on_request_send(&self, url: &str) -> bool {
        self.engine.on_request_send(url)
    }

    pub fn trigger_grace(&self) {
        self.engine.trigger_grace()
    }

    // === Settings and overrides ===

    pub fn set_threshold(&self, threshold: u32) -> Result<()> {
        Ok(self.engine.set_threshold(threshold)?)
    }

    pub fn threshold(&self) -> u32 {
        self.engine.threshold()
    }

    pub fn set_user_level(&self, tracker: &str, level: BlockLevel) {
        self.engine.set_user_level(tracker, level)
    }

    pub fn clear_user_overrides(&self) {
        self.engine.clear_user_overrides()
    }

    pub fn set_known_not_trackers(&self, domains: Vec<String>) {
        self.engine.set_known_not_trackers(domains)
    }

    pub fn set_potential_trackers(&self, domains: Vec<String>) {
        self.engine.set_potential_trackers(domains)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.engine.set_enabled(enabled)
    }

    pub fn is_enabled(&self) -> bool {
        self.engine.is_enabled()
    }

    pub fn add_observer(&self, observer: Arc<dyn ProtectionObserver>) {
        self.engine.add_observer(observer)
    }

    // === Reporting ===

    pub fn tracker_report(&self) -> Vec<TrackerInfo> {
        self.engine.tracker_report()
    }

    /// Tracker list serialized for the UI page.
    pub fn tracker_report_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.engine.tracker_report())?)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoCookies;

    impl CookieCounter for NoCookies {
        fn cookie_count(&self, _domain: &str) -> u32 {
            0
        }
    }

    struct AllCookies;

    impl CookieCounter for AllCookies {
        fn cookie_count(&self, _domain: &str) -> u32 {
            1
        }
    }

    fn test_config(dir: &std::path::Path) -> Config {
        let mut config = Config::new(dir.to_path_buf());
        config.auto_block_threshold = 2;
        config
    }

    fn temp_dir(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("sentinel-test-{}-{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_shield_end_to_end() {
        let dir = temp_dir("e2e");
        let shield = Shield::new(test_config(&dir), Arc::new(AllCookies)).unwrap();
        shield.initialize().unwrap();

        assert_eq!(shield.threshold(), 2);

        // Two sites -> cookie suppression, four -> rejection
        for i in 0..2 {
            let verdict = shield.evaluate_request(&RequestContext {
                url: "https://ads.tracker.example/px.gif".to_string(),
                page_url: format!("https://site{}.example/", i),
                is_top_level: false,
                is_private: false,
            });
            assert_eq!(verdict, Verdict::Accept);
        }
        assert!(shield.on_request_send("https://ads.tracker.example/px.gif"));

        for i in 2..4 {
            shield.evaluate_request(&RequestContext {
                url: "https://ads.tracker.example/px.gif".to_string(),
                page_url: format!("https://site{}.example/", i),
                is_top_level: false,
                is_private: false,
            });
        }
        let verdict = shield.evaluate_request(&RequestContext {
            url: "https://ads.tracker.example/px.gif".to_string(),
            page_url: "https://site0.example/".to_string(),
            is_top_level: false,
            is_private: false,
        });
        assert_eq!(verdict, Verdict::Reject);

        let json = shield.tracker_report_json().unwrap();
        assert!(json.contains("tracker.example"));

        shield.shutdown();
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_config_disables_protection() {
        let dir = temp_dir("disabled");
        let mut config = test_config(&dir);
        config.tracking_protection = false;

        let shield = Shield::new(config, Arc::new(NoCookies)).unwrap();
        shield.initialize().unwrap();

        assert!(!shield.is_enabled());
        let verdict = shield.evaluate_request(&RequestContext {
            url: "https://ads.tracker.example/px.gif".to_string(),
            page_url: "https://site.example/".to_string(),
            is_top_level: false,
            is_private: false,
        });
        assert_eq!(verdict, Verdict::Accept);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
