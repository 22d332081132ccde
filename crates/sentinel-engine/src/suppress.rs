//! Cookie suppression coordinator
//!
//! Single-slot handshake between the decision point (which arms a URL)
//! and the send-time hook (which consumes it exactly once). The slot is
//! last-write-wins: two third-party requests evaluated back-to-back can
//! overwrite each other's pending value, dropping a suppression. That
//! race is accepted; see DESIGN.md.

use parking_lot::Mutex;

#[derive(Debug, Default)]
pub struct CookieSuppression {
    pending: Mutex<Option<String>>,
}

impl CookieSuppression {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm suppression for the next send of exactly `url`, replacing any
    /// pending value.
    pub fn arm(&self, url: &str) {
        let mut pending = self.pending.lock();
        if let Some(previous) = pending.replace(url.to_string()) {
            if previous != url {
                tracing::debug!(dropped = %previous, "Overwrote pending cookie suppression");
            }
        }
    }

    /// Take and clear the slot; `true` iff it held exactly `url`.
    ///
    /// The slot is cleared even on a mismatch: a request that never hits
    /// the network (cache hit) must not leave a stale value armed for an
    /// unrelated later request.
    pub fn consume(&self, url: &str) -> bool {
        match self.pending.lock().take() {
            Some(pending) => pending == url,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consume_matching() {
        let slot = CookieSuppression::new();

        slot.arm("https://a.example/x");
        assert!(slot.consume("https://a.example/x"));
        // Consumed exactly once
        assert!(!slot.consume("https://a.example/x"));
    }

    #[test]
    fn test_mismatch_clears_slot() {
        let slot = CookieSuppression::new();

        slot.arm("https://a.example/x");
        assert!(!slot.consume("https://a.example/y"));
        // The armed value is gone, not left for a later request
        assert!(!slot.consume("https://a.example/x"));
    }

    #[test]
    fn test_last_write_wins() {
        let slot = CookieSuppression::new();

        slot.arm("https://a.example/x");
        slot.arm("https://b.example/y");
        assert!(!slot.consume("https://a.example/x"));

        slot.arm("https://a.example/x");
        slot.arm("https://b.example/y");
        assert!(slot.consume("https://b.example/y"));
    }

    #[test]
    fn test_consume_empty() {
        let slot = CookieSuppression::new();
        assert!(!slot.consume("https://a.example/x"));
    }
}
