//! Grace window
//!
//! Time-boxed bypass of all enforcement around a user-initiated reload.
//! Tracks an expiry timestamp rather than a per-trigger timer, so an
//! earlier reload's expiry can never cut a later reload's window short:
//! each trigger moves the expiry forward and the window stays active until
//! the wall clock passes the most recent one.

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

#[derive(Debug)]
pub struct GraceWindow {
    expires_at: Mutex<Option<DateTime<Utc>>>,
    duration: Duration,
}

impl GraceWindow {
    pub fn new(duration_secs: i64) -> Self {
        Self {
            expires_at: Mutex::new(None),
            duration: Duration::seconds(duration_secs),
        }
    }

    /// Open (or extend) the window for the configured duration from now.
    pub fn trigger(&self) {
        self.trigger_at(Utc::now());
    }

    pub fn is_active(&self) -> bool {
        self.is_active_at(Utc::now())
    }

    fn trigger_at(&self, now: DateTime<Utc>) {
        let mut expires_at = self.expires_at.lock();
        let new_expiry = now + self.duration;
        // Fixed duration means the new expiry is always the latest one
        *expires_at = Some(new_expiry);
        tracing::debug!(expires_at = %new_expiry, "Grace window triggered");
    }

    fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        let mut expires_at = self.expires_at.lock();
        match *expires_at {
            Some(expiry) if now < expiry => true,
            Some(_) => {
                // Lazily drop the stale expiry
                *expires_at = None;
                false
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inactive_by_default() {
        let window = GraceWindow::new(10);
        assert!(!window.is_active());
    }

    #[test]
    fn test_active_within_window() {
        let window = GraceWindow::new(10);
        let start = Utc::now();

        window.trigger_at(start);
        assert!(window.is_active_at(start + Duration::seconds(5)));
        assert!(!window.is_active_at(start + Duration::seconds(10)));
    }

    #[test]
    fn test_retrigger_extends_window() {
        // Pins the corrected expiry-timestamp behavior: an earlier
        // trigger's expiry does not deactivate a later trigger's window.
        let window = GraceWindow::new(10);
        let start = Utc::now();

        window.trigger_at(start);
        window.trigger_at(start + Duration::seconds(8));

        // Past the first expiry, inside the second
        assert!(window.is_active_at(start + Duration::seconds(12)));
        assert!(!window.is_active_at(start + Duration::seconds(18)));
    }
}
