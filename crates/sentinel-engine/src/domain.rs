//! Registrable-domain classification
//!
//! Reduces hosts to their registrable base domain so that
//! `cdn.tracker.example` and `px.tracker.example` count as one tracker.
//! Simplified public-suffix handling: two labels, three when the TLD is a
//! short country code (co.uk, com.au and friends).

use url::Url;

/// Reduce a host to its registrable base domain, lowercased.
pub fn base_domain(host: &str) -> String {
    let host = host.trim_end_matches('.').to_lowercase();
    let parts: Vec<&str> = host.split('.').collect();

    if parts.len() >= 2 {
        let len = parts.len();
        if parts[len - 1].len() <= 2 && parts.len() >= 3 {
            return parts[len - 3..].join(".");
        }
        return parts[len - 2..].join(".");
    }

    host
}

/// Parse a URL and reduce its host. `None` for unparseable or host-less
/// URLs (data:, about:, blob: and similar).
pub fn classify_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    if host.is_empty() {
        return None;
    }
    Some(base_domain(host))
}
