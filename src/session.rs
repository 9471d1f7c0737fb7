//! Per-session browsing state.
//!
//! A session is an anonymous capability bag keyed by an opaque cookie token;
//! the HTTP layer owns the token-to-session map and passes the session value
//! into the core explicitly. Grants are monotonic: once a folder key has been
//! accepted for a path, the grant lives for the remainder of the session.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Session {
    /// Canonical paths this session has unlocked. Append-only.
    pub authorized_paths: HashSet<String>,
    /// Whether listings include hidden entries for this session.
    pub show_hidden: bool,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that the session supplied the correct key for `path`.
    pub fn grant(&mut self, path: &str) {
        self.authorized_paths.insert(path.to_string());
    }

    pub fn is_granted(&self, path: &str) -> bool {
        self.authorized_paths.contains(path)
    }

    /// Flip the hidden-entry preference and return the new value.
    pub fn toggle_show_hidden(&mut self) -> bool {
        self.show_hidden = !self.show_hidden;
        self.show_hidden
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grants_are_monotonic_and_deduplicated() {
        let mut s = Session::new();
        s.grant("docs");
        s.grant("docs");
        s.grant("media/video");
        assert!(s.is_granted("docs"));
        assert!(s.is_granted("media/video"));
        assert_eq!(s.authorized_paths.len(), 2);
    }

    #[test]
    fn toggle_show_hidden_flips_and_returns_new_value() {
        let mut s = Session::new();
        assert!(!s.show_hidden);
        assert!(s.toggle_show_hidden());
        assert!(s.show_hidden);
        assert!(!s.toggle_show_hidden());
    }
}
