//! Folder-key authorization index.
//!
//! Maps protected subtree paths to their shared secrets and answers "what key
//! guards this path" with longest-ancestor-match semantics: an entry deeper in
//! the tree refines one set higher up. Session grant checks live here too so
//! the three ways a grant can satisfy a path stay in one place.
//!
//! The in-memory map and its on-disk persistence step share a single mutex;
//! writes are administrative and rare, so the coarse lock is fine. Persistence
//! is write-through with in-memory-wins: a failed save is surfaced as a
//! `Persistence` error but the change stays visible for the process lifetime.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{info, warn};

use crate::error::{AppError, AppResult};
use crate::paths;
use crate::session::Session;

#[derive(Debug, Serialize, Deserialize)]
struct ProtectedPathsFile {
    #[serde(default)]
    protected_paths: Vec<ProtectionEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtectionEntry {
    pub path: String,
    pub key: String,
}

pub struct AuthIndex {
    config_file: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl AuthIndex {
    /// Load the index from `config_file`. A missing file yields an empty
    /// index; a malformed file yields an empty index plus a `ConfigCorrupt`
    /// notice so the caller can log it. The process keeps running degraded.
    pub fn open(config_file: impl Into<PathBuf>) -> (Self, Option<AppError>) {
        let config_file = config_file.into();
        let mut corrupt = None;
        let mut entries = BTreeMap::new();

        if config_file.exists() {
            match std::fs::read_to_string(&config_file) {
                Ok(raw) => match serde_json::from_str::<ProtectedPathsFile>(&raw) {
                    Ok(parsed) => {
                        for e in parsed.protected_paths {
                            let canon = paths::canonicalize(&e.path);
                            if canon.is_empty() || e.key.is_empty() {
                                warn!(path = %e.path, "skipping invalid protection entry");
                                continue;
                            }
                            entries.insert(canon, e.key);
                        }
                        info!(count = entries.len(), file = %config_file.display(), "loaded folder key entries");
                    }
                    Err(e) => {
                        warn!(file = %config_file.display(), error = %e, "folder key config unreadable, starting empty");
                        corrupt = Some(AppError::config_corrupt("folder_keys", &e.to_string()));
                    }
                },
                Err(e) => {
                    warn!(file = %config_file.display(), error = %e, "folder key config unreadable, starting empty");
                    corrupt = Some(AppError::config_corrupt("folder_keys", &e.to_string()));
                }
            }
        } else {
            info!(file = %config_file.display(), "no folder key config found, no paths protected");
        }

        (Self { config_file, entries: Mutex::new(entries) }, corrupt)
    }

    /// Serialize the map, longest path first for readable diffs. Called with
    /// the entry lock held so readers never observe a partial file state.
    fn save_locked(&self, entries: &BTreeMap<String, String>) -> AppResult<()> {
        let mut list: Vec<ProtectionEntry> = entries
            .iter()
            .map(|(path, key)| ProtectionEntry { path: path.clone(), key: key.clone() })
            .collect();
        list.sort_by(|a, b| b.path.len().cmp(&a.path.len()).then_with(|| a.path.cmp(&b.path)));
        let body = serde_json::to_string_pretty(&ProtectedPathsFile { protected_paths: list })
            .map_err(|e| AppError::internal("serialize_folder_keys", &e.to_string()))?;
        std::fs::write(&self.config_file, body)
            .map_err(|e| AppError::persistence("save_folder_keys", &e.to_string()))
    }

    /// Key of the longest protection entry that equals `path` or is an
    /// ancestor of it, if any.
    pub fn required_key(&self, path: &str) -> Option<String> {
        let entries = self.entries.lock();
        let mut best: Option<(&String, &String)> = None;
        for (entry_path, key) in entries.iter() {
            let matches = path == entry_path.as_str()
                || (path.len() > entry_path.len() && path.starts_with(entry_path.as_str()) && path.as_bytes()[entry_path.len()] == b'/');
            if matches {
                match best {
                    Some((bp, _)) if bp.len() >= entry_path.len() => {}
                    _ => best = Some((entry_path, key)),
                }
            }
        }
        best.map(|(_, k)| k.clone())
    }

    pub fn is_protected(&self, path: &str) -> bool {
        self.required_key(path).is_some()
    }

    /// True iff `key` unlocks `path` (vacuously true for unprotected paths).
    pub fn validate_key(&self, path: &str, key: &str) -> bool {
        match self.required_key(path) {
            Some(required) => required == key,
            None => true,
        }
    }

    /// Protect a subtree with a key. The path is canonicalized first; the
    /// root is never protectable.
    /// Idempotent: re-protecting with the same key re-runs persistence only.
    pub fn protect(&self, path: &str, key: &str) -> AppResult<()> {
        let canon = paths::canonicalize(path);
        if canon.is_empty() {
            return Err(AppError::invalid_target("protect_root", "Cannot protect the public root."));
        }
        let mut entries = self.entries.lock();
        entries.insert(canon, key.to_string());
        self.save_locked(&entries)
    }

    /// Remove protection from a subtree. Removing a non-entry is a no-op
    /// success, and persistence is only re-run when something changed.
    pub fn unprotect(&self, path: &str) -> AppResult<()> {
        let canon = paths::canonicalize(path);
        let mut entries = self.entries.lock();
        if entries.remove(&canon).is_none() {
            return Ok(());
        }
        self.save_locked(&entries)
    }

    /// Snapshot of all entries, for diagnostics.
    pub fn entries(&self) -> Vec<ProtectionEntry> {
        self.entries
            .lock()
            .iter()
            .map(|(path, key)| ProtectionEntry { path: path.clone(), key: key.clone() })
            .collect()
    }
}

/// Whether `session` may enter `path` given the key `required` guarding it.
///
/// Unprotected paths always pass. Otherwise a grant satisfies the request
/// three ways: the path itself was granted; the root was granted and the path
/// is below it (the root grant also covers the root itself via the first
/// clause); or some non-root granted ancestor covers the path.
pub fn has_access(session: &Session, path: &str, required: Option<&str>) -> bool {
    if required.is_none() {
        return true;
    }
    for granted in &session.authorized_paths {
        if path == granted.as_str() {
            return true;
        }
        if granted.is_empty() && !path.is_empty() {
            return true;
        }
        if !granted.is_empty()
            && path.len() > granted.len()
            && path.starts_with(granted.as_str())
            && path.as_bytes()[granted.len()] == b'/'
        {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn fresh_index(dir: &tempfile::TempDir) -> AuthIndex {
        let (idx, corrupt) = AuthIndex::open(dir.path().join("folder_keys.json"));
        assert!(corrupt.is_none());
        idx
    }

    #[test]
    fn longest_ancestor_match_wins() {
        let dir = tempdir().unwrap();
        let idx = fresh_index(&dir);
        idx.protect("a", "k1").unwrap();
        idx.protect("a/b", "k2").unwrap();
        assert_eq!(idx.required_key("a/b/c").as_deref(), Some("k2"));
        assert_eq!(idx.required_key("a/x").as_deref(), Some("k1"));
        assert_eq!(idx.required_key("a").as_deref(), Some("k1"));
        assert_eq!(idx.required_key("unrelated"), None);
    }

    #[test]
    fn prefix_match_requires_segment_boundary() {
        let dir = tempdir().unwrap();
        let idx = fresh_index(&dir);
        idx.protect("docs", "k").unwrap();
        assert_eq!(idx.required_key("docs2"), None);
        assert_eq!(idx.required_key("docs/sub").as_deref(), Some("k"));
    }

    #[test]
    fn root_is_never_protectable() {
        let dir = tempdir().unwrap();
        let idx = fresh_index(&dir);
        let err = idx.protect("", "x").unwrap_err();
        assert!(matches!(err, AppError::InvalidTarget { .. }));
        assert!(idx.entries().is_empty());
    }

    #[test]
    fn mutators_canonicalize_their_input() {
        let dir = tempdir().unwrap();
        let idx = fresh_index(&dir);
        idx.protect("a/", "k").unwrap();
        assert_eq!(idx.required_key("a").as_deref(), Some("k"));
        assert_eq!(idx.required_key("a/sub").as_deref(), Some("k"));
        idx.unprotect("/a/").unwrap();
        assert_eq!(idx.required_key("a"), None);
        // Root in disguise is still the root.
        assert!(idx.protect("/", "k").is_err());
        assert!(idx.protect("a/..", "k").is_err());
    }

    #[test]
    fn unprotect_missing_entry_is_noop_success() {
        let dir = tempdir().unwrap();
        let idx = fresh_index(&dir);
        idx.unprotect("nothing/here").unwrap();
        assert!(idx.entries().is_empty());
    }

    #[test]
    fn session_access_three_clauses() {
        let mut s = Session::new();
        assert!(has_access(&s, "a/b", None));
        assert!(!has_access(&s, "a/b", Some("k")));

        s.grant("a/b");
        assert!(has_access(&s, "a/b", Some("k")));
        assert!(has_access(&s, "a/b/deep", Some("k")));
        assert!(!has_access(&s, "a", Some("k")));
        assert!(!has_access(&s, "a/bc", Some("k")));
    }

    #[test]
    fn root_grant_unlocks_everything_including_root() {
        let mut s = Session::new();
        s.grant("");
        assert!(has_access(&s, "anything/at/all", Some("k")));
        assert!(has_access(&s, "", Some("k")));
    }

    #[test]
    fn corrupt_config_loads_empty_with_notice() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("folder_keys.json");
        std::fs::write(&file, "{not json").unwrap();
        let (idx, corrupt) = AuthIndex::open(&file);
        assert!(matches!(corrupt, Some(AppError::ConfigCorrupt { .. })));
        assert!(idx.entries().is_empty());
    }

    #[test]
    fn save_load_round_trip() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("folder_keys.json");
        {
            let (idx, _) = AuthIndex::open(&file);
            idx.protect("a", "k1").unwrap();
            idx.protect("a/b", "k2").unwrap();
            idx.protect("media", "k3").unwrap();
        }
        let (reloaded, corrupt) = AuthIndex::open(&file);
        assert!(corrupt.is_none());
        assert_eq!(reloaded.required_key("a/b/c").as_deref(), Some("k2"));
        assert_eq!(reloaded.required_key("media/x").as_deref(), Some("k3"));
        assert_eq!(reloaded.entries().len(), 3);
    }
}
