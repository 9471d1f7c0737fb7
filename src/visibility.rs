//! Hidden-path index.
//!
//! Tracks subtrees excluded from default listings. Membership is exact-match
//! only: hiding `docs` does not hide `docs/sub` unless it is hidden itself.
//! That asymmetry with the authorization index's ancestor semantics is
//! intentional and mirrors the product behavior; a directory walk that skips
//! a hidden directory never descends into it anyway.
//!
//! Same concurrency and persistence contract as [`crate::authz::AuthIndex`]:
//! one mutex over set plus save, write-through, in-memory-wins on failure.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;
use tracing::{info, warn};

use crate::error::{AppError, AppResult};
use crate::paths;

#[derive(Debug, Serialize, Deserialize)]
struct HiddenPathsFile {
    #[serde(default)]
    hidden_paths: Vec<String>,
}

pub struct VisibilityIndex {
    config_file: PathBuf,
    hidden: Mutex<BTreeSet<String>>,
}

impl VisibilityIndex {
    /// Load the hidden set from `config_file`; missing file means nothing is
    /// hidden, malformed file means empty set plus a `ConfigCorrupt` notice.
    pub fn open(config_file: impl Into<PathBuf>) -> (Self, Option<AppError>) {
        let config_file = config_file.into();
        let mut corrupt = None;
        let mut hidden = BTreeSet::new();

        if config_file.exists() {
            match std::fs::read_to_string(&config_file) {
                Ok(raw) => match serde_json::from_str::<HiddenPathsFile>(&raw) {
                    Ok(parsed) => {
                        for p in parsed.hidden_paths {
                            let canon = paths::canonicalize(&p);
                            if !canon.is_empty() {
                                hidden.insert(canon);
                            }
                        }
                        info!(count = hidden.len(), file = %config_file.display(), "loaded hidden paths");
                    }
                    Err(e) => {
                        warn!(file = %config_file.display(), error = %e, "visibility config unreadable, nothing hidden");
                        corrupt = Some(AppError::config_corrupt("folder_visibility", &e.to_string()));
                    }
                },
                Err(e) => {
                    warn!(file = %config_file.display(), error = %e, "visibility config unreadable, nothing hidden");
                    corrupt = Some(AppError::config_corrupt("folder_visibility", &e.to_string()));
                }
            }
        }

        (Self { config_file, hidden: Mutex::new(hidden) }, corrupt)
    }

    fn save_locked(&self, hidden: &BTreeSet<String>) -> AppResult<()> {
        let file = HiddenPathsFile { hidden_paths: hidden.iter().cloned().collect() };
        let body = serde_json::to_string_pretty(&file)
            .map_err(|e| AppError::internal("serialize_hidden_paths", &e.to_string()))?;
        std::fs::write(&self.config_file, body)
            .map_err(|e| AppError::persistence("save_hidden_paths", &e.to_string()))
    }

    /// Exact-match hidden test. The root is never hidden.
    pub fn is_hidden(&self, path: &str) -> bool {
        if path.is_empty() {
            return false;
        }
        self.hidden.lock().contains(path)
    }

    /// Hide or unhide a subtree. The path is canonicalized first; the root
    /// cannot be touched. Unhiding a path that was not hidden is a no-op
    /// success without re-persisting.
    pub fn set_hidden(&self, path: &str, hide: bool) -> AppResult<()> {
        let canon = paths::canonicalize(path);
        if canon.is_empty() {
            return Err(AppError::invalid_target("hide_root", "Cannot hide the public root."));
        }
        let mut hidden = self.hidden.lock();
        let changed = if hide { hidden.insert(canon) } else { hidden.remove(&canon) };
        if !changed {
            return Ok(());
        }
        self.save_locked(&hidden)
    }

    pub fn hidden_paths(&self) -> Vec<String> {
        self.hidden.lock().iter().cloned().collect()
    }
}
