//! Direct filesystem operations over the public root.
//!
//! Everything here is plain I/O: list a directory, walk for name matches,
//! make a folder, delete entries, write an upload. The interesting decisions
//! (may this session see or touch this path) are made by `access`/`authz`/
//! `visibility`; this module only re-checks containment on every resolved
//! absolute path immediately before touching disk.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::authz::AuthIndex;
use crate::error::{AppError, AppResult};
use crate::paths;
use crate::visibility::VisibilityIndex;

/// Metadata for one listing or search entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryInfo {
    pub path: String,
    pub display_name: String,
    pub is_dir: bool,
    pub size_bytes: u64,
    pub size_display: String,
    pub modified: Option<DateTime<Utc>>,
    pub is_protected: bool,
    pub is_hidden: bool,
}

/// Per-item outcome report for bulk deletion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteReport {
    pub success_count: usize,
    pub fail_count: usize,
    pub errors: Vec<DeleteError>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteError {
    pub path: String,
    pub error: String,
}

fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

/// Reduce a user-supplied folder name to a safe single path segment.
/// Separators and traversal dots are rejected outright; control characters
/// are stripped. Returns None if nothing safe remains.
fn sanitize_name(name: &str) -> Option<String> {
    if name.contains('/') || name.contains('\\') {
        return None;
    }
    let cleaned: String = name.chars().filter(|c| !c.is_control()).collect();
    let cleaned = cleaned.trim().trim_matches('.').to_string();
    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        None
    } else {
        Some(cleaned)
    }
}

pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn absolute(&self, canonical: &str) -> PathBuf {
        paths::resolve_under(&self.root, canonical)
    }

    pub fn is_safe(&self, abs: &Path) -> bool {
        paths::is_contained(abs, &self.root)
    }

    pub fn exists(&self, canonical: &str) -> bool {
        let abs = self.absolute(canonical);
        self.is_safe(&abs) && abs.exists()
    }

    pub fn is_dir(&self, canonical: &str) -> bool {
        let abs = self.absolute(canonical);
        self.is_safe(&abs) && abs.is_dir()
    }

    pub fn is_file(&self, canonical: &str) -> bool {
        let abs = self.absolute(canonical);
        self.is_safe(&abs) && abs.is_file()
    }

    fn entry_info(
        &self,
        abs: &Path,
        rel: String,
        auth: &AuthIndex,
        visibility: &VisibilityIndex,
    ) -> AppResult<EntryInfo> {
        let meta = std::fs::symlink_metadata(abs)?;
        let modified = meta.modified().ok().map(DateTime::<Utc>::from);
        let size_bytes = if meta.is_dir() { 0 } else { meta.len() };
        Ok(EntryInfo {
            display_name: paths::display_name(&rel).to_string(),
            is_dir: meta.is_dir(),
            size_bytes,
            size_display: if meta.is_dir() { "-".to_string() } else { human_size(size_bytes) },
            modified,
            is_protected: auth.is_protected(&rel),
            is_hidden: visibility.is_hidden(&rel),
            path: rel,
        })
    }

    /// Listing metadata for a single canonical path.
    pub fn stat_entry(
        &self,
        canonical: &str,
        auth: &AuthIndex,
        visibility: &VisibilityIndex,
    ) -> AppResult<EntryInfo> {
        let abs = self.absolute(canonical);
        if !self.is_safe(&abs) {
            return Err(AppError::out_of_bounds("stat_entry", "Path escapes the public root."));
        }
        self.entry_info(&abs, canonical.to_string(), auth, visibility)
    }

    /// List one directory level, sorted case-insensitively by name. Hidden
    /// entries are skipped unless `show_hidden`; entries that fail
    /// containment or stat are skipped rather than failing the listing.
    pub fn list_directory(
        &self,
        canonical: &str,
        show_hidden: bool,
        auth: &AuthIndex,
        visibility: &VisibilityIndex,
    ) -> AppResult<Vec<EntryInfo>> {
        let abs = self.absolute(canonical);
        if !self.is_safe(&abs) {
            return Err(AppError::out_of_bounds("list_directory", "Path escapes the public root."));
        }
        if !abs.is_dir() {
            return Err(AppError::not_found("list_directory", "Not a directory."));
        }

        let mut entries = Vec::new();
        for dirent in std::fs::read_dir(&abs)? {
            let dirent = match dirent {
                Ok(d) => d,
                Err(e) => {
                    warn!(dir = %abs.display(), error = %e, "skipping unreadable directory entry");
                    continue;
                }
            };
            let name = dirent.file_name().to_string_lossy().to_string();
            let entry_abs = dirent.path();
            if !self.is_safe(&entry_abs) {
                continue;
            }
            let entry_rel = paths::join(canonical, &name);
            if !show_hidden && visibility.is_hidden(&entry_rel) {
                continue;
            }
            match self.entry_info(&entry_abs, entry_rel, auth, visibility) {
                Ok(info) => entries.push(info),
                Err(_) => continue,
            }
        }
        entries.sort_by(|a, b| a.display_name.to_lowercase().cmp(&b.display_name.to_lowercase()));
        Ok(entries)
    }

    /// Case-insensitive substring match against final name segments, starting
    /// at `start`, optionally recursive. One unreadable entry never fails the
    /// whole search.
    pub fn find_by_name(
        &self,
        query: &str,
        start: &str,
        recursive: bool,
        show_hidden: bool,
        auth: &AuthIndex,
        visibility: &VisibilityIndex,
    ) -> Vec<EntryInfo> {
        let start_abs = self.absolute(start);
        if !self.is_safe(&start_abs) || !start_abs.is_dir() {
            return Vec::new();
        }
        let needle = query.to_lowercase();
        let mut walker = WalkDir::new(&start_abs).min_depth(1);
        if !recursive {
            walker = walker.max_depth(1);
        }

        let mut results = Vec::new();
        for entry in walker.into_iter().filter_map(|e| e.ok()) {
            let name = entry.file_name().to_string_lossy().to_string();
            if !name.to_lowercase().contains(&needle) {
                continue;
            }
            let entry_abs = entry.path();
            if !self.is_safe(entry_abs) {
                continue;
            }
            let rel = match entry_abs.strip_prefix(&self.root) {
                Ok(p) => paths::canonicalize(&p.to_string_lossy()),
                Err(_) => continue,
            };
            if !show_hidden && visibility.is_hidden(&rel) {
                continue;
            }
            if let Ok(info) = self.entry_info(entry_abs, rel, auth, visibility) {
                results.push(info);
            }
        }
        results.sort_by(|a, b| a.display_name.to_lowercase().cmp(&b.display_name.to_lowercase()));
        results
    }

    /// All directory paths under the root, for destination pickers. Hidden
    /// directories prune their whole subtree from the walk.
    pub fn all_directories(&self, show_hidden: bool, visibility: &VisibilityIndex) -> Vec<String> {
        let root = self.root.clone();
        let mut dirs: Vec<String> = WalkDir::new(&self.root)
            .min_depth(1)
            .into_iter()
            .filter_entry(|e| {
                if !e.file_type().is_dir() {
                    return true;
                }
                if show_hidden {
                    return true;
                }
                match e.path().strip_prefix(&root) {
                    Ok(p) => !visibility.is_hidden(&paths::canonicalize(&p.to_string_lossy())),
                    Err(_) => false,
                }
            })
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_dir())
            .filter_map(|e| {
                e.path()
                    .strip_prefix(&self.root)
                    .ok()
                    .map(|p| paths::canonicalize(&p.to_string_lossy()))
            })
            .collect();
        dirs.sort();
        dirs
    }

    /// Create a folder under `parent`. Returns the new canonical path.
    pub fn create_folder(&self, parent: &str, folder_name: &str) -> AppResult<String> {
        let safe_name = sanitize_name(folder_name)
            .ok_or_else(|| AppError::user("invalid_folder_name", "Invalid folder name."))?;
        let new_rel = paths::join(parent, &safe_name);
        let new_abs = self.absolute(&new_rel);
        if !self.is_safe(&new_abs) {
            return Err(AppError::out_of_bounds("create_folder", "Path escapes the public root."));
        }
        if new_abs.exists() {
            return Err(AppError::user("folder_exists", "Folder already exists."));
        }
        std::fs::create_dir_all(&new_abs)?;
        info!(path = %new_rel, "created folder");
        Ok(new_rel)
    }

    /// Delete files or folders by canonical path. Each item succeeds or fails
    /// independently; the root itself is undeletable.
    pub fn delete_items(&self, items: &[String]) -> DeleteReport {
        let mut report = DeleteReport { success_count: 0, fail_count: 0, errors: Vec::new() };
        for raw in items {
            let rel = paths::canonicalize(raw);
            if rel.is_empty() {
                report.fail_count += 1;
                report.errors.push(DeleteError { path: "/".into(), error: "Cannot delete root directory".into() });
                continue;
            }
            let abs = self.absolute(&rel);
            if !self.is_safe(&abs) {
                report.fail_count += 1;
                report.errors.push(DeleteError { path: rel, error: "Access forbidden".into() });
                continue;
            }
            let meta = match std::fs::symlink_metadata(&abs) {
                Ok(m) => m,
                Err(_) => {
                    report.fail_count += 1;
                    report.errors.push(DeleteError { path: rel, error: "Item not found".into() });
                    continue;
                }
            };
            let outcome = if meta.is_dir() && !meta.file_type().is_symlink() {
                std::fs::remove_dir_all(&abs)
            } else {
                std::fs::remove_file(&abs)
            };
            match outcome {
                Ok(()) => {
                    info!(path = %rel, "deleted");
                    report.success_count += 1;
                }
                Err(e) => {
                    report.fail_count += 1;
                    report.errors.push(DeleteError { path: rel, error: e.to_string() });
                }
            }
        }
        report
    }

    /// Write uploaded bytes to a destination path, creating parent
    /// directories as needed. Containment is re-checked on the resolved
    /// destination.
    pub fn save_upload(&self, dest_canonical: &str, data: &[u8]) -> AppResult<()> {
        if dest_canonical.is_empty() {
            return Err(AppError::user("missing_filename", "Upload destination must name a file."));
        }
        let dest_abs = self.absolute(dest_canonical);
        if !self.is_safe(&dest_abs) {
            return Err(AppError::out_of_bounds("save_upload", "Path escapes the public root."));
        }
        if let Some(parent) = dest_abs.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&dest_abs, data)?;
        info!(path = %dest_canonical, bytes = data.len(), "file uploaded");
        Ok(())
    }
}
