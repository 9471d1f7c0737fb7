//! Hybrid search ranking.
//!
//! Two retrieval signals feed one result list: vector-similarity hits from an
//! external semantic backend (opaque to this module beyond `(path, score)`)
//! and case-insensitive substring matches against filenames. The ranker
//! merges them per path, drops entries that vanished or are hidden, and
//! orders by score, then name-match, then display name. A result with no
//! score is strictly below any scored result, including 0.0; `Option<f32>`
//! carries that distinction structurally rather than through an in-range
//! sentinel value.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::path::Path;

use crate::error::{AppError, AppResult};
use crate::paths;
use crate::visibility::VisibilityIndex;

/// One similarity hit from the semantic backend, score in `[0, 1]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticHit {
    pub path: String,
    pub score: f32,
}

/// One merged, ranked result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedHit {
    pub path: String,
    pub display_name: String,
    /// Semantic similarity, absent for filename-only matches.
    pub score: Option<f32>,
    pub matched_name: bool,
}

/// Availability flags surfaced alongside search results for UI messaging.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SearchStatus {
    pub semantic_available: bool,
    pub index_ready: bool,
}

/// External vector-similarity search collaborator. Results come back already
/// sorted descending by score; the ranker re-derives its own composite order
/// regardless.
pub trait SemanticBackend: Send + Sync {
    /// Whether the backend itself (model, connection) is usable at all.
    fn is_available(&self) -> bool;
    /// Whether an index exists to query.
    fn is_index_ready(&self) -> bool;
    fn search(&self, query: &str, top_n: usize) -> Vec<SemanticHit>;
    /// Rebuild the index over the public root. Serialized by the caller so at
    /// most one rebuild is in flight.
    fn rebuild(&self, root: &Path) -> AppResult<usize> {
        let _ = root;
        Err(AppError::internal("semantic_unavailable", "No semantic backend configured."))
    }
    fn status(&self) -> SearchStatus {
        SearchStatus { semantic_available: self.is_available(), index_ready: self.is_index_ready() }
    }
}

/// Default backend when no vector search is wired up: always unavailable,
/// never returns hits. Filename search still works.
pub struct NoSemanticBackend;

impl SemanticBackend for NoSemanticBackend {
    fn is_available(&self) -> bool {
        false
    }
    fn is_index_ready(&self) -> bool {
        false
    }
    fn search(&self, _query: &str, _top_n: usize) -> Vec<SemanticHit> {
        Vec::new()
    }
}

/// Descending score order with absent scores strictly last.
fn score_cmp(a: Option<f32>, b: Option<f32>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Merge semantic and filename hits into one deduplicated, ordered list.
///
/// Semantic hits are seeded first, in input order; a hit whose path no longer
/// exists under `root`, errors on inspection, or is hidden (when hidden
/// entries are not requested) is silently dropped rather than failing the
/// query. Filename hits not already present join with no score. Callers
/// paginate by slicing.
pub fn rank_results(
    root: &Path,
    visibility: &VisibilityIndex,
    show_hidden: bool,
    semantic: &[SemanticHit],
    name_hits: &[String],
) -> Vec<RankedHit> {
    let name_set: HashSet<&str> = name_hits.iter().map(|s| s.as_str()).collect();
    let mut seen: HashSet<String> = HashSet::new();
    let mut merged: Vec<RankedHit> = Vec::new();

    for hit in semantic {
        let canon = paths::canonicalize(&hit.path);
        if seen.contains(&canon) {
            continue;
        }
        if !show_hidden && visibility.is_hidden(&canon) {
            continue;
        }
        let abs = paths::resolve_under(root, &canon);
        if std::fs::symlink_metadata(&abs).is_err() {
            continue;
        }
        let display_name = paths::display_name(&canon).to_string();
        seen.insert(canon.clone());
        merged.push(RankedHit {
            matched_name: name_set.contains(canon.as_str()),
            path: canon,
            display_name,
            score: Some(hit.score),
        });
    }

    for hit in name_hits {
        if seen.contains(hit.as_str()) {
            continue;
        }
        let display_name = paths::display_name(hit).to_string();
        seen.insert(hit.clone());
        merged.push(RankedHit { path: hit.clone(), display_name, score: None, matched_name: true });
    }

    merged.sort_by(|a, b| {
        score_cmp(a.score, b.score)
            .then_with(|| b.matched_name.cmp(&a.matched_name))
            .then_with(|| a.display_name.to_lowercase().cmp(&b.display_name.to_lowercase()))
    });
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn touch(dir: &Path, rel: &str) {
        let p = dir.join(rel);
        if let Some(parent) = p.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(p, b"x").unwrap();
    }

    fn vis(dir: &tempfile::TempDir) -> VisibilityIndex {
        VisibilityIndex::open(dir.path().join("vis.json")).0
    }

    #[test]
    fn composite_order_score_then_name_match_then_alpha() {
        let dir = tempdir().unwrap();
        for f in ["a.txt", "b.txt", "c.txt"] {
            touch(dir.path(), f);
        }
        let visibility = vis(&dir);
        let semantic = vec![
            SemanticHit { path: "a.txt".into(), score: 0.9 },
            SemanticHit { path: "b.txt".into(), score: 0.4 },
        ];
        let names = vec!["b.txt".to_string(), "c.txt".to_string()];

        let out = rank_results(dir.path(), &visibility, false, &semantic, &names);
        let order: Vec<&str> = out.iter().map(|h| h.path.as_str()).collect();
        assert_eq!(order, vec!["a.txt", "b.txt", "c.txt"]);
        assert!(!out[0].matched_name);
        assert_eq!(out[1].score, Some(0.4));
        assert!(out[1].matched_name);
        assert_eq!(out[2].score, None);
        assert!(out[2].matched_name);
    }

    #[test]
    fn absent_score_sorts_below_zero_score() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "zero.txt");
        touch(dir.path(), "nameonly.txt");
        let visibility = vis(&dir);
        let semantic = vec![SemanticHit { path: "zero.txt".into(), score: 0.0 }];
        let names = vec!["nameonly.txt".to_string()];

        let out = rank_results(dir.path(), &visibility, false, &semantic, &names);
        assert_eq!(out[0].path, "zero.txt");
        assert_eq!(out[1].path, "nameonly.txt");
    }

    #[test]
    fn name_match_breaks_score_ties_then_alpha() {
        let dir = tempdir().unwrap();
        for f in ["m.txt", "n.txt", "z.txt"] {
            touch(dir.path(), f);
        }
        let visibility = vis(&dir);
        let semantic = vec![
            SemanticHit { path: "z.txt".into(), score: 0.5 },
            SemanticHit { path: "n.txt".into(), score: 0.5 },
            SemanticHit { path: "m.txt".into(), score: 0.5 },
        ];
        let names = vec!["z.txt".to_string()];

        let out = rank_results(dir.path(), &visibility, false, &semantic, &names);
        let order: Vec<&str> = out.iter().map(|h| h.path.as_str()).collect();
        // z matched by name outranks the alphabetical pair at the same score
        assert_eq!(order, vec!["z.txt", "m.txt", "n.txt"]);
    }

    #[test]
    fn vanished_and_hidden_semantic_hits_are_dropped() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "kept.txt");
        touch(dir.path(), "secret/file.txt");
        let visibility = vis(&dir);
        visibility.set_hidden("secret/file.txt", true).unwrap();

        let semantic = vec![
            SemanticHit { path: "kept.txt".into(), score: 0.8 },
            SemanticHit { path: "gone.txt".into(), score: 0.9 },
            SemanticHit { path: "secret/file.txt".into(), score: 0.7 },
        ];
        let out = rank_results(dir.path(), &visibility, false, &semantic, &[]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].path, "kept.txt");

        // Opting into hidden entries restores the hidden hit.
        let out = rank_results(dir.path(), &visibility, true, &semantic, &[]);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn empty_inputs_yield_empty_result() {
        let dir = tempdir().unwrap();
        let visibility = vis(&dir);
        let out = rank_results(dir.path(), &visibility, false, &[], &[]);
        assert!(out.is_empty());
    }

    #[test]
    fn duplicate_paths_deduplicate_to_one_hit() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "dup.txt");
        let visibility = vis(&dir);
        let semantic = vec![
            SemanticHit { path: "dup.txt".into(), score: 0.9 },
            SemanticHit { path: "./dup.txt".into(), score: 0.5 },
        ];
        let names = vec!["dup.txt".to_string()];
        let out = rank_results(dir.path(), &visibility, false, &semantic, &names);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].score, Some(0.9));
        assert!(out[0].matched_name);
    }

    #[test]
    fn no_backend_reports_unavailable() {
        let b = NoSemanticBackend;
        let s = b.status();
        assert!(!s.semantic_available);
        assert!(!s.index_ready);
        assert!(b.search("anything", 10).is_empty());
        assert!(b.rebuild(Path::new("/tmp")).is_err());
    }
}
