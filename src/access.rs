//! Access decision composition.
//!
//! One pure query per request: canonicalize the raw path, confine it to the
//! public root, then combine the authorization and visibility indexes with
//! the session's grants into a single verdict. Hidden status is informational
//! for direct requests; it only filters listings.

use serde::{Deserialize, Serialize};

use crate::authz::{self, AuthIndex};
use crate::files::FileStore;
use crate::session::Session;
use crate::visibility::VisibilityIndex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Access {
    /// Request may proceed. `hidden` flags paths excluded from listings.
    Allowed { hidden: bool },
    /// A folder key guards this path and the session holds no grant for it.
    RequiresKey,
    /// The resolved path escapes the public root.
    OutOfBounds,
    /// The path does not exist on disk.
    NotFound,
}

/// Decide whether `session` may operate on `raw_path`.
/// Returns the canonical path alongside the verdict so callers reuse it for
/// the actual filesystem operation.
pub fn decide(
    auth: &AuthIndex,
    visibility: &VisibilityIndex,
    files: &FileStore,
    session: &Session,
    raw_path: &str,
) -> (String, Access) {
    let canonical = crate::paths::canonicalize(raw_path);
    let abs = files.absolute(&canonical);
    if !files.is_safe(&abs) {
        return (canonical, Access::OutOfBounds);
    }
    if !abs.exists() {
        return (canonical, Access::NotFound);
    }
    let required = auth.required_key(&canonical);
    if required.is_some() && !authz::has_access(session, &canonical, required.as_deref()) {
        return (canonical, Access::RequiresKey);
    }
    let hidden = visibility.is_hidden(&canonical);
    (canonical, Access::Allowed { hidden })
}

/// Validate a supplied folder key and, on success, grant the session access
/// to the subtree. Returns whether a grant happened. A wrong key and a
/// missing key are indistinguishable to the caller; paths without protection
/// report success without mutating the session.
pub fn grant_access(auth: &AuthIndex, session: &mut Session, raw_path: &str, supplied_key: &str) -> bool {
    let canonical = crate::paths::canonicalize(raw_path);
    match auth.required_key(&canonical) {
        None => true,
        Some(required) if required == supplied_key => {
            session.grant(&canonical);
            true
        }
        Some(_) => false,
    }
}
