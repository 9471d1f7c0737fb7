//! Canonical relative paths and containment checks for the public root.
//!
//! Every user-supplied path is reduced to a canonical relative form before any
//! index lookup: forward-slash separated, no leading/trailing separator, no
//! `.`/`..` segments, with the empty string denoting the root. Containment is
//! checked on fully resolved absolute paths immediately before filesystem use,
//! since traversal tricks only become visible after resolution.

use path_absolutize::Absolutize;
use std::path::{Path, PathBuf};

/// Reduce an arbitrary path string to canonical relative form.
///
/// Accepts both `/` and `\` as separators, drops empty and `.` segments and
/// resolves `..` lexically, clamping at the root so no input can yield a path
/// above it. Total: never fails, worst case is the root (`""`).
pub fn canonicalize(raw: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for seg in raw.split(|c| c == '/' || c == '\\') {
        match seg {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    segments.join("/")
}

/// True iff `candidate`, after lexical absolutization, equals `root` or sits
/// beneath it. Component-wise comparison avoids false positives such as
/// `/public2` against `/public`.
pub fn is_contained(candidate: &Path, root: &Path) -> bool {
    let cand = match candidate.absolutize() {
        Ok(p) => p.to_path_buf(),
        Err(_) => return false,
    };
    let root = match root.absolutize() {
        Ok(p) => p.to_path_buf(),
        Err(_) => return false,
    };
    cand.starts_with(&root)
}

/// Resolve a canonical relative path beneath `root`.
/// Callers must still run [`is_contained`] on the result before touching disk.
pub fn resolve_under(root: &Path, canonical: &str) -> PathBuf {
    if canonical.is_empty() {
        root.to_path_buf()
    } else {
        root.join(canonical)
    }
}

/// Final segment of a canonical path, or the empty string for the root.
pub fn display_name(canonical: &str) -> &str {
    canonical.rsplit('/').next().unwrap_or("")
}

/// Parent of a canonical path; the root is its own parent.
pub fn parent(canonical: &str) -> &str {
    match canonical.rsplit_once('/') {
        Some((p, _)) => p,
        None => "",
    }
}

/// Join two canonical fragments, re-canonicalizing the result.
pub fn join(base: &str, name: &str) -> String {
    if base.is_empty() {
        canonicalize(name)
    } else {
        canonicalize(&format!("{}/{}", base, name))
    }
}

/// Percent-encode a canonical path for use in URLs, preserving slashes.
pub fn url_encode(canonical: &str) -> String {
    canonical
        .split('/')
        .map(|seg| urlencoding::encode(seg).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Percent-decode a URL path fragment. Invalid encodings are passed through.
pub fn url_decode(path: &str) -> String {
    match urlencoding::decode(path) {
        Ok(s) => s.into_owned(),
        Err(_) => path.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonicalize_strips_and_collapses() {
        assert_eq!(canonicalize("/docs/sub/"), "docs/sub");
        assert_eq!(canonicalize("docs//sub"), "docs/sub");
        assert_eq!(canonicalize("docs/./sub"), "docs/sub");
        assert_eq!(canonicalize("docs\\sub"), "docs/sub");
    }

    #[test]
    fn canonicalize_resolves_dotdot_without_escaping() {
        assert_eq!(canonicalize("a/b/../c"), "a/c");
        assert_eq!(canonicalize("../../etc/passwd"), "etc/passwd");
        assert_eq!(canonicalize("a/../.."), "");
    }

    #[test]
    fn canonicalize_maps_root_forms_to_empty() {
        assert_eq!(canonicalize(""), "");
        assert_eq!(canonicalize("."), "");
        assert_eq!(canonicalize("/"), "");
        assert_eq!(canonicalize("./"), "");
    }

    #[test]
    fn containment_basic() {
        assert!(is_contained(Path::new("/public/sub"), Path::new("/public")));
        assert!(is_contained(Path::new("/public"), Path::new("/public")));
        assert!(!is_contained(Path::new("/public/../secret"), Path::new("/public")));
        assert!(!is_contained(Path::new("/elsewhere"), Path::new("/public")));
    }

    #[test]
    fn containment_rejects_sibling_prefix() {
        assert!(!is_contained(Path::new("/public2/x"), Path::new("/public")));
    }

    #[test]
    fn helpers() {
        assert_eq!(display_name("a/b/c.txt"), "c.txt");
        assert_eq!(display_name(""), "");
        assert_eq!(parent("a/b/c"), "a/b");
        assert_eq!(parent("a"), "");
        assert_eq!(join("", "x"), "x");
        assert_eq!(join("a/b", "c"), "a/b/c");
        assert_eq!(url_encode("a b/c"), "a%20b/c");
        assert_eq!(url_decode("a%20b/c"), "a b/c");
    }
}
