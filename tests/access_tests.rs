//! End-to-end access decision tests across canonicalization, containment,
//! folder keys, session grants and visibility.

use anyhow::Result;
use tempfile::{tempdir, TempDir};

use atrium::access::{self, Access};
use atrium::authz::AuthIndex;
use atrium::files::FileStore;
use atrium::session::Session;
use atrium::visibility::VisibilityIndex;

struct World {
    _tmp: TempDir,
    auth: AuthIndex,
    visibility: VisibilityIndex,
    files: FileStore,
}

fn world() -> Result<World> {
    let tmp = tempdir()?;
    let public = tmp.path().join("public");
    std::fs::create_dir_all(public.join("music/flac"))?;
    std::fs::create_dir_all(public.join("docs"))?;
    std::fs::write(public.join("music/flac/track.flac"), b"data")?;
    std::fs::write(public.join("docs/readme.md"), b"# hi")?;
    let (auth, _) = AuthIndex::open(tmp.path().join("folder_keys.json"));
    let (visibility, _) = VisibilityIndex::open(tmp.path().join("folder_visibility.json"));
    let files = FileStore::new(&public);
    Ok(World { _tmp: tmp, auth, visibility, files })
}

#[test]
fn messy_input_paths_normalize_before_decision() -> Result<()> {
    let w = world()?;
    let s = Session::new();
    for raw in ["/docs/", "docs//", "./docs", "music/../docs"] {
        let (canon, access) = access::decide(&w.auth, &w.visibility, &w.files, &s, raw);
        assert_eq!(canon, "docs", "raw input {:?}", raw);
        assert_eq!(access, Access::Allowed { hidden: false });
    }
    Ok(())
}

#[test]
fn traversal_clamps_to_root_instead_of_escaping() -> Result<()> {
    let w = world()?;
    let s = Session::new();
    let (canon, access) = access::decide(&w.auth, &w.visibility, &w.files, &s, "../../../../");
    assert_eq!(canon, "");
    assert_eq!(access, Access::Allowed { hidden: false });
    Ok(())
}

#[test]
fn full_unlock_flow() -> Result<()> {
    let w = world()?;
    w.auth.protect("music", "rhythm").unwrap();
    let mut s = Session::new();

    let (_, before) = access::decide(&w.auth, &w.visibility, &w.files, &s, "music/flac/track.flac");
    assert_eq!(before, Access::RequiresKey);

    // Wrong key: no grant, decision unchanged.
    assert!(!access::grant_access(&w.auth, &mut s, "music/flac", "rythm"));
    assert!(s.authorized_paths.is_empty());

    // Correct key grants the requested path; the grant covers the subtree.
    assert!(access::grant_access(&w.auth, &mut s, "music", "rhythm"));
    let (_, after) = access::decide(&w.auth, &w.visibility, &w.files, &s, "music/flac/track.flac");
    assert_eq!(after, Access::Allowed { hidden: false });
    Ok(())
}

#[test]
fn deeper_protection_overrides_shallower_key() -> Result<()> {
    let w = world()?;
    w.auth.protect("music", "outer").unwrap();
    w.auth.protect("music/flac", "inner").unwrap();
    let mut s = Session::new();

    // The outer key no longer opens the refined subtree.
    assert!(access::grant_access(&w.auth, &mut s, "music", "outer"));
    let (_, access_flac) = access::decide(&w.auth, &w.visibility, &w.files, &s, "music/flac");
    // The ancestor grant still satisfies the subtree: the grant is on
    // "music" and "music/flac" sits beneath it.
    assert_eq!(access_flac, Access::Allowed { hidden: false });

    // A fresh session must supply the inner key for the inner subtree.
    let mut fresh = Session::new();
    assert!(!access::grant_access(&w.auth, &mut fresh, "music/flac", "outer"));
    assert!(access::grant_access(&w.auth, &mut fresh, "music/flac", "inner"));
    Ok(())
}

#[test]
fn hidden_paths_allow_direct_access_but_flag_it() -> Result<()> {
    let w = world()?;
    w.visibility.set_hidden("docs", true).unwrap();
    let s = Session::new();
    let (_, access) = access::decide(&w.auth, &w.visibility, &w.files, &s, "docs");
    assert_eq!(access, Access::Allowed { hidden: true });
    // Exact-match semantics: the child is not flagged.
    let (_, access) = access::decide(&w.auth, &w.visibility, &w.files, &s, "docs/readme.md");
    assert_eq!(access, Access::Allowed { hidden: false });
    Ok(())
}

#[test]
fn grants_never_shrink_within_a_session() -> Result<()> {
    let w = world()?;
    w.auth.protect("music", "k").unwrap();
    let mut s = Session::new();
    assert!(access::grant_access(&w.auth, &mut s, "music", "k"));
    let before = s.authorized_paths.clone();

    // Later failed attempts leave existing grants untouched.
    assert!(!access::grant_access(&w.auth, &mut s, "music", "wrong"));
    assert_eq!(s.authorized_paths, before);
    Ok(())
}
