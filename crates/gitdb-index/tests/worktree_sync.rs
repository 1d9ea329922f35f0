//! Staging, modification detection, checkout, and tree materialization
//! against a real working directory.

use std::fs;
use std::path::{Path, PathBuf};

use bstr::BStr;
use gitdb_hash::ObjectId;
use gitdb_index::{Index, IndexEntry, IndexError};
use gitdb_repo::Repository;

fn setup() -> (tempfile::TempDir, PathBuf, Repository) {
    let dir = tempfile::tempdir().unwrap();
    let workdir = dir.path().to_path_buf();
    let repo = Repository::open(workdir.join(".git"));
    (dir, workdir, repo)
}

fn write_file(workdir: &Path, rel: &str, content: &[u8]) -> PathBuf {
    let path = workdir.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn add_stages_blob_and_stat() {
    let (_dir, workdir, repo) = setup();
    let file = write_file(&workdir, "src/main.rs", b"fn main() {}\n");

    let mut index = Index::new();
    let entry = index.add(&workdir, &file, &repo).unwrap();
    assert_eq!(entry.path, "src/main.rs");
    assert_eq!(entry.stage(), 0);
    assert_eq!(entry.stat.size, 13);

    // The blob landed in the object store under the recorded identifier.
    let expected = repo.write_blob(b"fn main() {}\n").unwrap();
    let entry_oid = index.entry(BStr::new(b"src/main.rs")).unwrap().oid;
    assert_eq!(entry_oid, expected);
}

#[test]
fn add_outside_workdir_fails() {
    let (_dir, workdir, repo) = setup();
    let elsewhere = tempfile::tempdir().unwrap();
    let foreign = elsewhere.path().join("file.txt");
    fs::write(&foreign, b"x").unwrap();

    let mut index = Index::new();
    assert!(matches!(
        index.add(&workdir, &foreign, &repo),
        Err(IndexError::OutsideWorkdir(_))
    ));
}

#[test]
fn fresh_entry_is_unmodified() {
    let (_dir, workdir, repo) = setup();
    let file = write_file(&workdir, "stable.txt", b"same\n");

    let mut index = Index::new();
    index.add(&workdir, &file, &repo).unwrap();
    let entry = index.entry(BStr::new(b"stable.txt")).unwrap();
    assert!(!index.is_modified(entry, &workdir, false, &repo).unwrap());
}

#[test]
fn missing_file_is_modified() {
    let (_dir, workdir, repo) = setup();
    let file = write_file(&workdir, "gone.txt", b"bye\n");

    let mut index = Index::new();
    index.add(&workdir, &file, &repo).unwrap();
    fs::remove_file(&file).unwrap();

    let entry = index.entry(BStr::new(b"gone.txt")).unwrap();
    assert!(index.is_modified(entry, &workdir, false, &repo).unwrap());
}

#[test]
fn assume_valid_wins_over_everything() {
    let (_dir, workdir, repo) = setup();
    let file = write_file(&workdir, "skip.txt", b"data\n");

    let mut index = Index::new();
    index.add(&workdir, &file, &repo).unwrap();
    fs::remove_file(&file).unwrap();

    let mut entry = index.entry(BStr::new(b"skip.txt")).unwrap().clone();
    entry.set_assume_valid(true);
    assert!(!index.is_modified(&entry, &workdir, false, &repo).unwrap());
}

#[test]
fn update_needed_forces_modified() {
    let (_dir, workdir, repo) = setup();
    let file = write_file(&workdir, "stale.txt", b"data\n");

    let mut index = Index::new();
    index.add(&workdir, &file, &repo).unwrap();
    let mut entry = index.entry(BStr::new(b"stale.txt")).unwrap().clone();
    entry.set_update_needed(true);
    assert!(index.is_modified(&entry, &workdir, false, &repo).unwrap());
}

#[test]
fn mtime_drift_is_conservatively_modified() {
    let (_dir, workdir, repo) = setup();
    let file = write_file(&workdir, "touched.txt", b"content\n");

    let mut index = Index::new();
    index.add(&workdir, &file, &repo).unwrap();

    // Same content, different mtime.
    filetime::set_file_mtime(&file, filetime::FileTime::from_unix_time(1_600_000_000, 0))
        .unwrap();

    let entry = index.entry(BStr::new(b"touched.txt")).unwrap();
    assert!(index.is_modified(entry, &workdir, false, &repo).unwrap());
    // A forced content check sees through the stale timestamp.
    assert!(!index.is_modified(entry, &workdir, true, &repo).unwrap());
}

#[test]
fn forced_check_detects_content_change() {
    let (_dir, workdir, repo) = setup();
    let file = write_file(&workdir, "edited.txt", b"original\n");

    let mut index = Index::new();
    index.add(&workdir, &file, &repo).unwrap();

    // Same size, different bytes, different mtime.
    fs::write(&file, b"ORIGINAL\n").unwrap();
    filetime::set_file_mtime(&file, filetime::FileTime::from_unix_time(1_600_000_000, 0))
        .unwrap();

    let entry = index.entry(BStr::new(b"edited.txt")).unwrap();
    assert!(index.is_modified(entry, &workdir, true, &repo).unwrap());
}

#[test]
fn size_change_is_modified() {
    let (_dir, workdir, repo) = setup();
    let file = write_file(&workdir, "grow.txt", b"ab\n");

    let mut index = Index::new();
    index.add(&workdir, &file, &repo).unwrap();
    fs::write(&file, b"abcd\n").unwrap();

    let entry = index.entry(BStr::new(b"grow.txt")).unwrap();
    assert!(index.is_modified(entry, &workdir, false, &repo).unwrap());
}

#[cfg(unix)]
#[test]
fn executable_drift_respects_filemode() {
    use std::os::unix::fs::PermissionsExt;

    let (_dir, workdir, mut repo) = setup();
    let file = write_file(&workdir, "tool.sh", b"#!/bin/sh\n");

    let mut index = Index::new();
    index.add(&workdir, &file, &repo).unwrap();

    let mut perms = fs::metadata(&file).unwrap().permissions();
    perms.set_mode(perms.mode() | 0o111);
    fs::set_permissions(&file, perms).unwrap();

    let entry = index.entry(BStr::new(b"tool.sh")).unwrap().clone();
    assert!(index.is_modified(&entry, &workdir, false, &repo).unwrap());

    // With core.filemode off the drift is invisible.
    repo.config_mut().set_bool("core", None, "filemode", false);
    assert!(!index.is_modified(&entry, &workdir, false, &repo).unwrap());
}

#[test]
fn checkout_restores_content_and_timestamps() {
    let (_dir, workdir, repo) = setup();
    let file = write_file(&workdir, "docs/readme.md", b"# hello\n");

    let mut index = Index::new();
    index.add(&workdir, &file, &repo).unwrap();
    fs::remove_file(&file).unwrap();

    index.checkout(&repo, &workdir).unwrap();
    assert_eq!(fs::read(&file).unwrap(), b"# hello\n");
    assert!(index.is_stat_dirty());

    // Timestamps were re-stamped from the written file, so the entry is
    // not immediately reported modified.
    let entry = index.entry(BStr::new(b"docs/readme.md")).unwrap();
    assert!(!index.is_modified(entry, &workdir, false, &repo).unwrap());
}

#[test]
fn checkout_skips_unmerged_entries() {
    let (_dir, workdir, repo) = setup();

    let blob = repo.write_blob(b"theirs\n").unwrap();
    let mut entry = IndexEntry::new("conflict.txt", blob);
    entry.set_stage(3);
    let mut index = Index::new();
    index.add_entry(entry);

    index.checkout(&repo, &workdir).unwrap();
    assert!(!workdir.join("conflict.txt").exists());
}

#[test]
fn write_tree_builds_nested_trees() {
    let (_dir, workdir, repo) = setup();
    let mut index = Index::new();
    for (rel, content) in [
        ("a.txt", &b"top\n"[..]),
        ("dir/b.txt", b"middle\n"),
        ("dir/sub/c.txt", b"deep\n"),
        ("dir2/d.txt", b"side\n"),
    ] {
        let file = write_file(&workdir, rel, content);
        index.add(&workdir, &file, &repo).unwrap();
    }

    let root = index.write_tree(&repo).unwrap();

    let mut tree = repo.map_tree(root);
    let c = tree.find_member("dir/sub/c.txt").unwrap().unwrap();
    assert_eq!(tree.id(c), Some(repo.write_blob(b"deep\n").unwrap()));
    let b = tree.find_member("dir/b.txt").unwrap().unwrap();
    assert_eq!(tree.id(b), Some(repo.write_blob(b"middle\n").unwrap()));
    assert!(tree.find_member("dir2/d.txt").unwrap().is_some());
    assert!(tree.find_member("missing").unwrap().is_none());
}

#[test]
fn write_tree_preserves_executable_bit() {
    let (_dir, workdir, repo) = setup();
    let blob = repo.write_blob(b"#!/bin/sh\n").unwrap();

    let mut entry = IndexEntry::new("run.sh", blob);
    entry.mode = 0o100755;
    let mut index = Index::new();
    index.add_entry(entry);

    let root = index.write_tree(&repo).unwrap();
    let mut tree = repo.map_tree(root);
    let member = tree.find_member("run.sh").unwrap().unwrap();
    assert!(tree.executable(member));
}

#[test]
fn write_tree_of_empty_index_is_empty_tree() {
    let (_dir, _workdir, repo) = setup();
    let root = Index::new().write_tree(&repo).unwrap();
    assert_eq!(root.to_hex(), "4b825dc642cb6eb9a060e54bf8d69288fbee4904");
}

#[test]
fn write_tree_refuses_unmerged() {
    let (_dir, _workdir, repo) = setup();
    let mut entry = IndexEntry::new("conflict", ObjectId::from_raw([1u8; 20]));
    entry.set_stage(1);
    let mut index = Index::new();
    index.add_entry(entry);

    assert!(matches!(
        index.write_tree(&repo),
        Err(IndexError::UnmergedPaths)
    ));
}
