//! Screenshot snapshots and their drift between two capture runs.
//!
//! A snapshot maps every image under a capture directory, by forward-slash
//! relative path, to its size in bytes. Two snapshots are compared by path;
//! a size difference counts as a change.

use crate::error::Result;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use walkdir::WalkDir;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp", "gif"];

pub type Snapshot = BTreeMap<String, u64>;

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Record relative path -> size for every image file below `root`.
/// A missing directory is an empty snapshot.
pub fn collect(root: &Path) -> Result<Snapshot> {
    let mut snapshot = Snapshot::new();
    if !root.exists() {
        return Ok(snapshot);
    }
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry.map_err(std::io::Error::from)?;
        if !entry.file_type().is_file() || !is_image(entry.path()) {
            continue;
        }
        let Ok(rel) = entry.path().strip_prefix(root) else {
            continue;
        };
        let key = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        snapshot.insert(key, entry.metadata().map_err(std::io::Error::from)?.len());
    }
    Ok(snapshot)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangedFile {
    pub path: String,
    pub before: u64,
    pub after: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SnapshotDiff {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub changed: Vec<ChangedFile>,
}

impl SnapshotDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }
}

/// Compare two snapshots. Every list comes out sorted by path.
pub fn diff(previous: &Snapshot, current: &Snapshot) -> SnapshotDiff {
    let mut out = SnapshotDiff::default();
    for (path, &after) in current {
        match previous.get(path) {
            None => out.added.push(path.clone()),
            Some(&before) if before != after => out.changed.push(ChangedFile {
                path: path.clone(),
                before,
                after,
            }),
            Some(_) => {}
        }
    }
    out.removed = previous
        .keys()
        .filter(|p| !current.contains_key(*p))
        .cloned()
        .collect();
    out
}

/// Collect both directories and diff them.
pub fn diff_dirs(previous: &Path, current: &Path) -> Result<SnapshotDiff> {
    Ok(diff(&collect(previous)?, &collect(current)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, bytes: usize) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, vec![0u8; bytes]).unwrap();
    }

    #[test]
    fn collects_only_images_with_relative_keys() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "login/screenshot.png", 10);
        write(dir.path(), "home/hero.JPG", 20);
        write(dir.path(), "home/source.xml", 5);
        write(dir.path(), "summary.json", 5);

        let snap = collect(dir.path()).unwrap();
        assert_eq!(snap.len(), 2);
        assert_eq!(snap["login/screenshot.png"], 10);
        assert_eq!(snap["home/hero.JPG"], 20);
    }

    #[test]
    fn missing_directory_is_empty() {
        let dir = TempDir::new().unwrap();
        assert!(collect(&dir.path().join("nope")).unwrap().is_empty());
    }

    #[test]
    fn diff_reports_added_removed_changed() {
        let prev = TempDir::new().unwrap();
        let cur = TempDir::new().unwrap();
        write(prev.path(), "a.png", 1);
        write(prev.path(), "b.png", 2);
        write(prev.path(), "c.png", 3);
        write(cur.path(), "b.png", 2);
        write(cur.path(), "c.png", 30);
        write(cur.path(), "d/e.png", 4);

        let d = diff_dirs(prev.path(), cur.path()).unwrap();
        assert_eq!(d.added, vec!["d/e.png"]);
        assert_eq!(d.removed, vec!["a.png"]);
        assert_eq!(
            d.changed,
            vec![ChangedFile {
                path: "c.png".into(),
                before: 3,
                after: 30
            }]
        );
        assert!(!d.is_empty());
    }

    #[test]
    fn identical_snapshots_have_no_diff() {
        let mut snap = Snapshot::new();
        snap.insert("x.png".into(), 7);
        assert!(diff(&snap, &snap).is_empty());
    }
}
