use std::fs::{self, DirEntry};
use std::path::Path;

use reelcast_core::types::EntryKind;
use serde::Serialize;
use tracing::{debug, warn};

use crate::extensions::classify_file;
use crate::resolve::{self, MediaRoot};
use crate::BrowseError;

/// One element of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BrowseEntry {
    pub name: String,
    pub kind: EntryKind,
    /// Path relative to the media root, `/`-separated.
    pub path: String,
    pub size_bytes: Option<u64>,
}

/// A listed directory.
#[derive(Debug, Clone, Serialize)]
pub struct Listing {
    pub path: String,
    pub parent: Option<String>,
    pub entries: Vec<BrowseEntry>,
}

/// List a directory under the media root.
///
/// Directories come first, then files, each group ordered by name without
/// regard to case. Only metadata is read, so cloud placeholder files are
/// not downloaded; a slow provider makes this call slow, never fail.
pub fn list(root: &MediaRoot, rel_dir: &str) -> Result<Listing, BrowseError> {
    let rel_dir = resolve::normalize_display(rel_dir)?;
    let abs_dir = root.resolve(&rel_dir)?;

    if !abs_dir.is_dir() {
        return Err(BrowseError::NotFound(rel_dir));
    }

    let mut entries = Vec::new();
    for entry in fs::read_dir(&abs_dir)? {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!(dir = %abs_dir.display(), error = %e, "cannot read directory entry");
                continue;
            }
        };

        let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
            debug!(path = %entry.path().display(), "skipping non-UTF-8 name");
            continue;
        };

        if name.starts_with('.') {
            continue;
        }

        let Some((kind, size_bytes)) = classify_entry(root, &entry, &name) else {
            continue;
        };

        let path = if rel_dir.is_empty() {
            name.clone()
        } else {
            format!("{rel_dir}/{name}")
        };

        entries.push(BrowseEntry {
            name,
            kind,
            path,
            size_bytes,
        });
    }

    entries.sort_by(|a, b| {
        b.kind
            .is_dir()
            .cmp(&a.kind.is_dir())
            .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
            .then_with(|| a.name.cmp(&b.name))
    });

    debug!(dir = %rel_dir, count = entries.len(), "listed directory");

    Ok(Listing {
        parent: resolve::parent_of(&rel_dir),
        path: rel_dir,
        entries,
    })
}

/// Returns `None` for entries that must not be shown (symlinks leading out
/// of the root).
fn classify_entry(root: &MediaRoot, entry: &DirEntry, name: &str) -> Option<(EntryKind, Option<u64>)> {
    let file_type = match entry.file_type() {
        Ok(t) => t,
        Err(e) => {
            warn!(name, error = %e, "cannot read file type");
            return Some((classify_file(name), None));
        }
    };

    if file_type.is_symlink() {
        let target = entry.path().canonicalize().ok()?;
        if !target.starts_with(root.path()) {
            debug!(name, "skipping symlink outside media root");
            return None;
        }
        return Some(classify_path(&target, name));
    }

    if file_type.is_dir() {
        return Some((EntryKind::Directory, None));
    }

    let size = entry.metadata().ok().map(|m| m.len());
    Some((classify_file(name), size))
}

fn classify_path(path: &Path, name: &str) -> (EntryKind, Option<u64>) {
    match fs::metadata(path) {
        Ok(m) if m.is_dir() => (EntryKind::Directory, None),
        Ok(m) => (classify_file(name), Some(m.len())),
        Err(_) => (classify_file(name), None),
    }
}
