//! Media root containment.
//!
//! Every user-supplied path is relative to the media root. Resolution is
//! lexical first (rejecting absolute paths and `..` that climbs above the
//! root), then checked again against the canonical target so that a
//! symlink inside the root cannot lead out of it.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use crate::BrowseError;

/// The base directory all browsing and playback is confined to.
#[derive(Debug, Clone)]
pub struct MediaRoot {
    root: PathBuf,
}

impl MediaRoot {
    /// Open a media root. Fails if the directory is missing.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, BrowseError> {
        let dir = dir.as_ref();
        let root = dir.canonicalize().map_err(|e| match e.kind() {
            ErrorKind::NotFound => BrowseError::NotFound(dir.display().to_string()),
            _ => BrowseError::Io(e),
        })?;

        if !root.is_dir() {
            return Err(BrowseError::NotFound(dir.display().to_string()));
        }

        Ok(Self { root })
    }

    /// Canonical absolute path of the root.
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Resolve a relative path to an existing absolute path under the root.
    pub fn resolve(&self, rel_path: &str) -> Result<PathBuf, BrowseError> {
        let rel = normalize(rel_path)?;
        let candidate = if rel.as_os_str().is_empty() {
            self.root.clone()
        } else {
            self.root.join(rel)
        };

        let real = candidate.canonicalize().map_err(|e| match e.kind() {
            ErrorKind::NotFound => BrowseError::NotFound(rel_path.to_string()),
            _ => BrowseError::Io(e),
        })?;

        if !real.starts_with(&self.root) {
            return Err(BrowseError::PathTraversal(rel_path.to_string()));
        }

        Ok(candidate)
    }

    /// Resolve a path that must be a regular file.
    pub fn resolve_file(&self, rel_path: &str) -> Result<PathBuf, BrowseError> {
        let path = self.resolve(rel_path)?;
        if !path.is_file() {
            return Err(BrowseError::NotFound(rel_path.to_string()));
        }
        Ok(path)
    }

    /// Render an absolute path under the root back to its `/`-separated
    /// relative form. Returns `None` for paths outside the root.
    pub fn relative_of(&self, abs_path: &Path) -> Option<String> {
        let rel = abs_path.strip_prefix(&self.root).ok()?;
        Some(join_components(rel))
    }
}

/// Lexically normalize a user-supplied relative path.
pub fn normalize(rel_path: &str) -> Result<PathBuf, BrowseError> {
    let mut out = PathBuf::new();
    for component in Path::new(rel_path).components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    return Err(BrowseError::PathTraversal(rel_path.to_string()));
                }
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(BrowseError::PathTraversal(rel_path.to_string()));
            }
        }
    }
    Ok(out)
}

/// Normalized `/`-separated form of a relative path (`""` for the root).
pub fn normalize_display(rel_path: &str) -> Result<String, BrowseError> {
    Ok(join_components(&normalize(rel_path)?))
}

/// Parent of a normalized relative path, `None` at the root.
pub fn parent_of(rel_path: &str) -> Option<String> {
    if rel_path.is_empty() {
        return None;
    }
    Some(match rel_path.rsplit_once('/') {
        Some((parent, _)) => parent.to_string(),
        None => String::new(),
    })
}

fn join_components(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn fixture() -> (tempfile::TempDir, MediaRoot) {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("show")).unwrap();
        fs::write(tmp.path().join("show/ep1.mkv"), "fake video").unwrap();
        let root = MediaRoot::open(tmp.path()).unwrap();
        (tmp, root)
    }

    #[test]
    fn open_missing_root_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let err = MediaRoot::open(tmp.path().join("nope")).unwrap_err();
        assert!(matches!(err, BrowseError::NotFound(_)));
    }

    #[test]
    fn open_file_as_root_fails() {
        let (_tmp, root) = fixture();
        let err = MediaRoot::open(root.path().join("show/ep1.mkv")).unwrap_err();
        assert!(matches!(err, BrowseError::NotFound(_)));
    }

    #[test]
    fn resolves_inside_root() {
        let (_tmp, root) = fixture();
        assert_eq!(root.resolve("").unwrap(), root.path());
        assert_eq!(
            root.resolve("show/ep1.mkv").unwrap(),
            root.path().join("show/ep1.mkv")
        );
        assert_eq!(
            root.resolve("./show/../show/ep1.mkv").unwrap(),
            root.path().join("show/ep1.mkv")
        );
    }

    #[test]
    fn parent_segments_escaping_root_are_rejected() {
        let (_tmp, root) = fixture();
        for rel in ["..", "../etc/passwd", "show/../../x", "show/../.."] {
            let err = root.resolve(rel).unwrap_err();
            assert!(matches!(err, BrowseError::PathTraversal(_)), "{rel}: {err}");
        }
    }

    #[test]
    fn absolute_override_is_rejected() {
        let (_tmp, root) = fixture();
        let abs = root.path().join("show/ep1.mkv");
        let err = root.resolve(abs.to_str().unwrap()).unwrap_err();
        assert!(matches!(err, BrowseError::PathTraversal(_)));
    }

    #[test]
    fn missing_path_is_not_found() {
        let (_tmp, root) = fixture();
        let err = root.resolve("show/ep2.mkv").unwrap_err();
        assert!(matches!(err, BrowseError::NotFound(ref p) if p == "show/ep2.mkv"));
    }

    #[test]
    fn resolve_file_rejects_directories() {
        let (_tmp, root) = fixture();
        assert!(matches!(
            root.resolve_file("show").unwrap_err(),
            BrowseError::NotFound(_)
        ));
        assert!(root.resolve_file("show/ep1.mkv").is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn symlink_out_of_root_is_rejected() {
        let (_tmp, root) = fixture();
        let outside = tempfile::tempdir().unwrap();
        std::os::unix::fs::symlink(outside.path(), root.path().join("escape")).unwrap();
        let err = root.resolve("escape").unwrap_err();
        assert!(matches!(err, BrowseError::PathTraversal(_)));
    }

    #[test]
    fn relative_rendering() {
        let (_tmp, root) = fixture();
        let abs = root.path().join("show").join("ep1.mkv");
        assert_eq!(root.relative_of(&abs).as_deref(), Some("show/ep1.mkv"));
        assert_eq!(root.relative_of(root.path()).as_deref(), Some(""));
        assert_eq!(root.relative_of(Path::new("/definitely/elsewhere")), None);
    }

    #[test]
    fn display_and_parent() {
        assert_eq!(normalize_display("a/./b//c/..").unwrap(), "a/b");
        assert_eq!(normalize_display("").unwrap(), "");
        assert_eq!(parent_of(""), None);
        assert_eq!(parent_of("show").as_deref(), Some(""));
        assert_eq!(parent_of("show/season1").as_deref(), Some("show"));
    }
}
