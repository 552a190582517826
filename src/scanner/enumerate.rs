//! File discovery for scan runs.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// One item produced while walking a directory tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Enumerated {
    /// A regular file to hash
    File(PathBuf),
    /// A path that could not be traversed
    Warning { path: PathBuf, message: String },
}

/// Lazily walk `root` depth-first, yielding every regular file.
///
/// Symbolic links are not followed. An unreadable subdirectory yields a
/// warning and its siblings are still visited.
pub fn walk(root: &Path) -> impl Iterator<Item = Enumerated> {
    WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) if entry.file_type().is_file() => {
                Some(Enumerated::File(entry.into_path()))
            }
            Ok(_) => None,
            Err(e) => {
                let path = e
                    .path()
                    .map(Path::to_path_buf)
                    .unwrap_or_default();
                let message = e
                    .io_error()
                    .map(|io| io.to_string())
                    .unwrap_or_else(|| e.to_string());
                log::warn!("Skipping {:?}: {}", path, message);
                Some(Enumerated::Warning { path, message })
            }
        })
}

/// Keep the entries of an explicit list that are currently regular files.
///
/// Each path is kept once, at its first position in the list.
pub fn filter_existing<I, P>(paths: I) -> Vec<PathBuf>
where
    I: IntoIterator<Item = P>,
    P: Into<PathBuf>,
{
    let mut seen = HashSet::new();
    paths
        .into_iter()
        .map(Into::into)
        .filter(|path: &PathBuf| {
            if !path.is_file() {
                log::debug!("Dropping non-file entry {:?}", path);
                return false;
            }
            if !seen.insert(path.clone()) {
                log::debug!("Dropping duplicate entry {:?}", path);
                return false;
            }
            true
        })
        .collect()
}

/// Make a path absolute against the current directory without resolving links.
pub fn absolutize(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    match std::env::current_dir() {
        Ok(cwd) => cwd.join(path),
        Err(_) => path.to_path_buf(),
    }
}
