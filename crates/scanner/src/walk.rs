use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use crate::ScanError;

/// Recursively collect regular files under `root` whose name ends in
/// `.<extension>` (case-sensitive, no leading dot in `extension`).
///
/// A file named exactly `.flac` counts as a `flac` file. Entries that cannot
/// be read are logged and skipped. Results are sorted by path.
pub fn find_by_extension(root: &Path, extension: &str) -> Result<Vec<PathBuf>, ScanError> {
    let suffix = format!(".{extension}");
    let mut found: Vec<PathBuf> = walk_files(root)?
        .filter(|entry| {
            entry
                .file_name()
                .as_encoded_bytes()
                .ends_with(suffix.as_bytes())
        })
        .map(DirEntry::into_path)
        .collect();
    found.sort();

    debug!(root = %root.display(), extension, count = found.len(), "discovery finished");
    Ok(found)
}

/// Iterate over every regular file under `root`, skipping unreadable entries.
pub fn walk_files(root: &Path) -> Result<impl Iterator<Item = DirEntry>, ScanError> {
    if !root.is_dir() {
        return Err(ScanError::RootNotFound(root.to_path_buf()));
    }

    let iter = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(e) => Some(e),
            Err(e) => {
                warn!(path = ?e.path(), error = %e, "cannot read directory entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file());

    Ok(iter)
}
