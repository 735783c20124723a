use std::path::{Path, PathBuf};

/// Map `path` (somewhere under `from_root`) to the same relative position
/// under `to_root`, with its extension replaced by `extension`.
///
/// Returns `None` when `path` is not under `from_root`.
pub fn mirror_path(
    from_root: &Path,
    path: &Path,
    to_root: &Path,
    extension: &str,
) -> Option<PathBuf> {
    let rel = path.strip_prefix(from_root).ok()?;
    if rel.as_os_str().is_empty() {
        return None;
    }
    Some(to_root.join(rel).with_extension(extension))
}

/// Strip a single leading dot, so `.flac` and `flac` name the same extension.
pub fn normalize_extension(ext: &str) -> String {
    ext.strip_prefix('.').unwrap_or(ext).to_string()
}
