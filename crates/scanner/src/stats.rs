//! Library statistics: format tallies, per-directory sizes, and source files
//! that have no converted counterpart yet.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use flacport_core::StatsConfig;
use flacport_core::paths::mirror_path;
use serde::Serialize;
use tracing::{info, warn};

use crate::ScanError;
use crate::walk;

/// Aggregated statistics for one scanned directory tree.
#[derive(Debug, Default, Clone, Serialize)]
pub struct LibraryStats {
    pub root: PathBuf,
    /// Audio files per lower-case extension.
    pub audio_counts: BTreeMap<String, u64>,
    /// Non-audio files per lower-case extension; `""` for files without one.
    pub other_counts: BTreeMap<String, u64>,
    /// Bytes of the files directly inside each directory.
    pub directory_sizes: BTreeMap<PathBuf, u64>,
    pub format_files: BTreeMap<String, Vec<PathBuf>>,
    /// Source files whose converted counterpart does not exist.
    pub missing_converted: Vec<PathBuf>,
    pub source_extension: String,
}

/// Walk `root` and tally everything `stats` reports.
pub fn collect_stats(root: &Path, config: &StatsConfig) -> Result<LibraryStats, ScanError> {
    let mut stats = LibraryStats {
        root: root.to_path_buf(),
        source_extension: config.source_extension.clone(),
        ..Default::default()
    };

    for entry in walk::walk_files(root)? {
        let path = entry.path();
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        let size = match entry.metadata() {
            Ok(m) => m.len(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot stat file, skipping");
                continue;
            }
        };

        if config.is_audio(&ext) {
            *stats.audio_counts.entry(ext.clone()).or_default() += 1;
            stats
                .format_files
                .entry(ext.clone())
                .or_default()
                .push(path.to_path_buf());

            if ext == config.source_extension {
                let converted = mirror_path(
                    root,
                    path,
                    &config.converted_root,
                    &config.converted_extension,
                );
                if converted.is_some_and(|p| !p.exists()) {
                    stats.missing_converted.push(path.to_path_buf());
                }
            }
        } else {
            *stats.other_counts.entry(ext).or_default() += 1;
        }

        let dir = path.parent().unwrap_or(root).to_path_buf();
        *stats.directory_sizes.entry(dir).or_default() += size;
    }

    info!(
        root = %root.display(),
        audio_files = stats.audio_counts.values().sum::<u64>(),
        missing = stats.missing_converted.len(),
        "library statistics collected"
    );
    Ok(stats)
}

impl LibraryStats {
    /// The `n` largest directories, size descending, ties broken by path.
    pub fn top_directories(&self, n: usize) -> Vec<(&Path, u64)> {
        let mut dirs: Vec<(&Path, u64)> = self
            .directory_sizes
            .iter()
            .map(|(p, s)| (p.as_path(), *s))
            .collect();
        dirs.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        dirs.truncate(n);
        dirs
    }

    /// Write `missing_<ext>.txt` and one `<fmt>_files.txt` per audio format
    /// into `dir`, creating it if needed. Returns the files written.
    pub fn write_listings(&self, dir: &Path) -> Result<Vec<PathBuf>, ScanError> {
        std::fs::create_dir_all(dir).map_err(|source| ScanError::Write {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut written = Vec::with_capacity(self.format_files.len() + 1);

        let missing = dir.join(format!("missing_{}.txt", self.source_extension));
        write_path_list(&missing, &self.missing_converted)?;
        written.push(missing);

        for (fmt, files) in &self.format_files {
            let path = dir.join(format!("{fmt}_files.txt"));
            write_path_list(&path, files)?;
            written.push(path);
        }

        Ok(written)
    }
}

fn write_path_list(path: &Path, paths: &[PathBuf]) -> Result<(), ScanError> {
    let body = paths
        .iter()
        .map(|p| p.to_string_lossy())
        .collect::<Vec<_>>()
        .join("\n");
    std::fs::write(path, body).map_err(|source| ScanError::Write {
        path: path.to_path_buf(),
        source,
    })
}
