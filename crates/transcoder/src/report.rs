use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::TranscodeError;

/// Write the failure report: one input path per line, in the given order.
///
/// The file is always rewritten, so a clean run leaves an empty report
/// rather than a previous run's failures.
pub fn write_report(path: &Path, failed: &[PathBuf]) -> Result<(), TranscodeError> {
    let wrap = |source| TranscodeError::WriteReport {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(wrap)?;
        }
    }

    let mut file = std::io::BufWriter::new(std::fs::File::create(path).map_err(wrap)?);
    for input in failed {
        writeln!(file, "{}", input.display()).map_err(wrap)?;
    }
    file.flush().map_err(wrap)?;

    info!(path = %path.display(), failures = failed.len(), "failure report written");
    Ok(())
}
