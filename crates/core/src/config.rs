use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigError;
use crate::paths::normalize_extension;

/// Config file picked up from the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "flacport.toml";

/// Top-level configuration file layout.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub convert: ConvertConfig,
    pub stats: StatsConfig,
}

/// Settings for the batch converter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertConfig {
    /// Encoder binary, looked up in `PATH` unless it contains a separator.
    pub encoder: PathBuf,
    /// Codec identifier handed to the encoder.
    pub codec: String,
    pub source_extension: String,
    pub target_extension: String,
    /// Where the aggregated failure report is written.
    pub report_path: PathBuf,
    /// Concurrent encoder processes. `None` means one per CPU.
    pub workers: Option<usize>,
    /// Per-job deadline in seconds. `0` disables it.
    pub job_timeout_secs: u64,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            encoder: PathBuf::from("ffmpeg"),
            codec: "alac".into(),
            source_extension: "flac".into(),
            target_extension: "m4a".into(),
            report_path: PathBuf::from("conversion_errors.log"),
            workers: None,
            job_timeout_secs: 1800,
        }
    }
}

impl ConvertConfig {
    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(num_cpus::get).max(1)
    }

    pub fn job_timeout(&self) -> Option<Duration> {
        (self.job_timeout_secs > 0).then(|| Duration::from_secs(self.job_timeout_secs))
    }

    /// Normalize extensions and reject settings the converter cannot honor.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        self.source_extension =
            checked_extension("convert.source_extension", &self.source_extension)?;
        self.target_extension =
            checked_extension("convert.target_extension", &self.target_extension)?;

        if self.source_extension == self.target_extension {
            return Err(ConfigError::invalid(
                "convert.source_extension and convert.target_extension must differ",
            ));
        }
        if self.codec.trim().is_empty() {
            return Err(ConfigError::invalid("convert.codec cannot be empty"));
        }
        if self.encoder.as_os_str().is_empty() {
            return Err(ConfigError::invalid("convert.encoder cannot be empty"));
        }
        if self.workers == Some(0) {
            return Err(ConfigError::invalid("convert.workers must be at least 1"));
        }
        Ok(())
    }
}

/// Settings for the directory statistics scanner.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsConfig {
    /// Extensions tallied as audio formats (lower-case, no dot).
    pub audio_extensions: Vec<String>,
    pub source_extension: String,
    /// Root of the converted library checked for missing counterparts.
    pub converted_root: PathBuf,
    pub converted_extension: String,
    /// Directory receiving the per-format listing files.
    pub listing_dir: PathBuf,
    pub top_directories: usize,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            audio_extensions: ["mp3", "wav", "flac", "aac", "m4a", "ogg", "wma", "alac"]
                .into_iter()
                .map(String::from)
                .collect(),
            source_extension: "flac".into(),
            converted_root: PathBuf::from("files/apple_music"),
            converted_extension: "m4a".into(),
            listing_dir: PathBuf::from("ipod"),
            top_directories: 10,
        }
    }
}

impl StatsConfig {
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        self.source_extension =
            checked_extension("stats.source_extension", &self.source_extension)?.to_lowercase();
        self.converted_extension =
            checked_extension("stats.converted_extension", &self.converted_extension)?;

        let mut audio = Vec::with_capacity(self.audio_extensions.len());
        for ext in &self.audio_extensions {
            let ext = checked_extension("stats.audio_extensions", ext)?.to_lowercase();
            if !audio.contains(&ext) {
                audio.push(ext);
            }
        }
        self.audio_extensions = audio;
        Ok(())
    }

    pub fn is_audio(&self, lowercase_ext: &str) -> bool {
        self.audio_extensions.iter().any(|e| e == lowercase_ext)
    }
}

fn checked_extension(field: &str, raw: &str) -> Result<String, ConfigError> {
    let ext = normalize_extension(raw.trim());
    if ext.is_empty() {
        return Err(ConfigError::invalid(format!("{field} cannot be empty")));
    }
    if ext.contains(['/', '\\', '.']) {
        return Err(ConfigError::invalid(format!(
            "{field} must be a bare extension, got {raw:?}"
        )));
    }
    Ok(ext)
}

/// Load configuration from a TOML file.
///
/// Sections are validated by the subcommand that uses them, so a bad
/// `[stats]` table does not get in the way of `convert`.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Load from `custom_path`, else `./flacport.toml` if it exists, else defaults.
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let local = Path::new(DEFAULT_CONFIG_FILE);
    if local.is_file() {
        debug!(path = %local.display(), "using config from working directory");
        return load_config(local);
    }

    Ok(AppConfig::default())
}
