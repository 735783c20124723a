pub mod config;
pub mod error;
pub mod paths;
pub mod types;

pub use config::{AppConfig, ConvertConfig, StatsConfig};
pub use error::ConfigError;
pub use types::JobState;
