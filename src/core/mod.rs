//! Core functionality: configuration and naming conventions.

pub mod config;
pub mod version;

pub use config::{ChatConfig, Config, ConfigError, ConfigResult, ReleaseConfig, RepoConfig, TrackerConfig};
