// Configuration types module
// Defines all configuration-related data structures

use serde::Deserialize;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub files: FilesConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Listener and runtime configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
}

/// What to serve
#[derive(Debug, Deserialize, Clone)]
pub struct FilesConfig {
    /// Space-separated `path[:alias]` tokens, or the archive path in zip mode
    pub pathspec: String,
    /// Serve the contents of a zip archive instead of aliased paths
    pub zip: bool,
    /// Log every request path
    pub debug: bool,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone, Default)]
pub struct LoggingConfig {
    /// Info/request log file path (optional, stdout if not set)
    #[serde(default)]
    pub access_log_file: Option<String>,
    /// Error log file path (optional, stderr if not set)
    #[serde(default)]
    pub error_log_file: Option<String>,
}

/// Values supplied on the command line, applied over file and environment
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub workers: Option<usize>,
    pub pathspec: Option<String>,
    pub zip: Option<bool>,
    pub debug: Option<bool>,
}
