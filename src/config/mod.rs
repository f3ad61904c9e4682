// Configuration module entry point
// Layers defaults, an optional config file, FILESERVER_* environment
// variables and command-line overrides

mod types;

use std::net::SocketAddr;

pub use types::{Config, FilesConfig, LoggingConfig, Overrides, ServerConfig};

/// Default config file name (without extension)
pub const DEFAULT_CONFIG_PATH: &str = "config";

impl Config {
    /// Load configuration from the specified file path (extension optional)
    ///
    /// A missing file is not an error. Later sources win: defaults, file,
    /// environment (`FILESERVER_FILES__PATHSPEC`, `FILESERVER_SERVER__PORT`...),
    /// then `overrides`.
    pub fn load_from(config_path: &str, overrides: &Overrides) -> Result<Self, config::ConfigError> {
        let workers = overrides
            .workers
            .map(|w| i64::try_from(w).unwrap_or(i64::MAX));

        let settings = config::Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("files.pathspec", "")?
            .set_default("files.zip", false)?
            .set_default("files.debug", false)?
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(
                config::Environment::with_prefix("FILESERVER")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .set_override_option("server.host", overrides.host.clone())?
            .set_override_option("server.port", overrides.port.map(i64::from))?
            .set_override_option("server.workers", workers)?
            .set_override_option("files.pathspec", overrides.pathspec.clone())?
            .set_override_option("files.zip", overrides.zip)?
            .set_override_option("files.debug", overrides.debug)?
            .build()?;

        let cfg: Self = settings.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load `config.toml` from the working directory, if present
    pub fn load(overrides: &Overrides) -> Result<Self, config::ConfigError> {
        Self::load_from(DEFAULT_CONFIG_PATH, overrides)
    }

    fn validate(&self) -> Result<(), config::ConfigError> {
        if self.files.pathspec.is_empty() {
            return Err(config::ConfigError::Message(
                "nothing to serve: set files.pathspec or pass paths on the command line"
                    .to_string(),
            ));
        }
        if self.server.workers == Some(0) {
            return Err(config::ConfigError::Message(
                "server.workers must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| format!("Invalid address: {e}"))
    }
}
