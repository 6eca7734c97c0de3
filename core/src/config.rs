use std::{fs, path::PathBuf};

use directories::ProjectDirs;
use serde::Deserialize;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid log level '{0}'")]
    LogLevel(String),
}

/// Runtime configuration resolved from CLI, environment, config file and defaults.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Whether intermediate render files are added to the cleanup list.
    pub include_intermediate_files: bool,
    /// Filter directive for the log subscriber.
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            include_intermediate_files: false,
            log_level: default_log_level(),
        }
    }
}

#[derive(Deserialize, Default)]
struct FileConfig {
    #[serde(default)]
    logging: FileLogging,
    #[serde(default)]
    collect_files_for_cleaning_up: FileCleanup,
}

#[derive(Deserialize)]
struct FileLogging {
    #[serde(default = "default_log_level")]
    level: String,
}

#[derive(Deserialize, Default)]
struct FileCleanup {
    #[serde(default)]
    include_intermediate_files: bool,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for FileLogging {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Default location of `publish.toml`, if the platform has a config directory.
pub fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("org", "publishcore", "publishcore")
        .map(|proj| proj.config_dir().join("publish.toml"))
}

impl Config {
    /// Resolve configuration from CLI, environment variables, config file and defaults.
    pub fn load(cli: &Cli) -> Result<Self, ConfigError> {
        let mut cfg = Config::default();

        // config file path precedence: CLI -> ENV -> default
        let config_path = cli
            .config
            .clone()
            .or_else(|| std::env::var("PUBLISH_CONFIG").ok().map(PathBuf::from))
            .or_else(default_config_path);

        if let Some(path) = config_path {
            if let Ok(contents) = fs::read_to_string(&path) {
                let file_cfg: FileConfig = toml::from_str(&contents)
                    .map_err(|source| ConfigError::Parse { path, source })?;
                cfg.log_level = file_cfg.logging.level;
                cfg.include_intermediate_files =
                    file_cfg.collect_files_for_cleaning_up.include_intermediate_files;
            }
        }

        // environment overrides
        if let Ok(v) = std::env::var("PUBLISH_INCLUDE_INTERMEDIATE_FILES") {
            if let Ok(v) = v.parse::<bool>() {
                cfg.include_intermediate_files = v;
            }
        }
        if let Ok(level) = std::env::var("PUBLISH_LOG") {
            cfg.log_level = level;
        }

        // CLI overrides
        if let Some(v) = cli.include_intermediate_files {
            cfg.include_intermediate_files = v;
        }
        if let Some(level) = &cli.log_level {
            cfg.log_level = level.clone();
        }

        cfg.env_filter()?;
        Ok(cfg)
    }

    /// Log filter built from the configured level.
    pub fn env_filter(&self) -> Result<EnvFilter, ConfigError> {
        EnvFilter::try_new(&self.log_level).map_err(|_| ConfigError::LogLevel(self.log_level.clone()))
    }
}
