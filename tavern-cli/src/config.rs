//! Layered configuration for the `tavern` binary.
//!
//! Sources are merged in precedence order (later sources override earlier ones):
//! 1. Built-in defaults
//! 2. `~/.config/tavern/config.toml`
//! 3. `./tavern.toml`
//! 4. Environment variables prefixed `TAVERN_`
//! 5. Command-line flags

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tavern_characters::DEFAULT_DB_FILENAME;
use thiserror::Error;
use tracing::debug;

/// Name of the project-local configuration file
pub const PROJECT_CONFIG_FILE: &str = "tavern.toml";

/// Default number of records per listing page
pub const DEFAULT_PAGE_SIZE: usize = 10;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    #[error("page_size must be greater than zero")]
    InvalidPageSize,
}

/// Settings the command handlers read
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TavernConfig {
    /// SQLite database file
    pub database: PathBuf,
    /// Records per page in listings
    pub page_size: usize,
    /// Acting user id, when not given with `--user`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<i64>,
}

impl Default for TavernConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from(DEFAULT_DB_FILENAME),
            page_size: DEFAULT_PAGE_SIZE,
            user: None,
        }
    }
}

/// Values given on the command line; `None` leaves lower layers in place
#[derive(Debug, Clone, Default, Serialize)]
pub struct CliOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<i64>,
}

impl TavernConfig {
    /// Load configuration relative to the current directory
    pub fn load(overrides: &CliOverrides) -> Result<Self, ConfigError> {
        Self::load_from(Path::new("."), user_config_path().as_deref(), overrides)
    }

    /// Load configuration with explicit file locations
    pub fn load_from(
        project_dir: &Path,
        user_config: Option<&Path>,
        overrides: &CliOverrides,
    ) -> Result<Self, ConfigError> {
        let config: Self = build_figment(project_dir, user_config, overrides)
            .extract()
            .map_err(Box::new)?;
        if config.page_size == 0 {
            return Err(ConfigError::InvalidPageSize);
        }
        debug!(
            "using database {} with page size {}",
            config.database.display(),
            config.page_size
        );
        Ok(config)
    }
}

fn build_figment(
    project_dir: &Path,
    user_config: Option<&Path>,
    overrides: &CliOverrides,
) -> Figment {
    let mut figment = Figment::from(Serialized::defaults(TavernConfig::default()));
    if let Some(path) = user_config {
        figment = figment.merge(Toml::file(path));
    }
    figment
        .merge(Toml::file(project_dir.join(PROJECT_CONFIG_FILE)))
        .merge(Env::prefixed("TAVERN_"))
        .merge(Serialized::defaults(overrides))
}

/// `~/.config/tavern/config.toml`
pub fn user_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".config").join("tavern").join("config.toml"))
}
