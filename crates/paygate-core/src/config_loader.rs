//! Configuration loader for the `PayGate` gateway.
//!
//! This module provides utilities for loading, saving, and managing
//! configuration files from the filesystem. It handles path expansion
//! (e.g., `~` to home directory) and provides sensible defaults when
//! configuration files don't exist.
//!
//! # Default Location
//!
//! Configuration is stored at `~/.paygate/config.toml` by default.
//!
//! # Examples
//!
//! ```no_run
//! use paygate_core::config_loader::ConfigLoader;
//!
//! let loader = ConfigLoader::new().expect("failed to create loader");
//! if loader.exists() {
//!     let config = loader.load().expect("failed to load config");
//!     println!("listening on {}", config.server.listen_addr);
//! } else {
//!     loader.write_default().expect("failed to write default config");
//! }
//! ```

use crate::config::Config;
use crate::error::ConfigError;
use std::fs;
use std::path::{Path, PathBuf};

/// The default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// The default base directory name within the home directory.
const BASE_DIR_NAME: &str = ".paygate";

/// Configuration loader that handles reading and writing configuration
/// files.
///
/// The `ConfigLoader` manages configuration file operations including:
/// - Loading configuration from TOML files
/// - Saving configuration to TOML files
/// - Creating default configuration files
/// - Path expansion for `~` (home directory)
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Base directory for `PayGate` files (default: ~/.paygate).
    base_dir: PathBuf,
}

impl ConfigLoader {
    /// Creates a new `ConfigLoader` with the default base directory
    /// (`~/.paygate`).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NoHomeDirectory`] if the home directory cannot
    /// be determined.
    pub fn new() -> Result<Self, ConfigError> {
        let base_dir = default_base_dir()?;
        Ok(Self { base_dir })
    }

    /// Creates a `ConfigLoader` with a custom base directory.
    #[must_use]
    pub const fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Returns the path to the configuration file.
    #[must_use]
    pub fn config_path(&self) -> PathBuf {
        self.base_dir.join(CONFIG_FILE_NAME)
    }

    /// Returns the base directory for `PayGate` files.
    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Loads configuration from the file.
    ///
    /// If the configuration file doesn't exist, returns the default
    /// configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ParseFailed`] if the file contains invalid
    /// TOML, or [`ConfigError::Io`] if the file cannot be read.
    pub fn load(&self) -> Result<Config, ConfigError> {
        let config_path = self.config_path();

        if !config_path.exists() {
            return Ok(Config::default());
        }

        Self::load_from_path(&config_path)
    }

    /// Loads configuration from the file, failing if the file doesn't exist.
    ///
    /// Unlike [`load`](Self::load), this method returns an error if the
    /// configuration file is not found.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::FileNotFound`] if the configuration file
    /// doesn't exist, [`ConfigError::ParseFailed`] on invalid TOML, or
    /// [`ConfigError::Io`] on a read failure.
    pub fn load_required(&self) -> Result<Config, ConfigError> {
        let config_path = self.config_path();

        if !config_path.exists() {
            return Err(ConfigError::file_not_found(
                config_path.display().to_string(),
            ));
        }

        Self::load_from_path(&config_path)
    }

    /// Saves configuration to the file.
    ///
    /// Creates the base directory if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if there's an I/O error writing the file,
    /// or [`ConfigError::ParseFailed`] if the configuration cannot be
    /// serialized.
    pub fn save(&self, config: &Config) -> Result<(), ConfigError> {
        self.ensure_base_dir()?;

        let config_path = self.config_path();

        let toml_str = toml::to_string_pretty(config).map_err(|e| {
            ConfigError::parse_failed(format!("failed to serialize configuration: {e}"))
        })?;

        fs::write(&config_path, toml_str).map_err(|e| {
            ConfigError::io(
                format!("failed to write configuration to {}", config_path.display()),
                e,
            )
        })?;

        Ok(())
    }

    /// Writes the default configuration file.
    ///
    /// Creates the base directory if it doesn't exist. Uses the formatted
    /// default TOML from [`Config::default_toml`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if there's an I/O error writing the file.
    pub fn write_default(&self) -> Result<(), ConfigError> {
        self.ensure_base_dir()?;

        let config_path = self.config_path();
        let default_toml = Config::default_toml();

        fs::write(&config_path, default_toml).map_err(|e| {
            ConfigError::io(
                format!(
                    "failed to write default configuration to {}",
                    config_path.display()
                ),
                e,
            )
        })?;

        Ok(())
    }

    /// Checks if the configuration file exists.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.config_path().exists()
    }

    /// Ensures the base directory exists, creating it if necessary.
    fn ensure_base_dir(&self) -> Result<(), ConfigError> {
        if !self.base_dir.exists() {
            fs::create_dir_all(&self.base_dir).map_err(|e| {
                ConfigError::io(
                    format!(
                        "failed to create base directory {}",
                        self.base_dir.display()
                    ),
                    e,
                )
            })?;
        }
        Ok(())
    }

    /// Loads configuration from a specific path.
    fn load_from_path(path: &Path) -> Result<Config, ConfigError> {
        let content = fs::read_to_string(path)
            .map_err(|e| ConfigError::io(format!("failed to read {}", path.display()), e))?;

        let config: Config = toml::from_str(&content).map_err(|e| {
            ConfigError::parse_failed(format!("invalid TOML in {}: {e}", path.display()))
        })?;

        Ok(config)
    }
}

/// Expands `~` in paths to the home directory.
///
/// If the path starts with `~`, it is replaced with the user's home
/// directory. Otherwise, the path is returned unchanged (converted to
/// `PathBuf`).
///
/// # Errors
///
/// Returns [`ConfigError::NoHomeDirectory`] if the path starts with `~` and
/// the home directory cannot be determined.
pub fn expand_path(path: &str) -> Result<PathBuf, ConfigError> {
    if let Some(rest) = path.strip_prefix("~/") {
        let home = dirs::home_dir().ok_or_else(ConfigError::no_home_directory)?;
        Ok(home.join(rest))
    } else if path == "~" {
        dirs::home_dir().ok_or_else(ConfigError::no_home_directory)
    } else {
        Ok(PathBuf::from(path))
    }
}

/// Returns the default base directory for `PayGate` files (`~/.paygate`).
///
/// # Errors
///
/// Returns [`ConfigError::NoHomeDirectory`] if the home directory cannot be
/// determined.
pub fn default_base_dir() -> Result<PathBuf, ConfigError> {
    let home = dirs::home_dir().ok_or_else(ConfigError::no_home_directory)?;
    Ok(home.join(BASE_DIR_NAME))
}

/// Loads configuration from the default location with defaults for missing
/// values.
///
/// # Errors
///
/// Returns [`ConfigError::NoHomeDirectory`] if the home directory cannot be
/// determined, [`ConfigError::ParseFailed`] on invalid TOML, or
/// [`ConfigError::Io`] on a read failure.
pub fn load_config() -> Result<Config, ConfigError> {
    let loader = ConfigLoader::new()?;
    loader.load()
}

/// Loads configuration from the default location and expands all paths.
///
/// Expands `~` in `ledger.db_path` and `audit.directory` to full paths.
///
/// # Errors
///
/// Returns [`ConfigError::NoHomeDirectory`] if the home directory cannot be
/// determined, [`ConfigError::ParseFailed`] on invalid TOML, or
/// [`ConfigError::Io`] on a read failure.
pub fn load_config_with_expanded_paths() -> Result<Config, ConfigError> {
    let mut config = load_config()?;

    let expanded_db = expand_path(&config.ledger.db_path)?;
    config.ledger.db_path = expanded_db.to_string_lossy().to_string();

    let expanded_audit = expand_path(&config.audit.directory)?;
    config.audit.directory = expanded_audit.to_string_lossy().to_string();

    Ok(config)
}
