//! The `paygate config` command: display, initialize, or locate the
//! configuration file.

use paygate_core::config_loader::ConfigLoader;
use paygate_core::error::ConfigError;

use crate::cli::args::ConfigAction;

/// Errors from the config command.
#[derive(Debug, thiserror::Error)]
pub enum ConfigCommandError {
    /// A configuration file already exists and `--force` was not given.
    #[error("Configuration already exists at {path}. Use --force to overwrite.")]
    AlreadyInitialized {
        /// Path of the existing configuration file.
        path: String,
    },

    /// Loading or writing the configuration failed.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The configuration could not be rendered as TOML.
    #[error("Failed to serialize configuration: {0}")]
    Serialize(String),
}

/// The `paygate config` command handler.
#[derive(Debug)]
pub struct ConfigCommand {
    loader: ConfigLoader,
    action: Option<ConfigAction>,
}

impl ConfigCommand {
    /// Creates the command over `loader`.
    #[must_use]
    pub const fn new(loader: ConfigLoader, action: Option<ConfigAction>) -> Self {
        Self { loader, action }
    }

    /// Runs the command, printing its output to stdout.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigCommandError`] if the configuration is missing (for
    /// display), already present (for `init` without `--force`), or cannot
    /// be read or written.
    pub fn run(&self) -> Result<(), ConfigCommandError> {
        match &self.action {
            None => self.show(),
            Some(ConfigAction::Init { force }) => self.init(*force),
            Some(ConfigAction::Path) => {
                println!("{}", self.loader.config_path().display());
                Ok(())
            }
        }
    }

    fn show(&self) -> Result<(), ConfigCommandError> {
        let config = self.loader.load_required()?;
        let rendered = toml::to_string_pretty(&config)
            .map_err(|e| ConfigCommandError::Serialize(e.to_string()))?;
        println!("{rendered}");
        Ok(())
    }

    fn init(&self, force: bool) -> Result<(), ConfigCommandError> {
        if self.loader.exists() && !force {
            return Err(ConfigCommandError::AlreadyInitialized {
                path: self.loader.config_path().display().to_string(),
            });
        }

        self.loader.write_default()?;

        println!(
            "Wrote default configuration to {}",
            self.loader.config_path().display()
        );
        println!();
        println!("Next steps:");
        println!("  1. Set settlement.pay_to and add [[policy_group]] entries");
        println!("  2. Review the configuration: paygate config");
        println!("  3. Start the server: paygate serve");
        Ok(())
    }
}
