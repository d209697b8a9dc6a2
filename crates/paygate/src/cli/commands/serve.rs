//! The `paygate serve` command: assemble the gateway and run the paywall
//! server until interrupted.

use std::sync::Arc;

use paygate_core::config::Config;
use paygate_core::config_loader::ConfigLoader;
use paygate_core::error::ConfigError;
use tracing::info;

use crate::gate::{GateError, PaymentGate};
use crate::server::{self, HttpSettler, PaywallState, ServerError};

/// Errors from the serve command.
#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    /// The configuration is missing or invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The gateway could not be assembled.
    #[error(transparent)]
    Gate(#[from] GateError),

    /// The server failed to bind or run.
    #[error(transparent)]
    Server(#[from] ServerError),
}

/// The `paygate serve` command handler.
#[derive(Debug)]
pub struct ServeCommand {
    loader: ConfigLoader,
    listen: Option<String>,
}

impl ServeCommand {
    /// Creates the command; `listen` overrides the configured address.
    #[must_use]
    pub const fn new(loader: ConfigLoader, listen: Option<String>) -> Self {
        Self { loader, listen }
    }

    /// Loads the configuration, assembles the gateway, and serves until
    /// SIGINT or SIGTERM.
    ///
    /// # Errors
    ///
    /// Returns [`ServeError`] if the configuration cannot be loaded or
    /// validated, a backing store cannot be opened, or the listen address
    /// cannot be bound.
    pub async fn run(&self) -> Result<(), ServeError> {
        let config = self.loader.load_required()?;
        let gate = PaymentGate::from_config(&config)?;
        let state = build_state(&config, &gate);

        let listen = self
            .listen
            .clone()
            .unwrap_or_else(|| config.server.listen_addr.clone());

        info!(
            groups = config.policy_groups.len(),
            price = %state.price,
            "starting paywall gateway"
        );
        server::run(&listen, state).await?;
        Ok(())
    }
}

/// Wires the paywall state from a validated configuration and gate.
fn build_state(config: &Config, gate: &PaymentGate) -> PaywallState {
    PaywallState {
        price: config.server.price(),
        resource_path: config.server.resource_path.clone(),
        evaluator: gate.evaluator(),
        settler: Arc::new(HttpSettler::new(config.settlement.clone())),
        audit: gate.audit(),
    }
}
