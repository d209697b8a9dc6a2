//! The `paygate check` command: dry-run a transfer against the loaded
//! policy without recording or settling anything.

use paygate_core::config_loader::ConfigLoader;
use paygate_core::error::{ConfigError, PolicyError};
use paygate_core::types::{Direction, MicroUsd, TransferRequest, Verdict};

use crate::cli::args::CheckArgs;
use crate::gate::{GateError, PaymentGate};

/// Errors from the check command.
#[derive(Debug, thiserror::Error)]
pub enum CheckError {
    /// The configuration is missing or invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The gateway could not be assembled.
    #[error(transparent)]
    Gate(#[from] GateError),

    /// The amount is not a representable non-negative USD value.
    #[error("Invalid amount: {value} (expected a non-negative USD value)")]
    InvalidAmount {
        /// The rejected amount.
        value: f64,
    },

    /// A spend-store read failed during evaluation.
    #[error("Policy evaluation failed: {0}")]
    Policy(#[from] PolicyError),
}

/// The `paygate check` command handler.
#[derive(Debug)]
pub struct CheckCommand {
    loader: ConfigLoader,
    args: CheckArgs,
}

impl CheckCommand {
    /// Creates the command over `loader`.
    #[must_use]
    pub const fn new(loader: ConfigLoader, args: CheckArgs) -> Self {
        Self { loader, args }
    }

    /// Evaluates the described transfer and prints the verdict.
    ///
    /// This is a pure dry run: nothing is written to the ledger or the
    /// audit log. The returned verdict lets the caller pick an exit code.
    ///
    /// # Errors
    ///
    /// Returns [`CheckError`] if the configuration cannot be loaded, the
    /// amount is invalid, or the spend store cannot be read.
    pub fn run(&self) -> Result<Verdict, CheckError> {
        let config = self.loader.load_required()?;
        let gate = PaymentGate::from_config(&config)?;

        let request = self.build_request()?;
        let verdict = gate.evaluator().evaluate(&request)?;

        match &verdict {
            Verdict::Allowed => println!("allowed"),
            Verdict::Denied { group, reason } => {
                println!("denied by group '{group}': {reason}");
            }
        }
        Ok(verdict)
    }

    fn build_request(&self) -> Result<TransferRequest, CheckError> {
        let amount = MicroUsd::from_usd(self.args.amount).ok_or(CheckError::InvalidAmount {
            value: self.args.amount,
        })?;

        let mut request = match Direction::from(self.args.direction) {
            Direction::Incoming => TransferRequest::incoming(amount),
            Direction::Outgoing => TransferRequest::outgoing(amount),
        };
        if let Some(to) = &self.args.to {
            request = request.with_counterparty(to.clone());
        }
        if let Some(domain) = &self.args.domain {
            request = request.with_domain(domain.clone());
        }
        if let Some(url) = &self.args.url {
            request = request.with_request_url(url.clone());
        }
        Ok(request)
    }
}
