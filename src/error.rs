//! # Errors
//!
//! Failures surfaced to the caller. Optimizer non-convergence and the
//! degenerate numeric cases (zero volatility, all-zero scores) are not errors;
//! they are absorbed into well-formed output.

use thiserror::Error;

/// Error type shared by every fallible portfolio operation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PortfolioError {
  /// Shape or length mismatch, missing or non-finite weights, non-positive weight sum.
  #[error("invalid input: {0}")]
  InputValidation(String),

  /// Too few return rows to estimate statistics.
  #[error("insufficient price history for calculation: need at least {required} return rows, got {actual}")]
  InsufficientData { required: usize, actual: usize },

  /// Too few price rows to run a backtest.
  #[error("at least {required} price points are required for backtesting, got {actual}")]
  InsufficientHistory { required: usize, actual: usize },
}

impl PortfolioError {
  pub(crate) fn invalid(msg: impl Into<String>) -> Self {
    Self::InputValidation(msg.into())
  }
}

/// Result alias used across the crate.
pub type Result<T, E = PortfolioError> = std::result::Result<T, E>;
