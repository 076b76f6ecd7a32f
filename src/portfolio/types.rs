//! # Portfolio Types
//!
//! $$
//! \mathbf{w}^\*=\arg\max_{\mathbf{w}} \frac{\mathbb E[R_p]-r_f}{\sigma_p}
//! $$
//!
//! Shared result containers for optimization, frontier tracing and sampling.

use ndarray::Array1;

/// Return, risk and risk-adjusted return of one weight vector.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PortfolioMetrics {
  /// `w . mu` (annualized if the inputs are annualized).
  pub expected_return: f64,
  /// `sqrt(w' Sigma w)`, never negative.
  pub volatility: f64,
  /// `(expected_return - rf) / volatility`, exactly 0 when volatility is 0.
  pub sharpe: f64,
}

/// Output of a single optimizer call.
#[derive(Clone, Debug)]
pub struct OptimizationResult {
  pub weights: Array1<f64>,
  pub metrics: PortfolioMetrics,
  /// `false` when the iteration cap was hit or the constraints were infeasible.
  pub success: bool,
  pub iterations: u64,
}

/// One point on the efficient frontier.
#[derive(Clone, Debug)]
pub struct FrontierPoint {
  pub target_return: f64,
  pub weights: Array1<f64>,
  pub metrics: PortfolioMetrics,
}

/// A randomly drawn long-only portfolio.
#[derive(Clone, Debug)]
pub struct RandomPortfolio {
  pub weights: Array1<f64>,
  pub metrics: PortfolioMetrics,
}
