//! # Mean-Variance Optimizers
//!
//! $$
//! \max_{\mathbf w\in\mathcal W}\frac{\mathbf w^\top\mu-r_f}{\sqrt{\mathbf w^\top\Sigma\mathbf w}},\qquad
//! \min_{\mathbf w\in\mathcal W}\mathbf w^\top\Sigma\mathbf w\ \ \text{s.t.}\ \mathbf w^\top\mu=t
//! $$
//!
//! Max-Sharpe, minimum-volatility and target-return legs on top of the
//! projected-gradient solver. Failure to converge is reported through
//! [`OptimizationResult::success`], never as an error.

use argmin::core::CostFunction;
use argmin::core::Gradient;
use ndarray::Array1;
use ndarray::Array2;
use tracing::debug;
use tracing::warn;

use super::metrics::check_shapes;
use super::metrics::evaluate;
use super::solver::FeasibleSet;
use super::solver::NegativeSharpe;
use super::solver::PortfolioVariance;
use super::solver::WeightBounds;
use super::solver::minimize;
use super::types::OptimizationResult;
use crate::error::Result;

/// Risk-free rate used when the caller does not supply one.
pub const DEFAULT_RISK_FREE: f64 = 0.04;

/// Iteration cap and stationarity tolerance for every optimizer call.
#[derive(Clone, Copy, Debug)]
pub struct OptimizerConfig {
  pub max_iters: u64,
  /// Projected-step size below which a point counts as stationary.
  pub tolerance: f64,
}

impl Default for OptimizerConfig {
  fn default() -> Self {
    Self {
      max_iters: 1000,
      tolerance: 1e-9,
    }
  }
}

/// Deterministic mean-variance optimizer.
#[derive(Clone, Debug, Default)]
pub struct MeanVarianceOptimizer {
  config: OptimizerConfig,
}

impl MeanVarianceOptimizer {
  /// Construct an optimizer with explicit configuration.
  pub fn new(config: OptimizerConfig) -> Self {
    Self { config }
  }

  /// Borrow optimizer configuration.
  pub fn config(&self) -> &OptimizerConfig {
    &self.config
  }

  /// Tangency portfolio: maximize the Sharpe ratio over the budget simplex.
  pub fn max_sharpe(
    &self,
    mu: &Array1<f64>,
    cov: &Array2<f64>,
    risk_free: f64,
    allow_short: bool,
  ) -> Result<OptimizationResult> {
    check_shapes(mu, cov)?;
    let problem = NegativeSharpe { mu, cov, risk_free };
    let set = FeasibleSet::new(WeightBounds::for_shorting(allow_short));
    Ok(self.run("max_sharpe", &problem, set, mu, cov, risk_free))
  }

  /// Global minimum-volatility portfolio.
  pub fn min_volatility(
    &self,
    mu: &Array1<f64>,
    cov: &Array2<f64>,
    risk_free: f64,
    allow_short: bool,
  ) -> Result<OptimizationResult> {
    check_shapes(mu, cov)?;
    let problem = PortfolioVariance { cov };
    let set = FeasibleSet::new(WeightBounds::for_shorting(allow_short));
    Ok(self.run("min_volatility", &problem, set, mu, cov, risk_free))
  }

  /// Minimum-volatility portfolio whose expected return equals `target_return`.
  ///
  /// An unreachable target yields `success = false` with equal weights.
  pub fn target_return(
    &self,
    mu: &Array1<f64>,
    cov: &Array2<f64>,
    target_return: f64,
    risk_free: f64,
    allow_short: bool,
  ) -> Result<OptimizationResult> {
    check_shapes(mu, cov)?;
    let problem = PortfolioVariance { cov };
    let set = FeasibleSet::with_target(WeightBounds::for_shorting(allow_short), mu, target_return);
    Ok(self.run("target_return", &problem, set, mu, cov, risk_free))
  }

  fn run<P>(
    &self,
    leg: &'static str,
    problem: &P,
    mut set: FeasibleSet<'_>,
    mu: &Array1<f64>,
    cov: &Array2<f64>,
    risk_free: f64,
  ) -> OptimizationResult
  where
    P: CostFunction<Param = Array1<f64>, Output = f64>
      + Gradient<Param = Array1<f64>, Gradient = Array1<f64>>,
  {
    let n = mu.len();
    let equal = Array1::from_elem(n, 1.0 / n as f64);

    if mu.iter().chain(cov.iter()).any(|v| !v.is_finite()) {
      warn!(leg, "non-finite statistics, falling back to equal weights");
      return failed(equal, mu, cov, risk_free, 0);
    }

    let Some(outcome) = minimize(problem, &mut set, &equal, self.config.max_iters, self.config.tolerance)
    else {
      debug!(leg, "constraints are infeasible");
      return failed(equal, mu, cov, risk_free, 0);
    };

    if !outcome.converged {
      warn!(
        leg,
        iterations = outcome.iterations,
        "optimizer did not converge"
      );
    }

    let metrics = evaluate(&outcome.weights, mu, cov, risk_free);
    debug!(
      leg,
      iterations = outcome.iterations,
      expected_return = metrics.expected_return,
      volatility = metrics.volatility,
      sharpe = metrics.sharpe,
      "optimization finished"
    );

    OptimizationResult {
      weights: outcome.weights,
      metrics,
      success: outcome.converged,
      iterations: outcome.iterations,
    }
  }
}

fn failed(
  weights: Array1<f64>,
  mu: &Array1<f64>,
  cov: &Array2<f64>,
  risk_free: f64,
  iterations: u64,
) -> OptimizationResult {
  let metrics = evaluate(&weights, mu, cov, risk_free);
  OptimizationResult {
    weights,
    metrics,
    success: false,
    iterations,
  }
}

/// Max-Sharpe weights with the default optimizer configuration.
pub fn optimize_max_sharpe(
  mu: &Array1<f64>,
  cov: &Array2<f64>,
  risk_free: f64,
  allow_short: bool,
) -> Result<OptimizationResult> {
  MeanVarianceOptimizer::default().max_sharpe(mu, cov, risk_free, allow_short)
}

/// Minimum-volatility weights; the reported Sharpe uses [`DEFAULT_RISK_FREE`].
pub fn optimize_min_volatility(
  mu: &Array1<f64>,
  cov: &Array2<f64>,
  allow_short: bool,
) -> Result<OptimizationResult> {
  MeanVarianceOptimizer::default().min_volatility(mu, cov, DEFAULT_RISK_FREE, allow_short)
}

/// Minimum-volatility weights at a fixed expected return.
pub fn optimize_target_return(
  mu: &Array1<f64>,
  cov: &Array2<f64>,
  target_return: f64,
  risk_free: f64,
  allow_short: bool,
) -> Result<OptimizationResult> {
  MeanVarianceOptimizer::default().target_return(mu, cov, target_return, risk_free, allow_short)
}
