//! # Portfolio Metrics
//!
//! $$
//! R_p=\mathbf w^\top\mu,\qquad \sigma_p=\sqrt{\mathbf w^\top\Sigma\mathbf w},\qquad S=\frac{R_p-r_f}{\sigma_p}
//! $$
//!
//! Expected return, volatility and Sharpe ratio of a weight vector.

use ndarray::Array1;
use ndarray::Array2;

use super::types::PortfolioMetrics;
use crate::error::PortfolioError;
use crate::error::Result;

/// Evaluate a weight vector against annualized statistics.
pub fn portfolio_metrics(
  weights: &Array1<f64>,
  mu: &Array1<f64>,
  cov: &Array2<f64>,
  risk_free: f64,
) -> Result<PortfolioMetrics> {
  check_shapes(mu, cov)?;
  if weights.len() != mu.len() {
    return Err(PortfolioError::invalid(format!(
      "weights length {} does not match {} assets",
      weights.len(),
      mu.len()
    )));
  }

  Ok(evaluate(weights, mu, cov, risk_free))
}

/// Unchecked evaluation for callers that already validated shapes.
pub(crate) fn evaluate(
  weights: &Array1<f64>,
  mu: &Array1<f64>,
  cov: &Array2<f64>,
  risk_free: f64,
) -> PortfolioMetrics {
  let expected_return = weights.dot(mu);
  let variance = weights.dot(&cov.dot(weights));
  let volatility = variance.max(0.0).sqrt();
  let sharpe = if volatility > 0.0 {
    (expected_return - risk_free) / volatility
  } else {
    0.0
  };

  PortfolioMetrics {
    expected_return,
    volatility,
    sharpe,
  }
}

/// `mu` must be non-empty and `Sigma` square with matching size.
pub(crate) fn check_shapes(mu: &Array1<f64>, cov: &Array2<f64>) -> Result<()> {
  let n = mu.len();
  if n == 0 {
    return Err(PortfolioError::invalid("expected returns are empty"));
  }
  if cov.dim() != (n, n) {
    return Err(PortfolioError::invalid(format!(
      "covariance shape {:?} does not match {n} assets",
      cov.dim()
    )));
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use ndarray::array;

  use super::*;

  #[test]
  fn two_asset_equal_weight() {
    let mu = array![0.10, 0.15];
    let cov = array![[0.04, 0.01], [0.01, 0.09]];
    let m = portfolio_metrics(&array![0.5, 0.5], &mu, &cov, 0.04).unwrap();

    assert_abs_diff_eq!(m.expected_return, 0.125, epsilon = 1e-12);
    assert_abs_diff_eq!(m.volatility, 0.0375_f64.sqrt(), epsilon = 1e-12);
    assert_abs_diff_eq!(m.volatility, 0.1936, epsilon = 1e-4);
    assert_abs_diff_eq!(m.sharpe, 0.085 / 0.0375_f64.sqrt(), epsilon = 1e-12);
    assert_abs_diff_eq!(m.sharpe, 0.439, epsilon = 1e-3);
  }

  #[test]
  fn zero_volatility_gives_zero_sharpe() {
    let m = portfolio_metrics(&array![1.0], &array![0.05], &array![[0.0]], 0.01).unwrap();

    assert_eq!(m.volatility, 0.0);
    assert_eq!(m.sharpe, 0.0);
  }

  #[test]
  fn negative_variance_round_off_is_clamped() {
    let m = evaluate(&array![1.0], &array![0.05], &array![[-1e-18]], 0.0);
    assert_eq!(m.volatility, 0.0);
    assert_eq!(m.sharpe, 0.0);
  }

  #[test]
  fn shape_mismatch_is_rejected() {
    let mu = array![0.1, 0.2];
    let cov = array![[0.04, 0.0], [0.0, 0.09]];

    assert!(portfolio_metrics(&array![1.0], &mu, &cov, 0.0).is_err());
    assert!(portfolio_metrics(&array![0.5, 0.5], &mu, &array![[0.04]], 0.0).is_err());
  }
}
