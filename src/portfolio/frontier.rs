//! # Efficient Frontier
//!
//! $$
//! \sigma^\*(t)=\min_{\mathbf w\in\mathcal W,\ \mathbf w^\top\mu=t}\sqrt{\mathbf w^\top\Sigma\mathbf w},
//! \qquad t\in[\mu_{\min},\mu_{\max}]
//! $$
//!
//! Sweeps evenly spaced target returns and keeps the successful
//! target-return solves. Targets are solved in parallel and returned in
//! ascending order.

use ndarray::Array1;
use ndarray::Array2;
use ndarray_stats::QuantileExt;
use rayon::prelude::*;
use tracing::debug;
use tracing::warn;

use super::optimizers::MeanVarianceOptimizer;
use super::types::FrontierPoint;

/// Default number of frontier targets.
pub const DEFAULT_FRONTIER_POINTS: usize = 50;

/// Target-return sweep range.
///
/// Long-only portfolios span `[min(mu), max(mu)]`; with shorting the range is
/// widened to `[0.5 min(mu), 1.5 max(mu)]`.
pub fn target_range(mu: &Array1<f64>, allow_short: bool) -> Option<(f64, f64)> {
  let lo = *mu.min().ok()?;
  let hi = *mu.max().ok()?;
  if !lo.is_finite() || !hi.is_finite() {
    return None;
  }

  Some(if allow_short {
    (0.5 * lo, 1.5 * hi)
  } else {
    (lo, hi)
  })
}

fn linspace(lo: f64, hi: f64, n: usize) -> Vec<f64> {
  match n {
    0 => Vec::new(),
    1 => vec![lo],
    _ => {
      let step = (hi - lo) / (n - 1) as f64;
      (0..n)
        .map(|i| if i == n - 1 { hi } else { lo + step * i as f64 })
        .collect()
    }
  }
}

impl MeanVarianceOptimizer {
  /// Trace up to `n_points` frontier points; unsuccessful targets are dropped.
  pub fn frontier(
    &self,
    mu: &Array1<f64>,
    cov: &Array2<f64>,
    n_points: usize,
    risk_free: f64,
    allow_short: bool,
  ) -> Vec<FrontierPoint> {
    let n = mu.len();
    if n == 0 || cov.dim() != (n, n) || cov.iter().any(|v| !v.is_finite()) {
      warn!(assets = n, "no feasible frontier points");
      return Vec::new();
    }
    let Some((lo, hi)) = target_range(mu, allow_short) else {
      warn!(assets = n, "no feasible frontier points");
      return Vec::new();
    };

    let targets = linspace(lo, hi, n_points);
    let mut points: Vec<FrontierPoint> = targets
      .into_par_iter()
      .map(|target| {
        let res = self
          .target_return(mu, cov, target, risk_free, allow_short)
          .ok()?;
        res.success.then(|| FrontierPoint {
          target_return: target,
          weights: res.weights,
          metrics: res.metrics,
        })
      })
      .collect::<Vec<Option<FrontierPoint>>>()
      .into_iter()
      .flatten()
      .collect();

    points.sort_by(|a, b| a.target_return.total_cmp(&b.target_return));

    if points.is_empty() {
      warn!(assets = n, n_points, "no feasible frontier points");
    } else {
      debug!(
        requested = n_points,
        traced = points.len(),
        "efficient frontier traced"
      );
    }

    points
  }
}

/// Efficient frontier with the default optimizer configuration.
pub fn trace_frontier(
  mu: &Array1<f64>,
  cov: &Array2<f64>,
  n_points: usize,
  risk_free: f64,
  allow_short: bool,
) -> Vec<FrontierPoint> {
  MeanVarianceOptimizer::default().frontier(mu, cov, n_points, risk_free, allow_short)
}
