//! # Portfolio Data Utilities
//!
//! $$
//! \mu = T\,\bar r,\qquad \Sigma = T\,\frac{1}{n-1}\sum_t (r_t-\bar r)(r_t-\bar r)^\top
//! $$
//!
//! Annualized statistics, correlation and per-asset risk profiles derived from
//! a [`PriceTable`].

use ndarray::Array1;
use ndarray::Array2;
use ndarray::ArrayView1;
use ndarray::Axis;
use ndarray_stats::CorrelationExt;
use tracing::debug;

use super::universe::AssetUniverse;
use super::universe::PriceTable;
use crate::error::PortfolioError;
use crate::error::Result;

/// Trading days per year used for annualization.
pub const TRADING_DAYS: usize = 252;

const MIN_RETURN_ROWS: usize = 2;

/// Annualized expected returns and covariance aligned to a universe.
#[derive(Clone, Debug)]
pub struct MarketStatistics {
  pub universe: AssetUniverse,
  /// Annualized mean simple return per asset.
  pub mu: Array1<f64>,
  /// Annualized sample covariance (ddof = 1).
  pub covariance: Array2<f64>,
  /// Number of return rows the estimate is based on.
  pub observations: usize,
}

impl MarketStatistics {
  /// Number of assets in the universe.
  pub fn n_assets(&self) -> usize {
    self.mu.len()
  }

  /// Annualized per-asset volatility, `sqrt(diag(Sigma))`.
  pub fn volatilities(&self) -> Array1<f64> {
    self.covariance.diag().mapv(|v| v.max(0.0).sqrt())
  }

  /// Correlation matrix implied by the covariance.
  pub fn correlation(&self) -> Array2<f64> {
    correlation_matrix(&self.covariance)
  }
}

/// Turn a price table into annualized `mu` and `Sigma`.
///
/// Returns are simple (`p_t / p_{t-1} - 1`); means and covariances are scaled
/// linearly by `trading_days`. At least two return rows are required.
pub fn prepare_statistics(table: &PriceTable, trading_days: usize) -> Result<MarketStatistics> {
  let returns = table.returns();
  let observations = returns.nrows();

  if observations < MIN_RETURN_ROWS {
    return Err(PortfolioError::InsufficientData {
      required: MIN_RETURN_ROWS,
      actual: observations,
    });
  }
  if returns.ncols() == 0 {
    return Err(PortfolioError::invalid("price table has no assets"));
  }

  let t = trading_days as f64;
  let mu = returns
    .mean_axis(Axis(0))
    .ok_or(PortfolioError::InsufficientData {
      required: MIN_RETURN_ROWS,
      actual: 0,
    })?
    * t;

  // rows of the transposed view are variables, columns are observations
  let covariance = returns
    .t()
    .cov(1.0)
    .map_err(|_| PortfolioError::InsufficientData {
      required: MIN_RETURN_ROWS,
      actual: observations,
    })?
    * t;

  debug!(
    assets = table.n_assets(),
    observations, trading_days, "prepared market statistics"
  );

  Ok(MarketStatistics {
    universe: table.universe().clone(),
    mu,
    covariance,
    observations,
  })
}

/// Correlation matrix implied by a covariance matrix.
///
/// Zero-variance assets get zero off-diagonal correlation.
pub fn correlation_matrix(cov: &Array2<f64>) -> Array2<f64> {
  let sd = cov.diag().mapv(|v| v.max(0.0).sqrt());
  let n = sd.len();

  Array2::from_shape_fn((n, n), |(i, j)| {
    if i == j {
      return 1.0;
    }
    let denom = sd[i] * sd[j];
    if denom > 1e-15 {
      (cov[[i, j]] / denom).clamp(-1.0, 1.0)
    } else {
      0.0
    }
  })
}

/// Stand-alone risk and return figures for one asset.
#[derive(Clone, Debug, PartialEq)]
pub struct AssetRiskProfile {
  pub ticker: String,
  pub annualized_return: f64,
  pub annualized_volatility: f64,
  /// `None` when the asset has no volatility.
  pub sharpe: Option<f64>,
  pub max_drawdown: f64,
}

/// Per-asset annualized return, volatility, Sharpe and price drawdown.
pub fn asset_risk_profiles(
  table: &PriceTable,
  trading_days: usize,
  risk_free: f64,
) -> Result<Vec<AssetRiskProfile>> {
  let returns = table.returns();
  if returns.nrows() < MIN_RETURN_ROWS {
    return Err(PortfolioError::InsufficientData {
      required: MIN_RETURN_ROWS,
      actual: returns.nrows(),
    });
  }

  let t = trading_days as f64;
  let profiles = table
    .universe()
    .iter()
    .enumerate()
    .map(|(j, ticker)| {
      let col = returns.column(j);
      let annualized_return = col.mean().unwrap_or(0.0) * t;
      let annualized_volatility = col.std(1.0) * t.sqrt();
      let sharpe = (annualized_volatility > 0.0)
        .then(|| (annualized_return - risk_free) / annualized_volatility);

      AssetRiskProfile {
        ticker: ticker.to_string(),
        annualized_return,
        annualized_volatility,
        sharpe,
        max_drawdown: max_drawdown(table.prices().column(j)),
      }
    })
    .collect();

  Ok(profiles)
}

/// Deepest peak-to-trough decline, `min(v_t / max_{s<=t} v_s - 1)`.
pub(crate) fn max_drawdown(values: ArrayView1<f64>) -> f64 {
  let mut peak = f64::NEG_INFINITY;
  let mut worst = 0.0_f64;

  for &v in values.iter() {
    peak = peak.max(v);
    if peak > 0.0 {
      worst = worst.min(v / peak - 1.0);
    }
  }

  worst
}
