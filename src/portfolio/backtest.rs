//! # Backtesting
//!
//! $$
//! r^p_t=\sum_i w_i r_{t,i},\qquad V_t=\prod_{s\le t}(1+r^p_s),\qquad
//! \mathrm{MDD}=\min_t\Big(\frac{V_t}{\max_{s\le t}V_s}-1\Big)
//! $$
//!
//! Replays a fixed-weight allocation (rebalanced every period) and a benchmark
//! over a price table, compounding from an initial capital of 1.

use chrono::NaiveDate;
use ndarray::Array1;
use tracing::debug;

use super::data::max_drawdown;
use super::universe::AssetUniverse;
use super::universe::LookbackWindow;
use super::universe::PriceTable;
use crate::error::PortfolioError;
use crate::error::Result;

/// Fewest price rows accepted by [`backtest`].
pub const MIN_BACKTEST_ROWS: usize = 20;

/// Weights handed to the backtester.
#[derive(Clone, Debug, PartialEq)]
pub enum Allocation {
  /// Aligned to the price table's columns.
  Aligned(Array1<f64>),
  /// Keyed by ticker; every ticker of the table must appear.
  ByTicker(Vec<(String, f64)>),
}

impl Allocation {
  /// Equal weights over `n` assets.
  pub fn equal(n: usize) -> Self {
    Self::Aligned(Array1::from_elem(n, 1.0 / n as f64))
  }

  /// Resolve against `universe` and rescale to sum to 1.
  pub fn normalized(&self, universe: &AssetUniverse) -> Result<Array1<f64>> {
    let w = match self {
      Self::Aligned(w) => {
        if w.len() != universe.len() {
          return Err(PortfolioError::invalid(format!(
            "weights length {} does not match {} tickers",
            w.len(),
            universe.len()
          )));
        }
        w.clone()
      }
      Self::ByTicker(pairs) => universe.align_weights(pairs)?,
    };

    if w.iter().any(|x| !x.is_finite()) {
      return Err(PortfolioError::invalid("weights contain missing values"));
    }
    let total = w.sum();
    if total <= 0.0 {
      return Err(PortfolioError::invalid("weights must sum to a positive value"));
    }

    Ok(w / total)
  }
}

impl From<Array1<f64>> for Allocation {
  fn from(w: Array1<f64>) -> Self {
    Self::Aligned(w)
  }
}

impl From<Vec<(String, f64)>> for Allocation {
  fn from(pairs: Vec<(String, f64)>) -> Self {
    Self::ByTicker(pairs)
  }
}

/// Summary of one compounded value curve.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CurveMetrics {
  pub total_return: f64,
  /// Geometric: `(1 + total)^(T / periods) - 1`.
  pub annualized_return: f64,
  /// Sample std of the curve's period changes, scaled by `sqrt(T)`.
  pub volatility: f64,
  /// Non-positive; 0 for a curve that never falls.
  pub max_drawdown: f64,
}

impl CurveMetrics {
  /// Summary statistics of a cumulative value curve.
  pub fn from_curve(curve: &Array1<f64>, trading_days: usize) -> Self {
    let periods = curve.len();
    let Some(&last) = curve.last() else {
      return Self::default();
    };

    let t = trading_days as f64;
    let total_return = last - 1.0;
    let annualized_return = (1.0 + total_return).powf(t / periods as f64) - 1.0;

    let changes: Array1<f64> = curve
      .windows(2)
      .into_iter()
      .map(|w| w[1] / w[0] - 1.0)
      .collect();
    let volatility = if changes.len() >= 2 {
      changes.std(1.0) * t.sqrt()
    } else {
      0.0
    };

    Self {
      total_return,
      annualized_return,
      volatility,
      max_drawdown: max_drawdown(curve.view()),
    }
  }
}

/// Portfolio and benchmark paths with their summaries.
#[derive(Clone, Debug)]
pub struct BacktestResult {
  /// Normalized portfolio weights.
  pub weights: Array1<f64>,
  pub benchmark_weights: Array1<f64>,
  /// Date of each return row when the table carries dates.
  pub dates: Option<Vec<NaiveDate>>,
  pub returns: Array1<f64>,
  pub cumulative: Array1<f64>,
  pub benchmark_returns: Array1<f64>,
  pub benchmark_cumulative: Array1<f64>,
  pub metrics: CurveMetrics,
  pub benchmark_metrics: CurveMetrics,
}

impl BacktestResult {
  /// Total return over the benchmark's.
  pub fn excess_return(&self) -> f64 {
    self.metrics.total_return - self.benchmark_metrics.total_return
  }
}

fn compound(returns: &Array1<f64>) -> Array1<f64> {
  let mut value = 1.0;
  returns.mapv(|r| {
    value *= 1.0 + r;
    value
  })
}

/// Replay `weights` and `benchmark` (equal weight when `None`) over `table`.
pub fn backtest(
  weights: &Allocation,
  table: &PriceTable,
  benchmark: Option<&Allocation>,
  trading_days: usize,
) -> Result<BacktestResult> {
  if table.n_rows() < MIN_BACKTEST_ROWS {
    return Err(PortfolioError::InsufficientHistory {
      required: MIN_BACKTEST_ROWS,
      actual: table.n_rows(),
    });
  }

  let universe = table.universe();
  let w = weights.normalized(universe)?;
  let bw = match benchmark {
    Some(b) => b.normalized(universe)?,
    None => Array1::from_elem(universe.len(), 1.0 / universe.len() as f64),
  };

  let asset_returns = table.returns();
  let returns = asset_returns.dot(&w);
  let benchmark_returns = asset_returns.dot(&bw);
  let cumulative = compound(&returns);
  let benchmark_cumulative = compound(&benchmark_returns);

  let metrics = CurveMetrics::from_curve(&cumulative, trading_days);
  let benchmark_metrics = CurveMetrics::from_curve(&benchmark_cumulative, trading_days);

  debug!(
    periods = returns.len(),
    total_return = metrics.total_return,
    benchmark_total_return = benchmark_metrics.total_return,
    "backtest finished"
  );

  Ok(BacktestResult {
    weights: w,
    benchmark_weights: bw,
    dates: table.dates().map(|d| d[1..].to_vec()),
    returns,
    cumulative,
    benchmark_returns,
    benchmark_cumulative,
    metrics,
    benchmark_metrics,
  })
}

/// [`backtest`] over a trailing window of `table`.
pub fn backtest_window(
  weights: &Allocation,
  table: &PriceTable,
  benchmark: Option<&Allocation>,
  window: LookbackWindow,
  trading_days: usize,
) -> Result<BacktestResult> {
  backtest(weights, &table.window(window), benchmark, trading_days)
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use approx::assert_relative_eq;
  use chrono::Duration;
  use ndarray::array;

  use super::*;

  fn geometric(start: f64, r: f64, rows: usize) -> Vec<f64> {
    (0..rows).map(|i| start * (1.0 + r).powi(i as i32)).collect()
  }

  #[test]
  fn constant_return_compounds() {
    let r = 0.001;
    let rows = 30;
    let table = PriceTable::from_columns(vec![
      ("AAA", geometric(100.0, r, rows)),
      ("BBB", geometric(40.0, r, rows)),
    ])
    .unwrap();
    let res = backtest(&Allocation::equal(2), &table, None, 252).unwrap();

    assert_eq!(res.cumulative.len(), rows - 1);
    assert_relative_eq!(
      *res.cumulative.last().unwrap(),
      (1.0 + r).powi((rows - 1) as i32),
      max_relative = 1e-10
    );
    assert_abs_diff_eq!(res.metrics.max_drawdown, 0.0, epsilon = 1e-12);
    assert_abs_diff_eq!(res.metrics.volatility, 0.0, epsilon = 1e-9);
    assert_relative_eq!(
      res.metrics.annualized_return,
      (1.0 + r).powf(252.0) - 1.0,
      max_relative = 1e-9
    );
  }

  #[test]
  fn short_history_is_rejected() {
    let table = PriceTable::from_columns(vec![("AAA", geometric(100.0, 0.01, 19))]).unwrap();
    let err = backtest(&Allocation::equal(1), &table, None, 252).unwrap_err();

    assert_eq!(
      err,
      PortfolioError::InsufficientHistory {
        required: 20,
        actual: 19
      }
    );
  }

  #[test]
  fn weights_are_normalized_and_validated() {
    let table = PriceTable::from_columns(vec![
      ("AAA", geometric(100.0, 0.01, 25)),
      ("BBB", geometric(100.0, -0.01, 25)),
    ])
    .unwrap();

    let res = backtest(&Allocation::Aligned(array![2.0, 2.0]), &table, None, 252).unwrap();
    assert_eq!(res.weights, array![0.5, 0.5]);

    assert!(backtest(&Allocation::Aligned(array![1.0]), &table, None, 252).is_err());
    assert!(backtest(&Allocation::Aligned(array![1.0, -1.0]), &table, None, 252).is_err());
    assert!(backtest(&Allocation::Aligned(array![f64::NAN, 1.0]), &table, None, 252).is_err());

    let partial = Allocation::ByTicker(vec![("AAA".to_string(), 1.0)]);
    assert!(matches!(
      backtest(&partial, &table, None, 252),
      Err(PortfolioError::InputValidation(_))
    ));
  }

  #[test]
  fn ticker_keyed_weights_match_aligned() {
    let table = PriceTable::from_columns(vec![
      ("AAA", geometric(100.0, 0.01, 25)),
      ("BBB", geometric(100.0, -0.005, 25)),
    ])
    .unwrap();
    let keyed = Allocation::ByTicker(vec![("BBB".to_string(), 0.25), ("AAA".to_string(), 0.75)]);
    let aligned = Allocation::Aligned(array![0.75, 0.25]);

    let a = backtest(&keyed, &table, None, 252).unwrap();
    let b = backtest(&aligned, &table, None, 252).unwrap();
    assert_eq!(a.cumulative, b.cumulative);
  }

  #[test]
  fn drawdown_and_benchmark() {
    let mut up = geometric(100.0, 0.01, 12);
    up.extend(geometric(up[11] * 0.98, -0.02, 10));
    let flat = vec![50.0; 22];
    let table = PriceTable::from_columns(vec![("RISKY", up), ("CASH", flat)]).unwrap();

    let res = backtest(
      &Allocation::Aligned(array![1.0, 0.0]),
      &table,
      Some(&Allocation::Aligned(array![0.0, 1.0])),
      252,
    )
    .unwrap();

    assert!(res.metrics.max_drawdown < -0.15);
    assert_abs_diff_eq!(res.metrics.max_drawdown, 0.98_f64.powi(10) - 1.0, epsilon = 1e-9);
    assert_eq!(res.benchmark_metrics, CurveMetrics {
      total_return: 0.0,
      annualized_return: 0.0,
      volatility: 0.0,
      max_drawdown: 0.0
    });
    assert!(res.excess_return() < 0.0);
  }

  #[test]
  fn dates_follow_return_rows() {
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let dates: Vec<NaiveDate> = (0..300).map(|d| start + Duration::days(d)).collect();
    let table = PriceTable::from_columns(vec![("AAA", geometric(10.0, 0.001, 300))])
      .unwrap()
      .with_dates(dates)
      .unwrap();

    let res = backtest_window(&Allocation::equal(1), &table, None, LookbackWindow::ThreeMonths, 252).unwrap();
    let res_dates = res.dates.unwrap();

    assert_eq!(res_dates.len(), res.cumulative.len());
    assert_eq!(*res_dates.last().unwrap(), start + Duration::days(299));
  }
}
