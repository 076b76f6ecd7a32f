//! # Allocation Suggestions
//!
//! $$
//! \mathcal S=\{\mathbf w_{\text{tangency}},\ \mathbf w_{\min\sigma},\ \mathbf w_{\text{current}},\ \tfrac1N\mathbf 1\}
//! $$
//!
//! Labeled portfolio variants and the comparison used to recommend a
//! rebalance toward one of them.

use std::collections::BTreeMap;
use std::fmt;

use ndarray::Array1;
use ndarray::Array2;
use tracing::debug;

use super::metrics::check_shapes;
use super::metrics::evaluate;
use super::optimizers::MeanVarianceOptimizer;
use super::types::PortfolioMetrics;
use super::universe::AssetUniverse;
use crate::error::PortfolioError;
use crate::error::Result;

/// Minimum absolute trade value listed by [`compare_suggestions`].
pub const DEFAULT_MIN_TRADE_VALUE: f64 = 10_000.0;

/// Which variant a [`Suggestion`] describes. Ordering follows presentation order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SuggestionKind {
  MaxSharpe,
  MinVolatility,
  Current,
  EqualWeight,
}

impl SuggestionKind {
  /// Human-readable name.
  pub fn label(&self) -> &'static str {
    match self {
      Self::MaxSharpe => "Maximum Sharpe Ratio Portfolio",
      Self::MinVolatility => "Minimum Volatility Portfolio",
      Self::Current => "Current Portfolio",
      Self::EqualWeight => "Equal Weight Portfolio",
    }
  }

  /// One-line description of the allocation.
  pub fn description(&self) -> &'static str {
    match self {
      Self::MaxSharpe => "Portfolio with the highest risk-adjusted return",
      Self::MinVolatility => "Portfolio with the lowest risk",
      Self::Current => "Your current portfolio allocation",
      Self::EqualWeight => "Simple equal allocation to all assets",
    }
  }
}

impl fmt::Display for SuggestionKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let key = match self {
      Self::MaxSharpe => "max_sharpe",
      Self::MinVolatility => "min_volatility",
      Self::Current => "current",
      Self::EqualWeight => "equal_weight",
    };
    f.write_str(key)
  }
}

/// A labeled allocation with its headline metrics.
#[derive(Clone, Debug)]
pub struct Suggestion {
  pub kind: SuggestionKind,
  pub label: String,
  pub description: String,
  /// `(ticker, weight)` in universe order.
  pub weights: Vec<(String, f64)>,
  pub expected_return_pct: f64,
  pub volatility_pct: f64,
  pub sharpe: f64,
}

impl Suggestion {
  fn new(kind: SuggestionKind, universe: &AssetUniverse, weights: &Array1<f64>, metrics: PortfolioMetrics) -> Result<Self> {
    Ok(Self {
      kind,
      label: kind.label().to_string(),
      description: kind.description().to_string(),
      weights: universe.label_weights(weights)?,
      expected_return_pct: metrics.expected_return * 100.0,
      volatility_pct: metrics.volatility * 100.0,
      sharpe: metrics.sharpe,
    })
  }

  /// Weight of `ticker`, zero when absent.
  pub fn weight_of(&self, ticker: &str) -> f64 {
    self
      .weights
      .iter()
      .find(|(t, _)| t == ticker)
      .map(|(_, w)| *w)
      .unwrap_or(0.0)
  }
}

impl MeanVarianceOptimizer {
  /// Max-Sharpe, min-volatility, optional current and equal-weight variants.
  ///
  /// Both optimized variants are long-only and every variant is evaluated at
  /// `risk_free`.
  pub fn suggestions(
    &self,
    universe: &AssetUniverse,
    mu: &Array1<f64>,
    cov: &Array2<f64>,
    current_weights: Option<&Array1<f64>>,
    risk_free: f64,
  ) -> Result<BTreeMap<SuggestionKind, Suggestion>> {
    check_shapes(mu, cov)?;
    let n = universe.len();
    if n != mu.len() {
      return Err(PortfolioError::invalid(format!(
        "universe has {n} tickers but statistics cover {} assets",
        mu.len()
      )));
    }

    let mut out = BTreeMap::new();

    let max_sharpe = self.max_sharpe(mu, cov, risk_free, false)?;
    out.insert(
      SuggestionKind::MaxSharpe,
      Suggestion::new(SuggestionKind::MaxSharpe, universe, &max_sharpe.weights, max_sharpe.metrics)?,
    );

    let min_vol = self.min_volatility(mu, cov, risk_free, false)?;
    out.insert(
      SuggestionKind::MinVolatility,
      Suggestion::new(SuggestionKind::MinVolatility, universe, &min_vol.weights, min_vol.metrics)?,
    );

    if let Some(current) = current_weights {
      if current.len() != n {
        return Err(PortfolioError::invalid(format!(
          "current weights length {} does not match {n} tickers",
          current.len()
        )));
      }
      let metrics = evaluate(current, mu, cov, risk_free);
      out.insert(
        SuggestionKind::Current,
        Suggestion::new(SuggestionKind::Current, universe, current, metrics)?,
      );
    }

    let equal = Array1::from_elem(n, 1.0 / n as f64);
    let metrics = evaluate(&equal, mu, cov, risk_free);
    out.insert(
      SuggestionKind::EqualWeight,
      Suggestion::new(SuggestionKind::EqualWeight, universe, &equal, metrics)?,
    );

    debug!(variants = out.len(), "composed portfolio suggestions");
    Ok(out)
  }
}

/// Labeled allocation variants with the default optimizer configuration.
pub fn compose_suggestions(
  universe: &AssetUniverse,
  mu: &Array1<f64>,
  cov: &Array2<f64>,
  current_weights: Option<&Array1<f64>>,
  risk_free: f64,
) -> Result<BTreeMap<SuggestionKind, Suggestion>> {
  MeanVarianceOptimizer::default().suggestions(universe, mu, cov, current_weights, risk_free)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TradeSide {
  Buy,
  Sell,
}

/// Trade needed to move one ticker from the current to the target weight.
#[derive(Clone, Debug, PartialEq)]
pub struct RebalanceTrade {
  pub ticker: String,
  pub current_weight: f64,
  pub target_weight: f64,
  /// `(target - current) * total_value`
  pub amount: f64,
  pub side: TradeSide,
}

/// Metric deltas and trades between two suggestions.
#[derive(Clone, Debug)]
pub struct RebalanceComparison {
  pub sharpe_change: f64,
  /// Percentage points.
  pub return_change_pct: f64,
  /// Percentage points.
  pub volatility_change_pct: f64,
  /// Trades whose absolute amount exceeds the minimum trade value.
  pub trades: Vec<RebalanceTrade>,
}

impl RebalanceComparison {
  /// No trade is large enough to be worth making.
  pub fn is_near_target(&self) -> bool {
    self.trades.is_empty()
  }
}

/// Compare `current` against `target` for a portfolio worth `total_value`.
///
/// Tickers are taken from the target in order, followed by any ticker only
/// the current allocation holds.
pub fn compare_suggestions(
  current: &Suggestion,
  target: &Suggestion,
  total_value: f64,
  min_trade_value: f64,
) -> RebalanceComparison {
  let mut tickers: Vec<&str> = target.weights.iter().map(|(t, _)| t.as_str()).collect();
  for (t, _) in &current.weights {
    if !tickers.contains(&t.as_str()) {
      tickers.push(t.as_str());
    }
  }

  let trades = tickers
    .into_iter()
    .filter_map(|ticker| {
      let current_weight = current.weight_of(ticker);
      let target_weight = target.weight_of(ticker);
      let amount = (target_weight - current_weight) * total_value;

      (amount.abs() > min_trade_value).then(|| RebalanceTrade {
        ticker: ticker.to_string(),
        current_weight,
        target_weight,
        amount,
        side: if amount > 0.0 {
          TradeSide::Buy
        } else {
          TradeSide::Sell
        },
      })
    })
    .collect();

  RebalanceComparison {
    sharpe_change: target.sharpe - current.sharpe,
    return_change_pct: target.expected_return_pct - current.expected_return_pct,
    volatility_change_pct: target.volatility_pct - current.volatility_pct,
    trades,
  }
}
