//! # Sharpe-Score Rebalancing
//!
//! $$
//! s_i=\begin{cases}\dfrac{S_i^{\,a}}{\sigma_i^{\,b}} & S_i>0,\ \sigma_i>0\\[4pt] 0 & \text{otherwise}\end{cases},
//! \qquad w_i=\frac{s_i}{\sum_j s_j}
//! $$
//!
//! A heuristic alternative to the optimizer: per-asset Sharpe scores become
//! target weights, and target weights become a share-level trade plan.
//! Input is generic via [`RiskScored`], so any per-asset metrics table can be used.

use impl_new_derive::ImplNew;
use tracing::debug;

use super::data::AssetRiskProfile;

/// Per-asset figures the scoring rule needs.
pub trait RiskScored {
  fn ticker(&self) -> &str;
  /// Annualized Sharpe ratio, `None` when unknown.
  fn sharpe(&self) -> Option<f64>;
  /// Annualized volatility, `None` when unknown.
  fn sigma(&self) -> Option<f64>;
}

impl RiskScored for AssetRiskProfile {
  fn ticker(&self) -> &str {
    &self.ticker
  }

  fn sharpe(&self) -> Option<f64> {
    self.sharpe
  }

  fn sigma(&self) -> Option<f64> {
    Some(self.annualized_volatility)
  }
}

/// Plain per-asset metrics row.
#[derive(ImplNew, Clone, Debug, PartialEq)]
pub struct AssetScoreInput {
  pub ticker: String,
  pub sharpe: Option<f64>,
  pub sigma: Option<f64>,
}

impl RiskScored for AssetScoreInput {
  fn ticker(&self) -> &str {
    &self.ticker
  }

  fn sharpe(&self) -> Option<f64> {
    self.sharpe
  }

  fn sigma(&self) -> Option<f64> {
    self.sigma
  }
}

/// Exponents of the scoring rule.
#[derive(Clone, Copy, Debug)]
pub struct SharpeScoreConfig {
  /// Exponent on the Sharpe ratio.
  pub a: f64,
  /// Exponent on volatility.
  pub b: f64,
}

impl Default for SharpeScoreConfig {
  fn default() -> Self {
    Self { a: 1.0, b: 1.0 }
  }
}

fn score<T: RiskScored>(asset: &T, config: &SharpeScoreConfig) -> f64 {
  let (Some(sharpe), Some(sigma)) = (asset.sharpe(), asset.sigma()) else {
    return 0.0;
  };
  if sharpe.is_nan() || sigma.is_nan() || sharpe <= 0.0 || sigma <= 0.0 {
    return 0.0;
  }

  let s = sharpe.powf(config.a) / sigma.powf(config.b);
  if s.is_finite() {
    s
  } else {
    0.0
  }
}

/// Score every asset, keeping input order.
pub fn sharpe_scores<T: RiskScored>(assets: &[T], config: &SharpeScoreConfig) -> Vec<(String, f64)> {
  assets
    .iter()
    .map(|a| (a.ticker().to_string(), score(a, config)))
    .collect()
}

/// Normalize scores into weights; an all-zero or overflowing score total gives equal weights.
pub fn sharpe_score_weights<T: RiskScored>(assets: &[T], config: &SharpeScoreConfig) -> Vec<(String, f64)> {
  let scores = sharpe_scores(assets, config);
  let total: f64 = scores.iter().map(|(_, s)| s).sum();

  if total == 0.0 || !total.is_finite() {
    if !scores.is_empty() {
      debug!(assets = scores.len(), total, "degenerate score total, using equal weights");
    }
    let n = scores.len() as f64;
    return scores.into_iter().map(|(t, _)| (t, 1.0 / n)).collect();
  }

  scores.into_iter().map(|(t, s)| (t, s / total)).collect()
}

/// Currency a holding is quoted in, relative to the portfolio's base currency.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Currency {
  /// Quoted in the base currency.
  Local,
  /// Quoted in the foreign currency; converted with the FX rate.
  Foreign,
}

/// Base currency code.
pub const LOCAL_CURRENCY: &str = "JPY";
/// Listing suffix of local-exchange tickers.
pub const LOCAL_TICKER_SUFFIX: &str = ".T";

impl Currency {
  /// Local when the code is the base currency or the ticker is locally listed.
  pub fn detect(ticker: &str, code: &str) -> Self {
    if code.eq_ignore_ascii_case(LOCAL_CURRENCY) || ticker.ends_with(LOCAL_TICKER_SUFFIX) {
      Self::Local
    } else {
      Self::Foreign
    }
  }
}

/// A current position.
#[derive(ImplNew, Clone, Debug, PartialEq)]
pub struct Holding {
  pub ticker: String,
  /// Market value in the base currency.
  pub current_value: f64,
  /// Last price in the quote currency.
  pub price: f64,
  pub currency: Currency,
}

/// Trade needed to bring one holding to its target weight.
#[derive(Clone, Debug, PartialEq)]
pub struct TradeLine {
  pub ticker: String,
  pub current_value: f64,
  pub target_weight: f64,
  pub target_value: f64,
  /// Positive to buy, negative to sell, in the base currency.
  pub diff_value: f64,
  pub price_local: f64,
  pub diff_shares: f64,
}

/// Trade plan toward `target_weights` for a portfolio worth `total_value`.
///
/// Foreign prices are multiplied by `fx_rate`. Holdings without a target get
/// weight 0; a non-positive converted price yields zero shares.
pub fn build_trade_plan(
  holdings: &[Holding],
  target_weights: &[(String, f64)],
  total_value: f64,
  fx_rate: f64,
) -> Vec<TradeLine> {
  holdings
    .iter()
    .map(|h| {
      let target_weight = target_weights
        .iter()
        .find(|(t, _)| *t == h.ticker)
        .map(|(_, w)| *w)
        .unwrap_or(0.0);
      let target_value = total_value * target_weight;
      let diff_value = target_value - h.current_value;

      let price_local = match h.currency {
        Currency::Local => h.price,
        Currency::Foreign => h.price * fx_rate,
      };
      let diff_shares = if price_local > 0.0 {
        diff_value / price_local
      } else {
        0.0
      };

      TradeLine {
        ticker: h.ticker.clone(),
        current_value: h.current_value,
        target_weight,
        target_value,
        diff_value,
        price_local,
        diff_shares,
      }
    })
    .collect()
}
