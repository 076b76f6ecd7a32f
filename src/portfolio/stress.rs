//! # Crash Scenarios
//!
//! $$
//! \Delta_i = d\,\beta_i-\tfrac12\,\frac{\sigma_i}{\sqrt T},\qquad
//! V_i' = V_i\max(1+\Delta_i,\,0)
//! $$
//!
//! Beta-scaled market-drop stress test with a half-sigma daily shock on top.

use impl_new_derive::ImplNew;
use tracing::debug;

/// Market drops applied by default.
pub const DEFAULT_CRASH_SCENARIOS: [f64; 4] = [-0.10, -0.20, -0.30, -0.50];

const DEFAULT_BETA: f64 = 1.0;
const DEFAULT_SIGMA: f64 = 0.30;
const HIGH_BETA: f64 = 1.5;

/// A position as seen by the stress test.
#[derive(ImplNew, Clone, Debug, PartialEq)]
pub struct StressPosition {
  pub ticker: String,
  /// Market value in the base currency.
  pub value: f64,
  /// Market beta; 1.0 when unknown.
  pub beta: Option<f64>,
  /// Annualized volatility as a fraction; 0.30 when unknown.
  pub sigma: Option<f64>,
}

impl StressPosition {
  fn shock(&self, market_drop: f64, trading_days: usize) -> f64 {
    let beta = self.beta.unwrap_or(DEFAULT_BETA);
    let sigma = self.sigma.unwrap_or(DEFAULT_SIGMA);
    market_drop * beta - 0.5 * sigma / (trading_days as f64).sqrt()
  }
}

/// Portfolio outcome under one market drop.
#[derive(Clone, Debug, PartialEq)]
pub struct ScenarioOutcome {
  /// Fractional market move, e.g. `-0.2`.
  pub market_drop: f64,
  /// Fractional portfolio move.
  pub portfolio_drop: f64,
  pub loss_amount: f64,
  pub new_value: f64,
}

/// Value-weighted beta over positions with a known beta; 1.0 when none has one.
pub fn weighted_beta(positions: &[StressPosition]) -> f64 {
  let (num, den) = positions
    .iter()
    .filter_map(|p| p.beta.map(|b| (b * p.value, p.value)))
    .fold((0.0, 0.0), |(n, d), (bv, v)| (n + bv, d + v));

  if den > 0.0 {
    num / den
  } else {
    DEFAULT_BETA
  }
}

/// Positions whose beta exceeds 1.5, largest first.
pub fn high_beta_positions(positions: &[StressPosition]) -> Vec<&StressPosition> {
  let mut out: Vec<&StressPosition> = positions
    .iter()
    .filter(|p| p.beta.is_some_and(|b| b > HIGH_BETA))
    .collect();
  out.sort_by(|a, b| b.value.total_cmp(&a.value));
  out
}

/// Apply each market drop to every position.
pub fn crash_scenarios(
  positions: &[StressPosition],
  market_drops: &[f64],
  trading_days: usize,
) -> Vec<ScenarioOutcome> {
  let total: f64 = positions.iter().map(|p| p.value).sum();

  market_drops
    .iter()
    .map(|&drop| {
      let new_value: f64 = positions
        .iter()
        .map(|p| p.value * (1.0 + p.shock(drop, trading_days)).max(0.0))
        .sum();
      let loss_amount = new_value - total;
      let portfolio_drop = if total > 0.0 { loss_amount / total } else { 0.0 };

      debug!(market_drop = drop, portfolio_drop, "crash scenario evaluated");
      ScenarioOutcome {
        market_drop: drop,
        portfolio_drop,
        loss_amount,
        new_value,
      }
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;

  use super::*;

  fn book() -> Vec<StressPosition> {
    vec![
      StressPosition::new("AAA".to_string(), 600.0, Some(1.2), Some(0.25)),
      StressPosition::new("BBB".to_string(), 400.0, None, None),
    ]
  }

  #[test]
  fn beta_is_value_weighted() {
    let positions = vec![
      StressPosition::new("AAA".to_string(), 300.0, Some(2.0), None),
      StressPosition::new("BBB".to_string(), 100.0, Some(0.4), None),
      StressPosition::new("CCC".to_string(), 600.0, None, None),
    ];
    assert_abs_diff_eq!(weighted_beta(&positions), (600.0 + 40.0) / 400.0, epsilon = 1e-12);
    assert_eq!(weighted_beta(&[]), 1.0);
  }

  #[test]
  fn scenario_losses_scale_with_beta() {
    let out = crash_scenarios(&book(), &DEFAULT_CRASH_SCENARIOS, 252);
    let root_t = 252_f64.sqrt();

    assert_eq!(out.len(), 4);
    let a = 600.0 * (1.0 - 0.12 - 0.125 / root_t);
    let b = 400.0 * (1.0 - 0.10 - 0.15 / root_t);
    assert_abs_diff_eq!(out[0].new_value, a + b, epsilon = 1e-9);
    assert_abs_diff_eq!(out[0].loss_amount, a + b - 1000.0, epsilon = 1e-9);
    assert_abs_diff_eq!(out[0].portfolio_drop, (a + b - 1000.0) / 1000.0, epsilon = 1e-12);

    for pair in out.windows(2) {
      assert!(pair[1].new_value < pair[0].new_value);
    }
  }

  #[test]
  fn positions_cannot_lose_more_than_their_value() {
    let positions = vec![StressPosition::new("LEV".to_string(), 100.0, Some(3.0), None)];
    let out = crash_scenarios(&positions, &[-0.5], 252);

    assert_eq!(out[0].new_value, 0.0);
    assert_abs_diff_eq!(out[0].portfolio_drop, -1.0);
  }

  #[test]
  fn high_beta_positions_sorted_by_value() {
    let positions = vec![
      StressPosition::new("A".to_string(), 10.0, Some(1.6), None),
      StressPosition::new("B".to_string(), 50.0, Some(2.1), None),
      StressPosition::new("C".to_string(), 90.0, Some(1.1), None),
    ];
    let tickers: Vec<&str> = high_beta_positions(&positions)
      .iter()
      .map(|p| p.ticker.as_str())
      .collect();
    assert_eq!(tickers, vec!["B", "A"]);
  }
}
