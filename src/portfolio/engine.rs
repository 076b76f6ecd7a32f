//! # Portfolio Engine
//!
//! $$
//! P \;\to\; (\mu,\Sigma) \;\to\; \{\mathbf w^\*_{\text{tangency}},\ \mathbf w^\*_{\min\sigma},\ \sigma^\*(t)\} \;\to\; V_t
//! $$
//!
//! High-level orchestration: statistics, frontier, random cloud, suggestions,
//! backtests and Sharpe-score rebalancing from a single configuration.

use std::collections::BTreeMap;

use anyhow::Context;
use anyhow::Result;
use ndarray::Array1;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;
use tracing::warn;

use super::backtest::Allocation;
use super::backtest::BacktestResult;
use super::backtest::backtest;
use super::data::MarketStatistics;
use super::data::TRADING_DAYS;
use super::data::asset_risk_profiles;
use super::data::prepare_statistics;
use super::frontier::DEFAULT_FRONTIER_POINTS;
use super::optimizers::DEFAULT_RISK_FREE;
use super::optimizers::MeanVarianceOptimizer;
use super::optimizers::OptimizerConfig;
use super::rebalance::Holding;
use super::rebalance::SharpeScoreConfig;
use super::rebalance::TradeLine;
use super::rebalance::build_trade_plan;
use super::rebalance::sharpe_score_weights;
use super::sampler::sample_random_portfolios_with_rng;
use super::suggestions::RebalanceComparison;
use super::suggestions::Suggestion;
use super::suggestions::SuggestionKind;
use super::suggestions::compare_suggestions;
use super::types::FrontierPoint;
use super::types::RandomPortfolio;
use super::universe::LookbackWindow;
use super::universe::PriceTable;

/// Runtime configuration for [`PortfolioEngine`].
#[derive(Clone, Debug)]
pub struct PortfolioEngineConfig {
  /// Periods per year used for annualization.
  pub trading_days: usize,
  /// Risk-free rate used in every Sharpe computation.
  pub risk_free: f64,
  /// Shorting for the frontier sweep. Suggestions are always long-only.
  pub allow_short: bool,
  pub frontier_points: usize,
  pub random_portfolios: usize,
  /// Seed for the random cloud; entropy when `None`.
  pub seed: Option<u64>,
  /// Trailing window the backtests run over.
  pub lookback: LookbackWindow,
  pub optimizer: OptimizerConfig,
  pub scoring: SharpeScoreConfig,
}

impl Default for PortfolioEngineConfig {
  fn default() -> Self {
    Self {
      trading_days: TRADING_DAYS,
      risk_free: DEFAULT_RISK_FREE,
      allow_short: false,
      frontier_points: DEFAULT_FRONTIER_POINTS,
      random_portfolios: 500,
      seed: None,
      lookback: LookbackWindow::All,
      optimizer: OptimizerConfig::default(),
      scoring: SharpeScoreConfig::default(),
    }
  }
}

/// Backtest of one suggestion.
#[derive(Clone, Debug)]
pub struct NamedBacktest {
  pub kind: SuggestionKind,
  pub result: BacktestResult,
}

/// Everything [`PortfolioEngine::analyze`] produces.
#[derive(Clone, Debug)]
pub struct OptimizationReport {
  pub statistics: MarketStatistics,
  pub frontier: Vec<FrontierPoint>,
  pub random_portfolios: Vec<RandomPortfolio>,
  pub suggestions: BTreeMap<SuggestionKind, Suggestion>,
  /// Suggestions whose backtest succeeded, in suggestion order.
  pub backtests: Vec<NamedBacktest>,
}

impl OptimizationReport {
  /// Borrow the suggestion of `kind`, if present.
  pub fn suggestion(&self, kind: SuggestionKind) -> Option<&Suggestion> {
    self.suggestions.get(&kind)
  }

  /// Borrow the backtest of `kind`, if it ran.
  pub fn backtest(&self, kind: SuggestionKind) -> Option<&BacktestResult> {
    self
      .backtests
      .iter()
      .find(|b| b.kind == kind)
      .map(|b| &b.result)
  }

  /// Current allocation against the max-Sharpe suggestion; `None` without current weights.
  pub fn rebalance_comparison(&self, total_value: f64, min_trade_value: f64) -> Option<RebalanceComparison> {
    let current = self.suggestions.get(&SuggestionKind::Current)?;
    let target = self.suggestions.get(&SuggestionKind::MaxSharpe)?;
    Some(compare_suggestions(current, target, total_value, min_trade_value))
  }
}

/// Single entry point for the optimization and backtesting workflow.
#[derive(Clone, Debug)]
pub struct PortfolioEngine {
  config: PortfolioEngineConfig,
  optimizer: MeanVarianceOptimizer,
}

impl Default for PortfolioEngine {
  fn default() -> Self {
    Self::new(PortfolioEngineConfig::default())
  }
}

impl PortfolioEngine {
  /// Construct a new engine with explicit configuration.
  pub fn new(config: PortfolioEngineConfig) -> Self {
    let optimizer = MeanVarianceOptimizer::new(config.optimizer);
    Self { config, optimizer }
  }

  /// Borrow engine configuration.
  pub fn config(&self) -> &PortfolioEngineConfig {
    &self.config
  }

  /// Borrow the underlying optimizer.
  pub fn optimizer(&self) -> &MeanVarianceOptimizer {
    &self.optimizer
  }

  /// Run the full pipeline on `table`.
  ///
  /// Statistics use the whole table; backtests use the configured lookback
  /// window. A backtest that fails (for example on a window shorter than 20
  /// rows) is logged and left out of the report.
  pub fn analyze(&self, table: &PriceTable, current_weights: Option<&Array1<f64>>) -> Result<OptimizationReport> {
    let cfg = &self.config;
    let statistics = prepare_statistics(table, cfg.trading_days).context("failed to prepare market statistics")?;
    let (mu, cov) = (&statistics.mu, &statistics.covariance);

    let frontier = self
      .optimizer
      .frontier(mu, cov, cfg.frontier_points, cfg.risk_free, cfg.allow_short);

    let mut rng = match cfg.seed {
      Some(seed) => StdRng::seed_from_u64(seed),
      None => StdRng::from_entropy(),
    };
    let random_portfolios = sample_random_portfolios_with_rng(mu, cov, cfg.random_portfolios, cfg.risk_free, &mut rng)
      .context("failed to sample random portfolios")?;

    let suggestions = self
      .optimizer
      .suggestions(&statistics.universe, mu, cov, current_weights, cfg.risk_free)
      .context("failed to compose portfolio suggestions")?;

    let window = table.window(cfg.lookback);
    let backtests = suggestions
      .values()
      .filter_map(|s| {
        let allocation = Allocation::ByTicker(s.weights.clone());
        match backtest(&allocation, &window, None, cfg.trading_days) {
          Ok(result) => Some(NamedBacktest { kind: s.kind, result }),
          Err(err) => {
            warn!(suggestion = %s.kind, error = %err, "backtest skipped");
            None
          }
        }
      })
      .collect::<Vec<_>>();

    info!(
      assets = statistics.n_assets(),
      frontier_points = frontier.len(),
      suggestions = suggestions.len(),
      backtests = backtests.len(),
      "portfolio analysis complete"
    );

    Ok(OptimizationReport {
      statistics,
      frontier,
      random_portfolios,
      suggestions,
      backtests,
    })
  }

  /// Sharpe-score target weights from `table` and the trades that reach them.
  pub fn sharpe_rebalance(
    &self,
    table: &PriceTable,
    holdings: &[Holding],
    total_value: f64,
    fx_rate: f64,
  ) -> Result<Vec<TradeLine>> {
    let profiles = asset_risk_profiles(table, self.config.trading_days, self.config.risk_free)
      .context("failed to compute asset risk profiles")?;
    let targets = sharpe_score_weights(&profiles, &self.config.scoring);
    Ok(build_trade_plan(holdings, &targets, total_value, fx_rate))
  }
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use ndarray::array;
  use tracing_test::traced_test;

  use super::*;
  use crate::error::PortfolioError;
  use crate::portfolio::rebalance::Currency;

  /// Deterministic three-asset history with distinct drift and wiggle.
  fn table(rows: usize) -> PriceTable {
    let series = |start: f64, drift: f64, amp: f64, phase: f64| -> Vec<f64> {
      (0..rows)
        .map(|i| {
          let t = i as f64;
          start * (1.0 + drift).powf(t) * (1.0 + amp * (0.7 * t + phase).sin())
        })
        .collect()
    };

    PriceTable::from_columns(vec![
      ("AAA", series(100.0, 0.0004, 0.01, 0.0)),
      ("BBB", series(50.0, 0.0008, 0.03, 1.3)),
      ("CCC", series(20.0, 0.0002, 0.02, 2.1)),
    ])
    .unwrap()
  }

  fn engine() -> PortfolioEngine {
    PortfolioEngine::new(PortfolioEngineConfig {
      frontier_points: 8,
      random_portfolios: 50,
      seed: Some(11),
      ..Default::default()
    })
  }

  #[test]
  #[traced_test]
  fn analyze_produces_full_report() {
    let current = array![0.5, 0.3, 0.2];
    let report = engine().analyze(&table(120), Some(&current)).unwrap();

    assert_eq!(report.statistics.n_assets(), 3);
    assert_eq!(report.random_portfolios.len(), 50);
    assert!(report.frontier.len() <= 8);
    assert_eq!(report.suggestions.len(), 4);
    assert_eq!(report.backtests.len(), 4);
    assert!(report.backtest(SuggestionKind::Current).is_some());

    let current = report.suggestion(SuggestionKind::Current).unwrap();
    assert_abs_diff_eq!(current.weight_of("BBB"), 0.3);
    assert!(report.rebalance_comparison(1_000_000.0, 10_000.0).is_some());
    assert!(logs_contain("portfolio analysis complete"));
  }

  #[test]
  fn comparison_needs_current_weights() {
    let report = engine().analyze(&table(60), None).unwrap();
    assert!(report.rebalance_comparison(1_000_000.0, 10_000.0).is_none());
  }

  #[test]
  #[traced_test]
  fn short_lookback_skips_backtests() {
    let engine = PortfolioEngine::new(PortfolioEngineConfig {
      frontier_points: 4,
      random_portfolios: 10,
      seed: Some(3),
      ..Default::default()
    });
    let report = engine.analyze(&table(15), None).unwrap();

    assert!(report.backtests.is_empty());
    assert_eq!(report.suggestions.len(), 3);
    assert!(logs_contain("backtest skipped"));
  }

  #[test]
  fn insufficient_data_is_downcastable() {
    let err = engine().analyze(&table(2), None).unwrap_err();

    assert!(err.to_string().contains("failed to prepare market statistics"));
    assert_eq!(
      err.downcast_ref::<PortfolioError>(),
      Some(&PortfolioError::InsufficientData {
        required: 2,
        actual: 1
      })
    );
  }

  #[test]
  fn seeded_engine_is_reproducible() {
    let a = engine().analyze(&table(60), None).unwrap();
    let b = engine().analyze(&table(60), None).unwrap();

    assert_eq!(a.random_portfolios[0].weights, b.random_portfolios[0].weights);
  }

  #[test]
  fn sharpe_rebalance_builds_a_plan() {
    let holdings = vec![
      Holding::new("AAA".to_string(), 500_000.0, 100.0, Currency::Foreign),
      Holding::new("BBB".to_string(), 300_000.0, 5_000.0, Currency::Local),
      Holding::new("CCC".to_string(), 200_000.0, 2_000.0, Currency::Local),
    ];
    let plan = engine()
      .sharpe_rebalance(&table(120), &holdings, 1_000_000.0, 150.0)
      .unwrap();

    assert_eq!(plan.len(), 3);
    let total_target: f64 = plan.iter().map(|l| l.target_value).sum();
    assert_abs_diff_eq!(total_target, 1_000_000.0, epsilon = 1e-6);
    assert_abs_diff_eq!(plan[0].price_local, 15_000.0);
  }
}
