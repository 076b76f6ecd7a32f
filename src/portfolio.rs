//! # Portfolio
//!
//! $$
//! \sigma_p^2 = \mathbf{w}^\top \Sigma \mathbf{w}
//! $$
//!
//! Mean-variance optimization, efficient frontiers, heuristic rebalancing and
//! backtesting over a shared asset universe.

pub mod backtest;
pub mod data;
pub mod engine;
pub mod frontier;
pub mod metrics;
pub mod optimizers;
pub mod rebalance;
pub mod sampler;
pub mod solver;
pub mod stress;
pub mod suggestions;
pub mod types;
pub mod universe;

pub use backtest::Allocation;
pub use backtest::BacktestResult;
pub use backtest::CurveMetrics;
pub use backtest::MIN_BACKTEST_ROWS;
pub use backtest::backtest;
pub use backtest::backtest_window;
pub use data::AssetRiskProfile;
pub use data::MarketStatistics;
pub use data::TRADING_DAYS;
pub use data::asset_risk_profiles;
pub use data::correlation_matrix;
pub use data::prepare_statistics;
pub use engine::NamedBacktest;
pub use engine::OptimizationReport;
pub use engine::PortfolioEngine;
pub use engine::PortfolioEngineConfig;
pub use frontier::DEFAULT_FRONTIER_POINTS;
pub use frontier::trace_frontier;
pub use metrics::portfolio_metrics;
pub use optimizers::DEFAULT_RISK_FREE;
pub use optimizers::MeanVarianceOptimizer;
pub use optimizers::OptimizerConfig;
pub use optimizers::optimize_max_sharpe;
pub use optimizers::optimize_min_volatility;
pub use optimizers::optimize_target_return;
pub use rebalance::AssetScoreInput;
pub use rebalance::Currency;
pub use rebalance::Holding;
pub use rebalance::RiskScored;
pub use rebalance::SharpeScoreConfig;
pub use rebalance::TradeLine;
pub use rebalance::build_trade_plan;
pub use rebalance::sharpe_score_weights;
pub use rebalance::sharpe_scores;
pub use sampler::DEFAULT_RANDOM_PORTFOLIOS;
pub use sampler::sample_random_portfolios;
pub use sampler::sample_random_portfolios_with_rng;
pub use solver::WeightBounds;
pub use solver::project_capped_simplex;
pub use stress::DEFAULT_CRASH_SCENARIOS;
pub use stress::ScenarioOutcome;
pub use stress::StressPosition;
pub use stress::crash_scenarios;
pub use stress::high_beta_positions;
pub use stress::weighted_beta;
pub use suggestions::RebalanceComparison;
pub use suggestions::RebalanceTrade;
pub use suggestions::Suggestion;
pub use suggestions::SuggestionKind;
pub use suggestions::TradeSide;
pub use suggestions::compare_suggestions;
pub use suggestions::compose_suggestions;
pub use types::FrontierPoint;
pub use types::OptimizationResult;
pub use types::PortfolioMetrics;
pub use types::RandomPortfolio;
pub use universe::AssetUniverse;
pub use universe::LookbackWindow;
pub use universe::PriceTable;
