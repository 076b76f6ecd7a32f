//! # frontier-rs
//!
//! $$
//! \mathbf{w}^\*=\arg\max_{\mathbf{w}\in\mathcal W} \frac{\mathbf{w}^\top\mu-r_f}{\sqrt{\mathbf{w}^\top\Sigma\mathbf{w}}}
//! $$
//!
//! Mean-variance portfolio optimization and backtesting.
//!
//! The crate turns a clean price-history table into annualized statistics,
//! finds the max-Sharpe and minimum-volatility portfolios, traces the efficient
//! frontier, samples random portfolios for plotting, composes labeled
//! allocation suggestions, derives Sharpe-score rebalancing plans and replays
//! any allocation against history with a benchmark.
//!
//! Everything is synchronous and stateless: each call takes its inputs by
//! reference and returns freshly computed values. Market data, persistence and
//! presentation are left to the caller.

pub mod error;
pub mod portfolio;

pub use error::PortfolioError;
pub use error::Result;
