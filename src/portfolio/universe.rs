//! # Asset Universe and Price Tables
//!
//! $$
//! P\in\mathbb R_{>0}^{T\times N},\qquad r_{t,i}=\frac{P_{t,i}}{P_{t-1,i}}-1
//! $$
//!
//! Ordered ticker sets and the price-history tables aligned to them. Every
//! vector and matrix in this crate is indexed in universe order; the helpers
//! here are the only place tickers are mapped to column positions.

use std::collections::HashMap;

use chrono::Duration;
use chrono::NaiveDate;
use ndarray::Array1;
use ndarray::Array2;
use ndarray::Axis;
use ndarray::s;

use crate::error::PortfolioError;
use crate::error::Result;

/// Ordered, duplicate-free list of asset identifiers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssetUniverse {
  tickers: Vec<String>,
  index: HashMap<String, usize>,
}

impl AssetUniverse {
  /// Build a universe, rejecting empty or duplicate tickers.
  pub fn new<I, S>(tickers: I) -> Result<Self>
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    let tickers: Vec<String> = tickers.into_iter().map(Into::into).collect();
    let mut index = HashMap::with_capacity(tickers.len());

    for (i, ticker) in tickers.iter().enumerate() {
      if ticker.trim().is_empty() {
        return Err(PortfolioError::invalid(format!("empty ticker at position {i}")));
      }
      if index.insert(ticker.clone(), i).is_some() {
        return Err(PortfolioError::invalid(format!("duplicate ticker {ticker}")));
      }
    }

    Ok(Self { tickers, index })
  }

  /// Number of assets.
  pub fn len(&self) -> usize {
    self.tickers.len()
  }

  /// Whether the universe holds no assets.
  pub fn is_empty(&self) -> bool {
    self.tickers.is_empty()
  }

  /// Tickers in column order.
  pub fn tickers(&self) -> &[String] {
    &self.tickers
  }

  /// Column position of `ticker`.
  pub fn index_of(&self, ticker: &str) -> Option<usize> {
    self.index.get(ticker).copied()
  }

  /// Iterate tickers in column order.
  pub fn iter(&self) -> impl Iterator<Item = &str> {
    self.tickers.iter().map(String::as_str)
  }

  /// Pair each weight with its ticker, in universe order.
  pub fn label_weights(&self, weights: &Array1<f64>) -> Result<Vec<(String, f64)>> {
    if weights.len() != self.len() {
      return Err(PortfolioError::invalid(format!(
        "weights length {} does not match {} tickers",
        weights.len(),
        self.len()
      )));
    }

    Ok(
      self
        .tickers
        .iter()
        .cloned()
        .zip(weights.iter().copied())
        .collect(),
    )
  }

  /// Resolve a ticker-keyed weight list into a universe-ordered vector.
  ///
  /// Every ticker of the universe must be present exactly once; unknown
  /// tickers are rejected.
  pub fn align_weights(&self, weights: &[(String, f64)]) -> Result<Array1<f64>> {
    let mut aligned = vec![f64::NAN; self.len()];

    for (ticker, w) in weights {
      let idx = self
        .index_of(ticker)
        .ok_or_else(|| PortfolioError::invalid(format!("unknown ticker {ticker}")))?;
      aligned[idx] = *w;
    }

    if let Some(pos) = aligned.iter().position(|w| w.is_nan()) {
      return Err(PortfolioError::invalid(format!(
        "missing weight for ticker {}",
        self.tickers[pos]
      )));
    }

    Ok(Array1::from(aligned))
  }
}

/// Trailing window applied to a price table before backtesting.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LookbackWindow {
  ThreeMonths,
  SixMonths,
  OneYear,
  #[default]
  All,
}

impl LookbackWindow {
  /// Window length in days, `None` for the full history.
  pub fn days(&self) -> Option<usize> {
    match self {
      Self::ThreeMonths => Some(63),
      Self::SixMonths => Some(126),
      Self::OneYear => Some(252),
      Self::All => None,
    }
  }

  /// Parse a window label such as `3M` or `1y`; unknown labels mean the full history.
  pub fn from_label(s: &str) -> Self {
    match s.to_lowercase().as_str() {
      "3m" => Self::ThreeMonths,
      "6m" => Self::SixMonths,
      "1y" | "12m" => Self::OneYear,
      _ => Self::All,
    }
  }
}

/// Gap-free price history, one row per period and one column per asset.
#[derive(Clone, Debug)]
pub struct PriceTable {
  universe: AssetUniverse,
  prices: Array2<f64>,
  dates: Option<Vec<NaiveDate>>,
}

impl PriceTable {
  /// Wrap a `rows x assets` price matrix. Prices must be finite and positive.
  pub fn new(universe: AssetUniverse, prices: Array2<f64>) -> Result<Self> {
    if prices.ncols() != universe.len() {
      return Err(PortfolioError::invalid(format!(
        "price table has {} columns but the universe has {} tickers",
        prices.ncols(),
        universe.len()
      )));
    }

    if let Some(((row, col), p)) = prices
      .indexed_iter()
      .find(|(_, p)| !p.is_finite() || **p <= 0.0)
    {
      return Err(PortfolioError::invalid(format!(
        "price {p} for {} at row {row} must be finite and positive",
        universe.tickers()[col]
      )));
    }

    Ok(Self {
      universe,
      prices,
      dates: None,
    })
  }

  /// Build from `(ticker, series)` columns of equal length.
  pub fn from_columns<S: Into<String>>(columns: Vec<(S, Vec<f64>)>) -> Result<Self> {
    let n_rows = columns.first().map(|(_, c)| c.len()).unwrap_or(0);
    let n_cols = columns.len();
    let mut tickers = Vec::with_capacity(n_cols);
    let mut prices = Array2::<f64>::zeros((n_rows, n_cols));

    for (j, (ticker, series)) in columns.into_iter().enumerate() {
      let ticker: String = ticker.into();
      if series.len() != n_rows {
        return Err(PortfolioError::invalid(format!(
          "column {ticker} has {} rows, expected {n_rows}",
          series.len()
        )));
      }
      prices.column_mut(j).assign(&Array1::from(series));
      tickers.push(ticker);
    }

    Self::new(AssetUniverse::new(tickers)?, prices)
  }

  /// Attach a date index; rows are reordered ascending by date.
  pub fn with_dates(self, dates: Vec<NaiveDate>) -> Result<Self> {
    if dates.len() != self.prices.nrows() {
      return Err(PortfolioError::invalid(format!(
        "{} dates supplied for {} price rows",
        dates.len(),
        self.prices.nrows()
      )));
    }

    let mut order: Vec<usize> = (0..dates.len()).collect();
    order.sort_by_key(|&i| dates[i]);

    let prices = self.prices.select(Axis(0), &order);
    let dates = order.iter().map(|&i| dates[i]).collect();

    Ok(Self {
      universe: self.universe,
      prices,
      dates: Some(dates),
    })
  }

  /// Borrow the asset universe.
  pub fn universe(&self) -> &AssetUniverse {
    &self.universe
  }

  /// Borrow the raw price matrix, one row per observation.
  pub fn prices(&self) -> &Array2<f64> {
    &self.prices
  }

  /// Row dates, when attached.
  pub fn dates(&self) -> Option<&[NaiveDate]> {
    self.dates.as_deref()
  }

  /// Number of price rows.
  pub fn n_rows(&self) -> usize {
    self.prices.nrows()
  }

  /// Number of asset columns.
  pub fn n_assets(&self) -> usize {
    self.prices.ncols()
  }

  /// Simple per-period returns; the leading undefined row is dropped.
  pub fn returns(&self) -> Array2<f64> {
    simple_returns(&self.prices)
  }

  /// Restrict the table to a trailing window.
  ///
  /// With a date index the cut is calendar based (`date >= last - days`),
  /// otherwise the last `days` rows are kept.
  pub fn window(&self, window: LookbackWindow) -> PriceTable {
    let Some(days) = window.days() else {
      return self.clone();
    };

    let start = match (&self.dates, self.dates.as_ref().and_then(|d| d.last())) {
      (Some(dates), Some(last)) => {
        let cutoff = *last - Duration::days(days as i64);
        dates.iter().position(|d| *d >= cutoff).unwrap_or(0)
      }
      _ => self.n_rows().saturating_sub(days),
    };

    PriceTable {
      universe: self.universe.clone(),
      prices: self.prices.slice(s![start.., ..]).to_owned(),
      dates: self.dates.as_ref().map(|d| d[start..].to_vec()),
    }
  }
}

/// `p_t / p_{t-1} - 1` for every column; returns an empty matrix for fewer than two rows.
pub fn simple_returns(prices: &Array2<f64>) -> Array2<f64> {
  if prices.nrows() < 2 {
    return Array2::zeros((0, prices.ncols()));
  }

  let prev = prices.slice(s![..-1, ..]);
  let next = prices.slice(s![1.., ..]);
  &next / &prev - 1.0
}
