//! # Random Portfolios
//!
//! $$
//! u_i\sim\mathcal U(0,1),\qquad w_i=\frac{u_i}{\sum_j u_j}
//! $$
//!
//! Long-only random weight vectors for scatter plots around the frontier.
//! Normalized uniforms are not Dirichlet draws; the samples are meant for
//! visualization and never feed the optimizer.

use ndarray::Array1;
use ndarray::Array2;
use ndarray::Axis;
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;

use super::metrics::check_shapes;
use super::metrics::evaluate;
use super::types::RandomPortfolio;
use crate::error::Result;

/// Default sample count for standalone use.
pub const DEFAULT_RANDOM_PORTFOLIOS: usize = 1000;

/// Draw `n` random portfolios from an entropy-seeded generator.
pub fn sample_random_portfolios(
  mu: &Array1<f64>,
  cov: &Array2<f64>,
  n: usize,
  risk_free: f64,
) -> Result<Vec<RandomPortfolio>> {
  let mut rng = StdRng::from_entropy();
  sample_random_portfolios_with_rng(mu, cov, n, risk_free, &mut rng)
}

/// Draw `n` random portfolios from the supplied generator.
pub fn sample_random_portfolios_with_rng<R: Rng + ?Sized>(
  mu: &Array1<f64>,
  cov: &Array2<f64>,
  n: usize,
  risk_free: f64,
  rng: &mut R,
) -> Result<Vec<RandomPortfolio>> {
  check_shapes(mu, cov)?;
  let n_assets = mu.len();
  let draws = Array2::random_using((n, n_assets), Uniform::new(0.0, 1.0), rng);

  let samples = draws
    .axis_iter(Axis(0))
    .map(|row| {
      let total = row.sum();
      let weights = if total > 0.0 {
        row.mapv(|u| u / total)
      } else {
        Array1::from_elem(n_assets, 1.0 / n_assets as f64)
      };
      let metrics = evaluate(&weights, mu, cov, risk_free);
      RandomPortfolio { weights, metrics }
    })
    .collect();

  Ok(samples)
}
