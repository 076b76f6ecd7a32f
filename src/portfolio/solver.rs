//! # Projected Gradient Solver
//!
//! $$
//! \mathbf w_{k+1}=\mathbf w_k+\lambda_k\big(P_{\mathcal W}(\mathbf w_k-\alpha_k\nabla f(\mathbf w_k))-\mathbf w_k\big),
//! \qquad \alpha_k=\frac{s^\top s}{s^\top y}
//! $$
//!
//! Spectral projected gradient (Barzilai-Borwein step, Armijo backtracking)
//! over the capped simplex
//! $\mathcal W=\{\mathbf w:\sum_i w_i=1,\ \ell\le w_i\le u\}$, optionally
//! intersected with the hyperplane $\mathbf w^\top\mu=t$.
//!
//! The Euclidean projection is exact. On the capped simplex it is
//! $w_i=\operatorname{clip}(v_i-a,\ell,u)$ with the budget multiplier $a$ found
//! by Brent's method; the target-return projection nests that search inside a
//! second Brent search on the return multiplier.

use argmin::core::CostFunction;
use argmin::core::Error;
use argmin::core::Gradient;
use ndarray::Array1;
use ndarray::Array2;
use ndarray_stats::QuantileExt;
use roots::SimpleConvergency;
use roots::find_root_brent;
use tracing::debug;

const ROOT_TOL: f64 = 1e-13;
const ROOT_MAX_ITER: usize = 200;
const TARGET_TOL: f64 = 1e-9;
const MULTIPLIER_LIMIT: f64 = 1e12;
const ARMIJO: f64 = 1e-4;
const MAX_BACKTRACKS: usize = 60;
const STEP_MIN: f64 = 1e-10;
const STEP_MAX: f64 = 1e6;
/// Unit-step residual accepted when the line search can no longer make progress.
const STALL_TOL: f64 = 1e-5;

/// Per-asset weight bounds shared by every coordinate.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WeightBounds {
  pub lower: f64,
  pub upper: f64,
}

impl WeightBounds {
  /// `[0, 1]`
  pub fn long_only() -> Self {
    Self {
      lower: 0.0,
      upper: 1.0,
    }
  }

  /// `[-1, 1]`
  pub fn long_short() -> Self {
    Self {
      lower: -1.0,
      upper: 1.0,
    }
  }

  /// `[-1, 1]` when shorting is allowed, `[0, 1]` otherwise.
  pub fn for_shorting(allow_short: bool) -> Self {
    if allow_short {
      Self::long_short()
    } else {
      Self::long_only()
    }
  }

  /// Whether `n` assets can satisfy the budget within these bounds.
  pub fn admits(&self, n: usize) -> bool {
    let n = n as f64;
    self.lower <= self.upper && n * self.lower <= 1.0 + ROOT_TOL && n * self.upper >= 1.0 - ROOT_TOL
  }

  fn clip(&self, x: f64) -> f64 {
    x.clamp(self.lower, self.upper)
  }
}

/// Euclidean projection onto `{w : sum(w) = 1, lower <= w_i <= upper}`.
///
/// Returns `None` for empty or non-finite input or when the bounds cannot
/// meet the budget.
pub fn project_capped_simplex(v: &Array1<f64>, bounds: WeightBounds) -> Option<Array1<f64>> {
  let n = v.len();
  if n == 0 || !bounds.admits(n) || v.iter().any(|x| !x.is_finite()) {
    return None;
  }

  let gap = |shift: f64| -> f64 { v.iter().map(|&x| bounds.clip(x - shift)).sum::<f64>() - 1.0 };

  // every coordinate sits on `upper` at `lo_shift` and on `lower` at `hi_shift`
  let lo_shift = *v.min().ok()? - bounds.upper;
  let hi_shift = *v.max().ok()? - bounds.lower;

  let shift = if gap(lo_shift).abs() <= ROOT_TOL {
    lo_shift
  } else if gap(hi_shift).abs() <= ROOT_TOL {
    hi_shift
  } else {
    let mut convergency = SimpleConvergency {
      eps: ROOT_TOL,
      max_iter: ROOT_MAX_ITER,
    };
    find_root_brent(lo_shift, hi_shift, &gap, &mut convergency).ok()?
  };

  let mut w = v.mapv(|x| bounds.clip(x - shift));
  polish_budget(&mut w, bounds);
  Some(w)
}

/// Spread the remaining budget residual over coordinates strictly inside the bounds.
fn polish_budget(w: &mut Array1<f64>, bounds: WeightBounds) {
  let residual = 1.0 - w.sum();
  if residual == 0.0 {
    return;
  }

  let free: Vec<usize> = w
    .indexed_iter()
    .filter(|(_, &x)| x > bounds.lower && x < bounds.upper)
    .map(|(i, _)| i)
    .collect();
  if free.is_empty() {
    return;
  }

  let share = residual / free.len() as f64;
  for i in free {
    w[i] = bounds.clip(w[i] + share);
  }
}

/// Feasible region of one optimization: the capped simplex plus an optional
/// target-return equality.
#[derive(Clone, Debug)]
pub(crate) struct FeasibleSet<'a> {
  bounds: WeightBounds,
  target: Option<(&'a Array1<f64>, f64)>,
  /// Last return multiplier, reused to warm-start the next projection.
  multiplier: f64,
}

impl<'a> FeasibleSet<'a> {
  pub(crate) fn new(bounds: WeightBounds) -> Self {
    Self {
      bounds,
      target: None,
      multiplier: 0.0,
    }
  }

  pub(crate) fn with_target(bounds: WeightBounds, mu: &'a Array1<f64>, target_return: f64) -> Self {
    Self {
      bounds,
      target: Some((mu, target_return)),
      multiplier: 0.0,
    }
  }

  pub(crate) fn project(&mut self, v: &Array1<f64>) -> Option<Array1<f64>> {
    match self.target {
      None => project_capped_simplex(v, self.bounds),
      Some((mu, target)) => self.project_on_target(v, mu, target),
    }
  }

  /// `w(b) = P_simplex(v - b mu)`; `mu . w(b)` is non-increasing in `b`, so the
  /// multiplier meeting the target is bracketed by doubling and refined by Brent.
  fn project_on_target(&mut self, v: &Array1<f64>, mu: &Array1<f64>, target: f64) -> Option<Array1<f64>> {
    if mu.len() != v.len() || !target.is_finite() {
      return None;
    }

    let bounds = self.bounds;
    let tol = TARGET_TOL * target.abs().max(1.0);
    let at = |b: f64| -> Option<(Array1<f64>, f64)> {
      let w = project_capped_simplex(&(v - &(mu * b)), bounds)?;
      let gap = w.dot(mu) - target;
      Some((w, gap))
    };

    let start = self.multiplier;
    let (w0, g0) = at(start)?;
    if g0.abs() <= tol {
      return Some(w0);
    }

    let spread = mu.max().ok()? - mu.min().ok()?;
    if spread.is_nan() || spread <= 1e-14 {
      return None;
    }

    let direction = g0.signum();
    let mut near = start;
    let mut step = 1.0;
    let far = loop {
      let candidate = start + direction * step;
      let (w, g) = at(candidate)?;
      if g.abs() <= tol {
        self.multiplier = candidate;
        return Some(w);
      }
      if g.signum() != g0.signum() {
        break candidate;
      }
      near = candidate;
      step *= 2.0;
      if step > MULTIPLIER_LIMIT {
        return None;
      }
    };

    let (a, b) = if near < far { (near, far) } else { (far, near) };
    let mut convergency = SimpleConvergency {
      eps: ROOT_TOL,
      max_iter: ROOT_MAX_ITER,
    };
    let root = find_root_brent(
      a,
      b,
      |m: f64| at(m).map(|(_, g)| g).unwrap_or(f64::NAN),
      &mut convergency,
    )
    .ok()?;

    let (w, g) = at(root)?;
    if g.abs() > tol {
      return None;
    }
    self.multiplier = root;
    Some(w)
  }
}

/// Result of a projected-gradient run.
#[derive(Clone, Debug)]
pub(crate) struct SolveOutcome {
  pub weights: Array1<f64>,
  pub iterations: u64,
  pub converged: bool,
}

/// Minimize `problem` over `set`, starting from the projection of `x0`.
///
/// Stationarity is $\lVert P(\mathbf x-\nabla f(\mathbf x))-\mathbf x\rVert_\infty$.
/// Returns `None` when the feasible set is empty. A run that meets a
/// non-finite cost or gradient keeps its last feasible iterate and reports
/// `converged = false`; a stalled line search or the iteration cap counts as
/// converged only when the residual is within the stall tolerance.
pub(crate) fn minimize<P>(
  problem: &P,
  set: &mut FeasibleSet<'_>,
  x0: &Array1<f64>,
  max_iters: u64,
  tolerance: f64,
) -> Option<SolveOutcome>
where
  P: CostFunction<Param = Array1<f64>, Output = f64>
    + Gradient<Param = Array1<f64>, Gradient = Array1<f64>>,
{
  let mut x = set.project(x0)?;
  let aborted = |x: Array1<f64>, iterations: u64| SolveOutcome {
    weights: x,
    iterations,
    converged: false,
  };

  let (mut fx, mut gx) = match evaluate(problem, &x) {
    Some(v) => v,
    None => return Some(aborted(x, 0)),
  };
  let mut alpha = 1.0;

  for k in 0..max_iters {
    // unit-step projected gradient residual, independent of the BB step
    let Some(unit) = set.project(&(&x - &gx)) else {
      return Some(aborted(x, k));
    };
    let residual = sup_norm(&(&unit - &x));
    if residual <= tolerance {
      debug!(iterations = k, residual, "projected gradient converged");
      return Some(SolveOutcome {
        weights: x,
        iterations: k,
        converged: true,
      });
    }

    let trial = if alpha == 1.0 {
      unit
    } else {
      let Some(trial) = set.project(&(&x - &(&gx * alpha))) else {
        return Some(aborted(x, k));
      };
      trial
    };
    let d = &trial - &x;

    let slope = gx.dot(&d);
    let mut lambda = 1.0;
    let mut accepted = None;
    for _ in 0..MAX_BACKTRACKS {
      let candidate = &x + &(&d * lambda);
      if let Ok(fc) = problem.cost(&candidate) {
        if fc.is_finite() && fc <= fx + ARMIJO * lambda * slope {
          accepted = Some((candidate, fc));
          break;
        }
      }
      lambda *= 0.5;
    }

    let Some((next, f_next)) = accepted else {
      if alpha != 1.0 {
        alpha = 1.0;
        continue;
      }
      debug!(iterations = k, residual, "line search stalled");
      return Some(SolveOutcome {
        weights: x,
        iterations: k,
        converged: residual <= STALL_TOL,
      });
    };

    let g_next = match problem.gradient(&next) {
      Ok(g) if g.iter().all(|v| v.is_finite()) => g,
      _ => return Some(aborted(next, k + 1)),
    };

    let s = &next - &x;
    let y = &g_next - &gx;
    let sy = s.dot(&y);
    alpha = if sy > 0.0 {
      (s.dot(&s) / sy).clamp(STEP_MIN, STEP_MAX)
    } else {
      STEP_MAX
    };

    x = next;
    fx = f_next;
    gx = g_next;
  }

  let residual = set
    .project(&(&x - &gx))
    .map_or(f64::INFINITY, |unit| sup_norm(&(&unit - &x)));
  debug!(iterations = max_iters, residual, "iteration cap reached");
  Some(SolveOutcome {
    weights: x,
    iterations: max_iters,
    converged: residual <= STALL_TOL,
  })
}

fn sup_norm(v: &Array1<f64>) -> f64 {
  v.iter().fold(0.0_f64, |m, x| m.max(x.abs()))
}

fn evaluate<P>(problem: &P, x: &Array1<f64>) -> Option<(f64, Array1<f64>)>
where
  P: CostFunction<Param = Array1<f64>, Output = f64>
    + Gradient<Param = Array1<f64>, Gradient = Array1<f64>>,
{
  let f = problem.cost(x).ok()?;
  let g = problem.gradient(x).ok()?;
  (f.is_finite() && g.iter().all(|v| v.is_finite())).then_some((f, g))
}

/// Below this volatility the Sharpe objective is flat.
const VOL_FLOOR: f64 = 1e-12;

/// $-\dfrac{\mathbf w^\top\mu-r_f}{\sqrt{\mathbf w^\top\Sigma\mathbf w}}$
pub(crate) struct NegativeSharpe<'a> {
  pub mu: &'a Array1<f64>,
  pub cov: &'a Array2<f64>,
  pub risk_free: f64,
}

impl CostFunction for NegativeSharpe<'_> {
  type Param = Array1<f64>;
  type Output = f64;

  fn cost(&self, w: &Self::Param) -> Result<Self::Output, Error> {
    let vol = w.dot(&self.cov.dot(w)).max(0.0).sqrt();
    if vol <= VOL_FLOOR {
      return Ok(0.0);
    }
    Ok(-(w.dot(self.mu) - self.risk_free) / vol)
  }
}

impl Gradient for NegativeSharpe<'_> {
  type Param = Array1<f64>;
  type Gradient = Array1<f64>;

  fn gradient(&self, w: &Self::Param) -> Result<Self::Gradient, Error> {
    let sigma_w = self.cov.dot(w);
    let vol = w.dot(&sigma_w).max(0.0).sqrt();
    if vol <= VOL_FLOOR {
      return Ok(Array1::zeros(w.len()));
    }
    let excess = w.dot(self.mu) - self.risk_free;
    Ok(&sigma_w * (excess / vol.powi(3)) - self.mu / vol)
  }
}

/// $\mathbf w^\top\Sigma\mathbf w$
pub(crate) struct PortfolioVariance<'a> {
  pub cov: &'a Array2<f64>,
}

impl CostFunction for PortfolioVariance<'_> {
  type Param = Array1<f64>;
  type Output = f64;

  fn cost(&self, w: &Self::Param) -> Result<Self::Output, Error> {
    Ok(w.dot(&self.cov.dot(w)))
  }
}

impl Gradient for PortfolioVariance<'_> {
  type Param = Array1<f64>;
  type Gradient = Array1<f64>;

  fn gradient(&self, w: &Self::Param) -> Result<Self::Gradient, Error> {
    Ok(self.cov.dot(w) * 2.0)
  }
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use ndarray::array;

  use super::*;

  #[test]
  fn projection_keeps_feasible_points() {
    let v = array![0.2, 0.3, 0.5];
    let w = project_capped_simplex(&v, WeightBounds::long_only()).unwrap();

    for (a, b) in w.iter().zip(v.iter()) {
      assert_abs_diff_eq!(a, b, epsilon = 1e-12);
    }
  }

  #[test]
  fn projection_clips_and_rebalances() {
    let w = project_capped_simplex(&array![2.0, 0.0, -1.0], WeightBounds::long_only()).unwrap();

    assert_abs_diff_eq!(w.sum(), 1.0, epsilon = 1e-12);
    assert_abs_diff_eq!(w[0], 1.0, epsilon = 1e-12);
    assert_abs_diff_eq!(w[2], 0.0, epsilon = 1e-12);
  }

  #[test]
  fn projection_of_uniform_shift() {
    let w = project_capped_simplex(&array![5.0, 5.0, 5.0, 5.0], WeightBounds::long_short()).unwrap();
    for x in w.iter() {
      assert_abs_diff_eq!(*x, 0.25, epsilon = 1e-12);
    }
  }

  #[test]
  fn single_asset_projects_to_one() {
    let w = project_capped_simplex(&array![-3.0], WeightBounds::long_only()).unwrap();
    assert_eq!(w, array![1.0]);
  }

  #[test]
  fn infeasible_bounds_have_no_projection() {
    let bounds = WeightBounds {
      lower: 0.0,
      upper: 0.2,
    };
    assert!(project_capped_simplex(&array![0.1, 0.1, 0.1], bounds).is_none());
  }

  #[test]
  fn target_projection_meets_both_constraints() {
    let mu = array![0.05, 0.10, 0.20];
    let mut set = FeasibleSet::with_target(WeightBounds::long_only(), &mu, 0.12);
    let w = set.project(&array![1.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0]).unwrap();

    assert_abs_diff_eq!(w.sum(), 1.0, epsilon = 1e-9);
    assert_abs_diff_eq!(w.dot(&mu), 0.12, epsilon = 1e-8);
    assert!(w.iter().all(|&x| (-1e-12..=1.0 + 1e-12).contains(&x)));
  }

  #[test]
  fn target_at_max_return_selects_that_asset() {
    let mu = array![0.05, 0.10, 0.20];
    let mut set = FeasibleSet::with_target(WeightBounds::long_only(), &mu, 0.20);
    let w = set.project(&array![0.5, 0.3, 0.2]).unwrap();

    assert_abs_diff_eq!(w[2], 1.0, epsilon = 1e-8);
  }

  #[test]
  fn unreachable_target_is_infeasible() {
    let mu = array![0.05, 0.10];
    let mut set = FeasibleSet::with_target(WeightBounds::long_only(), &mu, 0.30);
    assert!(set.project(&array![0.5, 0.5]).is_none());
  }

  #[test]
  fn variance_minimum_two_assets() {
    let cov = array![[0.04, 0.01], [0.01, 0.09]];
    let problem = PortfolioVariance { cov: &cov };
    let mut set = FeasibleSet::new(WeightBounds::long_only());
    let out = minimize(&problem, &mut set, &array![0.5, 0.5], 1000, 1e-9).unwrap();

    assert!(out.converged);
    assert_abs_diff_eq!(out.weights[0], 8.0 / 11.0, epsilon = 1e-6);
    assert_abs_diff_eq!(out.weights[1], 3.0 / 11.0, epsilon = 1e-6);
  }

  #[test]
  fn sharpe_gradient_matches_finite_differences() {
    let mu = array![0.10, 0.15, 0.07];
    let cov = array![[0.04, 0.01, 0.0], [0.01, 0.09, 0.02], [0.0, 0.02, 0.03]];
    let problem = NegativeSharpe {
      mu: &mu,
      cov: &cov,
      risk_free: 0.02,
    };
    let w = array![0.3, 0.5, 0.2];
    let g = problem.gradient(&w).unwrap();
    let h = 1e-6;

    for i in 0..3 {
      let mut up = w.clone();
      let mut down = w.clone();
      up[i] += h;
      down[i] -= h;
      let fd = (problem.cost(&up).unwrap() - problem.cost(&down).unwrap()) / (2.0 * h);
      assert_abs_diff_eq!(g[i], fd, epsilon = 1e-6);
    }
  }

  #[test]
  fn zero_risk_sharpe_is_flat() {
    let mu = array![0.1];
    let cov = array![[0.0]];
    let problem = NegativeSharpe {
      mu: &mu,
      cov: &cov,
      risk_free: 0.0,
    };

    assert_eq!(problem.cost(&array![1.0]).unwrap(), 0.0);
    assert_eq!(problem.gradient(&array![1.0]).unwrap(), array![0.0]);
  }
}
