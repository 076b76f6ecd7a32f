use std::hint::black_box;
use std::time::Instant;

use frontier_rs::portfolio::optimize_max_sharpe;
use frontier_rs::portfolio::trace_frontier;
use ndarray::Array1;
use ndarray::Array2;
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::ThreadPool;
use rayon::ThreadPoolBuilder;

fn median_ms(samples: &mut [f64]) -> f64 {
  samples.sort_by(f64::total_cmp);
  samples[samples.len() / 2]
}

/// Random positive-definite statistics for `n` assets.
fn synthetic_stats(n: usize, seed: u64) -> (Array1<f64>, Array2<f64>) {
  let mut rng = StdRng::seed_from_u64(seed);
  let mu = Array1::random_using(n, Uniform::new(0.02, 0.20), &mut rng);
  let factors = Array2::random_using((n, n), Uniform::new(-0.2, 0.2), &mut rng);
  let cov = factors.t().dot(&factors) / n as f64 + Array2::<f64>::eye(n) * 0.01;
  (mu, cov)
}

fn bench_frontier(pool: &ThreadPool, mu: &Array1<f64>, cov: &Array2<f64>, points: usize, runs: usize) -> f64 {
  pool.install(|| black_box(trace_frontier(mu, cov, points, 0.04, false)));

  let mut times_ms = Vec::with_capacity(runs);
  for _ in 0..runs {
    let t0 = Instant::now();
    pool.install(|| black_box(trace_frontier(mu, cov, points, 0.04, false)));
    times_ms.push(t0.elapsed().as_secs_f64() * 1_000.0);
  }
  median_ms(&mut times_ms)
}

fn bench_max_sharpe(mu: &Array1<f64>, cov: &Array2<f64>, runs: usize) -> f64 {
  let mut times_ms = Vec::with_capacity(runs);
  for _ in 0..runs {
    let t0 = Instant::now();
    black_box(optimize_max_sharpe(mu, cov, 0.04, false).ok());
    times_ms.push(t0.elapsed().as_secs_f64() * 1_000.0);
  }
  median_ms(&mut times_ms)
}

fn main() {
  let threads = std::thread::available_parallelism()
    .map(|v| v.get())
    .unwrap_or(1);
  let mt_threads = threads.max(2);
  let single = ThreadPoolBuilder::new()
    .num_threads(1)
    .build()
    .expect("failed to build single-thread pool");
  let multi = ThreadPoolBuilder::new()
    .num_threads(mt_threads)
    .build()
    .expect("failed to build multi-thread pool");

  println!("Efficient frontier benchmark");
  println!("Using MT threads: {mt_threads}");

  for &n in &[5_usize, 20, 50] {
    let (mu, cov) = synthetic_stats(n, 42);
    let sharpe = bench_max_sharpe(&mu, &cov, 7);
    let t1 = bench_frontier(&single, &mu, &cov, 50, 5);
    let tn = bench_frontier(&multi, &mu, &cov, 50, 5);
    let speedup = t1 / tn;
    println!(
      "assets={n:<4} | max_sharpe={sharpe:>8.3} ms | frontier 1T={t1:>9.2} ms | MT={tn:>9.2} ms | speedup={speedup:>5.2}x"
    );
  }
}
