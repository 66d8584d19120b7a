//! Performance benchmark for residual diagnostics over large panels
//!
//! Run with: cargo bench --bench acf_perf

use std::time::{Duration, Instant};

use anofox_eval_core::{Panel, ResidualOptions};

fn generate_residual_series(n: usize, seed: u64) -> Vec<f64> {
    let mut state = seed;
    let mut prev = 0.0;
    (0..n)
        .map(|_| {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            let shock = ((state >> 11) as f64 / (1u64 << 53) as f64) - 0.5;
            prev = 0.3 * prev + shock;
            prev
        })
        .collect()
}

fn generate_panel(entities: usize, length: usize) -> Panel<u32> {
    let series = (0..entities as u32)
        .map(|id| (id, generate_residual_series(length, id as u64 + 1)))
        .collect::<Vec<_>>();
    match Panel::from_series(series) {
        Ok(panel) => panel,
        Err(e) => panic!("failed to build benchmark panel: {}", e),
    }
}

fn benchmark_fn<F, R>(name: &str, iterations: usize, mut f: F) -> Duration
where
    F: FnMut() -> R,
{
    // Warmup
    let _ = f();

    let start = Instant::now();
    for _ in 0..iterations {
        let _ = std::hint::black_box(f());
    }
    let elapsed = start.elapsed();
    let per_iter = elapsed / iterations as u32;
    println!(
        "{}: total={:?}, per_iter={:?}, iters={}",
        name, elapsed, per_iter, iterations
    );
    elapsed
}

fn main() {
    println!("=== Residual Diagnostics Performance Benchmark ===\n");

    let series_lengths = [100, 1000, 10000];
    let max_lags = 24;

    println!("--- 1. Single series kernels ---\n");

    for &n in &series_lengths {
        let values = generate_residual_series(n, 42);
        let iters = if n <= 1000 { 1000 } else { 100 };

        benchmark_fn(&format!("acf_values(n={}, lags={})", n, max_lags), iters, || {
            anofox_eval_core::acf_values(&values, max_lags)
        });
        benchmark_fn(&format!("q_statistics(n={}, lags={})", n, max_lags), iters, || {
            anofox_eval_core::q_statistics(&values, max_lags)
        });
        benchmark_fn(&format!("dagostino_pearson(n={})", n), iters, || {
            anofox_eval_core::dagostino_pearson(&values)
        });
        benchmark_fn(&format!("breusch_godfrey_test(n={}, lags=4)", n), iters / 10, || {
            anofox_eval_core::breusch_godfrey_test(&values, 4)
        });
    }

    println!("\n--- 2. Panel engines (10k entities x 200 observations) ---\n");

    let panel = generate_panel(10_000, 200);

    benchmark_fn("acf(panel)", 5, || {
        anofox_eval_core::acf(&panel, max_lags, anofox_eval_core::DEFAULT_ALPHA)
    });
    benchmark_fn("ljung_box(panel)", 5, || {
        anofox_eval_core::ljung_box(&panel, max_lags)
    });
    benchmark_fn("normality_test(panel)", 5, || {
        anofox_eval_core::normality_test(&panel)
    });

    println!("\n--- 3. Ranking ---\n");

    for criterion in ["bias", "normality", "autocor_lb", "autocor_bg"] {
        benchmark_fn(&format!("rank_residuals({})", criterion), 3, || {
            anofox_eval_core::rank_residuals(&panel, criterion, ResidualOptions::default(), true)
        });
    }

    println!("\n=== Benchmark Complete ===");
}
