//! Per-entity summary statistics used for ranking by level and spread.

use crate::outcome::{MissingReason, Outcome};
use crate::panel::{EntityKey, Panel};

/// Summary statistics of one series.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeriesSummary {
    /// Number of finite observations
    pub length: usize,
    /// Arithmetic mean
    pub mean: f64,
    /// Median (50th percentile)
    pub median: f64,
    /// Sample standard deviation (n - 1 denominator)
    pub std_dev: f64,
    /// Coefficient of variation (std_dev / |mean|)
    pub coef_variation: f64,
}

/// A summary statistic usable as a sort criterion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SummaryStat {
    Mean,
    Median,
    Std,
    Cv,
}

impl SummaryStat {
    pub fn name(&self) -> &'static str {
        match self {
            SummaryStat::Mean => "mean",
            SummaryStat::Median => "median",
            SummaryStat::Std => "std",
            SummaryStat::Cv => "cv",
        }
    }

    /// Pick this statistic out of a summary.
    pub fn select(&self, summary: &SeriesSummary) -> Outcome {
        if summary.length == 0 {
            return Outcome::Missing(MissingReason::InsufficientSamples { needed: 1, got: 0 });
        }
        let value = match self {
            SummaryStat::Mean => summary.mean,
            SummaryStat::Median => summary.median,
            SummaryStat::Std => summary.std_dev,
            SummaryStat::Cv => summary.coef_variation,
        };
        Outcome::from_f64(value)
    }
}

/// Compute summary statistics, ignoring NaN values.
pub fn summarize(values: &[f64]) -> SeriesSummary {
    let valid: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    let n = valid.len();
    if n == 0 {
        return SeriesSummary::default();
    }

    let mean = valid.iter().sum::<f64>() / n as f64;

    let std_dev = if n > 1 {
        (valid.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64).sqrt()
    } else {
        f64::NAN
    };

    let coef_variation = if mean.abs() > f64::EPSILON {
        std_dev / mean.abs()
    } else {
        f64::NAN
    };

    let mut sorted = valid;
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let median = percentile(&sorted, 0.5);

    SeriesSummary {
        length: n,
        mean,
        median,
        std_dev,
        coef_variation,
    }
}

/// One summary statistic per entity, in grouping order.
pub fn summary_statistic<K: EntityKey>(panel: &Panel<K>, stat: SummaryStat) -> Vec<(K, Outcome)> {
    panel
        .groups()
        .into_iter()
        .map(|group| (group.entity.clone(), stat.select(&summarize(&group.values))))
        .collect()
}

/// Mean of a series; NaN when empty.
pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Compute percentile using linear interpolation.
fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    if sorted.len() == 1 {
        return sorted[0];
    }

    let n = sorted.len() as f64;
    let idx = p * (n - 1.0);
    let lower = idx.floor() as usize;
    let upper = idx.ceil() as usize;
    let frac = idx - lower as f64;

    if upper >= sorted.len() {
        sorted[sorted.len() - 1]
    } else {
        sorted[lower] * (1.0 - frac) + sorted[upper] * frac
    }
}
