//! Autocorrelation function with Bartlett confidence intervals.
//!
//! For every entity of a panel the series is demeaned, the lag-`i`
//! autocorrelation is the Pearson correlation of the series with its
//! `i`-shifted copy over the overlapping observations, and the confidence
//! band follows Bartlett's formula:
//!
//! ```text
//! var[k]      = 1 + 2 * Σ_{j=1}^{k-1} acf[j]²
//! interval[k] = z(1 - α/2) * sqrt(var[k] / n)
//! ```
//!
//! with `interval[0] = 0`, so the band has zero width at lag 0.
//!
//! # Example
//!
//! ```
//! use anofox_eval_core::{acf, Panel};
//!
//! let values: Vec<f64> = (0..50).map(|i| (i as f64 * 0.7).sin()).collect();
//! let panel = Panel::from_series(vec![("sensor-1", values)]).unwrap();
//! let result = acf(&panel, 5, 0.05).unwrap();
//!
//! assert_eq!(result[0].acf[0], Some(1.0));
//! assert_eq!(result[0].acf.len(), 6);
//! ```

use statrs::distribution::{ContinuousCDF, Normal};
use tracing::debug;

use crate::correlation::{demean, lagged_correlation};
use crate::error::{EvalError, Result};
use crate::panel::{EntityKey, Panel};

/// Default significance level for confidence bands.
pub const DEFAULT_ALPHA: f64 = 0.05;

/// ACF of one entity.
///
/// All vectors have `max_lags + 1` entries, indexed by lag. `None` marks a
/// lag that cannot be computed (series too short, zero variance, or a
/// missing earlier lag feeding the Bartlett sum).
#[derive(Debug, Clone, PartialEq)]
pub struct AcfResult<K> {
    pub entity: K,
    /// Number of observations of the entity
    pub length: usize,
    /// Autocorrelation by lag; `acf[0]` is always `Some(1.0)`
    pub acf: Vec<Option<f64>>,
    /// Half-width of the confidence band by lag
    pub interval: Vec<Option<f64>>,
    /// `acf - interval`
    pub confint_lower: Vec<Option<f64>>,
    /// `acf + interval`
    pub confint_upper: Vec<Option<f64>>,
}

/// Compute the ACF and Bartlett confidence bands for every entity.
///
/// # Arguments
/// * `panel` - Panel whose entities are already in time order
/// * `max_lags` - Largest lag to compute (at least 1)
/// * `alpha` - Significance level of the band, in `(0, 1)`
///
/// # Errors
/// `InvalidParameter` if `max_lags < 1` or `alpha` is outside `(0, 1)`.
/// Short series do not fail the call; their unreachable lags are `None`.
pub fn acf<K: EntityKey>(
    panel: &Panel<K>,
    max_lags: usize,
    alpha: f64,
) -> Result<Vec<AcfResult<K>>> {
    validate_max_lags(max_lags)?;
    let z = normal_quantile(1.0 - validate_alpha(alpha)? / 2.0)?;

    let groups = panel.groups();
    debug!(entities = groups.len(), max_lags, alpha, "computing acf");

    Ok(groups
        .into_iter()
        .map(|group| {
            let n = group.len();
            let acf = acf_values(&group.values, max_lags);
            let interval = bartlett_intervals(&acf, n, z);
            let confint_lower = combine(&acf, &interval, |a, w| a - w);
            let confint_upper = combine(&acf, &interval, |a, w| a + w);
            AcfResult {
                entity: group.entity.clone(),
                length: n,
                acf,
                interval,
                confint_lower,
                confint_upper,
            }
        })
        .collect())
}

/// Autocorrelations of a single series for lags `0..=max_lags`.
pub fn acf_values(values: &[f64], max_lags: usize) -> Vec<Option<f64>> {
    let centred = demean(values);
    std::iter::once(Some(1.0))
        .chain((1..=max_lags).map(|lag| lagged_correlation(&centred, lag)))
        .collect()
}

/// Bartlett half-widths for an ACF sequence starting at lag 0.
///
/// `length` is the full series length, not the post-shift overlap.
pub fn bartlett_intervals(acf: &[Option<f64>], length: usize, z: f64) -> Vec<Option<f64>> {
    if acf.is_empty() {
        return Vec::new();
    }
    if length == 0 {
        let mut out = vec![None; acf.len()];
        out[0] = Some(0.0);
        return out;
    }

    let n = length as f64;
    let mut out = Vec::with_capacity(acf.len());
    out.push(Some(0.0));

    // Running 1 + 2 * Σ acf[j]² over j = 1..k-1; None once a lag is missing.
    let mut var = Some(1.0);
    for k in 1..acf.len() {
        out.push(var.map(|v| z * (v / n).sqrt()));
        var = match (var, acf[k]) {
            (Some(v), Some(r)) => Some(v + 2.0 * r * r),
            _ => None,
        };
    }
    out
}

fn combine(
    acf: &[Option<f64>],
    interval: &[Option<f64>],
    op: impl Fn(f64, f64) -> f64,
) -> Vec<Option<f64>> {
    acf.iter()
        .zip(interval.iter())
        .map(|(a, w)| match (a, w) {
            (Some(a), Some(w)) => Some(op(*a, *w)),
            _ => None,
        })
        .collect()
}

/// Inverse CDF of the standard normal distribution.
pub fn normal_quantile(p: f64) -> Result<f64> {
    let normal = Normal::new(0.0, 1.0).map_err(|e| {
        EvalError::ComputationError(format!("failed to build standard normal: {}", e))
    })?;
    Ok(normal.inverse_cdf(p))
}

pub(crate) fn validate_max_lags(max_lags: usize) -> Result<usize> {
    if max_lags < 1 {
        return Err(EvalError::invalid_parameter(
            "max_lags",
            max_lags,
            "must be at least 1",
        ));
    }
    Ok(max_lags)
}

pub(crate) fn validate_alpha(alpha: f64) -> Result<f64> {
    if !(alpha > 0.0 && alpha < 1.0) {
        return Err(EvalError::invalid_parameter(
            "alpha",
            alpha,
            "must be between 0 and 1 (exclusive)",
        ));
    }
    Ok(alpha)
}
