//! D'Agostino-Pearson omnibus normality test.
//!
//! The statistic combines a skewness z-score (D'Agostino, 1970) and a
//! kurtosis z-score (Anscombe & Glynn, 1983):
//!
//! ```text
//! K² = Z_skew² + Z_kurt²  ~  χ²(2) under normality
//! ```

use statrs::distribution::{ChiSquared, ContinuousCDF};
use tracing::{debug, trace};

use crate::error::{EvalError, Result};
use crate::outcome::{MissingReason, Outcome};
use crate::panel::{EntityKey, Panel};

/// Smallest sample the skewness z-score is defined for.
pub const NORMALITY_MIN_SAMPLES: usize = 8;

/// Omnibus statistic and its p-value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalityStatistic {
    /// K² statistic
    pub statistic: f64,
    /// Survival function of χ²(2) at the statistic
    pub p_value: f64,
}

/// Normality test outcome for one entity.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalityResult<K> {
    pub entity: K,
    /// K² statistic, or why it was skipped
    pub statistic: Outcome,
    /// p-value, missing whenever the statistic is
    pub p_value: Outcome,
}

/// Run the normality test on every entity of a panel.
///
/// An entity with fewer than [`NORMALITY_MIN_SAMPLES`] observations is
/// reported as `Missing(InsufficientSamples)`; a constant one as
/// `Missing(Undefined)`. Neither aborts the batch.
pub fn normality_test<K: EntityKey>(panel: &Panel<K>) -> Result<Vec<NormalityResult<K>>> {
    let groups = panel.groups();
    debug!(entities = groups.len(), "computing normality statistics");

    groups
        .into_iter()
        .map(|group| {
            let (statistic, p_value) = match dagostino_pearson(&group.values) {
                Ok(stat) => (
                    Outcome::from_f64(stat.statistic),
                    Outcome::from_f64(stat.p_value),
                ),
                Err(EvalError::InsufficientData { needed, got }) => {
                    trace!(entity = ?group.entity, needed, got, "normality test skipped");
                    let missing =
                        Outcome::Missing(MissingReason::InsufficientSamples { needed, got });
                    (missing, missing)
                }
                Err(e) => return Err(e),
            };
            Ok(NormalityResult {
                entity: group.entity.clone(),
                statistic,
                p_value,
            })
        })
        .collect()
}

/// D'Agostino-Pearson K² test on a single sample.
///
/// An exactly symmetric sample (`g1 == 0`) has a skewness z-score of 0, so
/// only the kurtosis term contributes. scipy's `skewtest` instead replaces a
/// zero transformed skewness by 1, which inflates K² for such samples; that
/// substitution is not reproduced here.
///
/// # Errors
/// `InsufficientData` below [`NORMALITY_MIN_SAMPLES`] observations.
/// A constant sample yields a NaN statistic rather than an error.
pub fn dagostino_pearson(values: &[f64]) -> Result<NormalityStatistic> {
    let n = values.len();
    if n < NORMALITY_MIN_SAMPLES {
        return Err(EvalError::InsufficientData {
            needed: NORMALITY_MIN_SAMPLES,
            got: n,
        });
    }

    let moments = CentralMoments::new(values);
    let z_skew = skew_zscore(moments.skewness(), n as f64);
    let z_kurt = kurtosis_zscore(moments.kurtosis(), n as f64);
    let statistic = z_skew * z_skew + z_kurt * z_kurt;

    let chi2 = ChiSquared::new(2.0).map_err(|e| {
        EvalError::ComputationError(format!("failed to build chi-squared(2): {}", e))
    })?;
    let p_value = if statistic.is_finite() {
        chi2.sf(statistic)
    } else {
        f64::NAN
    };

    Ok(NormalityStatistic { statistic, p_value })
}

/// Population (biased) central moments m2, m3, m4.
struct CentralMoments {
    m2: f64,
    m3: f64,
    m4: f64,
}

impl CentralMoments {
    fn new(values: &[f64]) -> Self {
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let (mut m2, mut m3, mut m4) = (0.0, 0.0, 0.0);
        for v in values {
            let d = v - mean;
            let d2 = d * d;
            m2 += d2;
            m3 += d2 * d;
            m4 += d2 * d2;
        }
        Self {
            m2: m2 / n,
            m3: m3 / n,
            m4: m4 / n,
        }
    }

    /// Sample skewness g1 = m3 / m2^1.5 (NaN for zero variance).
    fn skewness(&self) -> f64 {
        if self.m2 <= 0.0 {
            return f64::NAN;
        }
        self.m3 / self.m2.powf(1.5)
    }

    /// Pearson kurtosis b2 = m4 / m2² (3 for a normal distribution).
    fn kurtosis(&self) -> f64 {
        if self.m2 <= 0.0 {
            return f64::NAN;
        }
        self.m4 / (self.m2 * self.m2)
    }
}

/// Johnson SU transform of the sample skewness; 0 when `g1 == 0`.
fn skew_zscore(g1: f64, n: f64) -> f64 {
    let y = g1 * ((n + 1.0) * (n + 3.0) / (6.0 * (n - 2.0))).sqrt();
    let beta2 = 3.0 * (n * n + 27.0 * n - 70.0) * (n + 1.0) * (n + 3.0)
        / ((n - 2.0) * (n + 5.0) * (n + 7.0) * (n + 9.0));
    let w2 = -1.0 + (2.0 * (beta2 - 1.0)).sqrt();
    let delta = 1.0 / (0.5 * w2.ln()).sqrt();
    let alpha = (2.0 / (w2 - 1.0)).sqrt();
    let ratio = y / alpha;
    delta * (ratio + (ratio * ratio + 1.0).sqrt()).ln()
}

fn kurtosis_zscore(b2: f64, n: f64) -> f64 {
    let expected = 3.0 * (n - 1.0) / (n + 1.0);
    let variance =
        24.0 * n * (n - 2.0) * (n - 3.0) / ((n + 1.0) * (n + 1.0) * (n + 3.0) * (n + 5.0));
    let x = (b2 - expected) / variance.sqrt();

    let sqrt_beta1 = 6.0 * (n * n - 5.0 * n + 2.0) / ((n + 7.0) * (n + 9.0))
        * (6.0 * (n + 3.0) * (n + 5.0) / (n * (n - 2.0) * (n - 3.0))).sqrt();
    let a = 6.0
        + 8.0 / sqrt_beta1 * (2.0 / sqrt_beta1 + (1.0 + 4.0 / (sqrt_beta1 * sqrt_beta1)).sqrt());

    let term1 = 1.0 - 2.0 / (9.0 * a);
    let denom = 1.0 + x * (2.0 / (a - 4.0)).sqrt();
    if denom == 0.0 {
        return f64::NAN;
    }
    let term2 = denom.signum() * ((1.0 - 2.0 / a) / denom.abs()).cbrt();
    (term1 - term2) / (2.0 / (9.0 * a)).sqrt()
}
