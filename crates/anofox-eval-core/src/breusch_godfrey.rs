//! Breusch-Godfrey LM test for serial correlation in residuals.
//!
//! The residual series `e_t` is regressed on an intercept and its own lags
//! `e_{t-1}, ..., e_{t-p}` (pre-sample lags are zero). With `R²` of that
//! auxiliary regression, `LM = n R²` is asymptotically χ²(p) when there is no
//! serial correlation up to lag `p`.

use anofox_regression::prelude::*;
use statrs::distribution::{ChiSquared, ContinuousCDF};
use tracing::{debug, trace};

use crate::acf::validate_max_lags;
use crate::error::{EvalError, Result};
use crate::outcome::{MissingReason, Outcome};
use crate::panel::{EntityKey, Panel};

/// LM statistic and p-value for one series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BreuschGodfreyStatistic {
    pub lm: f64,
    pub p_value: f64,
}

/// Breusch-Godfrey outcome for one entity.
#[derive(Debug, Clone, PartialEq)]
pub struct BreuschGodfreyResult<K> {
    pub entity: K,
    pub lm: Outcome,
    pub p_value: Outcome,
}

/// Run the Breusch-Godfrey test with `max_lags` lags on every entity.
///
/// # Errors
/// `InvalidParameter` if `max_lags < 1`. Entities with `n <= max_lags + 1`
/// are reported as `Missing(InsufficientSamples)`.
pub fn breusch_godfrey<K: EntityKey>(
    panel: &Panel<K>,
    max_lags: usize,
) -> Result<Vec<BreuschGodfreyResult<K>>> {
    validate_max_lags(max_lags)?;
    let chi2 = ChiSquared::new(max_lags as f64).map_err(|e| {
        EvalError::ComputationError(format!("failed to build chi-squared({}): {}", max_lags, e))
    })?;

    let groups = panel.groups();
    debug!(entities = groups.len(), max_lags, "computing breusch-godfrey statistics");

    Ok(groups
        .into_iter()
        .map(|group| {
            let lm = match lm_statistic(&group.values, max_lags) {
                Ok(lm) => Outcome::from_f64(lm),
                Err(EvalError::InsufficientData { needed, got }) => {
                    trace!(entity = ?group.entity, needed, got, "breusch-godfrey skipped");
                    Outcome::Missing(MissingReason::InsufficientSamples { needed, got })
                }
                Err(_) => Outcome::Missing(MissingReason::Undefined),
            };
            BreuschGodfreyResult {
                entity: group.entity.clone(),
                lm,
                p_value: lm.map(|stat| chi2.sf(stat)),
            }
        })
        .collect())
}

/// Breusch-Godfrey test on a single residual series.
pub fn breusch_godfrey_test(residuals: &[f64], max_lags: usize) -> Result<BreuschGodfreyStatistic> {
    validate_max_lags(max_lags)?;
    let lm = lm_statistic(residuals, max_lags)?;
    let chi2 = ChiSquared::new(max_lags as f64).map_err(|e| {
        EvalError::ComputationError(format!("failed to build chi-squared({}): {}", max_lags, e))
    })?;
    Ok(BreuschGodfreyStatistic {
        lm,
        p_value: chi2.sf(lm),
    })
}

/// `n R²` of the auxiliary regression of `e_t` on its first `lags` lags.
fn lm_statistic(residuals: &[f64], lags: usize) -> Result<f64> {
    let n = residuals.len();
    if n <= lags + 1 {
        return Err(EvalError::InsufficientData {
            needed: lags + 2,
            got: n,
        });
    }

    // n R² is scale invariant; normalising keeps the squared sums finite.
    let magnitude = residuals.iter().fold(0.0_f64, |m, e| m.max(e.abs()));
    if magnitude == 0.0 || !magnitude.is_finite() {
        return Ok(f64::NAN);
    }
    let residuals: Vec<f64> = residuals.iter().map(|e| e / magnitude).collect();

    let mean = residuals.iter().sum::<f64>() / n as f64;
    let ss_tot: f64 = residuals.iter().map(|e| (e - mean).powi(2)).sum();
    if ss_tot <= f64::EPSILON * n as f64 {
        return Ok(f64::NAN);
    }

    // Column j holds e_{t-(j+1)}, zero before the start of the series.
    let x_mat = faer::Mat::from_fn(n, lags, |i, j| {
        let lag = j + 1;
        if i >= lag {
            residuals[i - lag]
        } else {
            0.0
        }
    });
    let y_col = faer::Col::from_fn(n, |i| residuals[i]);

    let fitted = OlsRegressor::builder()
        .with_intercept(true)
        .build()
        .fit(&x_mat, &y_col)
        .map_err(|_| EvalError::ComputationError("auxiliary regression failed".to_string()))?;

    let predictions = fitted.predict(&x_mat);
    let ss_res: f64 = (0..n)
        .map(|i| (residuals[i] - predictions[i]).powi(2))
        .sum();

    let r2 = (1.0 - ss_res / ss_tot).clamp(0.0, 1.0);
    Ok(n as f64 * r2)
}
