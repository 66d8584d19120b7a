//! Forecast accuracy metrics and the metric registry.
//!
//! The slice-level functions score one series. The [`Metric`] trait lifts a
//! score to a whole panel (one value per entity), and [`MetricRegistry`]
//! resolves the metric names accepted by the ranking engine, binding the
//! training panel that the scaled metrics need.
//!
//! | Metric | Formula (per entity) |
//! |--------|----------------------|
//! | MAE | mean \|y - ŷ\| |
//! | MAPE | 100 · mean \|y - ŷ\| / \|y\| |
//! | MASE | MAE / mean \|Δy_train\| |
//! | MSE | mean (y - ŷ)² |
//! | Overforecast | mean max(ŷ - y, 0) |
//! | RMSE | √MSE |
//! | RMSSE | RMSE / √mean (Δy_train)² |
//! | sMAPE | 100 · mean 2\|y - ŷ\| / (\|y\| + \|ŷ\|) |
//! | Underforecast | mean max(y - ŷ, 0) |

use std::collections::HashMap;
use std::str::FromStr;

use tracing::debug;

use crate::error::{EvalError, Result};
use crate::outcome::{MissingReason, Outcome};
use crate::panel::{EntityKey, Panel};

/// Calculates Mean Absolute Error between actual and predicted values.
///
/// Average size of the forecast errors, ignoring their sign.
///
/// # Arguments
/// * `actual` - Observed values
/// * `forecast` - Predicted values, paired by position with `actual`
///
/// # Returns
/// The MAE in the units of the series. `InvalidInput` when the slices
/// differ in length, `InsufficientData` when they are empty.
///
/// # Formula
/// MAE = (1/n) * Σ|actual_i - forecast_i|
///
/// # Example
/// ```
/// use anofox_eval_core::metrics::mae;
/// let actual = vec![1.0, 2.0, 3.0];
/// let forecast = vec![1.1, 2.2, 2.8];
/// let error = mae(&actual, &forecast).unwrap();
/// assert!((error - 0.166).abs() < 0.01);
/// ```
pub fn mae(actual: &[f64], forecast: &[f64]) -> Result<f64> {
    validate_inputs(actual, forecast)?;
    let sum: f64 = actual
        .iter()
        .zip(forecast.iter())
        .map(|(a, f)| (a - f).abs())
        .sum();
    Ok(sum / actual.len() as f64)
}

/// Calculates Mean Squared Error between actual and predicted values.
///
/// Squaring weights large misses more than small ones.
///
/// # Arguments
/// * `actual` - Observed values
/// * `forecast` - Predicted values, paired by position with `actual`
///
/// # Returns
/// The MSE in squared units of the series.
///
/// # Formula
/// MSE = (1/n) * Σ(actual_i - forecast_i)²
pub fn mse(actual: &[f64], forecast: &[f64]) -> Result<f64> {
    validate_inputs(actual, forecast)?;
    let sum: f64 = actual
        .iter()
        .zip(forecast.iter())
        .map(|(a, f)| (a - f).powi(2))
        .sum();
    Ok(sum / actual.len() as f64)
}

/// Calculates Root Mean Squared Error between actual and predicted values.
///
/// # Formula
/// RMSE = √MSE
pub fn rmse(actual: &[f64], forecast: &[f64]) -> Result<f64> {
    Ok(mse(actual, forecast)?.sqrt())
}

/// Calculates Mean Absolute Percentage Error.
///
/// Observations with a zero actual value are skipped. Returns NaN if all
/// actual values are zero.
///
/// # Arguments
/// * `actual` - Observed values; zeros are excluded from the average
/// * `forecast` - Predicted values, paired by position with `actual`
///
/// # Returns
/// The MAPE as a percentage (0 for a perfect forecast, unbounded above).
///
/// # Formula
/// MAPE = (100/m) * Σ|actual_i - forecast_i| / |actual_i| over the m
/// non-zero actuals
pub fn mape(actual: &[f64], forecast: &[f64]) -> Result<f64> {
    validate_inputs(actual, forecast)?;
    let sum: f64 = actual
        .iter()
        .zip(forecast.iter())
        .filter(|(a, _)| a.abs() > f64::EPSILON)
        .map(|(a, f)| ((a - f) / a).abs())
        .sum();
    let count = actual.iter().filter(|a| a.abs() > f64::EPSILON).count();
    if count == 0 {
        return Ok(f64::NAN);
    }
    Ok(sum / count as f64 * 100.0)
}

/// Calculates Symmetric Mean Absolute Percentage Error.
///
/// Over- and under-forecasts of the same size score the same. Pairs where
/// both values are zero are skipped; if every pair is skipped the forecast
/// is perfect and the result is 0.
///
/// # Arguments
/// * `actual` - Observed values
/// * `forecast` - Predicted values, paired by position with `actual`
///
/// # Returns
/// The sMAPE as a percentage in `[0, 200]`.
///
/// # Formula
/// sMAPE = (100/m) * Σ 2|actual_i - forecast_i| / (|actual_i| + |forecast_i|)
pub fn smape(actual: &[f64], forecast: &[f64]) -> Result<f64> {
    validate_inputs(actual, forecast)?;
    let (sum, count) = actual
        .iter()
        .zip(forecast.iter())
        .filter(|(a, f)| a.abs() + f.abs() > f64::EPSILON)
        .fold((0.0, 0usize), |(sum, count), (a, f)| {
            (sum + 2.0 * (a - f).abs() / (a.abs() + f.abs()), count + 1)
        });
    if count == 0 {
        // Both series are all zeros: a perfect forecast.
        return Ok(0.0);
    }
    Ok(sum / count as f64 * 100.0)
}

/// Mean Absolute Scaled Error.
///
/// MAE of the forecast divided by the in-sample MAE of the one-step naive
/// forecast on the training series. Values below 1 beat the naive forecast.
///
/// # Arguments
/// * `actual` - Observed values over the forecast horizon
/// * `forecast` - Predicted values, paired by position with `actual`
/// * `train` - In-sample history used for the scale (at least 2 values)
///
/// # Returns
/// The unitless MASE; NaN when the training series is constant.
///
/// # Formula
/// MASE = MAE / ((1/(T-1)) * Σ|train_t - train_{t-1}|)
pub fn mase(actual: &[f64], forecast: &[f64], train: &[f64]) -> Result<f64> {
    let forecast_mae = mae(actual, forecast)?;
    let scale = naive_scale(train, |d| d.abs())?;
    if scale.abs() < f64::EPSILON {
        return Ok(f64::NAN);
    }
    Ok(forecast_mae / scale)
}

/// Root Mean Squared Scaled Error.
///
/// RMSE of the forecast divided by the in-sample RMSE of the one-step naive
/// forecast on the training series.
///
/// # Arguments
/// * `actual` - Observed values over the forecast horizon
/// * `forecast` - Predicted values, paired by position with `actual`
/// * `train` - In-sample history used for the scale (at least 2 values)
///
/// # Returns
/// The unitless RMSSE; NaN when the training series is constant.
///
/// # Formula
/// RMSSE = √(MSE / ((1/(T-1)) * Σ(train_t - train_{t-1})²))
pub fn rmsse(actual: &[f64], forecast: &[f64], train: &[f64]) -> Result<f64> {
    let forecast_mse = mse(actual, forecast)?;
    let scale = naive_scale(train, |d| d * d)?;
    if scale.abs() < f64::EPSILON {
        return Ok(f64::NAN);
    }
    Ok((forecast_mse / scale).sqrt())
}

/// Mean amount by which the forecast exceeds the actual value.
///
/// Under-forecasts contribute 0, so `overforecast + underforecast == mae`.
///
/// # Formula
/// (1/n) * Σ max(forecast_i - actual_i, 0)
pub fn overforecast(actual: &[f64], forecast: &[f64]) -> Result<f64> {
    validate_inputs(actual, forecast)?;
    let sum: f64 = actual
        .iter()
        .zip(forecast.iter())
        .map(|(a, f)| (f - a).max(0.0))
        .sum();
    Ok(sum / actual.len() as f64)
}

/// Mean amount by which the forecast falls short of the actual value.
///
/// # Formula
/// (1/n) * Σ max(actual_i - forecast_i, 0)
pub fn underforecast(actual: &[f64], forecast: &[f64]) -> Result<f64> {
    validate_inputs(actual, forecast)?;
    let sum: f64 = actual
        .iter()
        .zip(forecast.iter())
        .map(|(a, f)| (a - f).max(0.0))
        .sum();
    Ok(sum / actual.len() as f64)
}

fn naive_scale(train: &[f64], loss: impl Fn(f64) -> f64) -> Result<f64> {
    if train.len() < 2 {
        return Err(EvalError::InsufficientData {
            needed: 2,
            got: train.len(),
        });
    }
    let sum: f64 = train.windows(2).map(|w| loss(w[1] - w[0])).sum();
    Ok(sum / (train.len() - 1) as f64)
}

fn validate_inputs(actual: &[f64], forecast: &[f64]) -> Result<()> {
    if actual.len() != forecast.len() {
        return Err(EvalError::InvalidInput(format!(
            "Actual and forecast arrays must have the same length: {} vs {}",
            actual.len(),
            forecast.len()
        )));
    }
    if actual.is_empty() {
        return Err(EvalError::InsufficientData { needed: 1, got: 0 });
    }
    Ok(())
}

/// Score of one entity under a metric.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityScore<K> {
    pub entity: K,
    pub score: Outcome,
}

/// A panel-level accuracy metric: one score per entity of `y_true`.
///
/// Implementations pair `y_true` and `y_pred` on `(entity, time)` and
/// return scores in `y_true`'s grouping order. Entities without any
/// matching prediction should be reported as `Missing(Unmatched)`.
pub trait Metric<K: EntityKey> {
    /// Name of the score column.
    fn name(&self) -> &str;

    fn score(&self, y_true: &Panel<K>, y_pred: &Panel<K>) -> Result<Vec<EntityScore<K>>>;
}

/// Built-in accuracy metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccuracyMetric {
    Mae,
    Mape,
    Mase,
    Mse,
    Overforecast,
    Rmse,
    Rmsse,
    Smape,
    Underforecast,
}

impl AccuracyMetric {
    pub const ALL: [AccuracyMetric; 9] = [
        AccuracyMetric::Mae,
        AccuracyMetric::Mape,
        AccuracyMetric::Mase,
        AccuracyMetric::Mse,
        AccuracyMetric::Overforecast,
        AccuracyMetric::Rmse,
        AccuracyMetric::Rmsse,
        AccuracyMetric::Smape,
        AccuracyMetric::Underforecast,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            AccuracyMetric::Mae => "mae",
            AccuracyMetric::Mape => "mape",
            AccuracyMetric::Mase => "mase",
            AccuracyMetric::Mse => "mse",
            AccuracyMetric::Overforecast => "overforecast",
            AccuracyMetric::Rmse => "rmse",
            AccuracyMetric::Rmsse => "rmsse",
            AccuracyMetric::Smape => "smape",
            AccuracyMetric::Underforecast => "underforecast",
        }
    }

    /// Whether the metric is scaled by the training series.
    pub fn requires_training(&self) -> bool {
        matches!(self, AccuracyMetric::Mase | AccuracyMetric::Rmsse)
    }

    /// Score a single series. `train` is ignored by unscaled metrics.
    pub fn evaluate(&self, actual: &[f64], forecast: &[f64], train: Option<&[f64]>) -> Result<f64> {
        match self {
            AccuracyMetric::Mae => mae(actual, forecast),
            AccuracyMetric::Mape => mape(actual, forecast),
            AccuracyMetric::Mse => mse(actual, forecast),
            AccuracyMetric::Overforecast => overforecast(actual, forecast),
            AccuracyMetric::Rmse => rmse(actual, forecast),
            AccuracyMetric::Smape => smape(actual, forecast),
            AccuracyMetric::Underforecast => underforecast(actual, forecast),
            AccuracyMetric::Mase | AccuracyMetric::Rmsse => {
                let train = train.ok_or_else(|| self.missing_training())?;
                if *self == AccuracyMetric::Mase {
                    mase(actual, forecast, train)
                } else {
                    rmsse(actual, forecast, train)
                }
            }
        }
    }

    fn missing_training(&self) -> EvalError {
        EvalError::invalid_parameter("y_train", "None", format!("{} requires y_train", self.name()))
    }
}

impl FromStr for AccuracyMetric {
    type Err = EvalError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        AccuracyMetric::ALL
            .iter()
            .find(|m| m.name().eq_ignore_ascii_case(s))
            .copied()
            .ok_or_else(|| {
                EvalError::invalid_parameter(
                    "metric",
                    s,
                    format!(
                        "unknown metric, expected one of: {}",
                        MetricRegistry::<String>::available().join(", ")
                    ),
                )
            })
    }
}

impl std::fmt::Display for AccuracyMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A built-in metric with its training panel bound.
#[derive(Debug, Clone, Copy)]
pub struct BoundMetric<'a, K> {
    kind: AccuracyMetric,
    y_train: Option<&'a Panel<K>>,
}

impl<K> BoundMetric<'_, K> {
    pub fn kind(&self) -> AccuracyMetric {
        self.kind
    }
}

impl<K: EntityKey> Metric<K> for BoundMetric<'_, K> {
    fn name(&self) -> &str {
        self.kind.name()
    }

    fn score(&self, y_true: &Panel<K>, y_pred: &Panel<K>) -> Result<Vec<EntityScore<K>>> {
        let train_groups = self.y_train.map(|panel| panel.groups());
        let train_lookup: Option<HashMap<&K, &[f64]>> = train_groups.as_ref().map(|groups| {
            groups
                .iter()
                .map(|g| (g.entity, g.values.as_slice()))
                .collect()
        });

        let aligned = y_true.align(y_pred);
        debug!(metric = self.kind.name(), entities = aligned.len(), "scoring panel");

        aligned
            .into_iter()
            .map(|series| {
                let score = if series.actual.is_empty() {
                    Outcome::Missing(MissingReason::Unmatched)
                } else if self.kind.requires_training() {
                    match train_lookup.as_ref().and_then(|t| t.get(series.entity).copied()) {
                        Some(train) => Outcome::from_result(self.kind.evaluate(
                            &series.actual,
                            &series.forecast,
                            Some(train),
                        ))?,
                        None => Outcome::Missing(MissingReason::Unmatched),
                    }
                } else {
                    Outcome::from_result(self.kind.evaluate(&series.actual, &series.forecast, None))?
                };
                Ok(EntityScore {
                    entity: series.entity.clone(),
                    score,
                })
            })
            .collect()
    }
}

/// Resolves metric names to bound [`Metric`] implementations.
#[derive(Debug, Clone, Copy)]
pub struct MetricRegistry<'a, K> {
    y_train: Option<&'a Panel<K>>,
}

impl<K> Default for MetricRegistry<'_, K> {
    fn default() -> Self {
        Self { y_train: None }
    }
}

impl<'a, K> MetricRegistry<'a, K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry that binds `y_train` into the scaled metrics.
    pub fn with_training(y_train: &'a Panel<K>) -> Self {
        Self {
            y_train: Some(y_train),
        }
    }

    /// Names accepted by [`MetricRegistry::get`].
    pub fn available() -> Vec<&'static str> {
        AccuracyMetric::ALL.iter().map(|m| m.name()).collect()
    }

    /// Bind a metric.
    ///
    /// # Errors
    /// `InvalidParameter` if the metric needs a training panel and the
    /// registry has none.
    pub fn bind(&self, kind: AccuracyMetric) -> Result<BoundMetric<'a, K>> {
        if kind.requires_training() && self.y_train.is_none() {
            return Err(kind.missing_training());
        }
        Ok(BoundMetric {
            kind,
            y_train: self.y_train,
        })
    }

    /// Look a metric up by name and bind it.
    pub fn get(&self, name: &str) -> Result<BoundMetric<'a, K>> {
        self.bind(name.parse()?)
    }
}
