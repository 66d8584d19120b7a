//! Ranking entities by statistics, accuracy, residual diagnostics or FVA.
//!
//! A sort criterion belongs to one of four families:
//!
//! - **Summary statistics** (`mean`, `median`, `std`, `cv`) of `y_true`
//! - **Accuracy metrics** (`mae`, `mape`, `mase`, `mse`, `overforecast`,
//!   `rmse`, `rmsse`, `smape`, `underforecast`) of `y_pred` against `y_true`
//! - **Residual diagnostics** (`bias`, `abs_bias`, `normality`,
//!   `autocor_lb`, `autocor_bg`) of a residual panel
//! - **Forecast value added** (`naive`, `snaive`, `linear`,
//!   `linear_scaled`): uplift of `y_pred` over a benchmark forecast
//!
//! Rankings are stable: entities with equal values keep the order in which
//! they first appear in the input panel. Missing values sort last in both
//! directions.
//!
//! # Example
//!
//! ```
//! use anofox_eval_core::{rank_forecasts, Panel};
//!
//! let y_true = Panel::from_series(vec![
//!     ("A", vec![4.0, 6.0]),
//!     ("B", vec![1.0, 1.0]),
//!     ("C", vec![3.0, 3.0]),
//! ])
//! .unwrap();
//! let ranked = rank_forecasts(&y_true, &y_true, "mean", None, false).unwrap();
//! assert_eq!(ranked.entities(), vec![&"B", &"C", &"A"]);
//! ```

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::str::FromStr;

use tracing::debug;

use crate::acf::validate_max_lags;
use crate::breusch_godfrey::breusch_godfrey;
use crate::error::{EvalError, Result};
use crate::ljung_box::ljung_box;
use crate::metrics::{AccuracyMetric, Metric, MetricRegistry};
use crate::normality::normality_test;
use crate::outcome::{MissingReason, Outcome};
use crate::panel::{EntityKey, Panel};
use crate::stats::{mean, summary_statistic, SummaryStat};

/// Default number of lags for the autocorrelation diagnostics.
pub const DEFAULT_MAX_LAGS: usize = 12;

/// Options for residual-diagnostic rankings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResidualOptions {
    /// Lag depth of the Ljung-Box and Breusch-Godfrey statistics
    pub max_lags: usize,
}

impl Default for ResidualOptions {
    fn default() -> Self {
        Self {
            max_lags: DEFAULT_MAX_LAGS,
        }
    }
}

impl ResidualOptions {
    pub fn validate(&self) -> Result<()> {
        validate_max_lags(self.max_lags).map(|_| ())
    }
}

/// Residual diagnostics usable as sort criteria.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResidualDiagnostic {
    /// |mean residual|
    Bias,
    /// |mean residual| (alias kept for callers that spell it out)
    AbsBias,
    /// D'Agostino-Pearson K² statistic
    Normality,
    /// Ljung-Box Q at `max_lags`
    AutocorLb,
    /// Breusch-Godfrey LM statistic with `max_lags` lags
    AutocorBg,
}

impl ResidualDiagnostic {
    pub fn name(&self) -> &'static str {
        match self {
            ResidualDiagnostic::Bias => "bias",
            ResidualDiagnostic::AbsBias => "abs_bias",
            ResidualDiagnostic::Normality => "normality",
            ResidualDiagnostic::AutocorLb => "autocor_lb",
            ResidualDiagnostic::AutocorBg => "autocor_bg",
        }
    }
}

/// Benchmark forecasts for forecast-value-added rankings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FvaBenchmark {
    Naive,
    SeasonalNaive,
    Linear,
    LinearScaled,
}

impl FvaBenchmark {
    pub fn name(&self) -> &'static str {
        match self {
            FvaBenchmark::Naive => "naive",
            FvaBenchmark::SeasonalNaive => "snaive",
            FvaBenchmark::Linear => "linear",
            FvaBenchmark::LinearScaled => "linear_scaled",
        }
    }
}

/// A sort criterion parsed from its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortCriterion {
    Summary(SummaryStat),
    Accuracy(AccuracyMetric),
    Residual(ResidualDiagnostic),
    Fva(FvaBenchmark),
}

impl SortCriterion {
    pub fn name(&self) -> &'static str {
        match self {
            SortCriterion::Summary(s) => s.name(),
            SortCriterion::Accuracy(m) => m.name(),
            SortCriterion::Residual(r) => r.name(),
            SortCriterion::Fva(b) => b.name(),
        }
    }
}

impl FromStr for SortCriterion {
    type Err = EvalError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let criterion = match s {
            "mean" => SortCriterion::Summary(SummaryStat::Mean),
            "median" => SortCriterion::Summary(SummaryStat::Median),
            "std" => SortCriterion::Summary(SummaryStat::Std),
            "cv" => SortCriterion::Summary(SummaryStat::Cv),
            "bias" => SortCriterion::Residual(ResidualDiagnostic::Bias),
            "abs_bias" => SortCriterion::Residual(ResidualDiagnostic::AbsBias),
            "normality" => SortCriterion::Residual(ResidualDiagnostic::Normality),
            "autocor_lb" => SortCriterion::Residual(ResidualDiagnostic::AutocorLb),
            "autocor_bg" => SortCriterion::Residual(ResidualDiagnostic::AutocorBg),
            "naive" => SortCriterion::Fva(FvaBenchmark::Naive),
            "snaive" => SortCriterion::Fva(FvaBenchmark::SeasonalNaive),
            "linear" => SortCriterion::Fva(FvaBenchmark::Linear),
            "linear_scaled" => SortCriterion::Fva(FvaBenchmark::LinearScaled),
            other => match other.parse::<AccuracyMetric>() {
                Ok(metric) => SortCriterion::Accuracy(metric),
                Err(_) => return Err(EvalError::UnknownSortCriterion(other.to_string())),
            },
        };
        Ok(criterion)
    }
}

/// Caller-supplied benchmark forecasts, one panel per benchmark model.
#[derive(Debug, Clone)]
pub struct BenchmarkForecasts<K> {
    panels: HashMap<FvaBenchmark, Panel<K>>,
}

impl<K> Default for BenchmarkForecasts<K> {
    fn default() -> Self {
        Self {
            panels: HashMap::new(),
        }
    }
}

impl<K: EntityKey> BenchmarkForecasts<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, benchmark: FvaBenchmark, y_pred_bench: Panel<K>) -> Self {
        self.insert(benchmark, y_pred_bench);
        self
    }

    pub fn insert(&mut self, benchmark: FvaBenchmark, y_pred_bench: Panel<K>) {
        self.panels.insert(benchmark, y_pred_bench);
    }

    /// Predictions of a benchmark model.
    ///
    /// # Errors
    /// `InvalidParameter` if no predictions were supplied for it.
    pub fn get(&self, benchmark: FvaBenchmark) -> Result<&Panel<K>> {
        self.panels.get(&benchmark).ok_or_else(|| {
            EvalError::invalid_parameter(
                "benchmark",
                benchmark.name(),
                "no benchmark predictions supplied",
            )
        })
    }
}

/// A sort criterion together with the data it is evaluated on.
pub enum Criterion<'a, K: EntityKey> {
    /// Summary statistic of the actual values.
    Summary {
        stat: SummaryStat,
        y_true: &'a Panel<K>,
    },
    /// Accuracy of `y_pred` under a metric (which carries any training data).
    Metric {
        metric: &'a dyn Metric<K>,
        y_true: &'a Panel<K>,
        y_pred: &'a Panel<K>,
    },
    /// Diagnostic statistic of a residual panel.
    Residual {
        diagnostic: ResidualDiagnostic,
        y_resids: &'a Panel<K>,
        options: ResidualOptions,
    },
    /// Uplift of `y_pred` over a benchmark; sMAPE unless `scoring` is set.
    Fva {
        benchmark: FvaBenchmark,
        y_true: &'a Panel<K>,
        y_pred: &'a Panel<K>,
        benchmarks: &'a BenchmarkForecasts<K>,
        scoring: Option<&'a dyn Metric<K>>,
    },
}

impl<K: EntityKey> Criterion<'_, K> {
    /// Label of the value column in the ranked table.
    pub fn name(&self) -> String {
        match self {
            Criterion::Summary { stat, .. } => stat.name().to_string(),
            Criterion::Metric { metric, .. } => metric.name().to_string(),
            Criterion::Residual { diagnostic, .. } => diagnostic.name().to_string(),
            Criterion::Fva { benchmark, .. } => benchmark.name().to_string(),
        }
    }
}

/// One row of a ranked table.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedEntity<K> {
    pub entity: K,
    pub value: Outcome,
}

/// Entities sorted by one criterion.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedTable<K> {
    /// Name of the value column
    pub criterion: String,
    pub rows: Vec<RankedEntity<K>>,
}

impl<K> RankedTable<K> {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn entities(&self) -> Vec<&K> {
        self.rows.iter().map(|r| &r.entity).collect()
    }

    pub fn values(&self) -> Vec<Option<f64>> {
        self.rows.iter().map(|r| r.value.value()).collect()
    }
}

/// Forecast value added of one entity.
#[derive(Debug, Clone, PartialEq)]
pub struct UpliftRecord<K> {
    pub entity: K,
    /// Score of the candidate forecast
    pub score: Outcome,
    /// Score of the benchmark forecast
    pub bench_score: Outcome,
    /// `bench_score - score`
    pub uplift: Outcome,
    /// `uplift > 0`; false when the uplift is missing
    pub has_uplift: bool,
}

/// Rank entities by a criterion.
///
/// # Arguments
/// * `criterion` - What to sort by, with the panels it needs
/// * `descending` - Sort from largest to smallest instead of ascending
///
/// # Returns
/// `(entity, value)` rows, stably sorted, missing values last.
pub fn rank<K: EntityKey>(criterion: Criterion<'_, K>, descending: bool) -> Result<RankedTable<K>> {
    let name = criterion.name();
    debug!(criterion = %name, descending, "ranking entities");

    let values: Vec<(K, Outcome)> = match criterion {
        Criterion::Summary { stat, y_true } => summary_statistic(y_true, stat),
        Criterion::Metric {
            metric,
            y_true,
            y_pred,
        } => metric
            .score(y_true, y_pred)?
            .into_iter()
            .map(|s| (s.entity, s.score))
            .collect(),
        Criterion::Residual {
            diagnostic,
            y_resids,
            options,
        } => residual_diagnostic(y_resids, diagnostic, &options)?,
        Criterion::Fva {
            benchmark,
            y_true,
            y_pred,
            benchmarks,
            scoring,
        } => uplift_records(y_true, y_pred, benchmarks.get(benchmark)?, scoring)?
            .into_iter()
            .map(|r| (r.entity, r.uplift))
            .collect(),
    };

    Ok(RankedTable {
        criterion: name,
        rows: sort_by_outcome(values, descending)
            .into_iter()
            .map(|(entity, value)| RankedEntity { entity, value })
            .collect(),
    })
}

/// Rank forecasts by a summary statistic of `y_true` or an accuracy metric.
///
/// `y_train` is required for `mase` and `rmsse`.
///
/// # Errors
/// `UnknownSortCriterion` for names outside the summary and accuracy
/// families; `InvalidParameter` if a scaled metric lacks `y_train`.
pub fn rank_forecasts<K: EntityKey>(
    y_true: &Panel<K>,
    y_pred: &Panel<K>,
    sort_by: &str,
    y_train: Option<&Panel<K>>,
    descending: bool,
) -> Result<RankedTable<K>> {
    match sort_by.parse::<SortCriterion>()? {
        SortCriterion::Summary(stat) => rank(Criterion::Summary { stat, y_true }, descending),
        SortCriterion::Accuracy(kind) => {
            let registry = match y_train {
                Some(train) => MetricRegistry::with_training(train),
                None => MetricRegistry::new(),
            };
            let metric = registry.bind(kind)?;
            rank(
                Criterion::Metric {
                    metric: &metric,
                    y_true,
                    y_pred,
                },
                descending,
            )
        }
        other => Err(EvalError::UnknownSortCriterion(format!(
            "{} is not a forecast criterion",
            other.name()
        ))),
    }
}

/// Rank entities by a diagnostic statistic of their residuals.
///
/// # Errors
/// `UnknownSortCriterion` for names outside the residual family;
/// `InvalidParameter` for invalid options.
pub fn rank_residuals<K: EntityKey>(
    y_resids: &Panel<K>,
    sort_by: &str,
    options: ResidualOptions,
    descending: bool,
) -> Result<RankedTable<K>> {
    match sort_by.parse::<SortCriterion>()? {
        SortCriterion::Residual(diagnostic) => rank(
            Criterion::Residual {
                diagnostic,
                y_resids,
                options,
            },
            descending,
        ),
        other => Err(EvalError::UnknownSortCriterion(format!(
            "{} is not a residual criterion",
            other.name()
        ))),
    }
}

/// Forecast value added of `y_pred` over `y_pred_bench`, sorted by uplift.
///
/// Both forecasts are scored against `y_true` with `scoring` (sMAPE by
/// default) and `uplift = bench_score - score`, so a positive uplift means
/// the candidate beats the benchmark.
///
/// # Errors
/// `JoinMismatch` if `y_pred` or `y_pred_bench` contains an entity that
/// does not occur in `y_true`. Entities of `y_true` that either forecast
/// does not cover get a missing uplift and `has_uplift == false`.
pub fn rank_fva<K: EntityKey>(
    y_true: &Panel<K>,
    y_pred: &Panel<K>,
    y_pred_bench: &Panel<K>,
    scoring: Option<&dyn Metric<K>>,
    descending: bool,
) -> Result<Vec<UpliftRecord<K>>> {
    let records = uplift_records(y_true, y_pred, y_pred_bench, scoring)?;
    let keyed: Vec<(UpliftRecord<K>, Outcome)> = records
        .into_iter()
        .map(|r| {
            let uplift = r.uplift;
            (r, uplift)
        })
        .collect();
    Ok(sort_by_outcome(keyed, descending)
        .into_iter()
        .map(|(record, _)| record)
        .collect())
}

fn uplift_records<K: EntityKey>(
    y_true: &Panel<K>,
    y_pred: &Panel<K>,
    y_pred_bench: &Panel<K>,
    scoring: Option<&dyn Metric<K>>,
) -> Result<Vec<UpliftRecord<K>>> {
    let known: HashSet<&K> = y_true.entity().iter().collect();
    for entity in y_pred.entities().into_iter().chain(y_pred_bench.entities()) {
        if !known.contains(entity) {
            return Err(EvalError::JoinMismatch {
                entity: format!("{:?}", entity),
            });
        }
    }

    let default_metric = MetricRegistry::<K>::new().bind(AccuracyMetric::Smape)?;
    let scoring: &dyn Metric<K> = scoring.unwrap_or(&default_metric);
    debug!(metric = scoring.name(), "computing forecast value added");

    let scores = scoring.score(y_true, y_pred)?;
    let bench_scores: HashMap<K, Outcome> = scoring
        .score(y_true, y_pred_bench)?
        .into_iter()
        .map(|s| (s.entity, s.score))
        .collect();

    Ok(scores
        .into_iter()
        .map(|s| {
            let bench_score = bench_scores
                .get(&s.entity)
                .copied()
                .unwrap_or(Outcome::Missing(MissingReason::Unmatched));
            let uplift = match (bench_score, s.score) {
                (Outcome::Value(bench), Outcome::Value(score)) => Outcome::from_f64(bench - score),
                (Outcome::Missing(reason), _) | (_, Outcome::Missing(reason)) => {
                    Outcome::Missing(reason)
                }
            };
            UpliftRecord {
                has_uplift: uplift.value().is_some_and(|u| u > 0.0),
                entity: s.entity,
                score: s.score,
                bench_score,
                uplift,
            }
        })
        .collect())
}

fn residual_diagnostic<K: EntityKey>(
    y_resids: &Panel<K>,
    diagnostic: ResidualDiagnostic,
    options: &ResidualOptions,
) -> Result<Vec<(K, Outcome)>> {
    options.validate()?;
    let max_lags = options.max_lags;

    let values = match diagnostic {
        ResidualDiagnostic::Bias | ResidualDiagnostic::AbsBias => y_resids
            .groups()
            .into_iter()
            .map(|g| (g.entity.clone(), Outcome::from_f64(mean(&g.values).abs())))
            .collect(),
        ResidualDiagnostic::Normality => normality_test(y_resids)?
            .into_iter()
            .map(|r| (r.entity, r.statistic))
            .collect(),
        ResidualDiagnostic::AutocorLb => ljung_box(y_resids, max_lags)?
            .into_iter()
            .map(|r| {
                let q = match r.last() {
                    Some(q) => Outcome::from_f64(q),
                    None if r.length < max_lags + 2 => {
                        Outcome::Missing(MissingReason::InsufficientSamples {
                            needed: max_lags + 2,
                            got: r.length,
                        })
                    }
                    None => Outcome::Missing(MissingReason::Undefined),
                };
                (r.entity, q)
            })
            .collect(),
        ResidualDiagnostic::AutocorBg => breusch_godfrey(y_resids, max_lags)?
            .into_iter()
            .map(|r| (r.entity, r.lm))
            .collect(),
    };
    Ok(values)
}

/// Stable sort on an outcome key; missing values always go last.
fn sort_by_outcome<T>(mut rows: Vec<(T, Outcome)>, descending: bool) -> Vec<(T, Outcome)> {
    rows.sort_by(|(_, a), (_, b)| match (a.value(), b.value()) {
        (Some(x), Some(y)) => {
            let ord = x.partial_cmp(&y).unwrap_or(Ordering::Equal);
            if descending {
                ord.reverse()
            } else {
                ord
            }
        }
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn means_panel() -> Panel<&'static str> {
        Panel::from_series(vec![
            ("A", vec![4.0, 6.0]),
            ("B", vec![1.0, 1.0]),
            ("C", vec![2.0, 4.0]),
        ])
        .unwrap()
    }

    #[test]
    fn test_rank_by_mean_ascending_and_descending() {
        let y_true = means_panel();
        let asc = rank_forecasts(&y_true, &y_true, "mean", None, false).unwrap();
        assert_eq!(asc.criterion, "mean");
        assert_eq!(asc.entities(), vec![&"B", &"C", &"A"]);
        assert_eq!(asc.values(), vec![Some(1.0), Some(3.0), Some(5.0)]);

        let desc = rank_forecasts(&y_true, &y_true, "mean", None, true).unwrap();
        assert_eq!(desc.entities(), vec![&"A", &"C", &"B"]);
    }

    #[test]
    fn test_ties_keep_first_appearance_order() {
        let y_true = Panel::from_series(vec![
            ("z", vec![2.0]),
            ("x", vec![1.0]),
            ("y", vec![2.0]),
            ("w", vec![1.0]),
        ])
        .unwrap();
        let asc = rank_forecasts(&y_true, &y_true, "median", None, false).unwrap();
        assert_eq!(asc.entities(), vec![&"x", &"w", &"z", &"y"]);

        let desc = rank_forecasts(&y_true, &y_true, "median", None, true).unwrap();
        assert_eq!(desc.entities(), vec![&"z", &"y", &"x", &"w"]);
    }

    #[test]
    fn test_missing_values_sort_last() {
        let y_true = Panel::from_series(vec![
            ("one", vec![5.0]),
            ("two", vec![1.0, 3.0]),
            ("three", vec![2.0, 2.5]),
        ])
        .unwrap();
        for descending in [false, true] {
            let ranked = rank_forecasts(&y_true, &y_true, "std", None, descending).unwrap();
            assert_eq!(*ranked.entities().last().unwrap(), &"one");
            assert!(ranked.rows[2].value.is_missing());
        }
    }

    #[test]
    fn test_rank_by_metric() {
        let y_true = means_panel();
        let y_pred = Panel::from_series(vec![
            ("A", vec![4.0, 6.0]),
            ("B", vec![3.0, 3.0]),
            ("C", vec![2.0, 5.0]),
        ])
        .unwrap();
        let ranked = rank_forecasts(&y_true, &y_pred, "mae", None, false).unwrap();
        assert_eq!(ranked.entities(), vec![&"A", &"C", &"B"]);
        assert_eq!(ranked.values(), vec![Some(0.0), Some(0.5), Some(2.0)]);
    }

    #[test]
    fn test_rank_by_custom_metric() {
        struct MaxError;
        impl Metric<&'static str> for MaxError {
            fn name(&self) -> &str {
                "max_error"
            }
            fn score(
                &self,
                y_true: &Panel<&'static str>,
                y_pred: &Panel<&'static str>,
            ) -> Result<Vec<crate::metrics::EntityScore<&'static str>>> {
                Ok(y_true
                    .align(y_pred)
                    .into_iter()
                    .map(|s| crate::metrics::EntityScore {
                        entity: *s.entity,
                        score: Outcome::from_f64(
                            s.actual
                                .iter()
                                .zip(s.forecast.iter())
                                .map(|(a, f)| (a - f).abs())
                                .fold(0.0, f64::max),
                        ),
                    })
                    .collect())
            }
        }

        let y_true = means_panel();
        let y_pred = Panel::from_series(vec![
            ("A", vec![4.0, 9.0]),
            ("B", vec![1.0, 2.0]),
            ("C", vec![2.0, 4.0]),
        ])
        .unwrap();
        let ranked = rank(
            Criterion::Metric {
                metric: &MaxError,
                y_true: &y_true,
                y_pred: &y_pred,
            },
            true,
        )
        .unwrap();
        assert_eq!(ranked.criterion, "max_error");
        assert_eq!(ranked.entities(), vec![&"A", &"B", &"C"]);
    }

    #[test]
    fn test_scaled_metric_requires_training() {
        let y_true = means_panel();
        assert!(matches!(
            rank_forecasts(&y_true, &y_true, "rmsse", None, false),
            Err(EvalError::InvalidParameter { .. })
        ));

        let y_train = Panel::from_series(vec![
            ("A", vec![0.0, 1.0, 2.0]),
            ("B", vec![0.0, 2.0, 4.0]),
            ("C", vec![0.0, 4.0, 8.0]),
        ])
        .unwrap();
        let ranked = rank_forecasts(&y_true, &y_true, "mase", Some(&y_train), false).unwrap();
        assert_eq!(ranked.values(), vec![Some(0.0), Some(0.0), Some(0.0)]);
    }

    #[test]
    fn test_unknown_criteria() {
        let y_true = means_panel();
        assert!(matches!(
            rank_forecasts(&y_true, &y_true, "wape", None, false),
            Err(EvalError::UnknownSortCriterion(_))
        ));
        assert!(matches!(
            rank_forecasts(&y_true, &y_true, "normality", None, false),
            Err(EvalError::UnknownSortCriterion(_))
        ));
        assert!(matches!(
            rank_residuals(&y_true, "mae", ResidualOptions::default(), false),
            Err(EvalError::UnknownSortCriterion(_))
        ));
    }

    #[test]
    fn test_criterion_names_parse() {
        for name in [
            "mean", "median", "std", "cv", "mae", "mape", "mase", "mse", "overforecast", "rmse",
            "rmsse", "smape", "underforecast", "bias", "abs_bias", "normality", "autocor_lb",
            "autocor_bg", "naive", "snaive", "linear", "linear_scaled",
        ] {
            let criterion: SortCriterion = name.parse().unwrap();
            assert_eq!(criterion.name(), name);
        }
    }

    #[test]
    fn test_rank_residuals_by_bias() {
        let resids = Panel::from_series(vec![
            ("low", vec![0.1, -0.1, 0.2]),
            ("neg", vec![-2.0, -1.0, -3.0]),
            ("pos", vec![1.0, 1.5, 0.5]),
        ])
        .unwrap();
        let ranked = rank_residuals(&resids, "bias", ResidualOptions::default(), false).unwrap();
        assert_eq!(ranked.entities(), vec![&"low", &"pos", &"neg"]);
        assert_relative_eq!(ranked.rows[2].value.value().unwrap(), 2.0, epsilon = 1e-12);

        let abs = rank_residuals(&resids, "abs_bias", ResidualOptions::default(), false).unwrap();
        assert_eq!(abs.values(), ranked.values());
    }

    #[test]
    fn test_rank_residuals_by_autocorrelation() {
        let mut state: u64 = 2024;
        let white: Vec<f64> = (0..200)
            .map(|_| {
                state = state
                    .wrapping_mul(6364136223846793005)
                    .wrapping_add(1442695040888963407);
                ((state >> 11) as f64 / (1u64 << 53) as f64) - 0.5
            })
            .collect();
        let mut prev = 0.0;
        let persistent: Vec<f64> = white
            .iter()
            .map(|e| {
                prev = 0.8 * prev + e;
                prev
            })
            .collect();
        let resids = Panel::from_series(vec![
            ("persistent", persistent),
            ("short", vec![0.1, -0.3, 0.2]),
            ("white", white),
        ])
        .unwrap();
        let options = ResidualOptions { max_lags: 4 };

        let lb = rank_residuals(&resids, "autocor_lb", options, true).unwrap();
        assert_eq!(lb.entities()[0], &"persistent");
        assert_eq!(
            lb.rows[2].value,
            Outcome::Missing(MissingReason::InsufficientSamples { needed: 6, got: 3 })
        );

        let bg = rank_residuals(&resids, "autocor_bg", options, true).unwrap();
        assert_eq!(bg.entities()[0], &"persistent");
        assert!(bg.rows[2].value.is_missing());
    }

    #[test]
    fn test_rank_residuals_by_normality() {
        let mut state: u64 = 77;
        let mut uniform = || {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            (state >> 11) as f64 / (1u64 << 53) as f64
        };
        // Irwin-Hall sum of twelve uniforms is close to a standard normal.
        let gaussian: Vec<f64> = (0..200)
            .map(|_| (0..12).map(|_| uniform()).sum::<f64>() - 6.0)
            .collect();
        let skewed: Vec<f64> = gaussian.iter().map(|z| z.exp()).collect();

        let resids = Panel::from_series(vec![
            ("gaussian", gaussian),
            ("short", vec![0.4, -0.2]),
            ("skewed", skewed),
        ])
        .unwrap();
        let ranked =
            rank_residuals(&resids, "normality", ResidualOptions::default(), true).unwrap();

        assert_eq!(ranked.criterion, "normality");
        assert_eq!(ranked.entities(), vec![&"skewed", &"gaussian", &"short"]);
        assert!(ranked.rows[0].value.value().unwrap() > ranked.rows[1].value.value().unwrap());
        assert_eq!(
            ranked.rows[2].value,
            Outcome::Missing(MissingReason::InsufficientSamples { needed: 8, got: 2 })
        );
    }

    #[test]
    fn test_residual_options_validated() {
        let resids = means_panel();
        assert!(matches!(
            rank_residuals(&resids, "autocor_lb", ResidualOptions { max_lags: 0 }, false),
            Err(EvalError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_fva_identical_forecasts_have_no_uplift() {
        let y_true = means_panel();
        let y_pred = Panel::from_series(vec![
            ("A", vec![5.0, 5.0]),
            ("B", vec![2.0, 1.0]),
            ("C", vec![3.0, 3.0]),
        ])
        .unwrap();
        let records = rank_fva(&y_true, &y_pred, &y_pred, None, false).unwrap();
        assert_eq!(records.len(), 3);
        for r in &records {
            assert_eq!(r.uplift, Outcome::Value(0.0));
            assert!(!r.has_uplift);
        }
    }

    #[test]
    fn test_fva_uplift_against_benchmark() {
        let y_true = means_panel();
        let y_pred = Panel::from_series(vec![
            ("A", vec![4.0, 6.0]),
            ("B", vec![2.0, 2.0]),
            ("C", vec![2.0, 4.0]),
        ])
        .unwrap();
        let naive = Panel::from_series(vec![
            ("A", vec![3.0, 3.0]),
            ("B", vec![1.0, 1.0]),
            ("C", vec![2.0, 4.0]),
        ])
        .unwrap();
        let registry = MetricRegistry::<&str>::new();
        let bound = registry.get("mae").unwrap();
        let mae: &dyn Metric<&str> = &bound;

        let records = rank_fva(&y_true, &y_pred, &naive, Some(mae), true).unwrap();
        let order: Vec<_> = records.iter().map(|r| r.entity).collect();
        assert_eq!(order, vec!["A", "C", "B"]);
        assert_eq!(records[0].uplift, Outcome::Value(2.0));
        assert!(records[0].has_uplift);
        assert_eq!(records[1].uplift, Outcome::Value(0.0));
        assert!(!records[1].has_uplift);
        assert_eq!(records[2].uplift, Outcome::Value(-1.0));

        let benchmarks = BenchmarkForecasts::new().with(FvaBenchmark::Naive, naive);
        let ranked = rank(
            Criterion::Fva {
                benchmark: FvaBenchmark::Naive,
                y_true: &y_true,
                y_pred: &y_pred,
                benchmarks: &benchmarks,
                scoring: Some(mae),
            },
            false,
        )
        .unwrap();
        assert_eq!(ranked.criterion, "naive");
        assert_eq!(ranked.entities(), vec![&"B", &"C", &"A"]);

        let missing = rank(
            Criterion::Fva {
                benchmark: FvaBenchmark::SeasonalNaive,
                y_true: &y_true,
                y_pred: &y_pred,
                benchmarks: &benchmarks,
                scoring: None,
            },
            false,
        );
        assert!(matches!(missing, Err(EvalError::InvalidParameter { .. })));
    }

    #[test]
    fn test_fva_join_policy() {
        let y_true = means_panel();
        let extra = Panel::from_series(vec![("A", vec![4.0, 6.0]), ("Z", vec![1.0, 1.0])]).unwrap();
        let err = rank_fva(&y_true, &y_true, &extra, None, false).unwrap_err();
        assert_eq!(
            err,
            EvalError::JoinMismatch {
                entity: "\"Z\"".into()
            }
        );

        let partial = Panel::from_series(vec![("B", vec![1.0, 2.0]), ("A", vec![4.0, 6.0])]).unwrap();
        let records = rank_fva(&y_true, &y_true, &partial, None, true).unwrap();
        let last = records.last().unwrap();
        assert_eq!(last.entity, "C");
        assert_eq!(last.uplift, Outcome::Missing(MissingReason::Unmatched));
        assert!(!last.has_uplift);
        assert_eq!(records[0].entity, "B");
        assert!(records[0].has_uplift);
    }
}
