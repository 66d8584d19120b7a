//! Residual diagnostics and forecast ranking for panels of time series.
//!
//! This crate computes per-entity autocorrelation (with Bartlett confidence
//! intervals), Ljung-Box Q-statistics, normality and serial-correlation tests,
//! and ranks entities by summary statistics, accuracy metrics, residual
//! diagnostics or forecast value added.

pub mod acf;
pub mod breusch_godfrey;
pub mod correlation;
pub mod error;
pub mod ljung_box;
pub mod metrics;
pub mod normality;
pub mod outcome;
pub mod panel;
pub mod rank;
pub mod stats;

// Re-exports for convenience
pub use acf::{acf, acf_values, bartlett_intervals, normal_quantile, AcfResult, DEFAULT_ALPHA};
pub use breusch_godfrey::{
    breusch_godfrey, breusch_godfrey_test, BreuschGodfreyResult, BreuschGodfreyStatistic,
};
pub use correlation::lagged_correlation;
pub use error::{EvalError, Result};
pub use ljung_box::{ljung_box, q_statistics, LjungBoxResult};
pub use metrics::{
    mae, mape, mase, mse, overforecast, rmse, rmsse, smape, underforecast, AccuracyMetric,
    BoundMetric, EntityScore, Metric, MetricRegistry,
};
pub use normality::{
    dagostino_pearson, normality_test, NormalityResult, NormalityStatistic, NORMALITY_MIN_SAMPLES,
};
pub use outcome::{MissingReason, Outcome};
pub use panel::{EntityKey, EntitySeries, Panel};
pub use rank::{
    rank, rank_forecasts, rank_fva, rank_residuals, BenchmarkForecasts, Criterion, FvaBenchmark,
    RankedEntity, RankedTable, ResidualDiagnostic, ResidualOptions, SortCriterion, UpliftRecord,
    DEFAULT_MAX_LAGS,
};
pub use stats::{summarize, summary_statistic, SeriesSummary, SummaryStat};
