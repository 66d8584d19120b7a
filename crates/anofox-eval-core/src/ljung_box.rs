//! Ljung-Box portmanteau statistic.
//!
//! For each entity the cumulative Q-statistic
//!
//! ```text
//! Q[k] = n (n + 2) Σ_{i=1}^{k} acf[i]² / (n - i)
//! ```
//!
//! is returned for every lag depth `k = 1..=max_lags`. Comparing `Q[k]`
//! against a χ²(k) threshold is left to the caller.

use tracing::{debug, trace};

use crate::acf::validate_max_lags;
use crate::correlation::lagged_correlation;
use crate::error::Result;
use crate::panel::{EntityKey, Panel};

/// Q-statistics of one entity.
#[derive(Debug, Clone, PartialEq)]
pub struct LjungBoxResult<K> {
    pub entity: K,
    /// Number of observations of the entity
    pub length: usize,
    /// `qstats[k - 1]` is the statistic at lag depth `k`
    pub qstats: Vec<Option<f64>>,
}

impl<K> LjungBoxResult<K> {
    /// Statistic at the deepest lag, if it could be computed.
    pub fn last(&self) -> Option<f64> {
        self.qstats.last().copied().flatten()
    }
}

/// Compute the cumulative Ljung-Box Q-statistics for every entity.
///
/// # Errors
/// `InvalidParameter` if `max_lags < 1`. Lags at or beyond an entity's
/// length make that lag and every deeper one `None`.
pub fn ljung_box<K: EntityKey>(
    panel: &Panel<K>,
    max_lags: usize,
) -> Result<Vec<LjungBoxResult<K>>> {
    validate_max_lags(max_lags)?;

    let groups = panel.groups();
    debug!(entities = groups.len(), max_lags, "computing ljung-box q-statistics");

    Ok(groups
        .into_iter()
        .map(|group| {
            let qstats = q_statistics(&group.values, max_lags);
            if qstats.iter().any(Option::is_none) {
                trace!(entity = ?group.entity, length = group.len(), "ljung-box lags truncated");
            }
            LjungBoxResult {
                entity: group.entity.clone(),
                length: group.len(),
                qstats,
            }
        })
        .collect())
}

/// Cumulative Q-statistics of a single series for lags `1..=max_lags`.
pub fn q_statistics(values: &[f64], max_lags: usize) -> Vec<Option<f64>> {
    let n = values.len();
    let scale = n as f64 * (n as f64 + 2.0);

    let mut acc = Some(0.0);
    (1..=max_lags)
        .map(|lag| {
            let term = if lag < n {
                lagged_correlation(values, lag).map(|r| r * r / (n - lag) as f64)
            } else {
                None
            };
            acc = match (acc, term) {
                (Some(sum), Some(t)) => Some(sum + t),
                _ => None,
            };
            acc.map(|sum| scale * sum)
        })
        .collect()
}
