//! Lagged Pearson correlation shared by the ACF and Ljung-Box engines.

/// Pearson correlation between `values[lag..]` and `values[..n - lag]`.
///
/// Only the overlapping observations enter the computation, so the `lag`
/// values shifted out of the series are excluded from both the means and the
/// sums of squares. Uses two passes (means first, then centred products).
///
/// Returns `None` when fewer than two pairs overlap or when either segment
/// has zero variance.
pub fn lagged_correlation(values: &[f64], lag: usize) -> Option<f64> {
    let n = values.len();
    if lag >= n || n - lag < 2 {
        return None;
    }

    // Work relative to the largest magnitude so squared sums cannot overflow.
    let magnitude = values.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
    if magnitude == 0.0 || !magnitude.is_finite() {
        return None;
    }

    let lead = &values[lag..];
    let lagged = &values[..n - lag];
    let m = lead.len() as f64;

    let mean_lead = lead.iter().map(|v| v / magnitude).sum::<f64>() / m;
    let mean_lagged = lagged.iter().map(|v| v / magnitude).sum::<f64>() / m;

    let mut cross = 0.0;
    let mut ss_lead = 0.0;
    let mut ss_lagged = 0.0;
    for (a, b) in lead.iter().zip(lagged.iter()) {
        let da = a / magnitude - mean_lead;
        let db = b / magnitude - mean_lagged;
        cross += da * db;
        ss_lead += da * da;
        ss_lagged += db * db;
    }

    // Sums of squares at rounding-noise level mean a constant segment.
    let scale = mean_lead.abs().max(mean_lagged.abs());
    let noise = 16.0 * m * (f64::EPSILON * scale).powi(2);
    if ss_lead <= noise || ss_lagged <= noise {
        return None;
    }

    let r = cross / (ss_lead.sqrt() * ss_lagged.sqrt());
    r.is_finite().then(|| r.clamp(-1.0, 1.0))
}

/// Subtract the mean from every value.
pub fn demean(values: &[f64]) -> Vec<f64> {
    if values.is_empty() {
        return Vec::new();
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    values.iter().map(|v| v - mean).collect()
}
