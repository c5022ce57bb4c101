//! Pure statistics over window snapshots
//!
//! Everything in this module is a pure function of the sample slice it is
//! given; nothing here touches shared state or the clock. Statistics are
//! derived, not stored, so a recomputation over the same window always
//! matches exactly.

use crate::types::Sample;
use serde::{Deserialize, Serialize};

/// Aggregate statistics of one window
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    /// Arithmetic mean of the window
    pub mean: f64,
    /// Population variance (divisor n, not n-1)
    pub variance: f64,
    /// Smallest value in the window
    pub min: f64,
    /// Largest value in the window
    pub max: f64,
    /// Number of samples the statistics were computed from
    pub count: usize,
}

impl Statistics {
    /// Compute statistics over a window snapshot
    ///
    /// Returns `None` for an empty window: no data is not the same as zero,
    /// and callers must not fold the two together.
    pub fn compute(samples: &[Sample]) -> Option<Statistics> {
        if samples.is_empty() {
            return None;
        }

        let n = samples.len() as f64;
        let mut sum = 0.0;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for sample in samples {
            sum += sample.value;
            min = min.min(sample.value);
            max = max.max(sample.value);
        }
        let mean = sum / n;

        let variance = samples
            .iter()
            .map(|sample| {
                let delta = sample.value - mean;
                delta * delta
            })
            .sum::<f64>()
            / n;

        Some(Statistics {
            mean,
            variance,
            min,
            max,
            count: samples.len(),
        })
    }
}

/// Pearson correlation of two windows, aligned by position from the latest
///
/// The i-th-from-latest sample of `a` is paired with the i-th-from-latest
/// sample of `b` over the most recent `min(|a|,|b|)` samples, which keeps the
/// computation well-defined when the two streams are sampled at different
/// rates. A series with zero variance correlates as `0.0` (not NaN) so
/// downstream consumers stay total; fewer than two aligned pairs also yield
/// `0.0`.
pub fn correlation(a: &[Sample], b: &[Sample]) -> f64 {
    let n = a.len().min(b.len());
    if n < 2 {
        return 0.0;
    }

    let xs = &a[a.len() - n..];
    let ys = &b[b.len() - n..];

    let nf = n as f64;
    let mut sum_x = 0.0;
    let mut sum_y = 0.0;
    let mut sum_xy = 0.0;
    let mut sum_x2 = 0.0;
    let mut sum_y2 = 0.0;
    for (x, y) in xs.iter().zip(ys.iter()) {
        sum_x += x.value;
        sum_y += y.value;
        sum_xy += x.value * y.value;
        sum_x2 += x.value * x.value;
        sum_y2 += y.value * y.value;
    }

    let denom_x = nf * sum_x2 - sum_x * sum_x;
    let denom_y = nf * sum_y2 - sum_y * sum_y;
    if denom_x <= 0.0 || denom_y <= 0.0 {
        return 0.0;
    }

    (nf * sum_xy - sum_x * sum_y) / (denom_x * denom_y).sqrt()
}
