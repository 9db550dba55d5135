//! Summary statistics over channels that may contain missing readings.
//!
//! Every helper works on the present subsequence only and returns `None`
//! where a statistic is undefined instead of producing NaN.

use serde::{Deserialize, Serialize};

use crate::table::Value;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SummaryStats {
    pub count: usize,
    pub missing: usize,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    pub std: Option<f64>,
}

pub fn summarize(values: &[Value]) -> SummaryStats {
    let present = present_values(values);
    SummaryStats {
        count: present.len(),
        missing: values.len() - present.len(),
        min: present.iter().copied().reduce(f64::min),
        max: present.iter().copied().reduce(f64::max),
        mean: mean(&present),
        std: sample_std(&present),
    }
}

pub fn present_values(values: &[Value]) -> Vec<f64> {
    values.iter().filter_map(|v| v.present()).collect()
}

pub fn mean(xs: &[f64]) -> Option<f64> {
    if xs.is_empty() {
        return None;
    }
    Some(xs.iter().sum::<f64>() / xs.len() as f64).filter(|m| m.is_finite())
}

/// Sample standard deviation (N-1 denominator); undefined below two points or
/// when the squared deviations overflow.
pub fn sample_std(xs: &[f64]) -> Option<f64> {
    if xs.len() < 2 {
        return None;
    }
    let m = mean(xs)?;
    let ss = xs
        .iter()
        .map(|v| {
            let d = *v - m;
            d * d
        })
        .sum::<f64>();
    Some((ss / (xs.len() - 1) as f64).sqrt()).filter(|s| s.is_finite())
}

/// Quantile with linear interpolation between the two closest ranks.
pub fn quantile(xs: &[f64], q: f64) -> Option<f64> {
    if xs.is_empty() {
        return None;
    }
    let mut sorted = xs.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    Some(quantile_sorted(&sorted, q))
}

pub fn median(xs: &[f64]) -> Option<f64> {
    quantile(xs, 0.5)
}

fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    if sorted.len() == 1 {
        return sorted[0];
    }

    let q = q.clamp(0.0, 1.0);
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        let frac = pos - lo as f64;
        sorted[lo] + (sorted[hi] - sorted[lo]) * frac
    }
}

/// Centered rolling mean.
///
/// Position `i` averages the present values in `[i - window/2, i + window - window/2)`,
/// clipped to the series bounds. Positions with fewer than `min_periods` present
/// values in their window (and always positions with none) are `None`.
pub fn centered_rolling_mean(values: &[Value], window: usize, min_periods: usize) -> Vec<Option<f64>> {
    let n = values.len();
    if window == 0 {
        return vec![None; n];
    }

    let mut prefix_sum = Vec::with_capacity(n + 1);
    let mut prefix_count = Vec::with_capacity(n + 1);
    prefix_sum.push(0.0);
    prefix_count.push(0usize);
    for value in values {
        let (add, inc) = match value {
            Value::Present(v) => (*v, 1),
            Value::Missing => (0.0, 0),
        };
        prefix_sum.push(prefix_sum[prefix_sum.len() - 1] + add);
        prefix_count.push(prefix_count[prefix_count.len() - 1] + inc);
    }

    let before = window / 2;
    let after = window - before;
    let required = min_periods.max(1);

    (0..n)
        .map(|i| {
            let start = i.saturating_sub(before);
            let end = (i + after).min(n);
            let count = prefix_count[end] - prefix_count[start];
            if count < required {
                None
            } else {
                Some((prefix_sum[end] - prefix_sum[start]) / count as f64)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "actual={actual} expected={expected}"
        );
    }

    #[test]
    fn summary_ignores_missing_values() {
        let values = [
            Value::Present(1.0),
            Value::Missing,
            Value::Present(3.0),
            Value::Present(5.0),
        ];
        let stats = summarize(&values);
        assert_eq!(stats.count, 3);
        assert_eq!(stats.missing, 1);
        assert_eq!(stats.min, Some(1.0));
        assert_eq!(stats.max, Some(5.0));
        assert_close(stats.mean.unwrap(), 3.0);
        assert_close(stats.std.unwrap(), 2.0);
    }

    #[test]
    fn degenerate_inputs_are_undefined_not_nan() {
        let single = summarize(&[Value::Present(4.0), Value::Missing]);
        assert_eq!(single.mean, Some(4.0));
        assert_eq!(single.std, None);

        let empty = summarize(&[Value::Missing, Value::Missing]);
        assert_eq!(empty.count, 0);
        assert_eq!(empty.min, None);
        assert_eq!(empty.max, None);
        assert_eq!(empty.mean, None);
        assert_eq!(empty.std, None);
    }

    #[test]
    fn overflowing_moments_are_undefined() {
        assert_eq!(mean(&[f64::MAX, f64::MAX]), None);
        assert_eq!(sample_std(&[f64::MAX, -f64::MAX]), None);

        let stats = summarize(&[Value::Present(f64::MAX), Value::Present(-f64::MAX)]);
        assert_eq!(stats.mean, Some(0.0));
        assert_eq!(stats.std, None);
    }

    #[test]
    fn quantile_interpolates_linearly() {
        let xs = [1.0, 2.0, 3.0, 100.0, 4.0, 5.0];
        assert_close(quantile(&xs, 0.25).unwrap(), 2.25);
        assert_close(quantile(&xs, 0.75).unwrap(), 4.75);
        assert_close(median(&xs).unwrap(), 3.5);
        assert_eq!(quantile(&[], 0.5), None);
    }

    #[test]
    fn rolling_mean_uses_centered_windows() {
        let values: Vec<Value> = [1.0, 2.0, 3.0, 4.0, 5.0]
            .iter()
            .copied()
            .map(Value::Present)
            .collect();

        let odd = centered_rolling_mean(&values, 3, 1);
        assert_close(odd[0].unwrap(), 1.5);
        assert_close(odd[2].unwrap(), 3.0);
        assert_close(odd[4].unwrap(), 4.5);

        // Even windows lean left: position 2 covers rows 0..=3.
        let even = centered_rolling_mean(&values, 4, 4);
        assert_eq!(even[0], None);
        assert_close(even[2].unwrap(), 2.5);
        assert_eq!(even[4], None);
    }

    #[test]
    fn rolling_mean_counts_only_present_values_toward_min_periods() {
        let values = [
            Value::Present(2.0),
            Value::Missing,
            Value::Missing,
            Value::Present(4.0),
        ];
        let rm = centered_rolling_mean(&values, 3, 2);
        assert_eq!(rm[1], None);
        assert_eq!(rm[2], None);

        let rm = centered_rolling_mean(&values, 3, 1);
        assert_close(rm[1].unwrap(), 2.0);
        assert_close(rm[2].unwrap(), 4.0);
    }
}
