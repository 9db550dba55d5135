//! Read-only quality checks: timestamp gaps, missing values, point outliers and drift.
//!
//! Detectors never mutate the table. Each returns plain `Issue` observations
//! pointing back at a row of the original data.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::params::{DetectionParameters, OutlierMethod, ParamError};
use crate::stats::{centered_rolling_mean, mean, median, present_values, quantile, sample_std};
use crate::table::{format_interval_ms, Channel, Table, TableError, Value};

const MIN_ZSCORE_POINTS: usize = 2;
const MIN_IQR_POINTS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum IssueType {
    MissingValue,
    TimestampGap,
    OutlierZScore,
    OutlierIqr,
    Drift,
}

impl IssueType {
    pub const ALL: [IssueType; 5] = [
        IssueType::MissingValue,
        IssueType::TimestampGap,
        IssueType::OutlierZScore,
        IssueType::OutlierIqr,
        IssueType::Drift,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::MissingValue => "Missing Value",
            Self::TimestampGap => "Timestamp Gap",
            Self::OutlierZScore => "Outlier (Z-Score)",
            Self::OutlierIqr => "Outlier (IQR)",
            Self::Drift => "Drift",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub ts_ms_utc: i64,
    pub row: usize,
    pub channel: String,
    pub issue_type: IssueType,
    pub details: String,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum QcError {
    #[error(transparent)]
    Table(#[from] TableError),
    #[error(transparent)]
    Param(#[from] ParamError),
}

/// A maximal run of rows whose rolling mean sits beyond the drift threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DriftRegion {
    pub start_row: usize,
    pub end_row: usize,
    pub max_score: f64,
}

impl DriftRegion {
    pub fn point_count(&self) -> usize {
        self.end_row - self.start_row + 1
    }

    pub fn mid_row(&self) -> usize {
        (self.start_row + self.end_row) / 2
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct ZScoreFit {
    pub(crate) mean: f64,
    pub(crate) std: f64,
}

impl ZScoreFit {
    pub(crate) fn z(&self, value: f64) -> f64 {
        (value - self.mean) / self.std
    }
}

/// Mean/std over present values; `None` when fewer than two points, zero spread
/// or a non-finite moment.
pub(crate) fn fit_zscore(values: &[Value]) -> Option<ZScoreFit> {
    let present = present_values(values);
    if present.len() < MIN_ZSCORE_POINTS {
        return None;
    }
    let std = sample_std(&present)?;
    if std == 0.0 {
        return None;
    }
    Some(ZScoreFit {
        mean: mean(&present)?,
        std,
    })
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct IqrBounds {
    pub(crate) lower: f64,
    pub(crate) upper: f64,
}

impl IqrBounds {
    pub(crate) fn is_outside(&self, value: f64) -> bool {
        value < self.lower || value > self.upper
    }
}

/// Tukey fences from linearly interpolated quartiles; `None` below four points.
pub(crate) fn fit_iqr(values: &[Value], factor: f64) -> Option<IqrBounds> {
    let present = present_values(values);
    if present.len() < MIN_IQR_POINTS {
        return None;
    }
    let q1 = quantile(&present, 0.25)?;
    let q3 = quantile(&present, 0.75)?;
    let iqr = q3 - q1;
    Some(IqrBounds {
        lower: q1 - factor * iqr,
        upper: q3 + factor * iqr,
    })
}

/// Flags timestamp spacing above twice the median interval, then every missing
/// reading of each selected channel.
pub fn detect_gaps<S: AsRef<str>>(table: &Table, channels: &[S]) -> Result<Vec<Issue>, QcError> {
    let selected = table.select_channels(channels)?;
    let mut issues = timestamp_gap_issues(table);
    for channel in selected {
        issues.extend(missing_value_issues(table, channel));
    }
    Ok(issues)
}

pub fn detect_outliers_zscore<S: AsRef<str>>(
    table: &Table,
    channels: &[S],
    threshold: f64,
) -> Result<Vec<Issue>, QcError> {
    let selected = table.select_channels(channels)?;
    Ok(selected
        .into_iter()
        .flat_map(|channel| zscore_issues(table, channel, threshold))
        .collect())
}

pub fn detect_outliers_iqr<S: AsRef<str>>(
    table: &Table,
    channels: &[S],
    factor: f64,
) -> Result<Vec<Issue>, QcError> {
    let selected = table.select_channels(channels)?;
    Ok(selected
        .into_iter()
        .flat_map(|channel| iqr_issues(table, channel, factor))
        .collect())
}

pub fn detect_drift<S: AsRef<str>>(
    table: &Table,
    channels: &[S],
    window: usize,
    threshold: f64,
) -> Result<Vec<Issue>, QcError> {
    let selected = table.select_channels(channels)?;
    let mut issues = Vec::new();
    for channel in selected {
        for region in drift_regions(channel.values(), window, threshold) {
            let mid = region.mid_row();
            issues.push(Issue {
                ts_ms_utc: table.timestamps()[mid],
                row: mid,
                channel: channel.name().to_string(),
                issue_type: IssueType::Drift,
                details: format!(
                    "Drift detected from row {} to {} ({} points), max deviation={:.2}σ",
                    region.start_row,
                    region.end_row,
                    region.point_count(),
                    region.max_score
                ),
            });
        }
    }
    Ok(issues)
}

/// Scores each row by `|rolling_mean - global_mean| / global_std` and merges
/// consecutive rows above `threshold` into regions.
///
/// Edge rows use a partial window of at least `window / 2` present points, so
/// confidence is lower near the series boundaries than in its interior.
pub fn drift_regions(values: &[Value], window: usize, threshold: f64) -> Vec<DriftRegion> {
    let present = present_values(values);
    if window == 0 || present.len() < window {
        return Vec::new();
    }
    let (global_mean, global_std) = match (mean(&present), sample_std(&present)) {
        (Some(m), Some(s)) if s != 0.0 => (m, s),
        _ => return Vec::new(),
    };

    let rolling = centered_rolling_mean(values, window, window / 2);
    let mut regions = Vec::new();
    let mut open: Option<DriftRegion> = None;

    for (row, local_mean) in rolling.iter().enumerate() {
        let drifting = local_mean
            .map(|m| (m - global_mean).abs() / global_std)
            .filter(|score| *score > threshold);
        match drifting {
            Some(score) => match open.as_mut() {
                Some(region) => {
                    region.end_row = row;
                    region.max_score = region.max_score.max(score);
                }
                None => {
                    open = Some(DriftRegion {
                        start_row: row,
                        end_row: row,
                        max_score: score,
                    });
                }
            },
            None => {
                if let Some(region) = open.take() {
                    regions.push(region);
                }
            }
        }
    }
    if let Some(region) = open.take() {
        regions.push(region);
    }

    regions
}

/// Runs every detector and returns issues sorted by timestamp.
///
/// The sort is stable, so rows sharing a timestamp keep detector order:
/// gaps and missing values, z-score outliers, IQR outliers, then drift.
pub fn run_all_detections<S: AsRef<str>>(
    table: &Table,
    channels: &[S],
    params: &DetectionParameters,
) -> Result<Vec<Issue>, QcError> {
    params.validate()?;

    info!(
        component = "detectors",
        event = "detection.run.start",
        rows = table.len(),
        channels = channels.len(),
        outlier_method = ?params.outlier_method,
        zscore_threshold = params.zscore_threshold,
        iqr_factor = params.iqr_factor,
        drift_window = params.drift_window,
        drift_threshold = params.drift_threshold
    );

    let mut issues = detect_gaps(table, channels)?;
    match params.outlier_method {
        OutlierMethod::ZScore => {
            issues.extend(detect_outliers_zscore(table, channels, params.zscore_threshold)?);
        }
        OutlierMethod::Iqr => {
            issues.extend(detect_outliers_iqr(table, channels, params.iqr_factor)?);
        }
        OutlierMethod::Both => {
            issues.extend(detect_outliers_zscore(table, channels, params.zscore_threshold)?);
            issues.extend(detect_outliers_iqr(table, channels, params.iqr_factor)?);
        }
    }
    issues.extend(detect_drift(
        table,
        channels,
        params.drift_window,
        params.drift_threshold,
    )?);

    issues.sort_by_key(|issue| issue.ts_ms_utc);

    info!(
        component = "detectors",
        event = "detection.run.finish",
        issues = issues.len()
    );

    Ok(issues)
}

/// Per-type issue counts, largest first; ties follow `IssueType` order.
pub fn count_issues_by_type(issues: &[Issue]) -> Vec<(IssueType, usize)> {
    let mut counts: Vec<(IssueType, usize)> = IssueType::ALL
        .iter()
        .map(|kind| {
            let count = issues.iter().filter(|i| i.issue_type == *kind).count();
            (*kind, count)
        })
        .filter(|(_, count)| *count > 0)
        .collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
}

fn timestamp_gap_issues(table: &Table) -> Vec<Issue> {
    let timestamps = table.timestamps();
    if timestamps.len() < 2 {
        return Vec::new();
    }

    let diffs: Vec<i64> = timestamps
        .windows(2)
        .map(|w| w[1].saturating_sub(w[0]))
        .collect();
    let diffs_f64: Vec<f64> = diffs.iter().map(|d| *d as f64).collect();
    let Some(expected) = median(&diffs_f64) else {
        return Vec::new();
    };

    diffs
        .iter()
        .enumerate()
        .filter(|(_, diff)| **diff as f64 > expected * 2.0)
        .map(|(idx, diff)| {
            let row = idx + 1;
            Issue {
                ts_ms_utc: timestamps[row],
                row,
                channel: table.timestamp_column().to_string(),
                issue_type: IssueType::TimestampGap,
                details: format!(
                    "Gap of {} (expected ~{})",
                    format_interval_ms(*diff),
                    format_interval_ms(expected.round() as i64)
                ),
            }
        })
        .collect()
}

fn missing_value_issues(table: &Table, channel: &Channel) -> Vec<Issue> {
    channel
        .values()
        .iter()
        .enumerate()
        .filter(|(_, value)| value.is_missing())
        .map(|(row, _)| Issue {
            ts_ms_utc: table.timestamps()[row],
            row,
            channel: channel.name().to_string(),
            issue_type: IssueType::MissingValue,
            details: "value is missing".to_string(),
        })
        .collect()
}

fn zscore_issues(table: &Table, channel: &Channel, threshold: f64) -> Vec<Issue> {
    let Some(fit) = fit_zscore(channel.values()) else {
        debug!(
            component = "detectors",
            event = "detection.channel.skipped",
            channel = channel.name(),
            check = "zscore",
            reason = "fewer than 2 present values or zero spread"
        );
        return Vec::new();
    };

    let mut issues = Vec::new();
    for (row, value) in channel.values().iter().enumerate() {
        let Value::Present(v) = *value else {
            continue;
        };
        let z = fit.z(v);
        if z.abs() > threshold {
            issues.push(Issue {
                ts_ms_utc: table.timestamps()[row],
                row,
                channel: channel.name().to_string(),
                issue_type: IssueType::OutlierZScore,
                details: format!("Value={v:.4}, Z={z:.2} (threshold={threshold})"),
            });
        }
    }
    issues
}

fn iqr_issues(table: &Table, channel: &Channel, factor: f64) -> Vec<Issue> {
    let Some(bounds) = fit_iqr(channel.values(), factor) else {
        debug!(
            component = "detectors",
            event = "detection.channel.skipped",
            channel = channel.name(),
            check = "iqr",
            reason = "fewer than 4 present values"
        );
        return Vec::new();
    };

    let mut issues = Vec::new();
    for (row, value) in channel.values().iter().enumerate() {
        let Value::Present(v) = *value else {
            continue;
        };
        if bounds.is_outside(v) {
            issues.push(Issue {
                ts_ms_utc: table.timestamps()[row],
                row,
                channel: channel.name().to_string(),
                issue_type: IssueType::OutlierIqr,
                details: format!(
                    "Value={v:.4}, bounds=[{:.4}, {:.4}]",
                    bounds.lower, bounds.upper
                ),
            });
        }
    }
    issues
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINUTE_MS: i64 = 60_000;

    fn values(xs: &[f64]) -> Vec<Value> {
        xs.iter().copied().map(Value::from_f64).collect()
    }

    fn table_of(xs: &[f64]) -> Table {
        let timestamps = (0..xs.len() as i64).map(|i| i * MINUTE_MS).collect();
        Table::new("ts", timestamps, vec![("v".to_string(), values(xs))]).unwrap()
    }

    #[test]
    fn zscore_fit_skips_constant_and_tiny_series() {
        assert!(fit_zscore(&values(&[5.0, 5.0, 5.0])).is_none());
        assert!(fit_zscore(&values(&[5.0, f64::NAN])).is_none());
        assert!(fit_zscore(&values(&[1.0, 2.0])).is_some());
    }

    #[test]
    fn iqr_fences_follow_interpolated_quartiles() {
        let bounds = fit_iqr(&values(&[1.0, 2.0, 3.0, 100.0, 4.0, 5.0]), 1.5).unwrap();
        assert!((bounds.lower - (2.25 - 3.75)).abs() < 1e-12);
        assert!((bounds.upper - (4.75 + 3.75)).abs() < 1e-12);
        assert!(bounds.is_outside(100.0));
        assert!(!bounds.is_outside(5.0));
        assert!(fit_iqr(&values(&[1.0, 2.0, f64::NAN, 3.0]), 1.5).is_none());
    }

    #[test]
    fn zscore_reports_value_and_score() {
        let table = table_of(&[1.0, 2.0, 3.0, 100.0, 4.0, 5.0]);
        let issues = detect_outliers_zscore(&table, &["v"], 2.0).unwrap();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].row, 3);
        assert_eq!(issues[0].issue_type, IssueType::OutlierZScore);
        assert!(issues[0].details.starts_with("Value=100.0000, Z=2.04"));
        assert!(issues[0].details.ends_with("(threshold=2)"));
    }

    #[test]
    fn iqr_flags_point_outside_fences() {
        let table = table_of(&[1.0, 2.0, 3.0, 100.0, 4.0, 5.0]);
        let issues = detect_outliers_iqr(&table, &["v"], 1.5).unwrap();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].row, 3);
        assert_eq!(
            issues[0].details,
            "Value=100.0000, bounds=[-1.5000, 8.5000]"
        );
    }

    #[test]
    fn timestamp_gap_is_attributed_to_later_row() {
        let mut timestamps: Vec<i64> = (0..10).map(|i| i * MINUTE_MS).collect();
        for ts in timestamps.iter_mut().skip(6) {
            *ts += 9 * MINUTE_MS;
        }
        let table = Table::new("ts", timestamps.clone(), vec![]).unwrap();
        let issues = detect_gaps::<&str>(&table, &[]).unwrap();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].row, 6);
        assert_eq!(issues[0].ts_ms_utc, timestamps[6]);
        assert_eq!(issues[0].channel, "ts");
        assert_eq!(
            issues[0].details,
            "Gap of 0 days 00:10:00 (expected ~0 days 00:01:00)"
        );
    }

    #[test]
    fn extreme_timestamp_spacing_saturates_instead_of_overflowing() {
        let timestamps = vec![i64::MIN, i64::MIN + MINUTE_MS, i64::MIN + 2 * MINUTE_MS, i64::MAX];
        let table = Table::new("ts", timestamps, vec![]).unwrap();
        let issues = detect_gaps::<&str>(&table, &[]).unwrap();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].row, 3);
    }

    #[test]
    fn single_timestamp_has_no_gaps() {
        let table = table_of(&[1.0]);
        assert!(detect_gaps(&table, &["v"]).unwrap().is_empty());
    }

    #[test]
    fn drift_region_spans_the_shifted_tail() {
        let mut xs = vec![0.0; 80];
        xs.extend(vec![10.0; 20]);

        let regions = drift_regions(&values(&xs), 10, 1.5);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].start_row, 84);
        assert_eq!(regions[0].end_row, 99);
        assert_eq!(regions[0].point_count(), 16);
        assert_eq!(regions[0].mid_row(), 91);
        let expected_max = 8.0 / (1600.0_f64 / 99.0).sqrt();
        assert!((regions[0].max_score - expected_max).abs() < 1e-9);
    }

    #[test]
    fn drift_requires_window_worth_of_points_and_spread() {
        assert!(drift_regions(&values(&[1.0, 2.0, 3.0]), 5, 0.1).is_empty());
        assert!(drift_regions(&values(&[4.0; 20]), 5, 0.1).is_empty());
        assert!(drift_regions(&values(&[1.0, 2.0, 3.0]), 0, 0.1).is_empty());
    }

    #[test]
    fn drift_issue_reports_region_once() {
        let mut xs = vec![0.0; 80];
        xs.extend(vec![10.0; 20]);
        let table = table_of(&xs);
        let issues = detect_drift(&table, &["v"], 10, 1.5).unwrap();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].row, 91);
        assert_eq!(issues[0].ts_ms_utc, 91 * MINUTE_MS);
        assert_eq!(
            issues[0].details,
            "Drift detected from row 84 to 99 (16 points), max deviation=1.99σ"
        );
    }

    #[test]
    fn counts_are_sorted_by_frequency() {
        let issue = |issue_type| Issue {
            ts_ms_utc: 0,
            row: 0,
            channel: "v".to_string(),
            issue_type,
            details: String::new(),
        };
        let issues = vec![
            issue(IssueType::Drift),
            issue(IssueType::MissingValue),
            issue(IssueType::MissingValue),
            issue(IssueType::OutlierZScore),
        ];
        assert_eq!(
            count_issues_by_type(&issues),
            vec![
                (IssueType::MissingValue, 2),
                (IssueType::OutlierZScore, 1),
                (IssueType::Drift, 1),
            ]
        );
    }

    #[test]
    fn unknown_channel_is_an_error() {
        let table = table_of(&[1.0, 2.0]);
        let err = run_all_detections(&table, &["nope"], &DetectionParameters::default())
            .unwrap_err();
        assert_eq!(
            err,
            QcError::Table(TableError::UnknownChannel("nope".to_string()))
        );
    }
}
