//! Repair stages: outlier removal/replacement followed by bounded gap interpolation.
//!
//! Every public entry point borrows the input table and returns an independent
//! cleaned copy. Channels that were not selected are copied through unchanged.

use tracing::{info, warn};

use crate::detectors::{fit_iqr, fit_zscore, QcError};
use crate::params::{CleaningParameters, OutlierAction, OutlierMethod};
use crate::stats::centered_rolling_mean;
use crate::table::{Table, TableError, Value};

pub fn remove_outliers_zscore<S: AsRef<str>>(
    table: &Table,
    channels: &[S],
    threshold: f64,
) -> Result<Table, QcError> {
    let mut cleaned = table.clone();
    apply_per_channel(&mut cleaned, channels, |values| {
        null_zscore_outliers(values, threshold)
    })?;
    Ok(cleaned)
}

pub fn remove_outliers_iqr<S: AsRef<str>>(
    table: &Table,
    channels: &[S],
    factor: f64,
) -> Result<Table, QcError> {
    let mut cleaned = table.clone();
    apply_per_channel(&mut cleaned, channels, |values| {
        null_iqr_outliers(values, factor)
    })?;
    Ok(cleaned)
}

pub fn replace_outliers_rolling<S: AsRef<str>>(
    table: &Table,
    channels: &[S],
    threshold: f64,
    window: usize,
) -> Result<Table, QcError> {
    let mut cleaned = table.clone();
    apply_per_channel(&mut cleaned, channels, |values| {
        replace_with_rolling_mean(values, threshold, window)
    })?;
    Ok(cleaned)
}

pub fn interpolate_gaps<S: AsRef<str>>(
    table: &Table,
    channels: &[S],
    max_gap: usize,
) -> Result<Table, QcError> {
    let mut cleaned = table.clone();
    apply_per_channel(&mut cleaned, channels, |values| {
        interpolate_bounded(values, max_gap)
    })?;
    Ok(cleaned)
}

/// Full repair: outlier handling first, then interpolation, so positions
/// nulled by outlier removal are filled the same way as originally missing ones.
///
/// With `RemoveSetMissing`, `OutlierMethod::Both` cleans with the z-score test
/// only; IQR stays a detection-only check in that configuration.
pub fn clean_series<S: AsRef<str>>(
    table: &Table,
    channels: &[S],
    params: &CleaningParameters,
) -> Result<Table, QcError> {
    params.validate()?;
    table.select_channels(channels)?;

    let mut cleaned = table.clone();
    match (params.outlier_action, params.outlier_method) {
        (OutlierAction::RemoveSetMissing, OutlierMethod::Iqr) => {
            apply_per_channel(&mut cleaned, channels, |values| {
                null_iqr_outliers(values, params.iqr_factor)
            })?;
        }
        (OutlierAction::RemoveSetMissing, method) => {
            if method == OutlierMethod::Both {
                warn!(
                    component = "cleaners",
                    event = "cleaning.method.collapsed",
                    requested = ?method,
                    applied = ?OutlierMethod::ZScore
                );
            }
            apply_per_channel(&mut cleaned, channels, |values| {
                null_zscore_outliers(values, params.zscore_threshold)
            })?;
        }
        (OutlierAction::ReplaceWithRollingMean, _) => {
            apply_per_channel(&mut cleaned, channels, |values| {
                replace_with_rolling_mean(values, params.zscore_threshold, params.rolling_window)
            })?;
        }
    }

    apply_per_channel(&mut cleaned, channels, |values| {
        interpolate_bounded(values, params.interpolate_max_gap)
    })?;

    info!(
        component = "cleaners",
        event = "cleaning.run.finish",
        rows = cleaned.len(),
        channels = channels.len(),
        outlier_action = ?params.outlier_action,
        outlier_method = ?params.outlier_method,
        interpolate_max_gap = params.interpolate_max_gap
    );

    Ok(cleaned)
}

fn apply_per_channel<S, F>(table: &mut Table, channels: &[S], mut stage: F) -> Result<(), QcError>
where
    S: AsRef<str>,
    F: FnMut(&[Value]) -> Vec<Value>,
{
    table.select_channels(channels)?;
    for name in channels {
        let name = name.as_ref();
        let channel = table
            .channel(name)
            .ok_or_else(|| TableError::UnknownChannel(name.to_string()))?;
        let updated = stage(channel.values());
        table.replace_values(name, updated)?;
    }
    Ok(())
}

fn null_zscore_outliers(values: &[Value], threshold: f64) -> Vec<Value> {
    let Some(fit) = fit_zscore(values) else {
        return values.to_vec();
    };
    values
        .iter()
        .map(|value| match value {
            Value::Present(v) if fit.z(*v).abs() > threshold => Value::Missing,
            other => *other,
        })
        .collect()
}

fn null_iqr_outliers(values: &[Value], factor: f64) -> Vec<Value> {
    let Some(bounds) = fit_iqr(values, factor) else {
        return values.to_vec();
    };
    values
        .iter()
        .map(|value| match value {
            Value::Present(v) if bounds.is_outside(*v) => Value::Missing,
            other => *other,
        })
        .collect()
}

/// Rolling means come from the unmodified series, so replacements never feed
/// into each other.
fn replace_with_rolling_mean(values: &[Value], threshold: f64, window: usize) -> Vec<Value> {
    let Some(fit) = fit_zscore(values) else {
        return values.to_vec();
    };
    let rolling = centered_rolling_mean(values, window, 1);
    values
        .iter()
        .zip(rolling)
        .map(|(value, local_mean)| match (value, local_mean) {
            (Value::Present(v), Some(m)) if fit.z(*v).abs() > threshold => Value::Present(m),
            (other, _) => *other,
        })
        .collect()
}

/// Linear interpolation over interior runs of at most `max_gap` missing values.
/// Longer runs, and runs touching either end of the series, stay missing.
fn interpolate_bounded(values: &[Value], max_gap: usize) -> Vec<Value> {
    let mut out = values.to_vec();
    if max_gap == 0 {
        return out;
    }

    let mut last_present: Option<(usize, f64)> = None;
    for (idx, value) in values.iter().enumerate() {
        let Value::Present(right) = *value else {
            continue;
        };
        if let Some((left_idx, left)) = last_present {
            let run = idx - left_idx - 1;
            if run > 0 && run <= max_gap {
                let span = (idx - left_idx) as f64;
                for (k, slot) in out.iter_mut().enumerate().take(idx).skip(left_idx + 1) {
                    let offset = (k - left_idx) as f64;
                    *slot = Value::Present(left + (right - left) * offset / span);
                }
            }
        }
        last_present = Some((idx, right));
    }

    out
}
