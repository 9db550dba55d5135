//! Plain-text QC report over raw data, cleaned data, issues and parameters.

use chrono::{DateTime, Utc};

use crate::detectors::{count_issues_by_type, Issue, QcError};
use crate::params::QcConfig;
use crate::stats::summarize;
use crate::table::{format_ts_ms, Channel, Table, Value};

const BANNER_WIDTH: usize = 60;
const RULE_WIDTH: usize = 40;

/// Renders the report. Output depends only on the inputs; the caller supplies
/// the generation time.
pub fn render_report<S: AsRef<str>>(
    raw: &Table,
    cleaned: &Table,
    issues: &[Issue],
    channels: &[S],
    config: &QcConfig,
    generated_at: DateTime<Utc>,
) -> Result<String, QcError> {
    let raw_channels = raw.select_channels(channels)?;
    let cleaned_channels = cleaned.select_channels(channels)?;
    let banner = "=".repeat(BANNER_WIDTH);
    let rule = "-".repeat(RULE_WIDTH);

    let mut lines = vec![
        banner.clone(),
        "SENSOR DATA QUALITY CONTROL REPORT".to_string(),
        banner.clone(),
        format!("Generated: {}", generated_at.format("%Y-%m-%d %H:%M:%S")),
        String::new(),
    ];

    lines.push("DATASET OVERVIEW".to_string());
    lines.push(rule.clone());
    lines.push(format!("Total records: {}", raw.len()));
    lines.push(format!("Timestamp column: {}", raw.timestamp_column()));
    let names: Vec<&str> = raw_channels.iter().map(|c| c.name()).collect();
    lines.push(format!("Value columns: {}", names.join(", ")));
    if let (Some(first), Some(last)) = (raw.timestamps().first(), raw.timestamps().last()) {
        lines.push(format!(
            "Time range: {} to {}",
            format_ts_ms(*first),
            format_ts_ms(*last)
        ));
    }
    lines.push(String::new());

    lines.push("RAW DATA STATISTICS".to_string());
    lines.push(rule.clone());
    for channel in &raw_channels {
        push_channel_stats(&mut lines, channel);
    }
    lines.push(String::new());

    lines.push("ISSUES DETECTED".to_string());
    lines.push(rule.clone());
    if issues.is_empty() {
        lines.push("  No issues detected.".to_string());
    } else {
        for (issue_type, count) in count_issues_by_type(issues) {
            lines.push(format!("  {}: {count}", issue_type.label()));
        }
        lines.push(format!("  Total: {}", issues.len()));
    }
    lines.push(String::new());

    lines.push("CLEANING RESULTS".to_string());
    lines.push(rule.clone());
    for (before, after) in raw_channels.iter().zip(&cleaned_channels) {
        let raw_missing = before.missing_count();
        let clean_missing = after.missing_count();
        let recovered = raw_missing as i64 - clean_missing as i64;
        lines.push(format!("  {}:", before.name()));
        lines.push(format!(
            "    NaN before: {raw_missing} -> after: {clean_missing} ({recovered} recovered)"
        ));
        lines.push(format!(
            "    Points modified: {}",
            modified_points(before.values(), after.values())
        ));
        lines.push(format!(
            "    Valid data: {} -> {}",
            before.values().len() - raw_missing,
            after.values().len() - clean_missing
        ));
    }
    lines.push(String::new());

    lines.push("PARAMETERS".to_string());
    lines.push(rule);
    for (key, value) in config.report_entries() {
        lines.push(format!("  {key}: {value}"));
    }
    lines.push(String::new());

    lines.push(banner.clone());
    lines.push("End of report".to_string());
    lines.push(banner);

    Ok(lines.join("\n"))
}

fn push_channel_stats(lines: &mut Vec<String>, channel: &Channel) {
    let stats = summarize(channel.values());
    let total = channel.values().len();
    let missing_pct = if total > 0 {
        stats.missing as f64 / total as f64 * 100.0
    } else {
        0.0
    };

    lines.push(format!("  {}:", channel.name()));
    lines.push(format!("    Min: {}", format_stat(stats.min)));
    lines.push(format!("    Max: {}", format_stat(stats.max)));
    lines.push(format!("    Mean: {}", format_stat(stats.mean)));
    lines.push(format!("    Std: {}", format_stat(stats.std)));
    lines.push(format!("    NaN: {} ({missing_pct:.1}%)", stats.missing));
}

fn format_stat(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{v:.4}"),
        None => "N/A".to_string(),
    }
}

fn modified_points(before: &[Value], after: &[Value]) -> usize {
    before
        .iter()
        .zip(after)
        .filter(|(a, b)| match (a, b) {
            (Value::Present(x), Value::Present(y)) => x != y,
            (Value::Missing, Value::Missing) => false,
            _ => true,
        })
        .count()
}
