//! CSV boundary: typed table loading with column auto-detection, and cleaned-table export.

use std::fs;
use std::io::{Read, Write};
use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use csv::StringRecord;
use thiserror::Error;
use tracing::info;

use crate::table::{format_ts_ms, Table, TableError, Value};

const DATETIME_FORMATS: [&str; 5] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
];

const MISSING_TOKENS: [&str; 5] = ["", "nan", "na", "null", "none"];

/// Explicit column choices. `None` fields are auto-detected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnSelection {
    pub timestamp_column: Option<String>,
    pub value_columns: Option<Vec<String>>,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Table(#[from] TableError),
    #[error("no datetime column detected")]
    NoTimestampColumn,
    #[error("no numeric columns detected")]
    NoNumericColumns,
    #[error("unknown column: {0}")]
    UnknownColumn(String),
    #[error("failed to parse timestamp in column {column} at row {row}: '{value}'")]
    ParseTimestamp {
        row: usize,
        column: String,
        value: String,
    },
    #[error("failed to parse number in column {column} at row {row}: '{value}'")]
    ParseValue {
        row: usize,
        column: String,
        value: String,
    },
}

pub fn load_table_csv(path: &Path, selection: &ColumnSelection) -> Result<Table, LoadError> {
    let file = fs::File::open(path)?;
    let table = read_table_csv(file, selection)?;
    info!(
        component = "loader",
        event = "loader.table.loaded",
        path = %path.display(),
        rows = table.len(),
        channels = table.channels().len(),
        timestamp_column = table.timestamp_column()
    );
    Ok(table)
}

pub fn read_table_csv<R: Read>(reader: R, selection: &ColumnSelection) -> Result<Table, LoadError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);
    let headers = reader.headers()?.clone();
    let records = reader.records().collect::<Result<Vec<StringRecord>, _>>()?;

    let ts_idx = match &selection.timestamp_column {
        Some(name) => column_index(&headers, name)?,
        None => detect_timestamp_column(&headers, &records).ok_or(LoadError::NoTimestampColumn)?,
    };
    let allow_epoch = selection.timestamp_column.is_some();
    let ts_name = headers.get(ts_idx).unwrap_or_default().to_string();

    let value_indices = match &selection.value_columns {
        Some(names) => names
            .iter()
            .map(|name| column_index(&headers, name))
            .collect::<Result<Vec<_>, _>>()?,
        None => detect_numeric_columns(&headers, &records, ts_idx),
    };
    if value_indices.is_empty() {
        return Err(LoadError::NoNumericColumns);
    }

    let mut timestamps = Vec::with_capacity(records.len());
    for (row, record) in records.iter().enumerate() {
        let raw = record.get(ts_idx).unwrap_or_default();
        let ts = parse_timestamp(raw, allow_epoch).ok_or_else(|| LoadError::ParseTimestamp {
            row,
            column: ts_name.clone(),
            value: raw.to_string(),
        })?;
        timestamps.push(ts);
    }

    let mut channels = Vec::with_capacity(value_indices.len());
    for idx in value_indices {
        let name = headers.get(idx).unwrap_or_default().to_string();
        let mut values = Vec::with_capacity(records.len());
        for (row, record) in records.iter().enumerate() {
            let raw = record.get(idx).unwrap_or_default();
            let value = parse_value(raw).ok_or_else(|| LoadError::ParseValue {
                row,
                column: name.clone(),
                value: raw.to_string(),
            })?;
            values.push(value);
        }
        channels.push((name, values));
    }

    Ok(Table::new(ts_name, timestamps, channels)?)
}

pub fn save_table_csv(path: &Path, table: &Table) -> Result<(), LoadError> {
    let file = fs::File::create(path)?;
    write_table_csv(file, table)
}

/// Writes the table with formatted timestamps; missing readings become empty cells.
pub fn write_table_csv<W: Write>(writer: W, table: &Table) -> Result<(), LoadError> {
    let mut writer = csv::Writer::from_writer(writer);

    let mut header = vec![table.timestamp_column().to_string()];
    header.extend(table.channel_names());
    writer.write_record(&header)?;

    for (row, ts) in table.timestamps().iter().enumerate() {
        let mut record = Vec::with_capacity(table.channels().len() + 1);
        record.push(format_ts_ms(*ts));
        for channel in table.channels() {
            record.push(match channel.values()[row] {
                Value::Present(v) => v.to_string(),
                Value::Missing => String::new(),
            });
        }
        writer.write_record(&record)?;
    }

    writer.flush()?;
    Ok(())
}

/// Parses a datetime cell into UTC epoch milliseconds. Naive datetimes are read as UTC.
pub fn parse_timestamp(raw: &str, allow_epoch_millis: bool) -> Option<i64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.timestamp_millis());
    }
    for format in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc().timestamp_millis());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date.and_hms_opt(0, 0, 0)?.and_utc().timestamp_millis());
    }
    if allow_epoch_millis {
        return raw.parse::<i64>().ok();
    }
    None
}

fn parse_value(raw: &str) -> Option<Value> {
    if is_missing_token(raw) {
        return Some(Value::Missing);
    }
    raw.parse::<f64>().ok().map(Value::from_f64)
}

fn is_missing_token(raw: &str) -> bool {
    let lowered = raw.trim().to_ascii_lowercase();
    MISSING_TOKENS.contains(&lowered.as_str())
}

fn column_index(headers: &StringRecord, name: &str) -> Result<usize, LoadError> {
    headers
        .iter()
        .position(|h| h == name)
        .ok_or_else(|| LoadError::UnknownColumn(name.to_string()))
}

fn detect_timestamp_column(headers: &StringRecord, records: &[StringRecord]) -> Option<usize> {
    if records.is_empty() {
        return None;
    }
    (0..headers.len()).find(|idx| {
        records
            .iter()
            .all(|r| parse_timestamp(r.get(*idx).unwrap_or_default(), false).is_some())
    })
}

fn detect_numeric_columns(
    headers: &StringRecord,
    records: &[StringRecord],
    ts_idx: usize,
) -> Vec<usize> {
    (0..headers.len())
        .filter(|idx| *idx != ts_idx)
        .filter(|idx| {
            records
                .iter()
                .all(|r| parse_value(r.get(*idx).unwrap_or_default()).is_some())
        })
        .collect()
}
