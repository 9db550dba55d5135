//! Fixed-schema sensor table: one shared timestamp axis plus named value channels.

use std::collections::HashSet;

use chrono::{TimeZone, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single reading slot. Missing readings are never encoded as NaN, and a
/// present reading is always finite.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Present(f64),
    Missing,
}

impl Value {
    /// NaN and infinities carry no usable reading and become `Missing`, so they
    /// surface as missing-value issues rather than poisoning channel statistics.
    pub fn from_f64(raw: f64) -> Self {
        if raw.is_finite() {
            Self::Present(raw)
        } else {
            Self::Missing
        }
    }

    pub fn present(self) -> Option<f64> {
        match self {
            Self::Present(v) => Some(v),
            Self::Missing => None,
        }
    }

    pub fn is_missing(self) -> bool {
        matches!(self, Self::Missing)
    }
}

impl From<Option<f64>> for Value {
    fn from(raw: Option<f64>) -> Self {
        match raw {
            Some(v) => Self::from_f64(v),
            None => Self::Missing,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    name: String,
    values: Vec<Value>,
}

impl Channel {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn missing_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_missing()).count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TableError {
    #[error("channel '{channel}' has {actual} values, expected {expected} to match the timestamp axis")]
    LengthMismatch {
        channel: String,
        expected: usize,
        actual: usize,
    },
    #[error("duplicate channel name: {0}")]
    DuplicateChannel(String),
    #[error("channel names must be non-empty")]
    EmptyChannelName,
    #[error("unknown channel: {0}")]
    UnknownChannel(String),
    #[error("channel '{channel}' holds a non-finite reading at row {row}")]
    NonFiniteValue { channel: String, row: usize },
}

/// Timestamps are UTC epoch milliseconds. Monotonicity is not enforced here;
/// irregular spacing is reported by the gap detector instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    timestamp_column: String,
    timestamps: Vec<i64>,
    channels: Vec<Channel>,
}

impl Table {
    pub fn new(
        timestamp_column: impl Into<String>,
        timestamps: Vec<i64>,
        channels: Vec<(String, Vec<Value>)>,
    ) -> Result<Self, TableError> {
        let mut seen = HashSet::new();
        let mut built = Vec::with_capacity(channels.len());

        for (name, values) in channels {
            if name.trim().is_empty() {
                return Err(TableError::EmptyChannelName);
            }
            if values.len() != timestamps.len() {
                return Err(TableError::LengthMismatch {
                    channel: name,
                    expected: timestamps.len(),
                    actual: values.len(),
                });
            }
            if !seen.insert(name.clone()) {
                return Err(TableError::DuplicateChannel(name));
            }
            if let Some(row) = values
                .iter()
                .position(|v| matches!(v, Value::Present(x) if !x.is_finite()))
            {
                return Err(TableError::NonFiniteValue { channel: name, row });
            }
            built.push(Channel { name, values });
        }

        Ok(Self {
            timestamp_column: timestamp_column.into(),
            timestamps,
            channels: built,
        })
    }

    pub fn timestamp_column(&self) -> &str {
        &self.timestamp_column
    }

    pub fn timestamps(&self) -> &[i64] {
        &self.timestamps
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn channel_names(&self) -> Vec<String> {
        self.channels.iter().map(|c| c.name.clone()).collect()
    }

    pub fn channel(&self, name: &str) -> Option<&Channel> {
        self.channels.iter().find(|c| c.name == name)
    }

    /// Resolves a caller selection in order. Each channel may be named once.
    pub fn select_channels<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<&Channel>, TableError> {
        let mut seen = HashSet::new();
        names
            .iter()
            .map(|name| {
                let name = name.as_ref();
                if !seen.insert(name) {
                    return Err(TableError::DuplicateChannel(name.to_string()));
                }
                self.channel(name)
                    .ok_or_else(|| TableError::UnknownChannel(name.to_string()))
            })
            .collect()
    }

    /// Replaces a channel's values in place. Callers only reach this on an owned copy.
    pub(crate) fn replace_values(
        &mut self,
        name: &str,
        values: Vec<Value>,
    ) -> Result<(), TableError> {
        let expected = self.timestamps.len();
        let channel = self
            .channels
            .iter_mut()
            .find(|c| c.name == name)
            .ok_or_else(|| TableError::UnknownChannel(name.to_string()))?;
        if values.len() != expected {
            return Err(TableError::LengthMismatch {
                channel: name.to_string(),
                expected,
                actual: values.len(),
            });
        }
        channel.values = values;
        Ok(())
    }
}

/// Formats UTC epoch milliseconds as `YYYY-MM-DD HH:MM:SS`, with milliseconds
/// appended only when non-zero.
pub fn format_ts_ms(ts_ms_utc: i64) -> String {
    match Utc.timestamp_millis_opt(ts_ms_utc).single() {
        Some(dt) if ts_ms_utc.rem_euclid(1_000) == 0 => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S%.3f").to_string(),
        None => ts_ms_utc.to_string(),
    }
}

/// Formats a millisecond interval as `D days HH:MM:SS[.mmm]`.
pub fn format_interval_ms(interval_ms: i64) -> String {
    let sign = if interval_ms < 0 { "-" } else { "" };
    let abs = interval_ms.unsigned_abs();
    let days = abs / 86_400_000;
    let hours = (abs / 3_600_000) % 24;
    let minutes = (abs / 60_000) % 60;
    let seconds = (abs / 1_000) % 60;
    let millis = abs % 1_000;
    if millis == 0 {
        format!("{sign}{days} days {hours:02}:{minutes:02}:{seconds:02}")
    } else {
        format!("{sign}{days} days {hours:02}:{minutes:02}:{seconds:02}.{millis:03}")
    }
}
