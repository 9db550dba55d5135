//! Deterministic synthetic sensor data with every kind of detectable defect.

use crate::table::{Table, TableError, Value};

pub const DEMO_START_TS_MS: i64 = 1_704_067_200_000; // 2024-01-01T00:00:00Z
pub const DEMO_ROWS: usize = 500;
const STEP_MS: i64 = 60_000;

/// Two channels sampled once a minute:
/// - a 10-minute timestamp jump before row 200
/// - `temperature`: missing rows 50..=52 and 150, spikes at rows 100 and 250,
///   a +6.0 plateau over rows 380..440
/// - `humidity`: a 10-row missing run at 300..310 (longer than the default
///   interpolation limit) and a dropout spike at row 420
pub fn demo_table() -> Result<Table, TableError> {
    let timestamps = (0..DEMO_ROWS as i64)
        .map(|i| {
            let jump = if i >= 200 { 9 * STEP_MS } else { 0 };
            DEMO_START_TS_MS + i * STEP_MS + jump
        })
        .collect();

    let temperature = (0..DEMO_ROWS)
        .map(|i| {
            let t = i as f64;
            let mut v = 20.0 + 0.5 * (t * 0.3).sin();
            if (380..440).contains(&i) {
                v += 6.0;
            }
            if i == 100 || i == 250 {
                v += 15.0;
            }
            if (50..=52).contains(&i) || i == 150 {
                Value::Missing
            } else {
                Value::Present(v)
            }
        })
        .collect();

    let humidity = (0..DEMO_ROWS)
        .map(|i| {
            let t = i as f64;
            let v = 45.0 + 3.0 * (t * 0.2).cos();
            if (300..310).contains(&i) {
                Value::Missing
            } else if i == 420 {
                Value::Present(5.0)
            } else {
                Value::Present(v)
            }
        })
        .collect();

    Table::new(
        "timestamp",
        timestamps,
        vec![
            ("temperature".to_string(), temperature),
            ("humidity".to_string(), humidity),
        ],
    )
}
