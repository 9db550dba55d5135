use std::fs;

use chrono::{TimeZone, Utc};
use sensor_qc::{
    clean_series, load_table_csv, read_table_csv, render_report, run_all_detections,
    save_table_csv, summarize, write_table_csv, ColumnSelection, IssueType, LoadError, QcConfig,
    Value,
};
use tempfile::tempdir;

const START_TS_MS: i64 = 1_704_067_200_000;
const MINUTE_MS: i64 = 60_000;

const MIXED_CSV: &str = "\
timestamp,site,temperature,humidity
2024-01-01 00:00:00,north,20.5,45.0
2024-01-01 00:01:00,north,20.7,NaN
2024-01-01 00:02:00,north,,44.8
2024-01-01 00:03:00,south,21.0,44.5
";

#[test]
fn auto_detects_timestamp_and_numeric_columns() {
    let dir = tempdir().expect("temp dir should be created");
    let path = dir.path().join("mixed.csv");
    fs::write(&path, MIXED_CSV).expect("fixture should be written");

    let table = load_table_csv(&path, &ColumnSelection::default()).expect("csv should load");

    assert_eq!(table.timestamp_column(), "timestamp");
    assert_eq!(table.channel_names(), vec!["temperature", "humidity"]);
    assert_eq!(
        table.timestamps(),
        &[
            START_TS_MS,
            START_TS_MS + MINUTE_MS,
            START_TS_MS + 2 * MINUTE_MS,
            START_TS_MS + 3 * MINUTE_MS,
        ]
    );
    let temperature = table.channel("temperature").unwrap().values();
    assert_eq!(temperature[2], Value::Missing);
    assert_eq!(temperature[3], Value::Present(21.0));
    assert_eq!(table.channel("humidity").unwrap().missing_count(), 1);
}

#[test]
fn infinite_cells_load_as_missing_and_are_reported() {
    let body = "\
timestamp,v
2024-01-01 00:00:00,1
2024-01-01 00:01:00,2
2024-01-01 00:02:00,inf
2024-01-01 00:03:00,3
2024-01-01 00:04:00,-Infinity
2024-01-01 00:05:00,4
";
    let table = read_table_csv(body.as_bytes(), &ColumnSelection::default()).unwrap();
    let readings = table.channel("v").unwrap().values();
    assert_eq!(readings[2], Value::Missing);
    assert_eq!(readings[4], Value::Missing);

    let stats = summarize(readings);
    assert!(stats.mean.is_some_and(f64::is_finite));
    assert!(stats.std.is_some_and(f64::is_finite));

    let config = QcConfig::default();
    let channels = table.channel_names();
    let issues = run_all_detections(&table, &channels, &config.detection_params()).unwrap();
    let missing_rows: Vec<usize> = issues
        .iter()
        .filter(|i| i.issue_type == IssueType::MissingValue)
        .map(|i| i.row)
        .collect();
    assert_eq!(missing_rows, vec![2, 4]);

    let cleaned = clean_series(&table, &channels, &config.cleaning_params()).unwrap();
    let generated_at = Utc
        .with_ymd_and_hms(2024, 1, 2, 0, 0, 0)
        .single()
        .expect("valid UTC timestamp expected");
    let report = render_report(&table, &cleaned, &issues, &channels, &config, generated_at).unwrap();
    assert!(report.contains("  Missing Value: 2"));
    assert!(report.contains("    Max: 4.0000"));
    assert!(!report.contains("Mean: inf"));
    assert!(!report.contains("Std: NaN"));
}

#[test]
fn explicit_selection_limits_channels() {
    let selection = ColumnSelection {
        timestamp_column: Some("timestamp".to_string()),
        value_columns: Some(vec!["humidity".to_string()]),
    };
    let table = read_table_csv(MIXED_CSV.as_bytes(), &selection).unwrap();
    assert_eq!(table.channel_names(), vec!["humidity"]);
    assert_eq!(table.len(), 4);
}

#[test]
fn explicit_timestamp_column_accepts_epoch_millis() {
    let body = "epoch_ms,flow\n1704067200000,1.0\n1704067260000,1.5\n";

    let auto = read_table_csv(body.as_bytes(), &ColumnSelection::default());
    assert!(matches!(auto, Err(LoadError::NoTimestampColumn)));

    let selection = ColumnSelection {
        timestamp_column: Some("epoch_ms".to_string()),
        value_columns: None,
    };
    let table = read_table_csv(body.as_bytes(), &selection).unwrap();
    assert_eq!(table.timestamps(), &[START_TS_MS, START_TS_MS + MINUTE_MS]);
    assert_eq!(table.channel_names(), vec!["flow"]);
}

#[test]
fn selection_errors_name_the_offending_column() {
    let selection = ColumnSelection {
        timestamp_column: None,
        value_columns: Some(vec!["pressure".to_string()]),
    };
    match read_table_csv(MIXED_CSV.as_bytes(), &selection) {
        Err(LoadError::UnknownColumn(name)) => assert_eq!(name, "pressure"),
        other => panic!("expected unknown column error, got {other:?}"),
    }

    let selection = ColumnSelection {
        timestamp_column: None,
        value_columns: Some(vec!["site".to_string()]),
    };
    match read_table_csv(MIXED_CSV.as_bytes(), &selection) {
        Err(LoadError::ParseValue { row, column, value }) => {
            assert_eq!((row, column.as_str(), value.as_str()), (0, "site", "north"));
        }
        other => panic!("expected parse error, got {other:?}"),
    }
}

#[test]
fn text_only_files_are_rejected() {
    let body = "timestamp,site\n2024-01-01 00:00:00,north\n";
    assert!(matches!(
        read_table_csv(body.as_bytes(), &ColumnSelection::default()),
        Err(LoadError::NoNumericColumns)
    ));

    let body = "label,value\nfirst,1.0\n";
    assert!(matches!(
        read_table_csv(body.as_bytes(), &ColumnSelection::default()),
        Err(LoadError::NoTimestampColumn)
    ));
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempdir().unwrap();
    let result = load_table_csv(&dir.path().join("absent.csv"), &ColumnSelection::default());
    assert!(matches!(result, Err(LoadError::Io(_))));
}

#[test]
fn export_writes_empty_cells_for_missing_values() {
    let table = read_table_csv(MIXED_CSV.as_bytes(), &ColumnSelection::default()).unwrap();
    let mut out = Vec::new();
    write_table_csv(&mut out, &table).expect("export should succeed");
    let text = String::from_utf8(out).unwrap();

    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "timestamp,temperature,humidity");
    assert_eq!(lines[1], "2024-01-01 00:00:00,20.5,45");
    assert_eq!(lines[2], "2024-01-01 00:01:00,20.7,");
    assert_eq!(lines[3], "2024-01-01 00:02:00,,44.8");
}

#[test]
fn saved_table_loads_back_identically() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("cleaned.csv");
    let table = read_table_csv(MIXED_CSV.as_bytes(), &ColumnSelection::default()).unwrap();

    save_table_csv(&path, &table).unwrap();
    let reloaded = load_table_csv(&path, &ColumnSelection::default()).unwrap();
    assert_eq!(reloaded, table);
}
