use std::fs;
use std::path::PathBuf;

use chrono::Utc;
use sensor_qc::{
    clean_series, demo_table, init_logging, load_table_csv, log_dataset_selected,
    log_output_written, log_run_start, logging_config_from_env, qc_config_from_env, render_report,
    run_all_detections, save_table_csv, ColumnSelection, Table,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let logging_cfg = logging_config_from_env();
    init_logging(&logging_cfg)?;
    log_run_start(&logging_cfg);

    let config = qc_config_from_env()?;
    let table = input_table()?;

    let channels = env_nonempty("QC_VALUE_COLUMNS")
        .map(|raw| split_columns(&raw))
        .unwrap_or_else(|| table.channel_names());

    let issues = run_all_detections(&table, &channels, &config.detection_params())?;
    let cleaned = clean_series(&table, &channels, &config.cleaning_params())?;
    let report = render_report(&table, &cleaned, &issues, &channels, &config, Utc::now())?;
    println!("{report}");

    if let Some(path) = env_nonempty("QC_CLEANED_CSV").map(PathBuf::from) {
        save_table_csv(&path, &cleaned)?;
        log_output_written("cleaned_csv", &path);
    }

    if let Some(path) = env_nonempty("QC_ISSUES_JSON").map(PathBuf::from) {
        fs::write(&path, serde_json::to_vec_pretty(&issues)?)?;
        log_output_written("issues_json", &path);
    }

    Ok(())
}

fn input_table() -> Result<Table, Box<dyn std::error::Error>> {
    let path = std::env::args()
        .nth(1)
        .or_else(|| env_nonempty("QC_INPUT_CSV"))
        .map(PathBuf::from);

    match path {
        Some(path) => {
            let selection = ColumnSelection {
                timestamp_column: env_nonempty("QC_TIMESTAMP_COLUMN"),
                value_columns: env_nonempty("QC_VALUE_COLUMNS").map(|raw| split_columns(&raw)),
            };
            let table = load_table_csv(&path, &selection)?;
            log_dataset_selected(
                &path.display().to_string(),
                table.len(),
                table.channels().len(),
                None,
            );
            Ok(table)
        }
        None => {
            let table = demo_table()?;
            log_dataset_selected(
                "demo",
                table.len(),
                table.channels().len(),
                Some("no input csv given"),
            );
            Ok(table)
        }
    }
}

fn env_nonempty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
}

fn split_columns(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .collect()
}
