//! Sensor time-series quality control.
//!
//! Implemented scope:
//! - detection: timestamp gaps, missing values, z-score/IQR outliers, drift regions
//! - cleaning: outlier removal or rolling-mean replacement, then bounded interpolation
//! - plain-text QC report and CSV load/export at the boundary

mod cleaners;
mod demo;
mod detectors;
mod loader;
mod observability;
mod params;
mod report;
mod stats;
mod table;

pub use cleaners::{
    clean_series, interpolate_gaps, remove_outliers_iqr, remove_outliers_zscore,
    replace_outliers_rolling,
};
pub use demo::{demo_table, DEMO_ROWS, DEMO_START_TS_MS};
pub use detectors::{
    count_issues_by_type, detect_drift, detect_gaps, detect_outliers_iqr, detect_outliers_zscore,
    drift_regions, run_all_detections, DriftRegion, Issue, IssueType, QcError,
};
pub use loader::{
    load_table_csv, parse_timestamp, read_table_csv, save_table_csv, write_table_csv,
    ColumnSelection, LoadError,
};
pub use observability::{
    init_logging, log_dataset_selected, log_output_written, log_run_start,
    logging_config_from_env, LogFormat, LoggingConfig, LoggingInitError,
};
pub use params::{
    qc_config_from_env, CleaningParameters, DetectionParameters, OutlierAction, OutlierMethod,
    ParamError, QcConfig,
};
pub use report::render_report;
pub use stats::{
    centered_rolling_mean, mean, median, present_values, quantile, sample_std, summarize,
    SummaryStats,
};
pub use table::{format_interval_ms, format_ts_ms, Channel, Table, TableError, Value};
