//! Detection/cleaning parameter sets and their environment overrides.

use std::env;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutlierMethod {
    ZScore,
    Iqr,
    Both,
}

impl OutlierMethod {
    pub fn label(self) -> &'static str {
        match self {
            Self::ZScore => "Z-Score",
            Self::Iqr => "IQR",
            Self::Both => "Both",
        }
    }
}

impl fmt::Display for OutlierMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for OutlierMethod {
    type Err = ParamError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "z-score" | "zscore" | "z_score" | "z" => Ok(Self::ZScore),
            "iqr" => Ok(Self::Iqr),
            "both" => Ok(Self::Both),
            _ => Err(ParamError::UnknownOutlierMethod(raw.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutlierAction {
    ReplaceWithRollingMean,
    RemoveSetMissing,
}

impl OutlierAction {
    pub fn label(self) -> &'static str {
        match self {
            Self::ReplaceWithRollingMean => "Replace with rolling mean",
            Self::RemoveSetMissing => "Remove (set missing)",
        }
    }
}

impl fmt::Display for OutlierAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for OutlierAction {
    type Err = ParamError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "replace" | "rolling-mean" | "rolling_mean" | "replace with rolling mean" => {
                Ok(Self::ReplaceWithRollingMean)
            }
            "remove" | "set-missing" | "set_missing" | "remove (set nan)"
            | "remove (set missing)" => Ok(Self::RemoveSetMissing),
            _ => Err(ParamError::UnknownOutlierAction(raw.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParamError {
    #[error("unknown outlier method: {0}")]
    UnknownOutlierMethod(String),
    #[error("unknown outlier action: {0}")]
    UnknownOutlierAction(String),
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectionParameters {
    pub zscore_threshold: f64,
    pub iqr_factor: f64,
    pub drift_window: usize,
    pub drift_threshold: f64,
    pub outlier_method: OutlierMethod,
}

impl Default for DetectionParameters {
    fn default() -> Self {
        Self {
            zscore_threshold: 3.0,
            iqr_factor: 1.5,
            drift_window: 50,
            drift_threshold: 2.0,
            outlier_method: OutlierMethod::ZScore,
        }
    }
}

impl DetectionParameters {
    pub fn validate(&self) -> Result<(), ParamError> {
        validate_positive("zscore_threshold", self.zscore_threshold)?;
        validate_non_negative("iqr_factor", self.iqr_factor)?;
        validate_window("drift_window", self.drift_window)?;
        validate_non_negative("drift_threshold", self.drift_threshold)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CleaningParameters {
    pub outlier_method: OutlierMethod,
    pub outlier_action: OutlierAction,
    pub zscore_threshold: f64,
    pub iqr_factor: f64,
    pub rolling_window: usize,
    pub interpolate_max_gap: usize,
}

impl Default for CleaningParameters {
    fn default() -> Self {
        Self {
            outlier_method: OutlierMethod::ZScore,
            outlier_action: OutlierAction::ReplaceWithRollingMean,
            zscore_threshold: 3.0,
            iqr_factor: 1.5,
            rolling_window: 10,
            interpolate_max_gap: 5,
        }
    }
}

impl CleaningParameters {
    pub fn validate(&self) -> Result<(), ParamError> {
        validate_positive("zscore_threshold", self.zscore_threshold)?;
        validate_non_negative("iqr_factor", self.iqr_factor)?;
        validate_window("rolling_window", self.rolling_window)
    }
}

/// The user-facing parameter set. Detection and cleaning share the outlier
/// method, z-score threshold and IQR factor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QcConfig {
    pub outlier_method: OutlierMethod,
    pub outlier_action: OutlierAction,
    pub zscore_threshold: f64,
    pub iqr_factor: f64,
    pub rolling_window: usize,
    pub interpolate_max_gap: usize,
    pub drift_window: usize,
    pub drift_threshold: f64,
}

impl Default for QcConfig {
    fn default() -> Self {
        let detection = DetectionParameters::default();
        let cleaning = CleaningParameters::default();
        Self {
            outlier_method: detection.outlier_method,
            outlier_action: cleaning.outlier_action,
            zscore_threshold: detection.zscore_threshold,
            iqr_factor: detection.iqr_factor,
            rolling_window: cleaning.rolling_window,
            interpolate_max_gap: cleaning.interpolate_max_gap,
            drift_window: detection.drift_window,
            drift_threshold: detection.drift_threshold,
        }
    }
}

impl QcConfig {
    pub fn detection_params(&self) -> DetectionParameters {
        DetectionParameters {
            zscore_threshold: self.zscore_threshold,
            iqr_factor: self.iqr_factor,
            drift_window: self.drift_window,
            drift_threshold: self.drift_threshold,
            outlier_method: self.outlier_method,
        }
    }

    pub fn cleaning_params(&self) -> CleaningParameters {
        CleaningParameters {
            outlier_method: self.outlier_method,
            outlier_action: self.outlier_action,
            zscore_threshold: self.zscore_threshold,
            iqr_factor: self.iqr_factor,
            rolling_window: self.rolling_window,
            interpolate_max_gap: self.interpolate_max_gap,
        }
    }

    pub fn validate(&self) -> Result<(), ParamError> {
        self.detection_params().validate()?;
        self.cleaning_params().validate()
    }

    /// Labelled parameter echo, in the order the report prints it.
    pub fn report_entries(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Outlier method", self.outlier_method.to_string()),
            ("Z-Score threshold", self.zscore_threshold.to_string()),
            ("IQR factor", self.iqr_factor.to_string()),
            ("Outlier action", self.outlier_action.to_string()),
            ("Rolling window", self.rolling_window.to_string()),
            ("Interpolation max gap", self.interpolate_max_gap.to_string()),
            ("Drift detection window", self.drift_window.to_string()),
            ("Drift threshold", self.drift_threshold.to_string()),
        ]
    }
}

/// Applies `QC_*` environment overrides on top of the defaults.
///
/// Unset or blank variables keep the default. A variable that is set but
/// malformed is an error rather than a silent fallback.
pub fn qc_config_from_env() -> Result<QcConfig, ParamError> {
    let mut config = QcConfig::default();

    if let Some(raw) = env_value("QC_OUTLIER_METHOD") {
        config.outlier_method = raw.parse()?;
    }
    if let Some(raw) = env_value("QC_OUTLIER_ACTION") {
        config.outlier_action = raw.parse()?;
    }
    if let Some(raw) = env_value("QC_ZSCORE_THRESHOLD") {
        config.zscore_threshold = parse_number("zscore_threshold", &raw)?;
    }
    if let Some(raw) = env_value("QC_IQR_FACTOR") {
        config.iqr_factor = parse_number("iqr_factor", &raw)?;
    }
    if let Some(raw) = env_value("QC_ROLLING_WINDOW") {
        config.rolling_window = parse_number("rolling_window", &raw)?;
    }
    if let Some(raw) = env_value("QC_INTERPOLATE_MAX_GAP") {
        config.interpolate_max_gap = parse_number("interpolate_max_gap", &raw)?;
    }
    if let Some(raw) = env_value("QC_DRIFT_WINDOW") {
        config.drift_window = parse_number("drift_window", &raw)?;
    }
    if let Some(raw) = env_value("QC_DRIFT_THRESHOLD") {
        config.drift_threshold = parse_number("drift_threshold", &raw)?;
    }

    config.validate()?;
    Ok(config)
}

fn env_value(key: &str) -> Option<String> {
    let raw = env::var(key).ok()?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn parse_number<T: FromStr>(field: &'static str, raw: &str) -> Result<T, ParamError> {
    raw.parse::<T>().map_err(|_| ParamError::InvalidValue {
        field,
        reason: format!("cannot parse '{raw}'"),
    })
}

fn validate_positive(field: &'static str, value: f64) -> Result<(), ParamError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(ParamError::InvalidValue {
            field,
            reason: format!("must be a finite number > 0, got {value}"),
        });
    }
    Ok(())
}

fn validate_non_negative(field: &'static str, value: f64) -> Result<(), ParamError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ParamError::InvalidValue {
            field,
            reason: format!("must be a finite number >= 0, got {value}"),
        });
    }
    Ok(())
}

fn validate_window(field: &'static str, value: usize) -> Result<(), ParamError> {
    if value == 0 {
        return Err(ParamError::InvalidValue {
            field,
            reason: "must be >= 1".to_string(),
        });
    }
    Ok(())
}
