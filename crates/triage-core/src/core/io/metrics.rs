use super::RecordError;
use crate::core::models::report::{Estimate, Stage};
use std::path::{Path, PathBuf};

pub const METRICS_FILE_NAME: &str = "metrics.csv";
pub const MISSING_VALUE: &str = "NA";

/// The per-candidate metrics table: one header row and one data row.
///
/// Every completed stage appends a value column and an uncertainty column. Failed stages are
/// written as [`MISSING_VALUE`] so downstream tooling sees which stage broke.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsRecord {
    headers: Vec<String>,
    values: Vec<String>,
}

impl MetricsRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn path_in(dir: &Path) -> PathBuf {
        dir.join(METRICS_FILE_NAME)
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.headers
            .iter()
            .position(|h| h == column)
            .and_then(|i| self.values.get(i))
            .map(String::as_str)
    }

    /// Numeric value of a column; `None` when the column is absent or holds [`MISSING_VALUE`].
    pub fn get_f64(&self, column: &str) -> Option<f64> {
        self.get(column).and_then(|v| v.parse().ok())
    }

    pub fn append(&mut self, stage: Stage, estimate: Estimate) {
        let [value_col, uncertainty_col] = stage.metrics_columns();
        self.headers.push(value_col.to_string());
        self.headers.push(uncertainty_col.to_string());
        if estimate.is_failed() {
            self.values.push(MISSING_VALUE.to_string());
            self.values.push(MISSING_VALUE.to_string());
        } else {
            self.values.push(estimate.value.to_string());
            self.values.push(format_uncertainty(estimate.uncertainty));
        }
    }

    pub fn read_from_dir(dir: &Path) -> Result<Self, RecordError> {
        let path = Self::path_in(dir);
        let origin = path.to_string_lossy().to_string();
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_path(&path)
            .map_err(|e| RecordError::Csv {
                path: origin.clone(),
                source: e,
            })?;

        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| RecordError::Csv {
                path: origin.clone(),
                source: e,
            })?
            .iter()
            .map(str::to_string)
            .collect();

        let values: Vec<String> = match reader.records().next() {
            Some(record) => record
                .map_err(|e| RecordError::Csv {
                    path: origin.clone(),
                    source: e,
                })?
                .iter()
                .map(str::to_string)
                .collect(),
            None => {
                return Err(RecordError::Malformed {
                    path: origin,
                    line: 2,
                    message: "metrics record has a header but no data row".to_string(),
                });
            }
        };

        Ok(Self { headers, values })
    }

    pub fn write_to_dir(&self, dir: &Path) -> Result<(), RecordError> {
        let path = Self::path_in(dir);
        let origin = path.to_string_lossy().to_string();
        let csv_err = |e| RecordError::Csv {
            path: origin.clone(),
            source: e,
        };

        let mut writer = csv::Writer::from_path(&path).map_err(csv_err)?;
        writer.write_record(&self.headers).map_err(csv_err)?;
        writer.write_record(&self.values).map_err(csv_err)?;
        writer.flush().map_err(|e| RecordError::Io {
            path: origin.clone(),
            source: e,
        })
    }

    /// Records one stage's columns in `dir`.
    ///
    /// Docking opens the funnel, so it replaces whatever record a previous run left behind.
    /// Later stages append to the existing record, creating it if absent.
    pub fn record_stage_in_dir(
        dir: &Path,
        stage: Stage,
        estimate: Estimate,
    ) -> Result<Self, RecordError> {
        let mut record = if stage != Stage::Dock && Self::path_in(dir).exists() {
            Self::read_from_dir(dir)?
        } else {
            Self::new()
        };
        record.append(stage, estimate);
        record.write_to_dir(dir)?;
        Ok(record)
    }
}

fn format_uncertainty(u: f64) -> String {
    if u.is_nan() {
        MISSING_VALUE.to_string()
    } else {
        u.to_string()
    }
}
