use super::RecordError;
use super::metrics::MISSING_VALUE;
use serde::Serialize;
use std::path::Path;

pub const SUMMARY_FILE_NAME: &str = "screening_summary.csv";

/// One line of the gated run summary. Empty cells mean the stage never ran.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SummaryRow {
    pub name: String,
    pub smiles: String,
    pub stages_run: String,
    pub stopped_before: String,
    pub dock: String,
    pub minimize: String,
    pub mmgbsa: String,
    #[serde(rename = "mmgbsa_U")]
    pub mmgbsa_uncertainty: String,
    pub error: String,
}

/// Renders a score cell: empty when absent, `NA` for a failed stage.
pub fn score_cell(score: Option<f64>) -> String {
    match score {
        None => String::new(),
        Some(s) if s.is_nan() => MISSING_VALUE.to_string(),
        Some(s) => s.to_string(),
    }
}

pub fn write_summary(path: &Path, rows: &[SummaryRow]) -> Result<(), RecordError> {
    let csv_error = |source| RecordError::Csv {
        path: path.to_string_lossy().to_string(),
        source,
    };
    let mut writer = csv::Writer::from_path(path).map_err(csv_error)?;
    for row in rows {
        writer.serialize(row).map_err(csv_error)?;
    }
    writer.flush().map_err(|e| RecordError::Io {
        path: path.to_string_lossy().to_string(),
        source: e,
    })
}
