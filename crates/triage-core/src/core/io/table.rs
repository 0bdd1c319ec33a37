use super::RecordError;
use super::metrics::MISSING_VALUE;
use std::io::Write;
use std::path::Path;

/// One row of a bulk result table.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreRow {
    pub smiles: String,
    pub name: String,
    pub score: f64,
}

/// Writes `smile,name,<column>` rows in the given order. `NaN` scores are written as `NA`.
pub fn write_score_table(
    writer: impl Write,
    column: &str,
    rows: &[ScoreRow],
) -> Result<(), csv::Error> {
    let mut writer = csv::Writer::from_writer(writer);
    writer.write_record(["smile", "name", column])?;
    for row in rows {
        let score = if row.score.is_nan() {
            MISSING_VALUE.to_string()
        } else {
            row.score.to_string()
        };
        writer.write_record([row.smiles.as_str(), row.name.as_str(), score.as_str()])?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_score_table_to_path(
    path: &Path,
    column: &str,
    rows: &[ScoreRow],
) -> Result<(), RecordError> {
    let file = std::fs::File::create(path).map_err(|e| RecordError::Io {
        path: path.to_string_lossy().to_string(),
        source: e,
    })?;
    write_score_table(file, column, rows).map_err(|e| RecordError::Csv {
        path: path.to_string_lossy().to_string(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_header_and_rows_in_order() {
        let rows = vec![
            ScoreRow {
                smiles: "CCO".into(),
                name: "ethanol".into(),
                score: -5.5,
            },
            ScoreRow {
                smiles: "C".into(),
                name: "methane".into(),
                score: f64::NAN,
            },
        ];
        let mut buffer = Vec::new();
        write_score_table(&mut buffer, "dock", &rows).unwrap();

        let text = String::from_utf8(buffer).unwrap();
        assert_eq!(text, "smile,name,dock\nCCO,ethanol,-5.5\nC,methane,NA\n");
    }

    #[test]
    fn smiles_with_commas_are_quoted() {
        let rows = vec![ScoreRow {
            smiles: "C,C".into(),
            name: "odd".into(),
            score: 1.0,
        }];
        let mut buffer = Vec::new();
        write_score_table(&mut buffer, "dock", &rows).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert_eq!(text, "smile,name,dock\n\"C,C\",odd,1\n");
    }
}
