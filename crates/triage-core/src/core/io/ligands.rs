use super::RecordError;
use crate::core::models::candidate::Candidate;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::debug;

/// Options controlling how a ligand list is read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LigandListOptions {
    /// Whether the first non-comment line is a header to skip.
    pub has_header: bool,
    /// Field delimiter; runs of the delimiter are treated as one separator.
    pub delimiter: u8,
    /// Keep only the first `limit` candidates.
    pub limit: Option<usize>,
}

impl Default for LigandListOptions {
    fn default() -> Self {
        Self {
            has_header: false,
            delimiter: b' ',
            limit: None,
        }
    }
}

/// Reads a `SMILES NAME` ligand list, one candidate per line. Lines starting with `#` are ignored.
pub fn read_from_path(
    path: &Path,
    options: &LigandListOptions,
) -> Result<Vec<Candidate>, RecordError> {
    let file = File::open(path).map_err(|e| RecordError::Io {
        path: path.to_string_lossy().to_string(),
        source: e,
    })?;
    read_from(file, &path.to_string_lossy(), options)
}

pub fn read_from(
    reader: impl Read,
    origin: &str,
    options: &LigandListOptions,
) -> Result<Vec<Candidate>, RecordError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(options.delimiter)
        .has_headers(options.has_header)
        .flexible(true)
        .comment(Some(b'#'))
        .from_reader(reader);

    let mut candidates = Vec::new();
    for result in reader.records() {
        if options.limit.is_some_and(|limit| candidates.len() >= limit) {
            break;
        }

        let record = result.map_err(|e| RecordError::Csv {
            path: origin.to_string(),
            source: e,
        })?;
        let line = record.position().map(|p| p.line()).unwrap_or_default();

        let mut fields = record.iter().map(str::trim).filter(|f| !f.is_empty());
        let Some(smiles) = fields.next() else {
            continue;
        };
        let name = fields.next().ok_or_else(|| RecordError::Malformed {
            path: origin.to_string(),
            line,
            message: format!("expected 'SMILES NAME', found only '{}'", smiles),
        })?;

        candidates.push(Candidate::new(candidates.len(), name, smiles));
    }

    debug!(
        count = candidates.len(),
        origin, "Loaded candidates from ligand list."
    );
    Ok(candidates)
}
