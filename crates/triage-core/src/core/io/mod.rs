use thiserror::Error;

pub mod ligands;
pub mod metrics;
pub mod summary;
pub mod table;

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("CSV error for '{path}': {source}")]
    Csv { path: String, source: csv::Error },
    #[error("Malformed record in '{path}' at line {line}: {message}")]
    Malformed {
        path: String,
        line: u64,
        message: String,
    },
}
