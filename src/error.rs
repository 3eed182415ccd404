use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum KiraError {
    #[error("invalid genome accession: {0}")]
    InvalidGenomeAccession(String),

    #[error("invalid batch size {size}: must be between 1 and {max}")]
    InvalidBatchSize { size: usize, max: usize },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("request failed: {0}")]
    Transport(String),

    #[error("remote service returned status {status}: {message}")]
    TransportStatus { status: u16, message: String },

    #[error("no matching record: {0}")]
    Lookup(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("output directory {} already exists and force is not set", .0.display())]
    #[diagnostic(help("pass --force to write into it, and --nodelete to keep its contents"))]
    OutputDirExists(PathBuf),
}

impl KiraError {
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            KiraError::Transport(_) | KiraError::TransportStatus { .. }
        )
    }
}
