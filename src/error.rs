use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced while configuring or running an inversion.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed or inconsistent settings (bad flag value, missing input).
    #[error("configuration error: {0}")]
    Config(String),

    /// A file could not be opened, read, or written.
    #[error("could not access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An input file held something other than the expected numbers.
    #[error("parse error in {} at line {line}: {message}", path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    /// Vector and matrix shapes do not line up.
    #[error("dimension mismatch: {0}")]
    Dimension(String),

    /// A matrix that must be symmetric positive definite is not.
    #[error("numerical error: {0}")]
    Numerical(String),
}

pub type Result<T> = std::result::Result<T, Error>;
