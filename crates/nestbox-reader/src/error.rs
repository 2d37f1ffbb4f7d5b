//! Reader driver errors.

use thiserror::Error;

/// Errors from the physical link or a replay source.
#[derive(Debug, Error)]
pub enum ReaderError {
    /// A replay script line failed to parse.
    #[error("failed to parse replay script at line {line}: {detail}")]
    Script { line: usize, detail: String },

    /// Link-level I/O failure.
    #[error("reader link error: {0}")]
    Io(#[from] std::io::Error),
}
