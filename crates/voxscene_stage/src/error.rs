//! # Stage Error Types
//!
//! All errors that can occur while opening or parsing a scene document.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur in the stage layer.
#[derive(Error, Debug)]
pub enum StageError {
    /// The backing file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// File that failed to open.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },

    /// The document is not a `.usda` text layer.
    #[error("unsupported scene format: {0}")]
    UnsupportedFormat(String),

    /// The text layer is malformed.
    #[error("syntax error at {line}:{column}: {message}")]
    Syntax {
        /// 1-based line of the offending token.
        line: u32,
        /// 1-based column of the offending token.
        column: u32,
        /// What went wrong.
        message: String,
    },

    /// Two sibling prims share a name within the layer.
    #[error("duplicate prim definition: {0}")]
    DuplicatePrim(String),
}

impl StageError {
    /// Creates a syntax error at a source position.
    #[must_use]
    pub fn syntax(line: u32, column: u32, message: impl Into<String>) -> Self {
        Self::Syntax {
            line,
            column,
            message: message.into(),
        }
    }
}

/// Result type for stage operations.
pub type StageResult<T> = Result<T, StageError>;
