//! Error types for the parlance library.
//!
//! All fallible operations return [`Result`], whose error side is the
//! [`ParlanceError`] enum. Parse errors carry the template line/column and
//! the offending span so callers can point at the broken input.
//!
//! # Examples
//!
//! ```
//! use parlance::error::{ParlanceError, Result};
//!
//! fn example_operation() -> Result<()> {
//!     Err(ParlanceError::config("missing template file"))
//! }
//!
//! match example_operation() {
//!     Ok(_) => println!("Success"),
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

use std::io;

use thiserror::Error;

/// The main error type for parlance operations.
#[derive(Error, Debug)]
pub enum ParlanceError {
    /// Malformed template text. Fatal to parsing.
    #[error("parse error at line {line}, column {column}: {message} ({span:?})")]
    Parse {
        /// 1-based template line.
        line: usize,
        /// 1-based column within the line.
        column: usize,
        /// Short description of what went wrong.
        message: String,
        /// The offending span of template text.
        span: String,
    },

    /// Recursive rule, missing slot, or expansion depth exceeded.
    #[error("expansion error: {0}")]
    Expansion(String),

    /// Internal invariant violation while building the graph.
    #[error("compile error: {0}")]
    Compile(String),

    /// Unknown converter or malformed converter output.
    #[error("recognition error: {0}")]
    Recognition(String),

    /// I/O errors (FST/symbol file writing, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid configuration (CLI adapter, option validation)
    #[error("configuration error: {0}")]
    Config(String),

    /// Generic anyhow error from embedding applications
    #[error("error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

/// Result type alias for operations that may fail with ParlanceError.
pub type Result<T> = std::result::Result<T, ParlanceError>;

impl ParlanceError {
    /// Create a new parse error with positional context.
    pub fn parse<M, S>(line: usize, column: usize, message: M, span: S) -> Self
    where
        M: Into<String>,
        S: Into<String>,
    {
        ParlanceError::Parse {
            line,
            column,
            message: message.into(),
            span: span.into(),
        }
    }

    /// Create a new expansion error.
    pub fn expansion<S: Into<String>>(msg: S) -> Self {
        ParlanceError::Expansion(msg.into())
    }

    /// Create a new compile error.
    pub fn compile<S: Into<String>>(msg: S) -> Self {
        ParlanceError::Compile(msg.into())
    }

    /// Create a new recognition error.
    pub fn recognition<S: Into<String>>(msg: S) -> Self {
        ParlanceError::Recognition(msg.into())
    }

    /// Create a new configuration error.
    pub fn config<S: Into<String>>(msg: S) -> Self {
        ParlanceError::Config(msg.into())
    }
}
