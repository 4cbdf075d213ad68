//! Error types for taxdoc
//!
//! Per-document problems (parse failures, conformance violations, rule
//! findings) are captured inside response payloads and never surface through
//! this type. `Error` covers the remaining operational failures:
//! configuration, schema loading and external engine faults.

use thiserror::Error;

/// Result type alias using taxdoc Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for taxdoc operations
#[derive(Error, Debug)]
pub enum Error {
    /// Service or schema configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Schema loading/parsing error (fatal at startup)
    #[error("schema error: {0}")]
    Schema(String),

    /// XML document error
    #[error("XML error: {0}")]
    Xml(String),

    /// External engine fault outside its normal error-reporting path
    #[error("engine error: {0}")]
    Engine(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}
