//! Store-level error taxonomy.
//!
//! Only `QueryError` and serialization/import failures are caller-visible;
//! everything else in the store is total.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unsupported RDF syntax: {0}")]
    UnsupportedSyntax(String),

    /// Import failures are atomic: the store is left unchanged.
    #[error("failed to parse {syntax} document: {message}")]
    Import {
        syntax: &'static str,
        message: String,
    },

    #[error(transparent)]
    Query(#[from] QueryError),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("malformed pattern query: {0}")]
    Parse(String),

    #[error("unknown prefix in pattern query: {0}")]
    UnknownPrefix(String),
}
