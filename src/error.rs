use thiserror::Error;

use crate::item::csv::csv_token::CsvToken;

#[derive(Error, Debug)]
/// Errors raised while configuring, reading or writing delimited text.
pub enum CsvError {
    /// Invalid separator/quote/escape combination or ignore-line pattern.
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// The reader or writer has already been closed.
    #[error("Stream closed")]
    Closed,

    /// A row read from the stream does not have the established number of tokens.
    #[error("Token count mismatch at line {line}: expected {expected}, got {actual}")]
    TokenCount {
        line: usize,
        expected: usize,
        actual: usize,
        tokens: Vec<CsvToken>,
    },

    /// A row submitted to the writer does not have the established number of values.
    #[error("Value count mismatch: expected {expected}, got {actual}")]
    ValueCount {
        expected: usize,
        actual: usize,
        values: Vec<Option<String>>,
    },

    /// Quote override flags were given for a row of a different length.
    #[error("Quote flags length mismatch: expected {expected}, got {actual}")]
    QuoteFlags { expected: usize, actual: usize },

    /// A value needs escaping but escaping is disabled.
    #[error("Value cannot be written without an escape character: {0:?}")]
    Unescapable(String),

    /// The input stream is not well formed (e.g. invalid UTF-8).
    #[error("Malformed input at line {line}: {message}")]
    Malformed { line: usize, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
