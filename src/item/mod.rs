#[cfg(feature = "logger")]
/// This module provides a logger item writer, useful to trace rows without writing them.
pub mod logger;

/// This module provides the delimited-text tokenizer and writer.
pub mod csv;
