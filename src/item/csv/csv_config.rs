use std::io::Read;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::CsvError;

const CR: char = '\r';
const LF: char = '\n';

/// How the writer decides whether a value is wrapped in quote characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum QuotePolicy {
    /// Every non-null value is quoted.
    #[default]
    All,
    /// Only values containing the separator, the quote character or a line break are quoted.
    Minimal,
    /// Quoted when the per-column override flag is set, otherwise as `Minimal`.
    Column,
}

/// Parsing and writing parameters shared by [`CsvTokenReader`](super::csv_reader::CsvTokenReader)
/// and [`CsvTokenWriter`](super::csv_writer::CsvTokenWriter).
///
/// A configuration is validated once when a reader or writer is built from it and is then
/// snapshotted, so later changes never affect an open stream.
///
/// # Default Configuration
///
/// - Separator: comma (`,`)
/// - Quote: double quote (`"`)
/// - Escape: backslash (`\`)
/// - Line separator: CRLF
/// - Quote policy: [`QuotePolicy::All`]
/// - Variable columns: allowed
///
/// # Examples
///
/// ```
/// use delimited_rs::item::csv::csv_config::{CsvConfig, QuotePolicy};
///
/// let config = CsvConfig {
///     separator: '\t',
///     null_string: Some("NULL".to_string()),
///     quote_policy: QuotePolicy::Minimal,
///     ..CsvConfig::default()
/// };
///
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CsvConfig {
    /// Field separator.
    pub separator: char,
    /// Quote character used to enclose fields.
    pub quote: char,
    /// Escape character.
    pub escape: char,
    pub quote_disabled: bool,
    pub escape_disabled: bool,
    /// Replacement for line breaks found inside enclosed values.
    pub break_string: Option<String>,
    /// Literal that stands for an absent value on the wire.
    pub null_string: Option<String>,
    pub null_string_ignore_case: bool,
    pub ignore_leading_whitespace: bool,
    pub ignore_trailing_whitespace: bool,
    pub ignore_empty_lines: bool,
    /// Regular expressions; physical lines fully matching any of them are skipped.
    pub ignore_line_patterns: Vec<String>,
    /// Number of leading physical lines discarded once at stream start.
    pub skip_lines: usize,
    /// Empty values are read back as `None`.
    pub empty_to_null: bool,
    /// Row terminator used by the writer.
    pub line_separator: String,
    pub quote_policy: QuotePolicy,
    /// Emit a UTF-8 byte order mark before the first write.
    pub utf8_bom: bool,
    /// Whether rows may have differing numbers of columns.
    pub variable_columns: bool,
}

impl Default for CsvConfig {
    fn default() -> Self {
        Self {
            separator: ',',
            quote: '"',
            escape: '\\',
            quote_disabled: false,
            escape_disabled: false,
            break_string: None,
            null_string: None,
            null_string_ignore_case: false,
            ignore_leading_whitespace: false,
            ignore_trailing_whitespace: false,
            ignore_empty_lines: false,
            ignore_line_patterns: Vec::new(),
            skip_lines: 0,
            empty_to_null: false,
            line_separator: "\r\n".to_string(),
            quote_policy: QuotePolicy::All,
            utf8_bom: false,
            variable_columns: true,
        }
    }
}

impl CsvConfig {
    /// Creates a configuration with the given structural characters and defaults elsewhere.
    pub fn new(separator: char, quote: char, escape: char) -> Self {
        Self {
            separator,
            quote,
            escape,
            ..Self::default()
        }
    }

    /// Loads a configuration from its JSON representation. Missing fields take their defaults.
    ///
    /// ```
    /// use delimited_rs::item::csv::csv_config::{CsvConfig, QuotePolicy};
    ///
    /// let config = CsvConfig::from_json(r#"{"separator": ";", "quote_policy": "Minimal"}"#).unwrap();
    /// assert_eq!(config.separator, ';');
    /// assert_eq!(config.quote, '"');
    /// assert_eq!(config.quote_policy, QuotePolicy::Minimal);
    /// ```
    pub fn from_json(json: &str) -> Result<Self, CsvError> {
        let config: CsvConfig = serde_json::from_str(json)
            .map_err(|error| CsvError::Configuration(error.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a configuration from a JSON document read from `rdr`.
    pub fn from_json_reader<R: Read>(rdr: R) -> Result<Self, CsvError> {
        let config: CsvConfig = serde_json::from_reader(rdr)
            .map_err(|error| CsvError::Configuration(error.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the separator/quote/escape combination and the ignore-line patterns.
    ///
    /// # Errors
    ///
    /// Returns [`CsvError::Configuration`] if
    /// - the separator is CR or LF,
    /// - quoting is enabled and the quote equals the separator, CR or LF,
    /// - escaping is enabled and the escape equals the separator, CR or LF,
    /// - an ignore-line pattern is not a valid regular expression.
    pub fn validate(&self) -> Result<(), CsvError> {
        if is_line_break(self.separator) {
            return Err(CsvError::Configuration(format!(
                "invalid separator {:?}",
                self.separator
            )));
        }

        if !self.quote_disabled && (self.quote == self.separator || is_line_break(self.quote)) {
            return Err(CsvError::Configuration(format!(
                "invalid quote character {:?}",
                self.quote
            )));
        }

        if !self.escape_disabled && (self.escape == self.separator || is_line_break(self.escape)) {
            return Err(CsvError::Configuration(format!(
                "invalid escape character {:?}",
                self.escape
            )));
        }

        self.compile_patterns().map(|_| ())
    }

    /// Compiles the ignore-line patterns, anchored so that they must match a whole line.
    pub(crate) fn compile_patterns(&self) -> Result<Vec<Regex>, CsvError> {
        self.ignore_line_patterns
            .iter()
            .map(|pattern| {
                Regex::new(&format!("^(?:{pattern})$")).map_err(|error| {
                    CsvError::Configuration(format!("invalid ignore pattern {pattern:?}: {error}"))
                })
            })
            .collect()
    }

    pub(crate) fn is_null_string(&self, value: &str) -> bool {
        match &self.null_string {
            Some(null_string) if self.null_string_ignore_case => {
                value.to_lowercase() == null_string.to_lowercase()
            }
            Some(null_string) => value == null_string,
            None => false,
        }
    }
}

pub(crate) fn is_line_break(c: char) -> bool {
    c == CR || c == LF
}
