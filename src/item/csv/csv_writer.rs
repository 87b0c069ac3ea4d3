use std::{
    cell::RefCell,
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

use log::debug;

use crate::{
    core::item::{ItemWriter, ItemWriterResult},
    error::CsvError,
    item::csv::{
        csv_config::{CsvConfig, QuotePolicy},
        csv_token::CsvToken,
    },
};

const CR: char = '\r';
const LF: char = '\n';
const BOM: char = '\u{feff}';

/// A writer serializing rows of values as delimited text.
///
/// Each value is quoted according to the configured [`QuotePolicy`], embedded quote or
/// separator characters are escaped, and absent values are written as the configured null
/// string. Output is buffered; call [`flush`](Self::flush) or [`close`](Self::close) to push
/// it to the sink.
///
/// # Examples
///
/// ```
/// use delimited_rs::item::csv::csv_config::{CsvConfig, QuotePolicy};
/// use delimited_rs::item::csv::csv_writer::CsvTokenWriterBuilder;
///
/// let config = CsvConfig {
///     quote_policy: QuotePolicy::Minimal,
///     null_string: Some("NULL".to_string()),
///     ..CsvConfig::default()
/// };
///
/// let writer = CsvTokenWriterBuilder::new()
///     .config(config)
///     .from_writer(vec![])
///     .unwrap();
///
/// writer.write_row(&[Some("BBBB"), Some("b,b"), None], None).unwrap();
///
/// let data = String::from_utf8(writer.into_inner().unwrap()).unwrap();
/// assert_eq!(data, "BBBB,\"b,b\",NULL\r\n");
/// ```
pub struct CsvTokenWriter<W: Write> {
    state: RefCell<Option<WriterState<W>>>,
}

impl<W: Write> CsvTokenWriter<W> {
    /// Serializes one row.
    ///
    /// `quote_flags`, when given, must have one entry per value; a `true` entry forces
    /// quoting of that column under [`QuotePolicy::Column`].
    ///
    /// # Errors
    ///
    /// - [`CsvError::QuoteFlags`] if `quote_flags` and `values` differ in length
    /// - [`CsvError::ValueCount`] if variable columns are disallowed and the row size differs
    ///   from the first row's
    /// - [`CsvError::Unescapable`] if a value needs escaping but escaping is disabled, or
    ///   contains a line break while quoting is disabled
    /// - [`CsvError::Closed`] after [`close`](Self::close)
    ///
    /// Nothing is written when an error is returned.
    pub fn write_row<S: AsRef<str>>(
        &self,
        values: &[Option<S>],
        quote_flags: Option<&[bool]>,
    ) -> ItemWriterResult {
        let mut state = self.state.borrow_mut();
        let state = state.as_mut().ok_or(CsvError::Closed)?;
        state.write_row(values, quote_flags)
    }

    /// Serializes one row of present values.
    pub fn write_values<S: AsRef<str>>(&self, values: &[S]) -> ItemWriterResult {
        let values: Vec<Option<&str>> = values.iter().map(|value| Some(value.as_ref())).collect();
        self.write_row(&values, None)
    }

    /// Flushes the buffered output and the underlying writer.
    pub fn flush(&self) -> ItemWriterResult {
        let mut state = self.state.borrow_mut();
        let state = state.as_mut().ok_or(CsvError::Closed)?;
        state.writer.flush()?;
        Ok(())
    }

    /// Flushes and releases the underlying writer. Closing twice is a no-op.
    pub fn close(&self) -> ItemWriterResult {
        if let Some(mut state) = self.state.borrow_mut().take() {
            state.writer.flush()?;
            debug!("CSV writer closed");
        }
        Ok(())
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.state.borrow().is_none()
    }

    /// Flushes the buffer and returns the underlying writer.
    pub fn into_inner(self) -> Result<W, CsvError> {
        let state = self.state.into_inner().ok_or(CsvError::Closed)?;
        state
            .writer
            .into_inner()
            .map_err(|error| CsvError::Io(error.into_error()))
    }
}

impl<W: Write> ItemWriter<Vec<Option<String>>> for CsvTokenWriter<W> {
    fn write(&self, items: &[Vec<Option<String>>]) -> ItemWriterResult {
        for values in items {
            self.write_row(values, None)?;
        }
        Ok(())
    }

    fn flush(&self) -> ItemWriterResult {
        CsvTokenWriter::flush(self)
    }

    fn close(&self) -> ItemWriterResult {
        CsvTokenWriter::close(self)
    }
}

/// Writes tokens back, forcing quotes on the tokens that were enclosed when
/// the policy is [`QuotePolicy::Column`].
impl<W: Write> ItemWriter<Vec<CsvToken>> for CsvTokenWriter<W> {
    fn write(&self, items: &[Vec<CsvToken>]) -> ItemWriterResult {
        for tokens in items {
            let values: Vec<Option<&str>> = tokens.iter().map(CsvToken::value).collect();
            let flags: Vec<bool> = tokens.iter().map(CsvToken::is_enclosed).collect();
            self.write_row(&values, Some(&flags))?;
        }
        Ok(())
    }

    fn flush(&self) -> ItemWriterResult {
        CsvTokenWriter::flush(self)
    }

    fn close(&self) -> ItemWriterResult {
        CsvTokenWriter::close(self)
    }
}

struct WriterState<W: Write> {
    config: CsvConfig,
    writer: BufWriter<W>,
    column_count: Option<usize>,
    bom_pending: bool,
}

impl<W: Write> WriterState<W> {
    fn write_row<S: AsRef<str>>(
        &mut self,
        values: &[Option<S>],
        quote_flags: Option<&[bool]>,
    ) -> ItemWriterResult {
        if let Some(flags) = quote_flags {
            if flags.len() != values.len() {
                return Err(CsvError::QuoteFlags {
                    expected: values.len(),
                    actual: flags.len(),
                });
            }
        }

        if values.is_empty() {
            if self.config.ignore_empty_lines {
                return Ok(());
            }
            let line = self.config.line_separator.clone();
            return self.emit(&line);
        }

        if let (false, Some(expected)) = (self.config.variable_columns, self.column_count) {
            if expected != values.len() {
                return Err(CsvError::ValueCount {
                    expected,
                    actual: values.len(),
                    values: values
                        .iter()
                        .map(|value| value.as_ref().map(|value| value.as_ref().to_string()))
                        .collect(),
                });
            }
        }

        let mut line = String::new();
        for (index, value) in values.iter().enumerate() {
            if index > 0 {
                line.push(self.config.separator);
            }
            let forced = quote_flags.is_some_and(|flags| flags[index]);
            self.format_value(value.as_ref().map(|value| value.as_ref()), forced, &mut line)?;
        }
        line.push_str(&self.config.line_separator);

        self.emit(&line)?;
        if self.column_count.is_none() {
            self.column_count = Some(values.len());
        }
        Ok(())
    }

    fn emit(&mut self, text: &str) -> ItemWriterResult {
        if self.bom_pending {
            let mut bom = [0; 4];
            self.writer.write_all(BOM.encode_utf8(&mut bom).as_bytes())?;
            self.bom_pending = false;
        }
        self.writer.write_all(text.as_bytes())?;
        Ok(())
    }

    fn format_value(&self, value: Option<&str>, forced: bool, out: &mut String) -> ItemWriterResult {
        let config = &self.config;

        let value = match value {
            Some(value) if !value.is_empty() => value,
            _ => {
                if let Some(null_string) = &config.null_string {
                    out.push_str(null_string);
                }
                return Ok(());
            }
        };

        if config.quote_disabled {
            // only quotes can protect a line break
            if value.contains([CR, LF]) {
                return Err(CsvError::Unescapable(value.to_string()));
            }
            if config.escape_disabled {
                if value.contains(config.separator) {
                    return Err(CsvError::Unescapable(value.to_string()));
                }
                out.push_str(value);
            } else {
                out.push_str(&escape(value, config.escape, &[config.separator, config.escape]));
            }
            return Ok(());
        }

        let quoted = match config.quote_policy {
            QuotePolicy::All => true,
            QuotePolicy::Minimal => needs_quotes(value, config),
            QuotePolicy::Column => forced || needs_quotes(value, config),
        };

        if !quoted {
            out.push_str(value);
            return Ok(());
        }

        out.push(config.quote);
        if config.escape_disabled {
            if value.contains(config.quote) {
                return Err(CsvError::Unescapable(value.to_string()));
            }
            out.push_str(value);
        } else {
            out.push_str(&escape(value, config.escape, &[config.quote, config.escape]));
        }
        out.push(config.quote);
        Ok(())
    }
}

fn needs_quotes(value: &str, config: &CsvConfig) -> bool {
    value
        .chars()
        .any(|c| c == config.separator || c == config.quote || c == CR || c == LF)
}

/// Puts the escape character in front of any of `targets`.
pub(crate) fn escape(value: &str, escape: char, targets: &[char]) -> String {
    let mut result = String::with_capacity(value.len());
    for c in value.chars() {
        if targets.contains(&c) {
            result.push(escape);
        }
        result.push(c);
    }
    result
}

/// A builder for configuring a [`CsvTokenWriter`].
///
/// # Examples
///
/// ```
/// use delimited_rs::item::csv::csv_config::CsvConfig;
/// use delimited_rs::item::csv::csv_writer::CsvTokenWriterBuilder;
///
/// let writer = CsvTokenWriterBuilder::new()
///     .config(CsvConfig {
///         line_separator: "\n".to_string(),
///         ..CsvConfig::default()
///     })
///     .from_writer(vec![])
///     .unwrap();
///
/// writer.write_values(&["AAAA", "aaa"]).unwrap();
///
/// let data = String::from_utf8(writer.into_inner().unwrap()).unwrap();
/// assert_eq!(data, "\"AAAA\",\"aaa\"\n");
/// ```
#[derive(Default)]
pub struct CsvTokenWriterBuilder {
    config: CsvConfig,
}

impl CsvTokenWriterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the configuration. It is validated and copied when the writer is built.
    pub fn config(mut self, config: CsvConfig) -> Self {
        self.config = config;
        self
    }

    /// Creates a `CsvTokenWriter` from a writer.
    ///
    /// # Errors
    ///
    /// Returns [`CsvError::Configuration`] if the configuration is invalid.
    pub fn from_writer<W: Write>(self, wtr: W) -> Result<CsvTokenWriter<W>, CsvError> {
        self.config.validate()?;

        debug!(
            "CSV writer created: separator={:?}, quote_policy={:?}",
            self.config.separator, self.config.quote_policy
        );

        let bom_pending = self.config.utf8_bom;
        let state = WriterState {
            config: self.config,
            writer: BufWriter::new(wtr),
            column_count: None,
            bom_pending,
        };

        Ok(CsvTokenWriter {
            state: RefCell::new(Some(state)),
        })
    }

    /// Creates a `CsvTokenWriter` writing to a newly created file.
    pub fn from_path<P: AsRef<Path>>(self, path: P) -> Result<CsvTokenWriter<File>, CsvError> {
        let file = File::create(path)?;
        self.from_writer(file)
    }
}
