use std::{cell::RefCell, fs::File, io::Read, path::Path};

use log::{debug, trace};
use regex::Regex;

use crate::{
    core::item::{ItemReader, ItemReaderResult},
    error::CsvError,
    item::csv::{
        csv_config::CsvConfig,
        csv_line::{line_content, LinePosition, LineSource},
        csv_token::{values_of, CsvToken},
    },
};

const CR: char = '\r';
const LF: char = '\n';

/// A streaming tokenizer turning delimited text into rows of [`CsvToken`].
///
/// The reader pulls one physical line at a time from the source and scans it character by
/// character. A quoted field may span several physical lines; the reader then refills its
/// line buffer until the closing quote is found.
///
/// # Type Parameters
///
/// - `R`: The type of reader providing the bytes. Must implement `Read`. Input is decoded as
///   UTF-8 and a leading byte order mark is dropped.
///
/// # Implementation Details
///
/// - Uses a `RefCell` so rows can be read through `&self`, as required by [`ItemReader`]
/// - The cursor state is dropped on [`close`](Self::close); any later call fails with
///   [`CsvError::Closed`]
/// - A reader is not `Sync`: use one reader per thread
///
/// # Examples
///
/// ```
/// use delimited_rs::item::csv::csv_config::CsvConfig;
/// use delimited_rs::item::csv::csv_reader::CsvTokenReaderBuilder;
///
/// let data = "symbol,name,price\r\nAAAA,aaa,10000\r\nBBBB,bbb,NULL";
///
/// let config = CsvConfig {
///     null_string: Some("NULL".to_string()),
///     ..CsvConfig::default()
/// };
///
/// let reader = CsvTokenReaderBuilder::new()
///     .config(config)
///     .from_reader(data.as_bytes())
///     .unwrap();
///
/// let header = reader.read_values().unwrap().unwrap();
/// assert_eq!(header[0].as_deref(), Some("symbol"));
///
/// let row = reader.read_tokens().unwrap().unwrap();
/// assert_eq!(row[1].value(), Some("aaa"));
///
/// let row = reader.read_values().unwrap().unwrap();
/// assert_eq!(row[2], None);
///
/// assert!(reader.read_tokens().unwrap().is_none());
/// ```
pub struct CsvTokenReader<R> {
    state: RefCell<Option<ReaderState<R>>>,
}

impl<R: Read> CsvTokenReader<R> {
    /// Reads the next logical row.
    ///
    /// # Returns
    /// - `Ok(Some(tokens))` for the next row, never empty
    /// - `Ok(None)` once the stream is exhausted
    /// - `Err(CsvError::TokenCount { .. })` when variable columns are disallowed and the row
    ///   size differs from the first row's; the row is consumed
    /// - `Err(CsvError::Closed)` after [`close`](Self::close)
    pub fn read_tokens(&self) -> ItemReaderResult<Vec<CsvToken>> {
        let mut state = self.state.borrow_mut();
        let state = state.as_mut().ok_or(CsvError::Closed)?;
        state.next_row()
    }

    /// Reads the next logical row and keeps only the token values.
    pub fn read_values(&self) -> ItemReaderResult<Vec<Option<String>>> {
        Ok(self.read_tokens()?.map(|tokens| values_of(&tokens)))
    }

    /// Current line numbers, for diagnostics.
    pub fn position(&self) -> Result<LinePosition, CsvError> {
        let state = self.state.borrow();
        let state = state.as_ref().ok_or(CsvError::Closed)?;
        Ok(state.position())
    }

    /// Releases the underlying source. Closing twice is a no-op.
    pub fn close(&self) -> Result<(), CsvError> {
        if self.state.borrow_mut().take().is_some() {
            debug!("CSV reader closed");
        }
        Ok(())
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.state.borrow().is_none()
    }
}

impl<R: Read> ItemReader<Vec<CsvToken>> for CsvTokenReader<R> {
    fn read(&self) -> ItemReaderResult<Vec<CsvToken>> {
        self.read_tokens()
    }
}

/// Cursor state owned by one reader.
struct ReaderState<R> {
    config: CsvConfig,
    patterns: Vec<Regex>,
    source: LineSource<R>,
    /// Last physical line as read from the source.
    text: String,
    /// Physical line being scanned.
    line: Vec<char>,
    pos: usize,
    initialized: bool,
    end_of_file: bool,
    start_line_number: usize,
    end_line_number: usize,
    row_number: usize,
    column_count: Option<usize>,
}

/// Raw text of one scanned token.
struct RawToken {
    text: String,
    enclosed: bool,
    start_line: usize,
    end_line: usize,
}

impl<R: Read> ReaderState<R> {
    fn position(&self) -> LinePosition {
        LinePosition {
            line_number: self.source.line_number(),
            start_line_number: self.start_line_number,
            end_line_number: self.end_line_number,
            row_number: self.row_number,
        }
    }

    fn next_row(&mut self) -> ItemReaderResult<Vec<CsvToken>> {
        if !self.initialized {
            self.skip_lines()?;
            self.initialized = true;
        }

        loop {
            if self.end_of_file {
                return Ok(None);
            }

            if self.pos >= self.line.len() && !self.fill()? {
                self.end_of_file = true;
                return Ok(None);
            }

            let mut tokens = Vec::new();
            loop {
                let (raw, row_end) = self.read_token()?;
                tokens.push(self.to_token(raw));
                if row_end {
                    break;
                }
            }

            if self.is_suppressed(&tokens) {
                debug!("Row at line {} ignored", self.source.line_number());
                continue;
            }

            self.start_line_number = tokens.first().map_or(0, CsvToken::start_line);
            self.end_line_number = tokens.last().map_or(0, CsvToken::end_line);
            self.row_number += 1;

            if !self.config.variable_columns {
                match self.column_count {
                    None => self.column_count = Some(tokens.len()),
                    Some(expected) if expected != tokens.len() => {
                        return Err(CsvError::TokenCount {
                            line: self.start_line_number,
                            expected,
                            actual: tokens.len(),
                            tokens,
                        });
                    }
                    Some(_) => {}
                }
            }

            return Ok(Some(tokens));
        }
    }

    fn skip_lines(&mut self) -> Result<(), CsvError> {
        for _ in 0..self.config.skip_lines {
            if !self.source.read_line(&mut self.text)? {
                break;
            }
        }
        if self.config.skip_lines > 0 {
            debug!("Skipped {} line(s)", self.source.line_number());
        }
        Ok(())
    }

    /// Loads the next physical line that is not ignored. Returns `false` at end of stream.
    fn fill(&mut self) -> Result<bool, CsvError> {
        loop {
            if !self.source.read_line(&mut self.text)? {
                self.line.clear();
                self.pos = 0;
                return Ok(false);
            }

            if self.is_ignored_line(&self.text) {
                trace!("Line {} ignored", self.source.line_number());
                continue;
            }

            self.line.clear();
            self.line.extend(self.text.chars());
            self.pos = 0;
            return Ok(true);
        }
    }

    fn is_ignored_line(&self, line: &str) -> bool {
        let content = line_content(line);
        (self.config.ignore_empty_lines && content.chars().all(char::is_whitespace))
            || self.patterns.iter().any(|pattern| pattern.is_match(content))
    }

    fn is_suppressed(&self, tokens: &[CsvToken]) -> bool {
        match tokens {
            [token] => match token.value() {
                None => self.config.ignore_empty_lines,
                Some(value) => {
                    (self.config.ignore_empty_lines && value.trim().is_empty())
                        || self.patterns.iter().any(|pattern| pattern.is_match(value))
                }
            },
            _ => false,
        }
    }

    fn next_char(&mut self) -> Result<Option<char>, CsvError> {
        if self.pos >= self.line.len() && !self.fill()? {
            return Ok(None);
        }
        let c = self.line[self.pos];
        self.pos += 1;
        Ok(Some(c))
    }

    /// Scans one token. The flag is `true` when the token ends its row.
    fn read_token(&mut self) -> Result<(RawToken, bool), CsvError> {
        let separator = self.config.separator;
        let quote = self.config.quote;
        let escape = self.config.escape;
        let quoting = !self.config.quote_disabled;
        let escaping = !self.config.escape_disabled;

        let start_line = self.source.line_number();
        let mut text = String::new();
        let mut in_quote = false;
        let mut enclosed = false;
        let mut escaped = false;
        let mut separator_escaped = false;
        // byte offsets of the closing quote, confirmed and tentative
        let mut close_at = None;
        let mut pending_close = 0;
        let row_end;

        loop {
            let Some(c) = self.next_char()? else {
                if in_quote && escaped && escaping && escape == quote {
                    enclosed = true;
                    close_at = Some(pending_close);
                }
                self.end_of_file = true;
                row_end = true;
                break;
            };

            if in_quote {
                if escaping && escape == quote {
                    if !escaped {
                        if c == quote {
                            escaped = true;
                            pending_close = text.len();
                        }
                        text.push(c);
                        continue;
                    }

                    escaped = false;
                    if c == quote {
                        text.push(c);
                        continue;
                    }

                    // the previous quote closed the field, `c` lies outside of it
                    in_quote = false;
                    enclosed = true;
                    close_at = Some(pending_close);
                } else {
                    if escaping && escaped {
                        escaped = false;
                    } else if escaping && c == escape {
                        escaped = true;
                    } else if c == quote {
                        in_quote = false;
                        enclosed = true;
                        close_at = Some(text.len());
                    }
                    text.push(c);
                    continue;
                }
            }

            let was_escaped = std::mem::take(&mut separator_escaped);

            if c == separator && !was_escaped {
                row_end = false;
                break;
            }

            if c == CR || c == LF {
                if c == CR && self.line.get(self.pos) == Some(&LF) {
                    self.pos += 1;
                }
                row_end = true;
                break;
            }

            if quoting && c == quote && text.chars().all(char::is_whitespace) {
                in_quote = true;
            } else if !quoting && escaping && c == escape && !was_escaped {
                separator_escaped = true;
            }
            text.push(c);
        }

        // a token only counts as enclosed if nothing but whitespace follows the closing quote
        if let (true, Some(at)) = (enclosed, close_at) {
            let rest = &text[at + quote.len_utf8()..];
            if !rest.chars().all(char::is_whitespace) {
                enclosed = false;
            }
        }

        let raw = RawToken {
            text,
            enclosed,
            start_line,
            end_line: self.source.line_number(),
        };
        Ok((raw, row_end))
    }

    fn to_token(&self, raw: RawToken) -> CsvToken {
        let config = &self.config;
        let enclosed = raw.enclosed;
        let escaping = !config.escape_disabled;

        let mut text = raw.text.as_str();
        if enclosed || config.ignore_leading_whitespace {
            text = text.trim_start();
        }
        if enclosed || config.ignore_trailing_whitespace {
            text = text.trim_end();
        }

        let value = if enclosed {
            let inner = text
                .strip_prefix(config.quote)
                .and_then(|inner| inner.strip_suffix(config.quote))
                .unwrap_or(text);
            let inner = match &config.break_string {
                Some(replacement) => replace_line_breaks(inner, replacement),
                None => inner.to_string(),
            };
            if escaping {
                Some(unescape(&inner, config.escape, &[config.quote, config.escape]))
            } else {
                Some(inner)
            }
        } else if config.is_null_string(text) {
            None
        } else if config.quote_disabled && escaping {
            Some(unescape(text, config.escape, &[config.separator, config.escape]))
        } else {
            Some(text.to_string())
        };

        let value = value.filter(|value| !(config.empty_to_null && value.is_empty()));

        CsvToken::new(value, raw.start_line, raw.end_line, enclosed)
    }
}

/// Replaces every CR, LF or CRLF in `value` by `replacement`.
fn replace_line_breaks(value: &str, replacement: &str) -> String {
    let mut result = String::with_capacity(value.len());
    let mut chars = value.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            CR => {
                chars.next_if_eq(&LF);
                result.push_str(replacement);
            }
            LF => result.push_str(replacement),
            _ => result.push(c),
        }
    }
    result
}

/// Drops the escape character in front of any of `targets`.
pub(crate) fn unescape(value: &str, escape: char, targets: &[char]) -> String {
    let mut result = String::with_capacity(value.len());
    let mut chars = value.chars().peekable();
    while let Some(c) = chars.next() {
        if c == escape {
            if let Some(next) = chars.next_if(|next| targets.contains(next)) {
                result.push(next);
                continue;
            }
        }
        result.push(c);
    }
    result
}

/// A builder for configuring a [`CsvTokenReader`].
///
/// # Default Configuration
///
/// - Configuration: [`CsvConfig::default`]
/// - Buffer capacity: 8 KiB
///
/// # Examples
///
/// ```
/// use delimited_rs::item::csv::csv_config::CsvConfig;
/// use delimited_rs::item::csv::csv_reader::CsvTokenReaderBuilder;
///
/// let reader = CsvTokenReaderBuilder::new()
///     .config(CsvConfig::new(';', '\'', '\''))
///     .capacity(1024)
///     .from_reader("a;'b;c'".as_bytes())
///     .unwrap();
///
/// let row = reader.read_values().unwrap().unwrap();
/// assert_eq!(row, vec![Some("a".to_string()), Some("b;c".to_string())]);
/// ```
pub struct CsvTokenReaderBuilder {
    config: CsvConfig,
    capacity: usize,
}

impl Default for CsvTokenReaderBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CsvTokenReaderBuilder {
    pub fn new() -> Self {
        Self {
            config: CsvConfig::default(),
            capacity: 8 * 1024,
        }
    }

    /// Sets the configuration. It is validated and copied when the reader is built.
    pub fn config(mut self, config: CsvConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the capacity of the read buffer.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Creates a `CsvTokenReader` from a reader.
    ///
    /// # Errors
    ///
    /// Returns [`CsvError::Configuration`] if the configuration is invalid.
    pub fn from_reader<R: Read>(self, rdr: R) -> Result<CsvTokenReader<R>, CsvError> {
        self.config.validate()?;
        let patterns = self.config.compile_patterns()?;

        debug!(
            "CSV reader created: separator={:?}, quote={:?}, escape={:?}",
            self.config.separator, self.config.quote, self.config.escape
        );

        let state = ReaderState {
            config: self.config,
            patterns,
            source: LineSource::new(rdr, self.capacity),
            text: String::new(),
            line: Vec::new(),
            pos: 0,
            initialized: false,
            end_of_file: false,
            start_line_number: 0,
            end_line_number: 0,
            row_number: 0,
            column_count: None,
        };

        Ok(CsvTokenReader {
            state: RefCell::new(Some(state)),
        })
    }

    /// Creates a `CsvTokenReader` from a file path.
    ///
    /// # Errors
    ///
    /// Returns [`CsvError::Io`] if the file cannot be opened, or a configuration error.
    pub fn from_path<P: AsRef<Path>>(self, path: P) -> Result<CsvTokenReader<File>, CsvError> {
        let file = File::open(path)?;
        self.from_reader(file)
    }
}
