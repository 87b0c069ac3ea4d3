/// Delimited-text support: a configurable tokenizer and writer.
///
/// This module converts between character streams and rows of string tokens. Every
/// structural character (separator, quote, escape) is configurable, so the format is
/// defined entirely by the [`CsvConfig`](csv_config::CsvConfig) in use.
///
/// # Module Architecture
///
/// 1. **CsvConfig**: validated, serializable parameters shared by readers and writers.
///
/// 2. **LineSource / LinePosition**: physical line splitting (CR, LF, CRLF) and line
///    numbering used for diagnostics and skip/ignore policies.
///
/// 3. **CsvTokenReader**: a character-level state machine producing one logical row of
///    [`CsvToken`](csv_token::CsvToken) at a time. Quoted fields may contain separators and
///    line breaks.
///
/// 4. **CsvTokenWriter**: quotes, escapes and joins row values according to the
///    [`QuotePolicy`](csv_config::QuotePolicy).
///
/// Both components follow the builder pattern and implement the crate's `ItemReader` and
/// `ItemWriter` traits, so they can be chained in a [`Step`](crate::core::step::Step).
///
/// # Examples
///
/// ## Reading
///
/// ```
/// use delimited_rs::item::csv::csv_config::CsvConfig;
/// use delimited_rs::item::csv::csv_reader::CsvTokenReaderBuilder;
///
/// let data = "\
/// ## exported prices
/// symbol;price
/// AAAA;\"10;000\"
/// ";
///
/// let config = CsvConfig {
///     separator: ';',
///     ignore_line_patterns: vec!["#.*".to_string()],
///     ..CsvConfig::default()
/// };
///
/// let reader = CsvTokenReaderBuilder::new()
///     .config(config)
///     .from_reader(data.as_bytes())
///     .unwrap();
///
/// let mut rows = Vec::new();
/// while let Some(row) = reader.read_values().unwrap() {
///     rows.push(row);
/// }
///
/// assert_eq!(rows.len(), 2);
/// assert_eq!(rows[1][1].as_deref(), Some("10;000"));
/// ```
///
/// ## Writing
///
/// ```
/// use delimited_rs::item::csv::csv_config::CsvConfig;
/// use delimited_rs::item::csv::csv_writer::CsvTokenWriterBuilder;
///
/// let config = CsvConfig {
///     quote_disabled: true,
///     line_separator: "\n".to_string(),
///     ..CsvConfig::default()
/// };
///
/// let mut buffer = Vec::new();
/// {
///     let writer = CsvTokenWriterBuilder::new()
///         .config(config)
///         .from_writer(&mut buffer)
///         .unwrap();
///
///     writer.write_values(&["AAAA", "10,000"]).unwrap();
///     writer.close().unwrap();
/// } // writer is dropped here, releasing the borrow
///
/// assert_eq!(String::from_utf8(buffer).unwrap(), "AAAA,10\\,000\n");
/// ```

/// Parsing and writing parameters.
pub mod csv_config;

/// Physical line splitting and line numbers.
pub mod csv_line;

/// A module providing facilities for reading rows of tokens.
pub mod csv_reader;

/// The token model.
pub mod csv_token;

/// A module providing facilities for writing rows of values.
pub mod csv_writer;
