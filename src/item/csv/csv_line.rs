use std::io::{BufRead, BufReader, ErrorKind, Read};

use crate::error::CsvError;

const CR: u8 = b'\r';
const LF: u8 = b'\n';
const BOM: char = '\u{feff}';

/// Line numbers of the reader, for diagnostics.
///
/// All numbers are 1-based physical line numbers except `row_number`, which counts the
/// logical rows returned so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LinePosition {
    /// Physical lines consumed from the source, skipped and ignored lines included.
    pub line_number: usize,
    /// First physical line of the last row returned.
    pub start_line_number: usize,
    /// Last physical line of the last row returned.
    pub end_line_number: usize,
    pub row_number: usize,
}

/// Physical line source: splits a byte stream on CR, LF or CRLF and counts the lines.
///
/// Each line keeps its terminator. A UTF-8 byte order mark at the very start of the
/// stream is dropped.
pub(crate) struct LineSource<R> {
    reader: BufReader<R>,
    bytes: Vec<u8>,
    line_number: usize,
}

impl<R: Read> LineSource<R> {
    pub(crate) fn new(rdr: R, capacity: usize) -> Self {
        Self {
            reader: BufReader::with_capacity(capacity.max(1), rdr),
            bytes: Vec::new(),
            line_number: 0,
        }
    }

    pub(crate) fn line_number(&self) -> usize {
        self.line_number
    }

    /// Reads the next physical line into `line`, replacing its content.
    ///
    /// Returns `Ok(false)` once the source is exhausted.
    pub(crate) fn read_line(&mut self, line: &mut String) -> Result<bool, CsvError> {
        line.clear();
        self.bytes.clear();

        loop {
            let available = match self.reader.fill_buf() {
                Ok(available) => available,
                Err(error) if error.kind() == ErrorKind::Interrupted => continue,
                Err(error) => return Err(error.into()),
            };

            if available.is_empty() {
                break;
            }

            match available.iter().position(|&b| b == CR || b == LF) {
                Some(index) => {
                    let terminator = available[index];
                    self.bytes.extend_from_slice(&available[..=index]);
                    self.reader.consume(index + 1);
                    if terminator == CR && self.peek()? == Some(LF) {
                        self.bytes.push(LF);
                        self.reader.consume(1);
                    }
                    break;
                }
                None => {
                    let length = available.len();
                    self.bytes.extend_from_slice(available);
                    self.reader.consume(length);
                }
            }
        }

        if self.bytes.is_empty() {
            return Ok(false);
        }

        self.line_number += 1;

        let text = std::str::from_utf8(&self.bytes).map_err(|error| CsvError::Malformed {
            line: self.line_number,
            message: error.to_string(),
        })?;

        let text = match text.strip_prefix(BOM) {
            Some(rest) if self.line_number == 1 => rest,
            _ => text,
        };
        line.push_str(text);

        // a stream made of a lone byte order mark holds no line
        if line.is_empty() {
            self.line_number -= 1;
            return Ok(false);
        }

        Ok(true)
    }

    fn peek(&mut self) -> Result<Option<u8>, CsvError> {
        loop {
            match self.reader.fill_buf() {
                Ok(available) => return Ok(available.first().copied()),
                Err(error) if error.kind() == ErrorKind::Interrupted => continue,
                Err(error) => return Err(error.into()),
            }
        }
    }
}

/// Physical line content without its terminator.
pub(crate) fn line_content(line: &str) -> &str {
    line.trim_end_matches(['\r', '\n'])
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use super::{line_content, LineSource};
    use crate::error::CsvError;

    fn read_all(input: &[u8], capacity: usize) -> Result<Vec<String>, CsvError> {
        let mut source = LineSource::new(input, capacity);
        let mut lines = Vec::new();
        let mut line = String::new();
        while source.read_line(&mut line)? {
            lines.push(line.clone());
        }
        Ok(lines)
    }

    #[test]
    fn lines_should_keep_their_terminator() -> Result<(), Box<dyn Error>> {
        let lines = read_all(b"a\r\nb\nc\rd", 8)?;
        assert_eq!(lines, vec!["a\r\n", "b\n", "c\r", "d"]);
        Ok(())
    }

    #[test]
    fn crlf_should_be_coalesced_across_buffer_boundaries() -> Result<(), Box<dyn Error>> {
        let lines = read_all(b"ab\r\ncd\r\n\r\n", 1)?;
        assert_eq!(lines, vec!["ab\r\n", "cd\r\n", "\r\n"]);
        Ok(())
    }

    #[test]
    fn lf_cr_should_be_two_terminators() -> Result<(), Box<dyn Error>> {
        let lines = read_all(b"a\n\rb", 4)?;
        assert_eq!(lines, vec!["a\n", "\r", "b"]);
        Ok(())
    }

    #[test]
    fn line_number_should_count_physical_lines() -> Result<(), Box<dyn Error>> {
        let mut source = LineSource::new("x\ny\n".as_bytes(), 16);
        let mut line = String::new();
        assert_eq!(source.line_number(), 0);
        assert!(source.read_line(&mut line)?);
        assert!(source.read_line(&mut line)?);
        assert!(!source.read_line(&mut line)?);
        assert_eq!(source.line_number(), 2);
        Ok(())
    }

    #[test]
    fn leading_bom_should_be_dropped_once() -> Result<(), Box<dyn Error>> {
        let lines = read_all("\u{feff}a\n\u{feff}b".as_bytes(), 3)?;
        assert_eq!(lines, vec!["a\n", "\u{feff}b"]);

        assert!(read_all("\u{feff}".as_bytes(), 8)?.is_empty());
        Ok(())
    }

    #[test]
    fn multibyte_characters_should_survive_small_buffers() -> Result<(), Box<dyn Error>> {
        let lines = read_all("Citroën,Ω\n".as_bytes(), 1)?;
        assert_eq!(lines, vec!["Citroën,Ω\n"]);
        Ok(())
    }

    #[test]
    fn invalid_utf8_should_report_its_line() {
        let result = read_all(b"ok\n\xff\xfe\n", 8);
        assert!(matches!(result, Err(CsvError::Malformed { line: 2, .. })));
    }

    #[test]
    fn content_should_exclude_terminator() {
        assert_eq!(line_content("abc\r\n"), "abc");
        assert_eq!(line_content("abc\r"), "abc");
        assert_eq!(line_content("  "), "  ");
    }
}
