use std::fmt;

/// One field read from a delimited stream, with the physical lines it spans.
///
/// `value` is `None` when the field matched the configured null string (or was empty and
/// `empty_to_null` is set). `enclosed` tells whether the field was wrapped in quote characters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvToken {
    value: Option<String>,
    start_line: usize,
    end_line: usize,
    enclosed: bool,
}

impl CsvToken {
    pub fn new(value: Option<String>, start_line: usize, end_line: usize, enclosed: bool) -> Self {
        Self {
            value,
            start_line,
            end_line,
            enclosed,
        }
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    pub fn into_value(self) -> Option<String> {
        self.value
    }

    pub fn start_line(&self) -> usize {
        self.start_line
    }

    pub fn end_line(&self) -> usize {
        self.end_line
    }

    pub fn is_enclosed(&self) -> bool {
        self.enclosed
    }
}

impl fmt::Display for CsvToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "{value}"),
            None => write!(f, "<null>"),
        }
    }
}

/// Extracts the values of a row of tokens, keeping their order.
pub fn values_of(tokens: &[CsvToken]) -> Vec<Option<String>> {
    tokens.iter().map(|token| token.value.clone()).collect()
}
