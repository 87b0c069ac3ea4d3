use log::warn;

use crate::{
    error::CsvError,
    item::csv::csv_token::{values_of, CsvToken},
};

/// Represents the result of reading an item: `Ok(None)` once the source is exhausted.
pub type ItemReaderResult<R> = Result<Option<R>, CsvError>;

/// Represents the result of processing an item.
pub type ItemProcessorResult<W> = Result<W, CsvError>;

/// Represents the result of writing items.
pub type ItemWriterResult = Result<(), CsvError>;

/// A source of items, read one at a time.
pub trait ItemReader<R> {
    fn read(&self) -> ItemReaderResult<R>;
}

/// Transforms an item read into the item to write.
pub trait ItemProcessor<R, W> {
    fn process(&self, item: &R) -> ItemProcessorResult<W>;
}

/// A sink of items, written in chunks.
pub trait ItemWriter<W> {
    fn write(&self, items: &[W]) -> ItemWriterResult;

    fn flush(&self) -> ItemWriterResult {
        Ok(())
    }

    fn open(&self) -> ItemWriterResult {
        Ok(())
    }

    fn close(&self) -> ItemWriterResult {
        Ok(())
    }
}

/// Passes items through unchanged.
#[derive(Default)]
pub struct DefaultProcessor;

impl<R: Clone> ItemProcessor<R, R> for DefaultProcessor {
    fn process(&self, item: &R) -> ItemProcessorResult<R> {
        Ok(item.clone())
    }
}

/// Drops the token metadata, keeping the values.
impl ItemProcessor<Vec<CsvToken>, Vec<Option<String>>> for DefaultProcessor {
    fn process(&self, item: &Vec<CsvToken>) -> ItemProcessorResult<Vec<Option<String>>> {
        Ok(values_of(item))
    }
}

/// Closes a secondary writer, logging instead of propagating a failure.
///
/// Only meant for cleanup paths where an error is already being reported.
pub fn close_quietly<W>(writer: &dyn ItemWriter<W>) {
    if let Err(error) = writer.close() {
        warn!("Error while closing writer: {}", error);
    }
}
