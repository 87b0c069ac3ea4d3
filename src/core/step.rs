use std::{
    cell::Cell,
    time::{Duration, Instant},
};

use log::{debug, error, info};

use crate::error::CsvError;

use super::item::{close_quietly, DefaultProcessor, ItemProcessor, ItemReader, ItemWriter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    Success,
    Failed,
}

/// Summary of one step execution.
#[derive(Debug)]
pub struct StepExecution {
    pub name: String,
    pub status: StepStatus,
    pub start: Instant,
    pub end: Instant,
    pub duration: Duration,
    pub read_count: usize,
    pub write_count: usize,
    pub read_error_count: usize,
    pub process_error_count: usize,
    pub write_error_count: usize,
}

#[derive(Debug, PartialEq)]
enum ChunkStatus {
    Full,
    Finished,
}

/// Copies rows from a reader to a writer in chunks, through a processor.
///
/// Failed reads, processing and writes are counted and skipped until their total exceeds
/// the skip limit; the step then fails with the last error.
///
/// # Examples
///
/// ```
/// use delimited_rs::core::item::ItemWriter;
/// use delimited_rs::core::step::{StepBuilder, StepStatus};
/// use delimited_rs::item::csv::csv_config::{CsvConfig, QuotePolicy};
/// use delimited_rs::item::csv::csv_reader::CsvTokenReaderBuilder;
/// use delimited_rs::item::csv::csv_token::CsvToken;
/// use delimited_rs::item::csv::csv_writer::CsvTokenWriterBuilder;
///
/// let reader = CsvTokenReaderBuilder::new()
///     .from_reader("a,b\nc,\"d;e\"\n".as_bytes())
///     .unwrap();
///
/// let writer = CsvTokenWriterBuilder::new()
///     .config(CsvConfig {
///         separator: ';',
///         quote_policy: QuotePolicy::Minimal,
///         line_separator: "\n".to_string(),
///         ..CsvConfig::default()
///     })
///     .from_writer(vec![])
///     .unwrap();
///
/// let step = StepBuilder::<Vec<CsvToken>, Vec<CsvToken>>::new("transcode")
///     .reader(&reader)
///     .writer(&writer)
///     .chunk(10)
///     .build()
///     .unwrap();
///
/// let execution = step.execute().unwrap();
/// assert_eq!(execution.status, StepStatus::Success);
/// assert_eq!(execution.write_count, 2);
/// ```
pub struct Step<'a, R, W> {
    name: String,
    reader: &'a dyn ItemReader<R>,
    processor: &'a dyn ItemProcessor<R, W>,
    writer: &'a dyn ItemWriter<W>,
    chunk_size: usize,
    skip_limit: usize,
    read_count: Cell<usize>,
    write_count: Cell<usize>,
    read_error_count: Cell<usize>,
    process_error_count: Cell<usize>,
    write_error_count: Cell<usize>,
}

impl<R, W> Step<'_, R, W> {
    /// Runs the step until the reader is exhausted or the skip limit is exceeded.
    ///
    /// The writer is opened first and closed at the end; on failure it is closed on a
    /// best-effort basis.
    pub fn execute(&self) -> Result<StepExecution, CsvError> {
        let start = Instant::now();
        debug!("Start of step: {}", self.name);

        self.writer.open()?;

        match self.run() {
            Ok(()) => {
                self.writer.close()?;
                let execution = self.execution(start, StepStatus::Success);
                info!(
                    "Step {} succeeded: {} read, {} written",
                    self.name, execution.read_count, execution.write_count
                );
                Ok(execution)
            }
            Err(err) => {
                close_quietly(self.writer);
                error!("Step {} failed: {}", self.name, err);
                Err(err)
            }
        }
    }

    fn run(&self) -> Result<(), CsvError> {
        let mut read_items = Vec::with_capacity(self.chunk_size);

        loop {
            let status = self.read_chunk(&mut read_items)?;
            let processed_items = self.process_chunk(&read_items)?;
            self.write_chunk(&processed_items)?;

            if status == ChunkStatus::Finished {
                return Ok(());
            }
        }
    }

    fn read_chunk(&self, read_items: &mut Vec<R>) -> Result<ChunkStatus, CsvError> {
        debug!("Start reading chunk");
        read_items.clear();

        loop {
            match self.reader.read() {
                Ok(Some(item)) => {
                    read_items.push(item);
                    inc(&self.read_count, 1);
                }
                Ok(None) => {
                    debug!("End reading chunk: FINISHED");
                    return Ok(ChunkStatus::Finished);
                }
                Err(err) => {
                    inc(&self.read_error_count, 1);
                    error!("Error occurred during read item: {}", err);
                    self.check_skip_limit(err)?;
                }
            }

            if read_items.len() == self.chunk_size {
                debug!("End reading chunk: FULL");
                return Ok(ChunkStatus::Full);
            }
        }
    }

    fn process_chunk(&self, read_items: &[R]) -> Result<Vec<W>, CsvError> {
        let mut processed_items = Vec::with_capacity(read_items.len());

        for item in read_items {
            match self.processor.process(item) {
                Ok(processed) => processed_items.push(processed),
                Err(err) => {
                    inc(&self.process_error_count, 1);
                    error!("Error occurred during process item: {}", err);
                    self.check_skip_limit(err)?;
                }
            }
        }

        Ok(processed_items)
    }

    fn write_chunk(&self, processed_items: &[W]) -> Result<(), CsvError> {
        if processed_items.is_empty() {
            return Ok(());
        }

        match self
            .writer
            .write(processed_items)
            .and_then(|()| self.writer.flush())
        {
            Ok(()) => {
                inc(&self.write_count, processed_items.len());
                Ok(())
            }
            Err(err) => {
                inc(&self.write_error_count, processed_items.len());
                error!("Error occurred during write items: {}", err);
                self.check_skip_limit(err)
            }
        }
    }

    fn check_skip_limit(&self, err: CsvError) -> Result<(), CsvError> {
        let errors = self.read_error_count.get()
            + self.process_error_count.get()
            + self.write_error_count.get();
        if errors > self.skip_limit {
            Err(err)
        } else {
            Ok(())
        }
    }

    fn execution(&self, start: Instant, status: StepStatus) -> StepExecution {
        StepExecution {
            name: self.name.clone(),
            status,
            start,
            end: Instant::now(),
            duration: start.elapsed(),
            read_count: self.read_count.get(),
            write_count: self.write_count.get(),
            read_error_count: self.read_error_count.get(),
            process_error_count: self.process_error_count.get(),
            write_error_count: self.write_error_count.get(),
        }
    }

    pub fn get_name(&self) -> &str {
        &self.name
    }

    pub fn get_read_count(&self) -> usize {
        self.read_count.get()
    }

    pub fn get_write_count(&self) -> usize {
        self.write_count.get()
    }

    pub fn get_read_error_count(&self) -> usize {
        self.read_error_count.get()
    }

    pub fn get_process_error_count(&self) -> usize {
        self.process_error_count.get()
    }

    pub fn get_write_error_count(&self) -> usize {
        self.write_error_count.get()
    }
}

fn inc(counter: &Cell<usize>, value: usize) {
    counter.set(counter.get() + value);
}

pub struct StepBuilder<'a, R, W> {
    name: String,
    reader: Option<&'a dyn ItemReader<R>>,
    processor: Option<&'a dyn ItemProcessor<R, W>>,
    writer: Option<&'a dyn ItemWriter<W>>,
    chunk_size: usize,
    skip_limit: usize,
}

impl<'a, R, W> StepBuilder<'a, R, W> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reader: None,
            processor: None,
            writer: None,
            chunk_size: 1,
            skip_limit: 0,
        }
    }

    pub fn reader(mut self, reader: &'a impl ItemReader<R>) -> Self {
        self.reader = Some(reader);
        self
    }

    pub fn processor(mut self, processor: &'a impl ItemProcessor<R, W>) -> Self {
        self.processor = Some(processor);
        self
    }

    pub fn writer(mut self, writer: &'a impl ItemWriter<W>) -> Self {
        self.writer = Some(writer);
        self
    }

    /// Number of items read before they are processed and written together. At least 1.
    pub fn chunk(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Number of failed items tolerated before the step fails.
    pub fn skip_limit(mut self, skip_limit: usize) -> Self {
        self.skip_limit = skip_limit;
        self
    }

    /// Builds the step, using [`DefaultProcessor`] when no processor was given.
    ///
    /// # Errors
    ///
    /// Returns [`CsvError::Configuration`] if the reader or the writer is missing.
    pub fn build(self) -> Result<Step<'a, R, W>, CsvError>
    where
        DefaultProcessor: ItemProcessor<R, W>,
    {
        let reader = self
            .reader
            .ok_or_else(|| CsvError::Configuration(format!("step {} has no reader", self.name)))?;
        let writer = self
            .writer
            .ok_or_else(|| CsvError::Configuration(format!("step {} has no writer", self.name)))?;

        Ok(Step {
            name: self.name,
            reader,
            processor: self.processor.unwrap_or(&DefaultProcessor),
            writer,
            chunk_size: self.chunk_size,
            skip_limit: self.skip_limit,
            read_count: Cell::new(0),
            write_count: Cell::new(0),
            read_error_count: Cell::new(0),
            process_error_count: Cell::new(0),
            write_error_count: Cell::new(0),
        })
    }
}
