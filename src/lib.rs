#![cfg_attr(docsrs, feature(doc_cfg))]

/*!
 # delimited-rs

 A streaming, configurable tokenizer and writer for delimiter-separated values (CSV, TSV and
 their many dialects).

 The reader converts a byte stream into logical rows of tokens; the writer converts rows of
 values back into correctly quoted and escaped text. Both are driven by one
 [`CsvConfig`](item::csv::csv_config::CsvConfig): separator, quote and escape characters
 (each can be disabled), null-string sentinel, whitespace trimming, empty-line and
 pattern-based line skipping, leading lines to skip, output line separator, quote policy,
 byte order mark and column-count enforcement.

 ## Core Concepts

- **CsvTokenReader:** pulls one physical line at a time and scans it character by character.
  A row may span several physical lines when a quoted field contains line breaks.
- **CsvToken:** one field value (or `None` for a null), the physical lines it spans and
  whether it was quoted.
- **CsvTokenWriter:** decides per value whether to quote, escapes what needs escaping and
  writes the configured line separator.
- **Step:** copies rows from an `ItemReader` to an `ItemWriter` in chunks, e.g. to convert
  between two dialects.

 ## Features

| **Feature**   | **Description**                                               |
|---------------|---------------------------------------------------------------|
| logger        | Enables a logger `ItemWriter`, useful for debugging purposes  |
| full          | Enables all available features                                |

 ## Getting Started

```rust
# use delimited_rs::{
#     core::step::{StepBuilder, StepStatus},
#     error::CsvError,
#     item::csv::{
#         csv_config::{CsvConfig, QuotePolicy},
#         csv_reader::CsvTokenReaderBuilder,
#         csv_token::CsvToken,
#         csv_writer::CsvTokenWriterBuilder,
#     },
# };
fn main() -> Result<(), CsvError> {
    let csv = "symbol,name,price,volume\r\nAAAA,aaa,10000,10\r\nBBBB,bbb,NULL,0";

    let reader = CsvTokenReaderBuilder::new()
        .config(CsvConfig {
            null_string: Some("NULL".to_string()),
            ..CsvConfig::default()
        })
        .from_reader(csv.as_bytes())?;

    let writer = CsvTokenWriterBuilder::new()
        .config(CsvConfig {
            separator: '\t',
            null_string: Some("\\N".to_string()),
            quote_policy: QuotePolicy::Minimal,
            ..CsvConfig::default()
        })
        .from_writer(Vec::new())?;

    let step = StepBuilder::<Vec<CsvToken>, Vec<CsvToken>>::new("to-tsv")
        .reader(&reader)
        .writer(&writer)
        .chunk(100)
        .build()?;

    let execution = step.execute()?;
    assert_eq!(execution.status, StepStatus::Success);
    assert_eq!(execution.write_count, 3);

    Ok(())
}
```

 ## License
 Licensed under either of

 -   Apache License, Version 2.0
     ([LICENSE-APACHE](LICENSE-APACHE) or <http://www.apache.org/licenses/LICENSE-2.0>)
 -   MIT license
     ([LICENSE-MIT](LICENSE-MIT) or <http://opensource.org/licenses/MIT>)

 at your option.
 */

/// Core module for row pipelines
pub mod core;

/// Error types for reading and writing
pub mod error;

#[doc(inline)]
pub use error::*;

/// Set of item readers / writers (csv tokenizer and writer, logger)
pub mod item;
