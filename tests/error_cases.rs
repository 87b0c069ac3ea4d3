mod common;

use common::MockFile;

use std::{
    error::Error,
    io::{self, ErrorKind},
};

use delimited_rs::{
    core::step::StepBuilder,
    error::CsvError,
    item::csv::{
        csv_config::CsvConfig, csv_reader::CsvTokenReaderBuilder, csv_token::CsvToken,
        csv_writer::CsvTokenWriterBuilder,
    },
};

fn failing_file() -> MockFile {
    let mut file = MockFile::default();
    file.expect_write().returning(|_buf| {
        let err = io::Error::from(ErrorKind::PermissionDenied);
        Result::Err(err)
    });
    file
}

fn is_permission_denied(result: Result<(), CsvError>) -> bool {
    matches!(result, Err(CsvError::Io(err)) if err.kind() == ErrorKind::PermissionDenied)
}

#[test]
fn flush_should_report_sink_error() -> Result<(), Box<dyn Error>> {
    let writer = CsvTokenWriterBuilder::new().from_writer(failing_file())?;

    // buffered, the sink is not touched yet
    writer.write_values(&["AAAA", "aaa"])?;

    assert!(is_permission_denied(writer.flush()));
    Ok(())
}

#[test]
fn close_should_report_sink_error_once() -> Result<(), Box<dyn Error>> {
    let writer = CsvTokenWriterBuilder::new().from_writer(failing_file())?;
    writer.write_values(&["AAAA"])?;

    assert!(is_permission_denied(writer.close()));
    assert!(writer.is_closed());
    assert!(writer.close().is_ok());
    Ok(())
}

#[test]
fn close_should_flush_then_release_sink() -> Result<(), Box<dyn Error>> {
    let mut file = MockFile::default();
    file.expect_write()
        .withf(|buf| buf.to_vec() == b"\"AAAA\",\"aaa\"\r\n")
        .times(1)
        .returning(|buf| Ok(buf.len()));
    file.expect_flush().times(1).returning(|| Ok(()));

    let writer = CsvTokenWriterBuilder::new().from_writer(file)?;
    writer.write_values(&["AAAA", "aaa"])?;
    writer.close()?;

    assert!(matches!(writer.write_values(&["BBBB"]), Err(CsvError::Closed)));
    assert!(matches!(writer.flush(), Err(CsvError::Closed)));
    Ok(())
}

#[test]
fn source_error_should_be_propagated_by_reader() -> Result<(), Box<dyn Error>> {
    let mut file = MockFile::default();
    file.expect_read()
        .returning(|_buf| Err(io::Error::from(ErrorKind::ConnectionReset)));

    let reader = CsvTokenReaderBuilder::new().from_reader(file)?;
    let result = reader.read_tokens();

    assert!(matches!(result, Err(CsvError::Io(err)) if err.kind() == ErrorKind::ConnectionReset));
    Ok(())
}

#[test]
fn step_should_fail_when_writer_sink_fails() -> Result<(), Box<dyn Error>> {
    let reader = CsvTokenReaderBuilder::new().from_reader("a,b\nc,d\n".as_bytes())?;
    let writer = CsvTokenWriterBuilder::new().from_writer(failing_file())?;

    let step = StepBuilder::<Vec<CsvToken>, Vec<CsvToken>>::new("failing")
        .reader(&reader)
        .writer(&writer)
        .chunk(10)
        .build()?;

    let result = step.execute();

    assert!(matches!(result, Err(CsvError::Io(_))));
    assert_eq!(step.get_read_count(), 2);
    assert_eq!(step.get_write_count(), 0);
    assert_eq!(step.get_write_error_count(), 2);
    assert!(writer.is_closed());
    Ok(())
}

#[test]
fn token_count_error_should_carry_row_and_consume_it() -> Result<(), Box<dyn Error>> {
    let config = CsvConfig {
        variable_columns: false,
        ..CsvConfig::default()
    };
    let reader = CsvTokenReaderBuilder::new()
        .config(config)
        .from_reader("a,b\nc\nd,e\n".as_bytes())?;

    assert_eq!(reader.read_tokens()?.map(|row| row.len()), Some(2));

    match reader.read_tokens() {
        Err(CsvError::TokenCount {
            line,
            expected,
            actual,
            tokens,
        }) => {
            assert_eq!(line, 2);
            assert_eq!(expected, 2);
            assert_eq!(actual, 1);
            assert_eq!(tokens[0].value(), Some("c"));
        }
        other => panic!("unexpected result: {other:?}"),
    }

    assert_eq!(
        reader.read_values()?,
        Some(vec![Some("d".to_string()), Some("e".to_string())])
    );
    Ok(())
}

#[test]
fn value_count_error_should_leave_output_untouched() -> Result<(), Box<dyn Error>> {
    let config = CsvConfig {
        variable_columns: false,
        line_separator: "\n".to_string(),
        ..CsvConfig::default()
    };
    let writer = CsvTokenWriterBuilder::new()
        .config(config)
        .from_writer(vec![])?;

    writer.write_values(&["a", "b"])?;
    let result = writer.write_row(&[Some("c"), None, Some("e")], None);

    match result {
        Err(CsvError::ValueCount {
            expected,
            actual,
            values,
        }) => {
            assert_eq!(expected, 2);
            assert_eq!(actual, 3);
            assert_eq!(values, vec![Some("c".to_string()), None, Some("e".to_string())]);
        }
        other => panic!("unexpected result: {other:?}"),
    }

    assert_eq!(String::from_utf8(writer.into_inner()?)?, "\"a\",\"b\"\n");
    Ok(())
}

#[test]
fn quote_flags_should_match_row_length() -> Result<(), Box<dyn Error>> {
    let writer = CsvTokenWriterBuilder::new().from_writer(vec![])?;

    let result = writer.write_row(&[Some("a")], Some(&[true, false][..]));

    assert!(matches!(
        result,
        Err(CsvError::QuoteFlags {
            expected: 1,
            actual: 2
        })
    ));
    assert!(writer.into_inner()?.is_empty());
    Ok(())
}

#[test]
fn unescapable_value_should_be_rejected() -> Result<(), Box<dyn Error>> {
    let config = CsvConfig {
        quote_disabled: true,
        escape_disabled: true,
        ..CsvConfig::default()
    };
    let writer = CsvTokenWriterBuilder::new()
        .config(config)
        .from_writer(vec![])?;

    let result = writer.write_values(&["10,000"]);

    assert!(matches!(result, Err(CsvError::Unescapable(value)) if value == "10,000"));
    Ok(())
}

#[test]
fn invalid_configuration_should_be_rejected_by_builders() {
    let separator_is_newline = CsvConfig {
        separator: '\n',
        ..CsvConfig::default()
    };
    assert!(matches!(
        CsvTokenReaderBuilder::new()
            .config(separator_is_newline.clone())
            .from_reader("a".as_bytes()),
        Err(CsvError::Configuration(_))
    ));
    assert!(matches!(
        CsvTokenWriterBuilder::new()
            .config(separator_is_newline)
            .from_writer(vec![]),
        Err(CsvError::Configuration(_))
    ));

    let quote_is_separator = CsvConfig::new(',', ',', '\\');
    assert!(matches!(
        CsvTokenReaderBuilder::new()
            .config(quote_is_separator)
            .from_reader("a".as_bytes()),
        Err(CsvError::Configuration(_))
    ));
}

#[test]
fn invalid_utf8_should_be_reported_with_its_line() -> Result<(), Box<dyn Error>> {
    let data: &[u8] = b"a,b\nc,\xff\n";
    let reader = CsvTokenReaderBuilder::new().from_reader(data)?;

    assert!(reader.read_tokens()?.is_some());
    assert!(matches!(
        reader.read_tokens(),
        Err(CsvError::Malformed { line: 2, .. })
    ));
    Ok(())
}

#[test]
fn closed_reader_should_reject_reads() -> Result<(), Box<dyn Error>> {
    let reader = CsvTokenReaderBuilder::new().from_reader("a,b\n".as_bytes())?;
    reader.close()?;

    assert!(matches!(reader.read_tokens(), Err(CsvError::Closed)));
    assert!(matches!(reader.position(), Err(CsvError::Closed)));
    assert!(reader.close().is_ok());
    Ok(())
}
