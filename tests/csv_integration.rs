mod common;

use std::{fs, io::Write, thread};

use anyhow::Result;
use common::{strings, values};
use rowscan::{
    TextError,
    core::{
        context::SessionStatus,
        format::LineSeparator,
        row::Row,
    },
    item::{
        collect::RowListConsumer,
        csv::{CsvParserBuilder, CsvWriterBuilder},
    },
};

const QUOTES: &str = "quantity,symbol,id\n23.4,IBM,1\n10,\"Microsoft, Inc.\",2\n";

#[test]
fn selected_field_by_name() -> Result<()> {
    let mut parser = CsvParserBuilder::new()
        .has_headers(true)
        .select_fields(&["symbol"])
        .from_reader(QUOTES.as_bytes())?;

    let row = parser.parse_next()?.expect("first row");
    assert_eq!(row.as_strs(), vec![Some("IBM")]);
    assert_eq!(row.headers(), Some(&["symbol".to_string()][..]));
    Ok(())
}

#[test]
fn selected_fields_by_index_follow_selection_order() -> Result<()> {
    let rows = CsvParserBuilder::new()
        .has_headers(true)
        .select_indexes(&[2, 0])
        .from_reader(QUOTES.as_bytes())?
        .parse_all()?;

    let first = &rows[0];
    assert_eq!(first.as_strs(), vec![Some("1"), Some("23.4")]);
    assert_eq!(first.get_by_name("quantity"), Some("23.4"));
    assert_eq!(rows[1].as_strs(), vec![Some("2"), Some("10")]);
    Ok(())
}

#[test]
fn selection_without_reordering_keeps_positions() -> Result<()> {
    let rows = CsvParserBuilder::new()
        .has_headers(true)
        .select_fields(&["id", "quantity"])
        .column_reordering(false)
        .from_reader(QUOTES.as_bytes())?
        .parse_all()?;

    assert_eq!(rows[0].as_strs(), vec![Some("23.4"), None, Some("1")]);
    Ok(())
}

#[test]
fn excluded_fields_are_dropped() -> Result<()> {
    let rows = CsvParserBuilder::new()
        .has_headers(true)
        .exclude_fields(&["QUANTITY"])
        .from_reader(QUOTES.as_bytes())?
        .parse_all()?;

    assert_eq!(
        rows.iter().map(Row::to_vec).collect::<Vec<_>>(),
        strings(&[&["IBM", "1"], &["Microsoft, Inc.", "2"]])
    );
    Ok(())
}

#[test]
fn consumer_receives_headers_and_rows() -> Result<()> {
    let mut consumer = RowListConsumer::new();
    let summary = CsvParserBuilder::new()
        .has_headers(true)
        .from_reader(QUOTES.as_bytes())?
        .parse(&mut consumer)?;

    assert_eq!(summary.status, SessionStatus::Completed);
    assert_eq!(summary.record_count, 2);
    assert_eq!(summary.row_count, 3);
    assert_eq!(summary.line_count, 3);
    assert_eq!(
        consumer.headers(),
        Some(&["quantity".to_string(), "symbol".to_string(), "id".to_string()][..])
    );
    assert_eq!(
        consumer.values(),
        strings(&[&["23.4", "IBM", "1"], &["10", "Microsoft, Inc.", "2"]])
    );
    Ok(())
}

#[test]
fn mixed_line_endings_are_each_counted_once() -> Result<()> {
    let input = "a,b\r\nc,d\ne,f\rg,h";
    let mut parser = CsvParserBuilder::new()
        .line_separator_detection(true)
        .from_reader(input.as_bytes())?;

    let rows = parser.parse_all()?;
    assert_eq!(
        rows.iter().map(Row::to_vec).collect::<Vec<_>>(),
        strings(&[&["a", "b"], &["c", "d"], &["e", "f"], &["g", "h"]])
    );

    let summary = parser.summary();
    assert_eq!(summary.line_count, 3);
    assert_eq!(summary.record_count, 4);
    assert_eq!(parser.context().line_separator(), Some("\r\n"));
    Ok(())
}

#[test]
fn automatic_line_separator_is_detected_without_the_flag() -> Result<()> {
    let mut parser = CsvParserBuilder::new()
        .line_separator(LineSeparator::Auto)
        .from_reader("x\ry\r".as_bytes())?;

    assert_eq!(parser.parse_all()?.len(), 2);
    assert_eq!(parser.context().line_separator(), Some("\r"));
    Ok(())
}

#[test]
fn explicit_line_separators_are_line_endings() -> Result<()> {
    assert!(matches!(
        CsvWriterBuilder::new().line_separator("|").from_writer(Vec::new()),
        Err(TextError::Configuration(_))
    ));
    assert!(matches!(
        CsvParserBuilder::new()
            .line_separator(LineSeparator::Explicit("|".to_string()))
            .from_reader("a|b".as_bytes()),
        Err(TextError::Configuration(_))
    ));

    let mut writer = CsvWriterBuilder::new()
        .line_separator("\r")
        .from_writer(Vec::new())?;
    writer.write_values(&["a", "b"])?;
    writer.write_values(&["c", "d"])?;
    let text = String::from_utf8(writer.finish()?)?;
    assert_eq!(text, "a,b\rc,d\r");

    let rows = CsvParserBuilder::new()
        .line_separator(LineSeparator::Explicit("\r".to_string()))
        .from_reader(text.as_bytes())?
        .parse_all()?;
    assert_eq!(values(&rows), strings(&[&["a", "b"], &["c", "d"]]));
    Ok(())
}

#[test]
fn written_text_parses_back_to_the_same_values() -> Result<()> {
    let rows: Vec<Vec<Option<&str>>> = vec![
        vec![Some("plain"), Some("with, comma"), Some("with \"quotes\"")],
        vec![Some(" padded "), Some("two\nlines"), Some("#not a comment")],
        vec![Some(""), None, Some("last")],
    ];

    let mut writer = CsvWriterBuilder::new()
        .headers(&["a", "b", "c"])
        .has_headers(true)
        .from_writer(Vec::new())?;
    for row in &rows {
        writer.write_row(row)?;
    }
    let text = String::from_utf8(writer.finish()?)?;

    let parsed = CsvParserBuilder::new()
        .has_headers(true)
        .from_reader(text.as_bytes())?
        .parse_all()?;

    assert_eq!(parsed.len(), 3);
    assert_eq!(parsed[0].as_strs(), rows[0]);
    assert_eq!(parsed[1].as_strs(), rows[1]);
    // a null is written as nothing and reads back empty
    assert_eq!(parsed[2].as_strs(), vec![Some(""), Some(""), Some("last")]);
    Ok(())
}

fn awkward_records() -> Vec<Vec<String>> {
    vec![
        vec!["1".into(), "Porsche".into(), "356, \"Speedster\"".into()],
        vec!["2".into(), "Peugeot".into(), "206+\nCity car".into()],
        vec!["3".into(), "".into(), "Citroën C4 Picasso".into()],
        vec!["4".into(), "Mazda".into(), "CX-30 \"Compact\"".into()],
    ]
}

#[test]
fn reads_what_the_csv_crate_writes() -> Result<()> {
    let mut oracle = csv::Writer::from_writer(Vec::new());
    oracle.write_record(["id", "make", "description"])?;
    for record in awkward_records() {
        oracle.write_record(&record)?;
    }
    let text = String::from_utf8(oracle.into_inner()?)?;

    let rows = CsvParserBuilder::new()
        .has_headers(true)
        .from_reader(text.as_bytes())?
        .parse_all()?;

    let expected: Vec<Vec<Option<String>>> = awkward_records()
        .into_iter()
        .map(|record| record.into_iter().map(Some).collect())
        .collect();
    assert_eq!(rows.iter().map(Row::to_vec).collect::<Vec<_>>(), expected);
    Ok(())
}

#[test]
fn csv_crate_reads_what_is_written() -> Result<()> {
    let mut writer = CsvWriterBuilder::new()
        .headers(&["id", "make", "description"])
        .has_headers(true)
        .from_writer(Vec::new())?;
    for record in awkward_records() {
        writer.write_values(&record)?;
    }
    let bytes = writer.finish()?;

    let mut oracle = csv::Reader::from_reader(bytes.as_slice());
    assert_eq!(
        oracle.headers()?.iter().collect::<Vec<_>>(),
        vec!["id", "make", "description"]
    );
    let records = oracle
        .records()
        .map(|record| record.map(|r| r.iter().map(str::to_string).collect::<Vec<_>>()))
        .collect::<Result<Vec<_>, _>>()?;
    assert_eq!(records, awkward_records());
    Ok(())
}

#[test]
fn reads_and_writes_files() -> Result<()> {
    let mut source = tempfile::NamedTempFile::new()?;
    source.write_all(QUOTES.as_bytes())?;
    source.flush()?;

    let target = tempfile::NamedTempFile::new()?;

    let mut parser = CsvParserBuilder::new()
        .has_headers(true)
        .select_fields(&["id", "symbol"])
        .from_path(source.path())?;
    let mut writer = CsvWriterBuilder::new()
        .headers(&["id", "symbol"])
        .has_headers(true)
        .delimiter("|")
        .from_path(target.path())?;

    while let Some(row) = parser.parse_next()? {
        writer.write_row(&row.as_strs())?;
    }
    writer.finish()?;

    let content = fs::read_to_string(target.path())?;
    assert_eq!(content, "id|symbol\n1|IBM\n2|Microsoft, Inc.\n");
    Ok(())
}

#[test]
fn record_limit_and_skipped_rows() -> Result<()> {
    let input = "generated by a tool\nquantity,symbol,id\n1,A,1\n2,B,2\n3,C,3\n";
    let mut parser = CsvParserBuilder::new()
        .rows_to_skip(1)
        .has_headers(true)
        .record_limit(2)
        .from_reader(input.as_bytes())?;

    let symbols: Vec<String> = parser
        .rows()
        .map(|row| row.map(|r| r.get_by_name("symbol").unwrap_or_default().to_string()))
        .collect::<Result<_, _>>()?;

    assert_eq!(symbols, vec!["A", "B"]);
    assert_eq!(parser.summary().status, SessionStatus::Completed);
    Ok(())
}

#[test]
fn frozen_settings_are_shared_between_sessions() -> Result<()> {
    let settings = CsvParserBuilder::new()
        .has_headers(true)
        .select_fields(&["id"])
        .build()?;

    let inputs = ["id,name\n1,a\n2,b\n", "name,id\nc,3\n"];
    let results: Vec<Vec<String>> = thread::scope(|scope| {
        let handles: Vec<_> = inputs
            .iter()
            .map(|input| {
                let settings = settings.clone();
                scope.spawn(move || -> rowscan::TextResult<Vec<String>> {
                    let mut parser = rowscan::core::parser::Parser::new(settings, input.as_bytes());
                    let mut ids = Vec::new();
                    while let Some(row) = parser.parse_next()? {
                        ids.extend(row.get(0).map(str::to_string));
                    }
                    Ok(ids)
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("session thread panicked"))
            .collect::<Result<_, _>>()
    })?;

    assert_eq!(results, vec![vec!["1", "2"], vec!["3"]]);
    Ok(())
}
