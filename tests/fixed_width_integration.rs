mod common;

use anyhow::Result;
use common::strings;
use rowscan::{
    core::{parser::Parser, row::Row, settings::ParserSettings},
    item::fixed_width::{
        Alignment, FixedWidthFields, FixedWidthFormat, FixedWidthParserBuilder,
        FixedWidthWriterBuilder,
    },
};

fn layout() -> FixedWidthFields {
    FixedWidthFields::new()
        .field("symbol", 8)
        .aligned("quantity", 8, Alignment::Right)
        .padded_with('0')
        .aligned("status", 10, Alignment::Center)
        .padded_with('*')
}

#[test]
fn written_layout_parses_back() -> Result<()> {
    let mut writer = FixedWidthWriterBuilder::new()
        .fields(layout())
        .has_headers(true)
        .from_writer(Vec::new())?;
    writer.write_values(&["IBM", "234", "open"])?;
    writer.write_row(&[Some("MSFT"), None, Some("closed")])?;
    let text = String::from_utf8(writer.finish()?)?;

    assert_eq!(
        text,
        "symbol  quantity**status**\nIBM     00000234***open***\nMSFT    00000000**closed**\n"
    );

    let rows = FixedWidthParserBuilder::new()
        .fields(layout())
        .has_headers(true)
        .from_reader(text.as_bytes())?
        .parse_all()?;

    assert_eq!(
        rows.iter().map(Row::to_vec).collect::<Vec<_>>(),
        strings(&[&["IBM", "234", "open"], &["MSFT", "", "closed"]])
    );
    assert_eq!(rows[1].get_by_name("status"), Some("closed"));
    Ok(())
}

#[test]
fn short_rows_are_completed_and_long_rows_rejected() -> Result<()> {
    let input = "IBM     00000234\nMSFT    00000010***open***extra\nAAPL    00000001**closed**\n";
    let mut parser = FixedWidthParserBuilder::new()
        .fields(layout())
        .error_tolerance(1)
        .from_reader(input.as_bytes())?;
    let rows: Vec<_> = parser.parse_all()?.iter().map(Row::to_vec).collect();

    assert_eq!(parser.summary().error_count, 1);
    assert_eq!(
        rows,
        strings(&[&["IBM", "234", ""], &["AAPL", "1", "closed"]])
    );
    Ok(())
}

#[test]
fn long_rows_can_be_truncated() -> Result<()> {
    let rows = FixedWidthParserBuilder::new()
        .fields(FixedWidthFields::from_lengths(&[3, 3]))
        .allow_long_rows(true)
        .from_reader("abcdefghi\njkl\n".as_bytes())?
        .parse_all()?;

    assert_eq!(
        rows.iter().map(Row::to_vec).collect::<Vec<_>>(),
        strings(&[&["abc", "def"], &["jkl", ""]])
    );
    Ok(())
}

#[test]
fn settings_load_from_json() -> Result<()> {
    let settings = ParserSettings::<FixedWidthFormat>::from_json(
        r#"{
            "format": {
                "padding": ".",
                "comment": ";",
                "fields": [
                    { "name": "code", "length": 4 },
                    { "name": "label", "length": 6, "alignment": "right" }
                ]
            },
            "selection": { "include_names": ["label"] },
            "null_value": "none"
        }"#,
    )?;
    assert_eq!(settings.format.fields.total_width(), 10);

    let mut parser = Parser::new(settings.freeze()?, "; listing\nA1...hello\nB2..\n".as_bytes());
    let rows = parser.parse_all()?;

    assert_eq!(
        rows.iter().map(Row::to_vec).collect::<Vec<_>>(),
        vec![vec![Some("hello".to_string())], vec![Some("".to_string())]]
    );
    assert_eq!(rows[0].headers(), Some(&["label".to_string()][..]));
    Ok(())
}
