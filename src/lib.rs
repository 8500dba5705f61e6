#![cfg_attr(docsrs, feature(doc_cfg))]

/*!
 # rowscan

 A streaming engine for tabular text: it turns character streams in CSV, TSV
 or fixed-width layouts into rows of values, and rows back into correctly
 quoted, escaped or padded text, with bounded memory whatever the size of
 the input.

 ## Core Concepts

- **Format:** describes one text format (delimiter, quote, escape, comment,
  line separator, padding) and builds its tokenizer and escaper.
- **Tokenizer:** the format's state machine, producing one raw row per call.
- **Parser:** a reading session. It extracts the headers, applies field
  selection and value substitution, counts recoverable errors against a
  tolerance and hands rows to the caller or to a `RowConsumer`.
- **TextWriter:** a writing session. It places values in header order,
  substitutes empty and null values, escapes them and writes headers exactly
  once.
- **SchemaProvider:** maps records of your own types to rows and back.

 ## Features

| **Feature**   | **Description**                                      |
|---------------|------------------------------------------------------|
| csv           | Enables the CSV format (default)                     |
| tsv           | Enables the TSV format (default)                     |
| fixed-width   | Enables the fixed-width format (default)             |
| logger        | Enables a row consumer logging every row             |
| full          | Enables all available features                       |

 ## Getting Started

```rust
# use rowscan::{item::csv::{CsvParserBuilder, CsvWriterBuilder}, TextError};
fn main() -> Result<(), TextError> {
    let csv = "quantity,symbol,id\n23.4,IBM,1\n#comments are skipped\n10,\"Microsoft, Inc.\",2\n";

    let mut parser = CsvParserBuilder::new()
        .has_headers(true)
        .select_fields(&["symbol", "id"])
        .error_tolerance(2)
        .from_reader(csv.as_bytes())?;

    let mut writer = CsvWriterBuilder::new()
        .headers(&["symbol", "id"])
        .has_headers(true)
        .delimiter(";")
        .from_writer(Vec::new())?;

    while let Some(row) = parser.parse_next()? {
        writer.write_row(&row.as_strs())?;
    }

    let out = String::from_utf8(writer.finish()?).unwrap_or_default();
    assert_eq!(out, "symbol;id\nIBM;1\nMicrosoft, Inc.;2\n");
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

/// Format-agnostic engine: buffers, settings, selection and the row pipeline
pub mod core;

/// Error types for parsing and writing sessions
pub mod error;

#[doc(inline)]
pub use error::*;

/// Concrete formats and reusable row consumers
pub mod item;
