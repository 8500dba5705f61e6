/// CSV support for reading and writing tabular data.
///
/// This module provides the CSV format descriptor together with its
/// tokenizer and escaper, plugged into the generic row pipeline.
///
/// # Module Architecture
///
/// 1. **CsvTokenizer** (`csv_reader`): the state machine turning characters
///    into rows. It understands quoted values, escaped quotes, embedded
///    delimiters and line breaks, comment lines and blank lines.
///
/// 2. **CsvEscaper** (`csv_writer`): the inverse operation, deciding when a
///    value must be quoted and escaping the quotes it contains.
///
/// Both are configured through [`CsvParserBuilder`] and [`CsvWriterBuilder`].
///
/// # Examples
///
/// ## Reading from CSV
///
/// ```
/// use rowscan::item::csv::CsvParserBuilder;
///
/// let csv_data = "\
/// city,country,pop
/// Boston,United States,4628910
/// \"Concord, MA\",United States,42695
/// ";
///
/// let mut parser = CsvParserBuilder::new()
///     .has_headers(true)
///     .from_reader(csv_data.as_bytes())
///     .unwrap();
///
/// let rows = parser.parse_all().unwrap();
/// assert_eq!(rows.len(), 2);
/// assert_eq!(rows[1].get_by_name("city"), Some("Concord, MA"));
/// assert_eq!(rows[0].get(2), Some("4628910"));
/// ```
///
/// ## Writing to CSV
///
/// ```
/// use rowscan::item::csv::CsvWriterBuilder;
///
/// let mut writer = CsvWriterBuilder::new()
///     .headers(&["name", "comment"])
///     .has_headers(true)
///     .from_writer(Vec::new())
///     .unwrap();
///
/// writer.write_values(&["Alice", "likes \"quotes\""]).unwrap();
/// writer.write_row(&[Some("Bob"), None]).unwrap();
///
/// let csv = String::from_utf8(writer.finish().unwrap()).unwrap();
/// assert_eq!(csv, "name,comment\nAlice,\"likes \"\"quotes\"\"\"\nBob,\n");
/// ```
pub mod csv_reader;
pub mod csv_writer;

use serde::{Deserialize, Serialize};

use crate::{
    core::{
        format::{CommonFormat, Format},
        parser::{Parser, ParserBuilder},
        settings::{ParserSettings, WriterSettings},
        writer::{TextWriter, WriterBuilder},
    },
    error::{TextError, TextResult},
};

use self::{csv_reader::CsvTokenizer, csv_writer::CsvEscaper};

/// Description of a delimited, quoted format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CsvFormat {
    #[serde(flatten)]
    pub common: CommonFormat,
    /// Field delimiter; may span several characters.
    pub delimiter: String,
    pub quote: char,
    /// Character escaping a quote inside a quoted value. Equal to `quote`
    /// for the usual doubled-quote convention.
    pub quote_escape: char,
    /// Keep going when a quote is followed by something else than a
    /// delimiter or a line ending, treating it as part of the value.
    pub allow_unescaped_quotes: bool,
    /// Normalize line endings found inside quoted values.
    pub normalize_line_endings_within_quotes: bool,
    /// Quote every value on write.
    pub quote_all_fields: bool,
}

impl Default for CsvFormat {
    fn default() -> Self {
        Self {
            common: CommonFormat::default(),
            delimiter: ",".to_string(),
            quote: '"',
            quote_escape: '"',
            allow_unescaped_quotes: true,
            normalize_line_endings_within_quotes: true,
            quote_all_fields: false,
        }
    }
}

impl Format for CsvFormat {
    type Tokenizer = CsvTokenizer;
    type Escaper = CsvEscaper;

    fn name(&self) -> &'static str {
        "csv"
    }

    fn common(&self) -> &CommonFormat {
        &self.common
    }

    fn common_mut(&mut self) -> &mut CommonFormat {
        &mut self.common
    }

    fn validate(&self) -> TextResult<()> {
        self.common.validate()?;

        if self.delimiter.is_empty() {
            return Err(TextError::Configuration(
                "Delimiter cannot be empty".to_string(),
            ));
        }
        if self.delimiter.contains(['\n', '\r']) {
            return Err(TextError::Configuration(
                "Delimiter cannot contain line endings".to_string(),
            ));
        }
        for (name, ch) in [("Quote", self.quote), ("Quote escape", self.quote_escape)] {
            if ch == '\n' || ch == '\r' {
                return Err(TextError::Configuration(format!(
                    "{} character cannot be a line ending",
                    name
                )));
            }
            if self.delimiter.contains(ch) {
                return Err(TextError::Configuration(format!(
                    "{} character {:?} conflicts with delimiter {:?}",
                    name, ch, self.delimiter
                )));
            }
        }
        if let Some(comment) = self.common.comment {
            if comment == self.quote || self.delimiter.starts_with(comment) {
                return Err(TextError::Configuration(format!(
                    "Comment character {:?} conflicts with the delimiter or the quote",
                    comment
                )));
            }
        }
        Ok(())
    }

    fn tokenizer(&self, settings: &ParserSettings<Self>) -> CsvTokenizer {
        CsvTokenizer::new(self, settings)
    }

    fn escaper(&self, _settings: &WriterSettings<Self>) -> CsvEscaper {
        CsvEscaper::new(self)
    }
}

pub type CsvParser<R> = Parser<CsvFormat, R>;
pub type CsvWriter<W> = TextWriter<CsvFormat, W>;
pub type CsvParserBuilder = ParserBuilder<CsvFormat>;
pub type CsvWriterBuilder = WriterBuilder<CsvFormat>;

impl ParserBuilder<CsvFormat> {
    pub fn delimiter(mut self, delimiter: &str) -> Self {
        self.settings.format.delimiter = delimiter.to_string();
        self
    }

    pub fn quote(mut self, quote: char) -> Self {
        self.settings.format.quote = quote;
        self
    }

    pub fn quote_escape(mut self, escape: char) -> Self {
        self.settings.format.quote_escape = escape;
        self
    }

    pub fn allow_unescaped_quotes(mut self, yes: bool) -> Self {
        self.settings.format.allow_unescaped_quotes = yes;
        self
    }

    pub fn normalize_line_endings_within_quotes(mut self, yes: bool) -> Self {
        self.settings.format.normalize_line_endings_within_quotes = yes;
        self
    }
}

impl WriterBuilder<CsvFormat> {
    pub fn delimiter(mut self, delimiter: &str) -> Self {
        self.settings.format.delimiter = delimiter.to_string();
        self
    }

    pub fn quote(mut self, quote: char) -> Self {
        self.settings.format.quote = quote;
        self
    }

    pub fn quote_escape(mut self, escape: char) -> Self {
        self.settings.format.quote_escape = escape;
        self
    }

    pub fn quote_all_fields(mut self, yes: bool) -> Self {
        self.settings.format.quote_all_fields = yes;
        self
    }
}

#[cfg(test)]
mod tests {
    use crate::core::format::Format;

    use super::CsvFormat;

    #[test]
    fn default_format_is_valid() {
        assert!(CsvFormat::default().validate().is_ok());
    }

    #[test]
    fn delimiter_quote_and_escape_must_differ() {
        let format = CsvFormat {
            delimiter: "\"".to_string(),
            ..CsvFormat::default()
        };
        assert!(format.validate().is_err());

        let format = CsvFormat {
            quote_escape: ';',
            delimiter: ";".to_string(),
            ..CsvFormat::default()
        };
        assert!(format.validate().is_err());

        let format = CsvFormat {
            quote_escape: '\\',
            ..CsvFormat::default()
        };
        assert!(format.validate().is_ok());
    }

    #[test]
    fn delimiter_cannot_be_empty_or_span_lines() {
        for delimiter in ["", "\n", ",\r"] {
            let format = CsvFormat {
                delimiter: delimiter.to_string(),
                ..CsvFormat::default()
            };
            assert!(format.validate().is_err(), "{:?} accepted", delimiter);
        }
    }

    #[test]
    fn comment_cannot_clash_with_delimiter() {
        let mut format = CsvFormat {
            delimiter: "#".to_string(),
            ..CsvFormat::default()
        };
        assert!(format.validate().is_err());
        format.common.comment = None;
        assert!(format.validate().is_ok());
    }
}
