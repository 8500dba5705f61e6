use crate::{core::item::RowEscaper, error::TextResult};

use super::CsvFormat;

/// Encodes rows as delimited text, quoting values only when needed.
///
/// A value is quoted when it contains the delimiter, the quote, the escape
/// or a line break, when it starts or ends with whitespace, when it would be
/// read back as a comment, when it is the only (empty) value of its row, or
/// when every value is quoted by configuration. Nulls are written as nothing.
///
/// Embedded quotes are doubled, or preceded by the escape character when the
/// format declares one distinct from the quote; that escape character is
/// itself escaped too.
///
/// # Examples
///
/// ```
/// use rowscan::core::item::RowEscaper;
/// use rowscan::item::csv::{CsvFormat, csv_writer::CsvEscaper};
///
/// let mut escaper = CsvEscaper::new(&CsvFormat::default());
/// let mut line = String::new();
/// escaper
///     .escape_row(&[Some("IBM"), Some("Microsoft, Inc."), None, Some("say \"hi\"")], &mut line)
///     .unwrap();
///
/// assert_eq!(line, "IBM,\"Microsoft, Inc.\",,\"say \"\"hi\"\"\"");
/// ```
#[derive(Debug, Clone)]
pub struct CsvEscaper {
    delimiter: String,
    quote: char,
    quote_escape: char,
    comment: Option<char>,
    separator: Vec<char>,
    quote_all: bool,
}

impl CsvEscaper {
    /// Creates an escaper for `format`, using its delimiter, quote, escape,
    /// comment and line separator to decide what needs quoting.
    pub fn new(format: &CsvFormat) -> Self {
        Self {
            delimiter: format.delimiter.clone(),
            quote: format.quote,
            quote_escape: format.quote_escape,
            comment: format.common.comment,
            separator: format
                .common
                .line_separator
                .for_writing()
                .chars()
                .collect(),
            quote_all: format.quote_all_fields,
        }
    }

    fn needs_quotes(&self, value: &str, first: bool, alone: bool) -> bool {
        if self.quote_all {
            return true;
        }
        let (Some(head), Some(tail)) = (value.chars().next(), value.chars().next_back()) else {
            return alone;
        };
        head.is_whitespace()
            || tail.is_whitespace()
            || (first && self.comment == Some(head))
            || value.contains(self.delimiter.as_str())
            || value.chars().any(|ch| {
                ch == self.quote
                    || ch == self.quote_escape
                    || ch == '\n'
                    || ch == '\r'
                    || self.separator.contains(&ch)
            })
    }

    fn write_quoted(&self, value: &str, out: &mut String) {
        out.push(self.quote);
        for ch in value.chars() {
            if ch == self.quote || (ch == self.quote_escape && self.quote_escape != self.quote) {
                out.push(self.quote_escape);
            }
            out.push(ch);
        }
        out.push(self.quote);
    }
}

impl RowEscaper for CsvEscaper {
    fn escape_row(&mut self, values: &[Option<&str>], out: &mut String) -> TextResult<()> {
        let alone = values.len() == 1;
        for (index, value) in values.iter().enumerate() {
            if index > 0 {
                out.push_str(&self.delimiter);
            }
            let Some(value) = value else {
                continue;
            };
            if self.needs_quotes(value, index == 0, alone) {
                self.write_quoted(value, out);
            } else {
                out.push_str(value);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::{core::item::RowEscaper, item::csv::CsvFormat};

    use super::CsvEscaper;

    fn escape(format: &CsvFormat, values: &[Option<&str>]) -> String {
        let mut out = String::new();
        CsvEscaper::new(format).escape_row(values, &mut out).unwrap();
        out
    }

    #[test]
    fn plain_values_are_not_quoted() {
        let format = CsvFormat::default();
        assert_eq!(escape(&format, &[Some("a"), Some("b c"), None]), "a,b c,");
    }

    #[test]
    fn special_values_are_quoted() {
        let format = CsvFormat::default();
        assert_eq!(
            escape(
                &format,
                &[Some("a,b"), Some("say \"hi\""), Some("x\ny"), Some(" pad"), Some("#1")]
            ),
            "\"a,b\",\"say \"\"hi\"\"\",\"x\ny\",\" pad\",#1"
        );
        assert_eq!(escape(&format, &[Some("#1"), Some("b")]), "\"#1\",b");
    }

    #[test]
    fn a_lone_empty_value_is_quoted() {
        let format = CsvFormat::default();
        assert_eq!(escape(&format, &[Some("")]), "\"\"");
        assert_eq!(escape(&format, &[Some(""), Some("")]), ",");
    }

    #[test]
    fn distinct_escape_character_escapes_itself() {
        let format = CsvFormat {
            quote_escape: '\\',
            ..CsvFormat::default()
        };
        assert_eq!(escape(&format, &[Some("a\"b\\")]), "\"a\\\"b\\\\\"");
    }

    #[test]
    fn quote_all_fields_quotes_values_but_not_nulls() {
        let format = CsvFormat {
            quote_all_fields: true,
            delimiter: ";".to_string(),
            ..CsvFormat::default()
        };
        assert_eq!(escape(&format, &[Some("a"), None, Some("")]), "\"a\";;\"\"");
    }
}
