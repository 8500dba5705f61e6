use std::io::Read;

use crate::{
    core::{
        input::{CharInput, NEWLINE},
        item::{RowTokenizer, TokenizerStatus},
        row::{RawRow, RowLimit},
        settings::ParserSettings,
    },
    error::{TextError, TextResult},
};

use super::CsvFormat;

/// How a value ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldEnd {
    Delimiter,
    LineEnd,
    EndOfInput,
}

/// Tokenizer for delimited, quoted text.
///
/// Each value goes through up to three states: unquoted, quoted, and after
/// the closing quote. Quoted content is kept as is (never trimmed), a doubled
/// quote (or `escape` + quote when the escape differs from the quote) stands
/// for a literal quote, and delimiters and line breaks inside quotes are part
/// of the value.
///
/// The tokenizer only produces raw values. Header extraction, field
/// selection and value substitution happen in the
/// [`Parser`](crate::core::parser::Parser) driving it, which is what
/// [`CsvParserBuilder`](super::CsvParserBuilder) builds.
///
/// # Rows and lines
///
/// - A line break outside quotes ends the row; `\r\n`, `\r` and `\n` all
///   count as one.
/// - Blank lines and lines starting with the comment character are skipped,
///   unless `skip_empty_lines` or `comment_processing` are disabled in the
///   settings.
/// - A row whose only value is quoted and empty (`""`) is never blank.
/// - A trailing delimiter yields a final empty value.
///
/// # Errors
///
/// Problems confined to one row are reported as
/// [`TextError::MalformedInput`] and are recoverable: a quote followed by
/// something else than a delimiter or a line end (when unescaped quotes are
/// not allowed), a quoted value still open at the end of the input, or a
/// value or column count over the configured limits. After such an error
/// [`recover`](RowTokenizer::recover) skips the rest of the row, including
/// the remainder of an open quoted value.
///
/// # Examples
///
/// ```
/// use rowscan::core::{
///     input::CharInput,
///     item::{RowTokenizer, TokenizerStatus},
///     row::RawRow,
///     settings::ParserSettings,
/// };
/// use rowscan::item::csv::{CsvFormat, csv_reader::CsvTokenizer};
///
/// let settings = ParserSettings::<CsvFormat>::default();
/// let mut tokenizer = CsvTokenizer::new(&settings.format, &settings);
/// let mut input = CharInput::new("23.4,\"Microsoft, Inc.\",2\n".as_bytes());
/// let mut row = RawRow::default();
///
/// let status = tokenizer.next_row(&mut input, &mut row).unwrap();
/// assert_eq!(status, TokenizerStatus::Row);
/// assert_eq!(row.to_vec(), vec!["23.4", "Microsoft, Inc.", "2"]);
///
/// // Nothing left
/// let status = tokenizer.next_row(&mut input, &mut row).unwrap();
/// assert_eq!(status, TokenizerStatus::EndOfInput);
/// ```
#[derive(Debug, Clone)]
pub struct CsvTokenizer {
    /// Delimiter, possibly several characters long
    delimiter: Vec<char>,
    quote: char,
    quote_escape: char,
    /// Comment character, `None` when comment processing is disabled
    comment: Option<char>,
    allow_unescaped_quotes: bool,
    /// Normalize line endings found inside quoted values
    normalize_quoted: bool,
    trim_leading: bool,
    trim_trailing: bool,
    skip_empty_lines: bool,
    /// Whether the last row consumed its line terminator
    line_ended: bool,
    /// Whether the last error happened inside a quoted value
    in_quotes: bool,
    /// Whether any value of the current row was quoted
    row_quoted: bool,
}

impl CsvTokenizer {
    /// Creates a tokenizer for `format`, taking trimming, comment and blank
    /// line handling from `settings`.
    ///
    /// The comment character of the format is ignored when
    /// `settings.comment_processing` is off.
    pub fn new(format: &CsvFormat, settings: &ParserSettings<CsvFormat>) -> Self {
        Self {
            delimiter: format.delimiter.chars().collect(),
            quote: format.quote,
            quote_escape: format.quote_escape,
            comment: format.common.comment.filter(|_| settings.comment_processing),
            allow_unescaped_quotes: format.allow_unescaped_quotes,
            normalize_quoted: format.normalize_line_endings_within_quotes,
            trim_leading: settings.ignore_leading_whitespace,
            trim_trailing: settings.ignore_trailing_whitespace,
            skip_empty_lines: settings.skip_empty_lines,
            line_ended: false,
            in_quotes: false,
            row_quoted: false,
        }
    }

    fn parse_row<R: Read>(
        &mut self,
        input: &mut CharInput<R>,
        row: &mut RawRow,
    ) -> TextResult<TokenizerStatus> {
        row.clear();
        self.line_ended = false;
        self.row_quoted = false;

        loop {
            match input.peek_char()? {
                None => return Ok(TokenizerStatus::EndOfInput),
                Some(NEWLINE) => {
                    input.next_char()?;
                    if !self.skip_empty_lines {
                        self.line_ended = true;
                        return Ok(TokenizerStatus::Row);
                    }
                }
                Some(ch) if self.comment == Some(ch) => {
                    input.skip_line()?;
                }
                Some(_) => break,
            }
        }

        loop {
            match self.parse_field(input, row)? {
                FieldEnd::Delimiter => continue,
                FieldEnd::LineEnd | FieldEnd::EndOfInput => break,
            }
        }
        Ok(TokenizerStatus::Row)
    }

    fn parse_field<R: Read>(
        &mut self,
        input: &mut CharInput<R>,
        row: &mut RawRow,
    ) -> TextResult<FieldEnd> {
        if self.trim_leading {
            while let Some(ch) = input.peek_char()? {
                if ch == NEWLINE || !ch.is_whitespace() || self.at_delimiter(input)? {
                    break;
                }
                input.next_char()?;
            }
        }

        if input.peek_char()? == Some(self.quote) {
            input.next_char()?;
            self.row_quoted = true;
            self.parse_quoted(input, row)
        } else {
            self.parse_unquoted(input, row, 0)
        }
    }

    fn parse_unquoted<R: Read>(
        &mut self,
        input: &mut CharInput<R>,
        row: &mut RawRow,
        floor: usize,
    ) -> TextResult<FieldEnd> {
        loop {
            if self.at_delimiter(input)? {
                input.skip(self.delimiter.len())?;
                self.end_value(input, row, floor)?;
                return Ok(FieldEnd::Delimiter);
            }
            match input.next_char()? {
                None => {
                    self.end_value(input, row, floor)?;
                    return Ok(FieldEnd::EndOfInput);
                }
                Some(NEWLINE) => {
                    self.line_ended = true;
                    self.end_value(input, row, floor)?;
                    return Ok(FieldEnd::LineEnd);
                }
                Some(ch) => push(input, row, ch)?,
            }
        }
    }

    fn parse_quoted<R: Read>(
        &mut self,
        input: &mut CharInput<R>,
        row: &mut RawRow,
    ) -> TextResult<FieldEnd> {
        self.in_quotes = true;
        input.set_normalize(self.normalize_quoted);

        loop {
            let Some(ch) = input.next_char()? else {
                input.set_normalize(true);
                return Err(malformed(input, "unterminated quoted value at end of input"));
            };

            if ch == self.quote_escape && self.quote_escape != self.quote {
                match input.peek_ahead(0)? {
                    Some(next) if next == self.quote || next == self.quote_escape => {
                        input.next_char()?;
                        push(input, row, next)?;
                    }
                    _ => push(input, row, ch)?,
                }
                continue;
            }

            if ch == self.quote {
                if self.quote_escape == self.quote && input.peek_ahead(0)? == Some(self.quote) {
                    input.next_char()?;
                    push(input, row, ch)?;
                    continue;
                }
                break;
            }

            push(input, row, ch)?;
        }

        input.set_normalize(true);
        self.in_quotes = false;
        let floor = row.field_len();
        self.after_closing_quote(input, row, floor)
    }

    fn after_closing_quote<R: Read>(
        &mut self,
        input: &mut CharInput<R>,
        row: &mut RawRow,
        floor: usize,
    ) -> TextResult<FieldEnd> {
        let mut spaces = String::new();
        loop {
            if self.at_delimiter(input)? {
                input.skip(self.delimiter.len())?;
                self.end_value(input, row, floor)?;
                return Ok(FieldEnd::Delimiter);
            }
            match input.next_char()? {
                None => {
                    self.end_value(input, row, floor)?;
                    return Ok(FieldEnd::EndOfInput);
                }
                Some(NEWLINE) => {
                    self.line_ended = true;
                    self.end_value(input, row, floor)?;
                    return Ok(FieldEnd::LineEnd);
                }
                Some(ch) if ch.is_whitespace() => spaces.push(ch),
                Some(ch) if self.allow_unescaped_quotes => {
                    // the quote was part of the value
                    push(input, row, self.quote)?;
                    for space in spaces.chars() {
                        push(input, row, space)?;
                    }
                    push(input, row, ch)?;
                    let floor = row.field_len();
                    return self.parse_unquoted(input, row, floor);
                }
                Some(ch) => {
                    return Err(malformed(
                        input,
                        &format!(
                            "unexpected character {:?} after closing quote {:?}",
                            ch, self.quote
                        ),
                    ));
                }
            }
        }
    }

    fn at_delimiter<R: Read>(&self, input: &mut CharInput<R>) -> TextResult<bool> {
        let found = match self.delimiter.as_slice() {
            [single] => input.peek_ahead(0)? == Some(*single),
            several => input.starts_with(several)?,
        };
        Ok(found)
    }

    fn end_value<R: Read>(
        &self,
        input: &CharInput<R>,
        row: &mut RawRow,
        floor: usize,
    ) -> TextResult<()> {
        if self.trim_trailing {
            row.trim_field_end(floor, |_| false);
        }
        row.end_field()
            .map_err(|limit| limit_error(input, row, limit))
    }

    fn is_blank(&self, row: &RawRow) -> bool {
        !self.row_quoted && row.len() == 1 && row.get(0) == Some("")
    }
}

impl RowTokenizer for CsvTokenizer {
    /// Reads the next row, skipping blank lines when configured to.
    fn next_row<R: Read>(
        &mut self,
        input: &mut CharInput<R>,
        row: &mut RawRow,
    ) -> TextResult<TokenizerStatus> {
        loop {
            let status = self.parse_row(input, row)?;
            if status == TokenizerStatus::Row && self.skip_empty_lines && self.is_blank(row) {
                continue;
            }
            return Ok(status);
        }
    }

    /// Skips what is left of a malformed row.
    ///
    /// When the error happened inside a quoted value, the input is first
    /// consumed up to the closing quote so the line breaks the value holds
    /// are not taken for row boundaries.
    fn recover<R: Read>(&mut self, input: &mut CharInput<R>) -> TextResult<()> {
        input.set_normalize(true);
        if self.in_quotes {
            self.in_quotes = false;
            while let Some(ch) = input.next_char()? {
                if ch == self.quote_escape && self.quote_escape != self.quote {
                    input.next_char()?;
                } else if ch == self.quote {
                    if self.quote_escape == self.quote && input.peek_ahead(0)? == Some(self.quote) {
                        input.next_char()?;
                    } else {
                        break;
                    }
                }
            }
        }
        if !self.line_ended {
            input.skip_line()?;
            self.line_ended = true;
        }
        Ok(())
    }
}

fn push<R: Read>(input: &CharInput<R>, row: &mut RawRow, ch: char) -> TextResult<()> {
    row.push_char(ch)
        .map_err(|limit| limit_error(input, row, limit))
}

fn limit_error<R: Read>(input: &CharInput<R>, row: &RawRow, limit: RowLimit) -> TextError {
    malformed(input, &limit.describe(row.len() + 1))
}

fn malformed<R: Read>(input: &CharInput<R>, message: &str) -> TextError {
    TextError::MalformedInput {
        line: input.current_line(),
        row: 0,
        message: message.to_string(),
    }
}
