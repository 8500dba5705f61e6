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

use super::{Alignment, FixedWidthFormat};

#[derive(Debug, Clone)]
struct Column {
    length: usize,
    alignment: Alignment,
    padding: char,
}

/// Cuts each line into the declared column windows.
///
/// Every column takes exactly its declared number of characters. The
/// padding of a column is stripped from the side its alignment leaves free:
/// the end for left-aligned values, the start for right-aligned ones, both
/// sides for centered ones. Each column may override the format's padding
/// character.
///
/// A line ending before the last column is completed with empty values when
/// the format allows short rows, and rejected otherwise. Characters past the
/// last column are dropped when the format allows long rows, and rejected
/// otherwise. Rejections are recoverable [`TextError::MalformedInput`]
/// errors.
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
/// use rowscan::item::fixed_width::{
///     Alignment, FixedWidthFields, FixedWidthFormat, fixed_width_reader::FixedWidthTokenizer,
/// };
///
/// let format = FixedWidthFormat {
///     fields: FixedWidthFields::new()
///         .field("symbol", 6)
///         .aligned("quantity", 5, Alignment::Right)
///         .padded_with('0'),
///     ..FixedWidthFormat::default()
/// };
/// let settings = ParserSettings {
///     format,
///     ..ParserSettings::default()
/// };
/// let mut tokenizer = FixedWidthTokenizer::new(&settings.format, &settings);
/// let mut input = CharInput::new("IBM   00234\n".as_bytes());
/// let mut row = RawRow::default();
///
/// assert_eq!(tokenizer.next_row(&mut input, &mut row).unwrap(), TokenizerStatus::Row);
/// assert_eq!(row.to_vec(), vec!["IBM", "234"]);
/// ```
#[derive(Debug, Clone)]
pub struct FixedWidthTokenizer {
    columns: Vec<Column>,
    comment: Option<char>,
    allow_short_rows: bool,
    allow_long_rows: bool,
    keep_padding: bool,
    trim_leading: bool,
    trim_trailing: bool,
    skip_empty_lines: bool,
    line_ended: bool,
    window: String,
}

impl FixedWidthTokenizer {
    /// Creates a tokenizer for the columns of `format`.
    pub fn new(format: &FixedWidthFormat, settings: &ParserSettings<FixedWidthFormat>) -> Self {
        Self {
            columns: format
                .fields
                .iter()
                .map(|field| Column {
                    length: field.length,
                    alignment: field.alignment,
                    padding: field.padding.unwrap_or(format.padding),
                })
                .collect(),
            comment: format.common.comment.filter(|_| settings.comment_processing),
            allow_short_rows: format.allow_short_rows,
            allow_long_rows: format.allow_long_rows,
            keep_padding: format.keep_padding,
            trim_leading: settings.ignore_leading_whitespace,
            trim_trailing: settings.ignore_trailing_whitespace,
            skip_empty_lines: settings.skip_empty_lines,
            line_ended: false,
            window: String::new(),
        }
    }

    /// Reads up to `length` characters of the current line into the window.
    /// Returns `false` when the line (or the input) ended first.
    fn read_window<R: Read>(&mut self, input: &mut CharInput<R>, length: usize) -> TextResult<bool> {
        self.window.clear();
        for _ in 0..length {
            match input.peek_char()? {
                None | Some(NEWLINE) => return Ok(false),
                Some(_) => {
                    if let Some(ch) = input.next_char()? {
                        self.window.push(ch);
                    }
                }
            }
        }
        Ok(true)
    }

    fn strip<'w>(&self, window: &'w str, column: &Column) -> &'w str {
        let mut value = window;
        if !self.keep_padding {
            let padding = column.padding;
            value = match column.alignment {
                Alignment::Left => value.trim_end_matches(padding),
                Alignment::Right => value.trim_start_matches(padding),
                Alignment::Center => value.trim_matches(padding),
            };
        }
        if self.trim_leading {
            value = value.trim_start();
        }
        if self.trim_trailing {
            value = value.trim_end();
        }
        value
    }

    /// Consumes the end of the line after the last column.
    fn finish_line<R: Read>(&mut self, input: &mut CharInput<R>) -> TextResult<()> {
        match input.peek_char()? {
            None => Ok(()),
            Some(NEWLINE) => {
                input.next_char()?;
                self.line_ended = true;
                Ok(())
            }
            Some(_) if self.allow_long_rows => {
                input.skip_line()?;
                self.line_ended = true;
                Ok(())
            }
            Some(_) => Err(malformed(
                input,
                &format!(
                    "row is longer than the {} characters declared",
                    self.columns.iter().map(|c| c.length).sum::<usize>()
                ),
            )),
        }
    }
}

impl RowTokenizer for FixedWidthTokenizer {
    fn next_row<R: Read>(
        &mut self,
        input: &mut CharInput<R>,
        row: &mut RawRow,
    ) -> TextResult<TokenizerStatus> {
        row.clear();
        self.line_ended = false;

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

        let mut complete = true;
        for index in 0..self.columns.len() {
            let column = self.columns[index].clone();
            if complete {
                complete = self.read_window(input, column.length)?;
            } else {
                self.window.clear();
            }
            if !complete && !self.allow_short_rows {
                return Err(malformed(
                    input,
                    &format!(
                        "row ends before column {} of {}",
                        index + 1,
                        self.columns.len()
                    ),
                ));
            }

            let value = self.strip(&self.window, &column);
            row.push_str(value)
                .and_then(|_| row.end_field())
                .map_err(|limit| limit_error(input, row, limit))?;
        }

        if complete {
            self.finish_line(input)?;
        } else if input.next_char()?.is_some() {
            self.line_ended = true;
        }
        Ok(TokenizerStatus::Row)
    }

    /// Skips the rest of the rejected line.
    fn recover<R: Read>(&mut self, input: &mut CharInput<R>) -> TextResult<()> {
        if !self.line_ended {
            input.skip_line()?;
            self.line_ended = true;
        }
        Ok(())
    }
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
