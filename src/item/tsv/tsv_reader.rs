use std::io::Read;

use crate::{
    core::{
        input::{CharInput, NEWLINE},
        item::{RowTokenizer, TokenizerStatus},
        row::RawRow,
        settings::ParserSettings,
    },
    error::{TextError, TextResult},
};

use super::{TAB, TsvFormat};

/// Tokenizer for tab-separated text.
///
/// Values are split on every tab and rows on every line break. There is no
/// quoting: special characters are written as escape sequences instead.
///
/// | Sequence             | Value               |
/// |----------------------|---------------------|
/// | `\t`                 | tab                 |
/// | `\n`                 | line feed           |
/// | `\r`                 | carriage return     |
/// | `\\`                 | the escape itself   |
/// | `\` + line break     | line break, when line joining is enabled |
///
/// Any other character after the escape is kept together with the escape.
/// Characters produced by an escape sequence survive whitespace trimming.
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
/// use rowscan::item::tsv::{TsvFormat, tsv_reader::TsvTokenizer};
///
/// let settings = ParserSettings::<TsvFormat>::default();
/// let mut tokenizer = TsvTokenizer::new(&settings.format, &settings);
/// let mut input = CharInput::new("C:\\\\temp\tcol\\tumn\n".as_bytes());
/// let mut row = RawRow::default();
///
/// assert_eq!(tokenizer.next_row(&mut input, &mut row).unwrap(), TokenizerStatus::Row);
/// assert_eq!(row.to_vec(), vec!["C:\\temp", "col\tumn"]);
/// ```
#[derive(Debug, Clone)]
pub struct TsvTokenizer {
    escape: char,
    /// Escaped line breaks continue the value on the next line
    line_joining: bool,
    comment: Option<char>,
    trim_leading: bool,
    trim_trailing: bool,
    skip_empty_lines: bool,
    line_ended: bool,
}

impl TsvTokenizer {
    /// Creates a tokenizer for `format` with the trimming, comment and blank
    /// line options of `settings`.
    pub fn new(format: &TsvFormat, settings: &ParserSettings<TsvFormat>) -> Self {
        Self {
            escape: format.escape,
            line_joining: format.line_joining,
            comment: format.common.comment.filter(|_| settings.comment_processing),
            trim_leading: settings.ignore_leading_whitespace,
            trim_trailing: settings.ignore_trailing_whitespace,
            skip_empty_lines: settings.skip_empty_lines,
            line_ended: false,
        }
    }

    fn parse_row<R: Read>(
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

        while self.parse_field(input, row)? {}
        Ok(TokenizerStatus::Row)
    }

    /// Reads one value; returns `true` when another value follows on the
    /// same row.
    fn parse_field<R: Read>(
        &mut self,
        input: &mut CharInput<R>,
        row: &mut RawRow,
    ) -> TextResult<bool> {
        if self.trim_leading {
            while let Some(ch) = input.peek_char()? {
                if ch == TAB || ch == NEWLINE || !ch.is_whitespace() {
                    break;
                }
                input.next_char()?;
            }
        }

        let mut floor = 0;
        loop {
            let ch = input.next_char()?;
            match ch {
                None => {
                    self.end_value(input, row, floor)?;
                    return Ok(false);
                }
                Some(NEWLINE) => {
                    self.line_ended = true;
                    self.end_value(input, row, floor)?;
                    return Ok(false);
                }
                Some(TAB) => {
                    self.end_value(input, row, floor)?;
                    return Ok(true);
                }
                Some(ch) if ch == self.escape => {
                    match input.next_char()? {
                        Some('t') => push(input, row, TAB)?,
                        Some('n') => push(input, row, '\n')?,
                        Some('r') => push(input, row, '\r')?,
                        Some(NEWLINE) if self.line_joining => push(input, row, '\n')?,
                        Some(NEWLINE) => {
                            push(input, row, ch)?;
                            self.line_ended = true;
                            let floor = row.field_len();
                            self.end_value(input, row, floor)?;
                            return Ok(false);
                        }
                        Some(next) if next == self.escape => push(input, row, next)?,
                        Some(next) => {
                            push(input, row, ch)?;
                            push(input, row, next)?;
                        }
                        None => {
                            push(input, row, ch)?;
                            let floor = row.field_len();
                            self.end_value(input, row, floor)?;
                            return Ok(false);
                        }
                    }
                    floor = row.field_len();
                }
                Some(ch) => push(input, row, ch)?,
            }
        }
    }

    fn end_value<R: Read>(
        &self,
        input: &CharInput<R>,
        row: &mut RawRow,
        floor: usize,
    ) -> TextResult<()> {
        if self.trim_trailing {
            row.trim_field_end(floor, |ch| ch == TAB);
        }
        row.end_field().map_err(|limit| TextError::MalformedInput {
            line: input.current_line(),
            row: 0,
            message: limit.describe(row.len() + 1),
        })
    }
}

impl RowTokenizer for TsvTokenizer {
    fn next_row<R: Read>(
        &mut self,
        input: &mut CharInput<R>,
        row: &mut RawRow,
    ) -> TextResult<TokenizerStatus> {
        loop {
            let status = self.parse_row(input, row)?;
            let blank = row.len() == 1 && row.get(0) == Some("");
            if status == TokenizerStatus::Row && self.skip_empty_lines && blank {
                continue;
            }
            return Ok(status);
        }
    }

    /// Skips the rest of the line the error happened on.
    fn recover<R: Read>(&mut self, input: &mut CharInput<R>) -> TextResult<()> {
        if !self.line_ended {
            input.skip_line()?;
            self.line_ended = true;
        }
        Ok(())
    }
}

fn push<R: Read>(input: &CharInput<R>, row: &mut RawRow, ch: char) -> TextResult<()> {
    row.push_char(ch).map_err(|limit| TextError::MalformedInput {
        line: input.current_line(),
        row: 0,
        message: limit.describe(row.len() + 1),
    })
}

#[cfg(test)]
mod tests {
    use crate::{
        core::{
            input::CharInput,
            item::{RowTokenizer, TokenizerStatus},
            row::RawRow,
            settings::ParserSettings,
        },
        item::tsv::TsvFormat,
    };

    use super::TsvTokenizer;

    fn tokenize_with(settings: ParserSettings<TsvFormat>, text: &str) -> Vec<Vec<String>> {
        let mut tokenizer = TsvTokenizer::new(&settings.format, &settings);
        let mut input = CharInput::new(text.as_bytes());
        let mut row = RawRow::default();
        let mut rows = Vec::new();
        while tokenizer.next_row(&mut input, &mut row).unwrap() == TokenizerStatus::Row {
            rows.push(row.to_vec());
        }
        rows
    }

    fn tokenize(text: &str) -> Vec<Vec<String>> {
        tokenize_with(ParserSettings::default(), text)
    }

    #[test]
    fn tabs_separate_values() {
        assert_eq!(
            tokenize("a\tb\t\nc\t d \n"),
            vec![vec!["a", "b", ""], vec!["c", "d"]]
        );
    }

    #[test]
    fn escape_sequences_are_decoded() {
        assert_eq!(
            tokenize("a\\tb\tline\\nbreak\tback\\\\slash\t\\x\n"),
            vec![vec!["a\tb", "line\nbreak", "back\\slash", "\\x"]]
        );
    }

    #[test]
    fn escaped_whitespace_survives_trimming() {
        assert_eq!(tokenize("value\\t \tnext\n"), vec![vec!["value\t", "next"]]);
    }

    #[test]
    fn line_joining_keeps_the_line_break() {
        let mut settings = ParserSettings::<TsvFormat>::default();
        settings.format.line_joining = true;
        assert_eq!(
            tokenize_with(settings, "first\\\nsecond\tx\ny\n"),
            vec![vec!["first\nsecond", "x"], vec!["y"]]
        );

        assert_eq!(
            tokenize("first\\\nsecond\n"),
            vec![vec!["first\\"], vec!["second"]]
        );
    }

    #[test]
    fn comments_and_blank_lines_are_skipped() {
        assert_eq!(tokenize("#c\n\n \na\n"), vec![vec!["a"]]);
    }
}
