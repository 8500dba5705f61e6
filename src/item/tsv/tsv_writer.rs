use crate::{
    core::item::RowEscaper,
    error::{TextError, TextResult},
};

use super::{TAB, TsvFormat};

/// Encodes rows as tab-separated text. Nulls are written as nothing.
///
/// TSV has no quoting, so a row holding nothing but one empty value would be
/// a blank line and vanish when read back. Such rows are rejected.
///
/// # Examples
///
/// ```
/// use rowscan::core::item::RowEscaper;
/// use rowscan::item::tsv::{TsvFormat, tsv_writer::TsvEscaper};
///
/// let mut escaper = TsvEscaper::new(&TsvFormat::default());
/// let mut line = String::new();
/// escaper
///     .escape_row(&[Some("tab\there"), None, Some("two\nlines")], &mut line)
///     .unwrap();
///
/// assert_eq!(line, "tab\\there\t\ttwo\\nlines");
/// ```
#[derive(Debug, Clone)]
pub struct TsvEscaper {
    escape: char,
    line_joining: bool,
}

impl TsvEscaper {
    pub fn new(format: &TsvFormat) -> Self {
        Self {
            escape: format.escape,
            line_joining: format.line_joining,
        }
    }

    fn write_value(&self, value: &str, out: &mut String) {
        for ch in value.chars() {
            match ch {
                TAB => {
                    out.push(self.escape);
                    out.push('t');
                }
                '\n' if self.line_joining => {
                    out.push(self.escape);
                    out.push('\n');
                }
                '\n' => {
                    out.push(self.escape);
                    out.push('n');
                }
                '\r' => {
                    out.push(self.escape);
                    out.push('r');
                }
                ch if ch == self.escape => {
                    out.push(self.escape);
                    out.push(self.escape);
                }
                ch => out.push(ch),
            }
        }
    }
}

impl RowEscaper for TsvEscaper {
    fn escape_row(&mut self, values: &[Option<&str>], out: &mut String) -> TextResult<()> {
        if matches!(values, [] | [None] | [Some("")]) {
            return Err(TextError::TextWriting(
                "A TSV row made of a single empty value cannot be told apart from a blank line"
                    .to_string(),
            ));
        }
        for (index, value) in values.iter().enumerate() {
            if index > 0 {
                out.push(TAB);
            }
            if let Some(value) = value {
                self.write_value(value, out);
            }
        }
        Ok(())
    }
}
