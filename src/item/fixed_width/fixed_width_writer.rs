use crate::{
    core::item::RowEscaper,
    error::{TextError, TextResult},
};

use super::{Alignment, FixedWidthFormat};

/// Pads (or truncates) each value to its column. Nulls become blank columns.
///
/// Values are placed according to the alignment of their column and padded
/// with the column's padding character, or the format's one. A row with
/// more values than declared columns, or a value holding a line break, is a
/// [`TextError::TextWriting`] error.
///
/// # Examples
///
/// ```
/// use rowscan::core::item::RowEscaper;
/// use rowscan::item::fixed_width::{
///     Alignment, FixedWidthFields, FixedWidthFormat, fixed_width_writer::FixedWidthEscaper,
/// };
///
/// let format = FixedWidthFormat {
///     fields: FixedWidthFields::new()
///         .field("symbol", 6)
///         .aligned("status", 8, Alignment::Center)
///         .padded_with('*'),
///     ..FixedWidthFormat::default()
/// };
/// let mut escaper = FixedWidthEscaper::new(&format);
/// let mut line = String::new();
/// escaper.escape_row(&[Some("IBM"), Some("open")], &mut line).unwrap();
///
/// assert_eq!(line, "IBM   **open**");
/// ```
#[derive(Debug, Clone)]
pub struct FixedWidthEscaper {
    columns: Vec<(usize, Alignment, char)>,
}

impl FixedWidthEscaper {
    /// Creates an escaper for the columns of `format`.
    pub fn new(format: &FixedWidthFormat) -> Self {
        Self {
            columns: format
                .fields
                .iter()
                .map(|field| {
                    (
                        field.length,
                        field.alignment,
                        field.padding.unwrap_or(format.padding),
                    )
                })
                .collect(),
        }
    }
}

impl RowEscaper for FixedWidthEscaper {
    fn escape_row(&mut self, values: &[Option<&str>], out: &mut String) -> TextResult<()> {
        if values.len() > self.columns.len() {
            return Err(TextError::TextWriting(format!(
                "Row has {} values but only {} fixed-width fields are declared",
                values.len(),
                self.columns.len()
            )));
        }

        for (index, (length, alignment, padding)) in self.columns.iter().enumerate() {
            let value = values.get(index).copied().flatten().unwrap_or("");
            if value.contains(['\n', '\r']) {
                return Err(TextError::TextWriting(format!(
                    "Value of fixed-width field {} contains a line break",
                    index
                )));
            }

            let width = value.chars().count().min(*length);
            let missing = length - width;
            let (before, after) = match alignment {
                Alignment::Left => (0, missing),
                Alignment::Right => (missing, 0),
                Alignment::Center => (missing / 2, missing - missing / 2),
            };
            out.extend(std::iter::repeat_n(*padding, before));
            out.extend(value.chars().take(width));
            out.extend(std::iter::repeat_n(*padding, after));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        core::item::RowEscaper,
        error::TextError,
        item::fixed_width::{Alignment, FixedWidthFields, FixedWidthFormat},
    };

    use super::FixedWidthEscaper;

    fn format() -> FixedWidthFormat {
        FixedWidthFormat {
            fields: FixedWidthFields::new()
                .field("name", 5)
                .aligned("id", 4, Alignment::Right)
                .padded_with('0')
                .aligned("tag", 5, Alignment::Center)
                .padded_with('*'),
            ..FixedWidthFormat::default()
        }
    }

    #[test]
    fn values_are_padded_to_their_column() {
        let mut out = String::new();
        FixedWidthEscaper::new(&format())
            .escape_row(&[Some("ab"), Some("42"), Some("ok")], &mut out)
            .unwrap();
        assert_eq!(out, "ab   0042*ok**");
    }

    #[test]
    fn long_values_are_truncated_and_missing_ones_blank() {
        let mut out = String::new();
        FixedWidthEscaper::new(&format())
            .escape_row(&[Some("abcdefgh"), None], &mut out)
            .unwrap();
        assert_eq!(out, "abcde0000*****");
    }

    #[test]
    fn extra_values_are_rejected() {
        let mut out = String::new();
        let result = FixedWidthEscaper::new(&format()).escape_row(
            &[Some("a"), Some("b"), Some("c"), Some("d")],
            &mut out,
        );
        assert!(matches!(result, Err(TextError::TextWriting(_))));
    }
}
