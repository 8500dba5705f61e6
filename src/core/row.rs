use std::{borrow::Cow, sync::Arc};

use super::selection::{index_of, normalize};

/// Why a tokenizer refused to grow a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowLimit {
    /// A value reached the maximum number of characters per column.
    FieldTooLong(usize),
    /// The row reached the maximum number of columns.
    TooManyColumns(usize),
}

impl RowLimit {
    pub fn describe(&self, column: usize) -> String {
        match self {
            RowLimit::FieldTooLong(max) => format!(
                "length of value in column {} exceeds the maximum of {} characters",
                column, max
            ),
            RowLimit::TooManyColumns(max) => {
                format!("row exceeds the maximum of {} columns", max)
            }
        }
    }
}

/// The fields of one record exactly as the tokenizer produced them.
///
/// All values share a single string buffer; each value is addressed by its
/// end offset, so handing a value to a consumer never copies it. The buffer
/// is bounded by the column and per-column character limits it was created
/// with.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRow {
    data: String,
    ends: Vec<usize>,
    field_start: usize,
    field_chars: usize,
    max_chars_per_column: usize,
    max_columns: usize,
}

impl Default for RawRow {
    fn default() -> Self {
        RawRow::with_limits(usize::MAX, usize::MAX)
    }
}

impl RawRow {
    pub fn with_limits(max_columns: usize, max_chars_per_column: usize) -> Self {
        Self {
            data: String::new(),
            ends: Vec::new(),
            field_start: 0,
            field_chars: 0,
            max_chars_per_column,
            max_columns,
        }
    }

    /// Builds a row from complete values (no limits applied).
    pub fn from_values<S: AsRef<str>>(values: &[S]) -> Self {
        let mut row = RawRow::default();
        for value in values {
            row.data.push_str(value.as_ref());
            row.ends.push(row.data.len());
        }
        row.field_start = row.data.len();
        row
    }

    pub fn clear(&mut self) {
        self.data.clear();
        self.ends.clear();
        self.field_start = 0;
        self.field_chars = 0;
    }

    /// Appends a character to the value in progress.
    pub fn push_char(&mut self, ch: char) -> Result<(), RowLimit> {
        if self.field_chars >= self.max_chars_per_column {
            return Err(RowLimit::FieldTooLong(self.max_chars_per_column));
        }
        self.data.push(ch);
        self.field_chars += 1;
        Ok(())
    }

    pub fn push_str(&mut self, text: &str) -> Result<(), RowLimit> {
        for ch in text.chars() {
            self.push_char(ch)?;
        }
        Ok(())
    }

    /// Completes the value in progress.
    pub fn end_field(&mut self) -> Result<(), RowLimit> {
        if self.ends.len() >= self.max_columns {
            return Err(RowLimit::TooManyColumns(self.max_columns));
        }
        self.ends.push(self.data.len());
        self.field_start = self.data.len();
        self.field_chars = 0;
        Ok(())
    }

    /// Characters accumulated by the value in progress.
    pub fn field_len(&self) -> usize {
        self.field_chars
    }

    /// Text accumulated by the value in progress.
    pub fn partial_field(&self) -> &str {
        &self.data[self.field_start..]
    }

    /// Removes trailing whitespace from the value in progress, leaving
    /// `keep` untouched. The first `floor` characters of the value (quoted or
    /// escaped content) are never removed.
    pub fn trim_field_end(&mut self, floor: usize, keep: impl Fn(char) -> bool) {
        while self.field_chars > floor {
            let Some(last) = self.data[self.field_start..].chars().next_back() else {
                break;
            };
            if !last.is_whitespace() || keep(last) {
                break;
            }
            self.data.pop();
            self.field_chars -= 1;
        }
    }

    pub fn len(&self) -> usize {
        self.ends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ends.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        let end = *self.ends.get(index)?;
        let start = if index == 0 { 0 } else { self.ends[index - 1] };
        Some(&self.data[start..end])
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        (0..self.len()).filter_map(move |index| self.get(index))
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.iter().map(str::to_string).collect()
    }

    /// Content of the row so far, completed fields and the value in
    /// progress, for error reports.
    pub fn content(&self) -> &str {
        &self.data
    }
}

/// A resolved record handed to row consumers.
///
/// Values borrow from the tokenizer's buffer when they were passed through
/// unchanged and are owned when a substitution replaced them. `None` means
/// the value is absent (or null) and no null substitution was configured.
#[derive(Debug, Clone, PartialEq)]
pub struct Row<'a> {
    headers: Option<Arc<[String]>>,
    values: Vec<Option<Cow<'a, str>>>,
}

impl<'a> Row<'a> {
    pub fn new(values: Vec<Option<Cow<'a, str>>>, headers: Option<Arc<[String]>>) -> Self {
        Self { headers, values }
    }

    /// Builds an owned row from plain strings.
    pub fn from_strs<S: AsRef<str>>(values: &[S]) -> Row<'static> {
        Row {
            headers: None,
            values: values
                .iter()
                .map(|value| Some(Cow::Owned(value.as_ref().to_string())))
                .collect(),
        }
    }

    pub fn with_headers(mut self, headers: Option<Arc<[String]>>) -> Self {
        self.headers = headers;
        self
    }

    /// Names of the columns of this row, in order, when known.
    pub fn headers(&self) -> Option<&[String]> {
        self.headers.as_deref()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.values.get(index)?.as_deref()
    }

    /// Looks a value up by column name (trimmed, case-insensitive).
    ///
    /// Names shared by several columns are not resolvable by name.
    pub fn get_by_name(&self, name: &str) -> Option<&str> {
        let headers = self.headers.as_deref()?;
        let index = index_of(headers, &normalize(name)).ok()??;
        self.get(index)
    }

    pub fn values(&self) -> &[Option<Cow<'a, str>>] {
        &self.values
    }

    pub fn iter(&self) -> impl Iterator<Item = Option<&str>> {
        self.values.iter().map(|value| value.as_deref())
    }

    pub fn as_strs(&self) -> Vec<Option<&str>> {
        self.iter().collect()
    }

    pub fn to_vec(&self) -> Vec<Option<String>> {
        self.iter().map(|value| value.map(str::to_string)).collect()
    }

    /// Detaches the row from the tokenizer's buffer.
    pub fn into_owned(self) -> Row<'static> {
        Row {
            headers: self.headers,
            values: self
                .values
                .into_iter()
                .map(|value| value.map(|text| Cow::Owned(text.into_owned())))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{borrow::Cow, sync::Arc};

    use super::{RawRow, Row, RowLimit};

    #[test]
    fn raw_row_addresses_values_in_a_shared_buffer() {
        let mut row = RawRow::default();
        row.push_str("23.4").unwrap();
        row.end_field().unwrap();
        row.end_field().unwrap();
        row.push_str("IBM").unwrap();
        row.end_field().unwrap();

        assert_eq!(row.len(), 3);
        assert_eq!(row.to_vec(), vec!["23.4", "", "IBM"]);
        assert_eq!(row.get(3), None);
        assert_eq!(row.content(), "23.4IBM");
    }

    #[test]
    fn raw_row_enforces_limits() {
        let mut row = RawRow::with_limits(2, 3);
        assert_eq!(row.push_str("abcd"), Err(RowLimit::FieldTooLong(3)));
        assert_eq!(row.field_len(), 3);

        row.end_field().unwrap();
        row.end_field().unwrap();
        assert_eq!(row.end_field(), Err(RowLimit::TooManyColumns(2)));
    }

    #[test]
    fn trailing_whitespace_is_trimmed_from_the_value_in_progress() {
        let mut row = RawRow::from_values(&["  kept  "]);
        row.push_str("value \t ").unwrap();
        row.trim_field_end(0, |ch| ch == '\t');
        assert_eq!(row.partial_field(), "value \t");

        row.trim_field_end(0, |_| false);
        assert_eq!(row.partial_field(), "value");
        row.end_field().unwrap();
        assert_eq!(row.to_vec(), vec!["  kept  ", "value"]);
    }

    #[test]
    fn trimming_stops_at_the_floor() {
        let mut row = RawRow::default();
        row.push_str("a  ").unwrap();
        row.trim_field_end(2, |_| false);
        assert_eq!(row.partial_field(), "a ");
    }

    #[test]
    fn row_values_can_be_found_by_header_name() {
        let headers: Arc<[String]> = vec!["Symbol".to_string(), "ID".to_string()].into();
        let row = Row::new(
            vec![Some(Cow::Borrowed("IBM")), None],
            Some(headers),
        );

        assert_eq!(row.get_by_name(" symbol "), Some("IBM"));
        assert_eq!(row.get_by_name("id"), None);
        assert_eq!(row.get_by_name("missing"), None);
        assert_eq!(row.as_strs(), vec![Some("IBM"), None]);
    }

    #[test]
    fn duplicate_header_names_are_not_resolvable_by_name() {
        let headers: Arc<[String]> = vec!["a".to_string(), "A".to_string()].into();
        let row = Row::from_strs(&["1", "2"]).with_headers(Some(headers));
        assert_eq!(row.get_by_name("a"), None);
        assert_eq!(row.get(1), Some("2"));
    }

    #[test]
    fn owned_rows_outlive_the_buffer() {
        let owned = {
            let raw = RawRow::from_values(&["x", "y"]);
            let row = Row::new(raw.iter().map(|v| Some(Cow::Borrowed(v))).collect(), None);
            row.into_owned()
        };
        assert_eq!(owned.to_vec(), vec![Some("x".to_string()), Some("y".to_string())]);
    }
}
