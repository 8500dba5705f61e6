/// Fixed-width columns.
///
/// Every column has a fixed number of characters, an alignment and an
/// optional padding character of its own. There is no quoting or escaping:
/// values are padded to their column on write and stripped of their padding
/// on read.
///
/// ```
/// use rowscan::item::fixed_width::{Alignment, FixedWidthFields, FixedWidthParserBuilder};
///
/// let fields = FixedWidthFields::new()
///     .field("symbol", 6)
///     .aligned("quantity", 8, Alignment::Right);
///
/// let text = "IBM       23.4\nMSFT        10\n";
/// let mut parser = FixedWidthParserBuilder::new()
///     .fields(fields)
///     .from_reader(text.as_bytes())
///     .unwrap();
///
/// let rows = parser.parse_all().unwrap();
/// assert_eq!(rows[0].get_by_name("quantity"), Some("23.4"));
/// assert_eq!(rows[1].get(0), Some("MSFT"));
/// ```
pub mod fixed_width_reader;
pub mod fixed_width_writer;

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

use self::{fixed_width_reader::FixedWidthTokenizer, fixed_width_writer::FixedWidthEscaper};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Alignment {
    #[default]
    Left,
    Right,
    Center,
}

/// One column of a fixed-width layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixedWidthField {
    pub name: Option<String>,
    pub length: usize,
    #[serde(default)]
    pub alignment: Alignment,
    /// Overrides the format's padding character for this column.
    #[serde(default)]
    pub padding: Option<char>,
}

/// Ordered column layout.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FixedWidthFields {
    fields: Vec<FixedWidthField>,
}

impl FixedWidthFields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unnamed, left-aligned columns of the given lengths.
    pub fn from_lengths(lengths: &[usize]) -> Self {
        Self {
            fields: lengths
                .iter()
                .map(|length| FixedWidthField {
                    name: None,
                    length: *length,
                    alignment: Alignment::Left,
                    padding: None,
                })
                .collect(),
        }
    }

    pub fn field(self, name: &str, length: usize) -> Self {
        self.aligned(name, length, Alignment::Left)
    }

    pub fn aligned(mut self, name: &str, length: usize, alignment: Alignment) -> Self {
        self.fields.push(FixedWidthField {
            name: Some(name.to_string()),
            length,
            alignment,
            padding: None,
        });
        self
    }

    /// Sets the padding character of the last column.
    pub fn padded_with(mut self, padding: char) -> Self {
        if let Some(field) = self.fields.last_mut() {
            field.padding = Some(padding);
        }
        self
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FixedWidthField> {
        self.fields.iter()
    }

    pub fn total_width(&self) -> usize {
        self.fields.iter().map(|field| field.length).sum()
    }

    /// Column names, when every column has one.
    pub fn names(&self) -> Option<Vec<String>> {
        if self.fields.is_empty() {
            return None;
        }
        self.fields.iter().map(|field| field.name.clone()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FixedWidthFormat {
    #[serde(flatten)]
    pub common: CommonFormat,
    pub padding: char,
    pub fields: FixedWidthFields,
    /// Rows ending before the last column are completed with empty values
    /// instead of being rejected.
    pub allow_short_rows: bool,
    /// Characters past the last column are ignored instead of being
    /// rejected.
    pub allow_long_rows: bool,
    /// Keep the padding characters in parsed values.
    pub keep_padding: bool,
}

impl Default for FixedWidthFormat {
    fn default() -> Self {
        Self {
            common: CommonFormat::default(),
            padding: ' ',
            fields: FixedWidthFields::default(),
            allow_short_rows: true,
            allow_long_rows: false,
            keep_padding: false,
        }
    }
}

impl Format for FixedWidthFormat {
    type Tokenizer = FixedWidthTokenizer;
    type Escaper = FixedWidthEscaper;

    fn name(&self) -> &'static str {
        "fixed-width"
    }

    fn common(&self) -> &CommonFormat {
        &self.common
    }

    fn common_mut(&mut self) -> &mut CommonFormat {
        &mut self.common
    }

    fn validate(&self) -> TextResult<()> {
        self.common.validate()?;
        if self.fields.is_empty() {
            return Err(TextError::Configuration(
                "Fixed-width format needs at least one field".to_string(),
            ));
        }
        for (index, field) in self.fields.iter().enumerate() {
            if field.length == 0 {
                return Err(TextError::Configuration(format!(
                    "Length of field {} must be greater than zero",
                    index
                )));
            }
            let padding = field.padding.unwrap_or(self.padding);
            if padding == '\n' || padding == '\r' {
                return Err(TextError::Configuration(format!(
                    "Padding of field {} cannot be a line ending",
                    index
                )));
            }
        }
        Ok(())
    }

    fn tokenizer(&self, settings: &ParserSettings<Self>) -> FixedWidthTokenizer {
        FixedWidthTokenizer::new(self, settings)
    }

    fn escaper(&self, _settings: &WriterSettings<Self>) -> FixedWidthEscaper {
        FixedWidthEscaper::new(self)
    }

    fn declared_headers(&self) -> Option<Vec<String>> {
        self.fields.names()
    }
}

pub type FixedWidthParser<R> = Parser<FixedWidthFormat, R>;
pub type FixedWidthWriter<W> = TextWriter<FixedWidthFormat, W>;
pub type FixedWidthParserBuilder = ParserBuilder<FixedWidthFormat>;
pub type FixedWidthWriterBuilder = WriterBuilder<FixedWidthFormat>;

impl ParserBuilder<FixedWidthFormat> {
    pub fn fields(mut self, fields: FixedWidthFields) -> Self {
        self.settings.format.fields = fields;
        self
    }

    pub fn padding(mut self, padding: char) -> Self {
        self.settings.format.padding = padding;
        self
    }

    pub fn allow_short_rows(mut self, yes: bool) -> Self {
        self.settings.format.allow_short_rows = yes;
        self
    }

    pub fn allow_long_rows(mut self, yes: bool) -> Self {
        self.settings.format.allow_long_rows = yes;
        self
    }

    pub fn keep_padding(mut self, yes: bool) -> Self {
        self.settings.format.keep_padding = yes;
        self
    }
}

impl WriterBuilder<FixedWidthFormat> {
    pub fn fields(mut self, fields: FixedWidthFields) -> Self {
        self.settings.format.fields = fields;
        self
    }

    pub fn padding(mut self, padding: char) -> Self {
        self.settings.format.padding = padding;
        self
    }
}

#[cfg(test)]
mod tests {
    use crate::core::format::Format;

    use super::{Alignment, FixedWidthFields, FixedWidthFormat};

    #[test]
    fn names_are_declared_only_when_every_field_has_one() {
        let fields = FixedWidthFields::new().field("a", 2).aligned("b", 3, Alignment::Right);
        assert_eq!(fields.names(), Some(vec!["a".to_string(), "b".to_string()]));
        assert_eq!(fields.total_width(), 5);
        assert_eq!(FixedWidthFields::from_lengths(&[1, 2]).names(), None);
    }

    #[test]
    fn fields_must_be_declared_with_positive_lengths() {
        assert!(FixedWidthFormat::default().validate().is_err());

        let format = FixedWidthFormat {
            fields: FixedWidthFields::from_lengths(&[3, 0]),
            ..FixedWidthFormat::default()
        };
        assert!(format.validate().is_err());

        let format = FixedWidthFormat {
            fields: FixedWidthFields::from_lengths(&[3, 1]),
            ..FixedWidthFormat::default()
        };
        assert!(format.validate().is_ok());
    }

    #[test]
    fn layout_loads_from_json() {
        let format: FixedWidthFormat = serde_json::from_str(
            r#"{
                "padding": "_",
                "fields": [
                    { "name": "id", "length": 4, "alignment": "right", "padding": "0" },
                    { "name": "name", "length": 10 }
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(format.padding, '_');
        assert_eq!(format.fields.total_width(), 14);
        assert_eq!(format.declared_headers(), Some(vec!["id".to_string(), "name".to_string()]));
    }
}
