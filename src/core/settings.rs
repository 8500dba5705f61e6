use std::sync::Arc;

use log::debug;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::error::{TextError, TextResult};

use super::{
    format::Format,
    input::DEFAULT_INPUT_BUFFER_SIZE,
    output::DEFAULT_OUTPUT_BUFFER_SIZE,
    schema::SchemaProvider,
    selection::{FieldSelection, SelectionMask},
};

pub const DEFAULT_MAX_CHARS_PER_COLUMN: usize = 4096;
pub const DEFAULT_MAX_COLUMNS: usize = 512;

/// Behaviour of a parsing session.
///
/// Settings are assembled (by hand, by a builder or from JSON), then frozen
/// with [`freeze`](ParserSettings::freeze) into a validated snapshot shared
/// by every session using it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(
    default,
    bound(
        serialize = "F: Serialize",
        deserialize = "F: Deserialize<'de> + Default"
    )
)]
pub struct ParserSettings<F> {
    pub format: F,
    /// Header names, overriding the ones extracted from the input.
    pub headers: Option<Vec<String>>,
    /// Treat the first row (after `rows_to_skip`) as the header row.
    pub header_extraction: bool,
    pub selection: Option<FieldSelection>,
    /// When disabled, unselected columns stay in place as nulls.
    pub column_reordering: bool,
    pub ignore_leading_whitespace: bool,
    pub ignore_trailing_whitespace: bool,
    /// Replacement for empty values. `None` keeps them empty.
    pub empty_value: Option<String>,
    /// Replacement for absent values. `None` keeps them absent.
    pub null_value: Option<String>,
    pub max_chars_per_column: usize,
    pub max_columns: usize,
    pub skip_empty_lines: bool,
    pub comment_processing: bool,
    /// Rows discarded before the header row and the data.
    pub rows_to_skip: u64,
    /// Maximum number of records to deliver.
    pub record_limit: Option<u64>,
    pub line_separator_detection: bool,
    /// Number of recoverable errors a session survives.
    pub error_tolerance: usize,
    pub input_buffer_size: usize,
}

impl<F: Default> Default for ParserSettings<F> {
    fn default() -> Self {
        Self {
            format: F::default(),
            headers: None,
            header_extraction: false,
            selection: None,
            column_reordering: true,
            ignore_leading_whitespace: true,
            ignore_trailing_whitespace: true,
            empty_value: None,
            null_value: None,
            max_chars_per_column: DEFAULT_MAX_CHARS_PER_COLUMN,
            max_columns: DEFAULT_MAX_COLUMNS,
            skip_empty_lines: true,
            comment_processing: true,
            rows_to_skip: 0,
            record_limit: None,
            line_separator_detection: false,
            error_tolerance: 0,
            input_buffer_size: DEFAULT_INPUT_BUFFER_SIZE,
        }
    }
}

impl<F: Format> ParserSettings<F> {
    pub fn from_json(json: &str) -> TextResult<Self>
    where
        F: DeserializeOwned + Default,
    {
        serde_json::from_str(json)
            .map_err(|err| TextError::Configuration(format!("Invalid parser settings: {}", err)))
    }

    /// Fills the headers from a schema provider when neither explicit nor
    /// extracted headers are configured.
    pub fn configure_from<T, S: SchemaProvider<T> + ?Sized>(mut self, schema: &S) -> Self {
        if self.headers.is_none() && !self.header_extraction {
            self.headers = schema.headers();
        }
        self
    }

    /// Headers known before reading any input.
    pub fn known_headers(&self) -> Option<Vec<String>> {
        self.headers
            .clone()
            .or_else(|| self.format.declared_headers())
    }

    /// Validates the settings and turns them into an immutable snapshot.
    pub fn freeze(self) -> TextResult<Arc<Self>> {
        self.format.validate()?;
        check_positive("max_chars_per_column", self.max_chars_per_column)?;
        check_positive("max_columns", self.max_columns)?;
        check_positive("input_buffer_size", self.input_buffer_size)?;
        check_headers(self.headers.as_deref())?;

        if let Some(selection) = &self.selection {
            selection.validate()?;
            let known = self.known_headers();
            if selection.is_by_name() && known.is_none() && !self.header_extraction {
                return Err(TextError::Configuration(
                    "Fields selected by name require headers: provide them or enable header extraction"
                        .to_string(),
                ));
            }
            if selection.is_by_name() {
                if let Some(headers) = known.as_deref() {
                    SelectionMask::resolve(selection, Some(headers), 0, self.column_reordering)?;
                }
            }
        }

        debug!("Parser settings frozen for format {}", self.format.name());
        Ok(Arc::new(self))
    }
}

/// Behaviour of a writing session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(
    default,
    bound(
        serialize = "F: Serialize",
        deserialize = "F: Deserialize<'de> + Default"
    )
)]
pub struct WriterSettings<F> {
    pub format: F,
    pub headers: Option<Vec<String>>,
    /// Write the headers automatically before the first row. Unset means
    /// disabled unless a schema provider asks for it.
    pub header_writing_enabled: Option<bool>,
    pub selection: Option<FieldSelection>,
    pub column_reordering: bool,
    /// Written in place of empty values.
    pub empty_value: Option<String>,
    /// Written in place of nulls.
    pub null_value: Option<String>,
    /// Trim values before writing them.
    pub trim_values: bool,
    /// Rows without any non-null value are not written.
    pub skip_empty_rows: bool,
    pub output_buffer_size: usize,
}

impl<F: Default> Default for WriterSettings<F> {
    fn default() -> Self {
        Self {
            format: F::default(),
            headers: None,
            header_writing_enabled: None,
            selection: None,
            column_reordering: true,
            empty_value: None,
            null_value: None,
            trim_values: false,
            skip_empty_rows: true,
            output_buffer_size: DEFAULT_OUTPUT_BUFFER_SIZE,
        }
    }
}

impl<F: Format> WriterSettings<F> {
    pub fn from_json(json: &str) -> TextResult<Self>
    where
        F: DeserializeOwned + Default,
    {
        serde_json::from_str(json)
            .map_err(|err| TextError::Configuration(format!("Invalid writer settings: {}", err)))
    }

    /// Fills unset headers and header writing flag from a schema provider.
    pub fn configure_from<T, S: SchemaProvider<T> + ?Sized>(mut self, schema: &S) -> Self {
        if self.headers.is_none() {
            self.headers = schema.headers();
        }
        if self.header_writing_enabled.is_none() {
            self.header_writing_enabled = schema.header_writing();
        }
        self
    }

    pub fn known_headers(&self) -> Option<Vec<String>> {
        self.headers
            .clone()
            .or_else(|| self.format.declared_headers())
    }

    pub fn writes_headers(&self) -> bool {
        self.header_writing_enabled.unwrap_or(false)
    }

    pub fn freeze(mut self) -> TextResult<Arc<Self>> {
        self.format.validate()?;
        check_positive("output_buffer_size", self.output_buffer_size)?;
        check_headers(self.headers.as_deref())?;

        if let Some(selection) = &self.selection {
            selection.validate()?;
            if selection.is_by_name() {
                let Some(headers) = self.known_headers() else {
                    return Err(TextError::Configuration(
                        "Fields selected by name require headers".to_string(),
                    ));
                };
                SelectionMask::resolve(selection, Some(&headers), 0, self.column_reordering)?;
            }
        }

        self.header_writing_enabled = Some(self.writes_headers());
        debug!("Writer settings frozen for format {}", self.format.name());
        Ok(Arc::new(self))
    }
}

fn check_positive(name: &str, value: usize) -> TextResult<()> {
    if value == 0 {
        return Err(TextError::Configuration(format!(
            "{} must be greater than zero",
            name
        )));
    }
    Ok(())
}

fn check_headers(headers: Option<&[String]>) -> TextResult<()> {
    match headers {
        Some([]) => Err(TextError::Configuration(
            "Headers cannot be empty".to_string(),
        )),
        _ => Ok(()),
    }
}

#[cfg(all(test, feature = "csv"))]
mod tests {
    use crate::{
        core::{
            schema::RecordSchema,
            selection::FieldSelection,
        },
        error::TextError,
        item::csv::CsvFormat,
    };

    use super::{ParserSettings, WriterSettings};

    #[derive(Default)]
    struct Quote {
        symbol: String,
    }

    #[test]
    fn selection_by_name_needs_headers() {
        let settings = ParserSettings::<CsvFormat> {
            selection: Some(FieldSelection::IncludeNames(vec!["symbol".to_string()])),
            ..ParserSettings::default()
        };
        assert!(matches!(settings.freeze(), Err(TextError::Configuration(_))));

        let settings = ParserSettings::<CsvFormat> {
            selection: Some(FieldSelection::IncludeNames(vec!["symbol".to_string()])),
            header_extraction: true,
            ..ParserSettings::default()
        };
        assert!(settings.freeze().is_ok());
    }

    #[test]
    fn unknown_names_fail_before_any_row_is_read() {
        let settings = ParserSettings::<CsvFormat> {
            headers: Some(vec!["quantity".to_string(), "symbol".to_string()]),
            selection: Some(FieldSelection::IncludeNames(vec!["price".to_string()])),
            ..ParserSettings::default()
        };
        assert!(matches!(settings.freeze(), Err(TextError::Configuration(_))));
    }

    #[test]
    fn limits_must_be_positive() {
        let settings = ParserSettings::<CsvFormat> {
            max_columns: 0,
            ..ParserSettings::default()
        };
        assert!(settings.freeze().is_err());
    }

    #[test]
    fn settings_load_from_json() {
        let settings = ParserSettings::<CsvFormat>::from_json(
            r#"{
                "format": { "delimiter": ";" },
                "header_extraction": true,
                "selection": { "include_indexes": [2, 0] },
                "error_tolerance": 2
            }"#,
        )
        .unwrap()
        .freeze()
        .unwrap();

        assert_eq!(settings.format.delimiter, ";");
        assert!(settings.header_extraction);
        assert_eq!(settings.error_tolerance, 2);
        assert_eq!(
            settings.selection,
            Some(FieldSelection::IncludeIndexes(vec![2, 0]))
        );
        assert_eq!(settings.max_columns, super::DEFAULT_MAX_COLUMNS);
    }

    #[test]
    fn invalid_json_is_a_configuration_error() {
        let result = WriterSettings::<CsvFormat>::from_json("{ \"trim_values\": 3 }");
        assert!(matches!(result, Err(TextError::Configuration(_))));
    }

    #[test]
    fn schema_fills_unset_writer_settings_only() {
        let schema = RecordSchema::<Quote>::new()
            .field("symbol", |q: &mut Quote, v: &str| { q.symbol = v.to_string(); Ok(()) }, |q: &Quote| Some(q.symbol.clone()))
            .write_headers(true);

        let settings = WriterSettings::<CsvFormat>::default()
            .configure_from(&schema)
            .freeze()
            .unwrap();
        assert_eq!(settings.headers, Some(vec!["symbol".to_string()]));
        assert_eq!(settings.header_writing_enabled, Some(true));

        let settings = WriterSettings::<CsvFormat> {
            header_writing_enabled: Some(false),
            ..WriterSettings::default()
        }
        .configure_from(&schema)
        .freeze()
        .unwrap();
        assert!(!settings.writes_headers());
    }

    #[test]
    fn unset_header_writing_freezes_to_disabled() {
        let settings = WriterSettings::<CsvFormat>::default().freeze().unwrap();
        assert_eq!(settings.header_writing_enabled, Some(false));
    }
}
