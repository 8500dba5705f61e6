use std::{fmt::Display, str::FromStr};

use crate::error::{TextError, TextResult};

use super::{
    row::Row,
    selection::{index_of, normalize},
};

/// Describes how records of type `T` map to rows.
///
/// Parsers and writers only call a provider through this trait; they never
/// inspect the record type themselves.
pub trait SchemaProvider<T> {
    /// Field names in column order.
    fn headers(&self) -> Option<Vec<String>>;

    /// Whether the record type asks for its headers to be written.
    fn header_writing(&self) -> Option<bool> {
        None
    }

    fn read_record(&self, row: &Row<'_>) -> TextResult<T>;

    fn write_record(&self, record: &T) -> TextResult<Vec<Option<String>>>;
}

type ParseFn<T> = Box<dyn Fn(&mut T, &str) -> Result<(), String> + Send + Sync>;
type FormatFn<T> = Box<dyn Fn(&T) -> Option<String> + Send + Sync>;

struct FieldMapping<T> {
    name: String,
    parse: ParseFn<T>,
    format: FormatFn<T>,
    default: Option<String>,
}

/// A [`SchemaProvider`] assembled from explicit field mappings.
///
/// ```
/// use rowscan::core::schema::{RecordSchema, SchemaProvider};
///
/// #[derive(Default)]
/// struct Quote {
///     symbol: String,
///     quantity: f64,
/// }
///
/// let schema = RecordSchema::<Quote>::new()
///     .parsed("quantity", |q, v| q.quantity = v, |q| q.quantity)
///     .field(
///         "symbol",
///         |q, v| {
///             q.symbol = v.to_string();
///             Ok(())
///         },
///         |q| Some(q.symbol.clone()),
///     );
///
/// let quote = Quote { symbol: "IBM".to_string(), quantity: 23.4 };
/// assert_eq!(
///     schema.write_record(&quote).unwrap(),
///     vec![Some("23.4".to_string()), Some("IBM".to_string())]
/// );
/// ```
pub struct RecordSchema<T> {
    fields: Vec<FieldMapping<T>>,
    header_writing: Option<bool>,
}

impl<T> Default for RecordSchema<T> {
    fn default() -> Self {
        Self {
            fields: Vec::new(),
            header_writing: None,
        }
    }
}

impl<T: Default> RecordSchema<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps a column with explicit conversions.
    pub fn field(
        mut self,
        name: &str,
        parse: impl Fn(&mut T, &str) -> Result<(), String> + Send + Sync + 'static,
        format: impl Fn(&T) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        self.fields.push(FieldMapping {
            name: name.to_string(),
            parse: Box::new(parse),
            format: Box::new(format),
            default: None,
        });
        self
    }

    /// Maps a column holding any value that parses with [`FromStr`] and
    /// prints with [`Display`].
    pub fn parsed<V>(
        self,
        name: &str,
        set: impl Fn(&mut T, V) + Send + Sync + 'static,
        get: impl Fn(&T) -> V + Send + Sync + 'static,
    ) -> Self
    where
        V: FromStr + Display,
        V::Err: Display,
    {
        self.field(
            name,
            move |record, text| {
                let value = text
                    .trim()
                    .parse::<V>()
                    .map_err(|err| format!("cannot parse {:?}: {}", text, err))?;
                set(record, value);
                Ok(())
            },
            move |record| Some(get(record).to_string()),
        )
    }

    /// Text parsed in place of an absent or empty value for the last mapped
    /// field.
    pub fn default_value(mut self, text: &str) -> Self {
        if let Some(field) = self.fields.last_mut() {
            field.default = Some(text.to_string());
        }
        self
    }

    pub fn write_headers(mut self, yes: bool) -> Self {
        self.header_writing = Some(yes);
        self
    }

    pub fn names(&self) -> Vec<&str> {
        self.fields.iter().map(|field| field.name.as_str()).collect()
    }
}

impl<T: Default> SchemaProvider<T> for RecordSchema<T> {
    fn headers(&self) -> Option<Vec<String>> {
        if self.fields.is_empty() {
            None
        } else {
            Some(self.fields.iter().map(|field| field.name.clone()).collect())
        }
    }

    fn header_writing(&self) -> Option<bool> {
        self.header_writing
    }

    fn read_record(&self, row: &Row<'_>) -> TextResult<T> {
        let mut record = T::default();

        for (position, field) in self.fields.iter().enumerate() {
            let column = match row.headers() {
                Some(headers) => match index_of(headers, &normalize(&field.name)) {
                    Ok(found) => found,
                    Err(_) => {
                        return Err(TextError::conversion(
                            position,
                            format!("field {:?} matches several columns", field.name),
                        ));
                    }
                },
                None => Some(position),
            };

            let value = column
                .and_then(|index| row.get(index))
                .filter(|value| !value.is_empty())
                .or(field.default.as_deref());

            if let Some(value) = value {
                (field.parse)(&mut record, value).map_err(|message| {
                    TextError::conversion(
                        column.unwrap_or(position),
                        format!("{}: {}", field.name, message),
                    )
                })?;
            }
        }
        Ok(record)
    }

    fn write_record(&self, record: &T) -> TextResult<Vec<Option<String>>> {
        Ok(self
            .fields
            .iter()
            .map(|field| (field.format)(record))
            .collect())
    }
}
