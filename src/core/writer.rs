use std::{
    borrow::Cow,
    fs::File,
    io::Write,
    path::Path,
    sync::Arc,
};

use log::{debug, info};
use uuid::Uuid;

use crate::error::{TextError, TextResult};

use super::{
    format::{Format, LineSeparator},
    item::{RowEscaper, RowProducer},
    output::CharOutput,
    schema::SchemaProvider,
    selection::{FieldSelection, SelectionMask},
    settings::WriterSettings,
};

/// A writing session over one output.
///
/// Values go through the inverse field selection, the empty and null
/// substitutions and the format's escaper before reaching the output. Headers
/// are written exactly once: automatically before the first row when header
/// writing is enabled, or explicitly with
/// [`write_headers`](TextWriter::write_headers) otherwise.
pub struct TextWriter<F: Format, W: Write> {
    settings: Arc<WriterSettings<F>>,
    output: CharOutput<W>,
    escaper: F::Escaper,
    headers: Option<Arc<[String]>>,
    mask: Option<SelectionMask>,
    headers_written: bool,
    record_count: u64,
    session_id: Uuid,
}

impl<F: Format, W: Write> TextWriter<F, W> {
    pub fn new(settings: Arc<WriterSettings<F>>, wtr: W) -> TextResult<Self> {
        let separator = settings.format.common().line_separator.for_writing().to_string();
        let output = CharOutput::new(wtr, separator, settings.output_buffer_size);
        let escaper = settings.format.escaper(&settings);
        let headers = settings.known_headers().map(Arc::from);

        let mut writer = Self {
            settings,
            output,
            escaper,
            headers,
            mask: None,
            headers_written: false,
            record_count: 0,
            session_id: Uuid::new_v4(),
        };
        writer.resolve_mask_from_headers()?;

        info!(
            "Start of {} writing session {}",
            writer.settings.format.name(),
            writer.session_id
        );
        Ok(writer)
    }

    pub fn settings(&self) -> &WriterSettings<F> {
        &self.settings
    }

    pub fn headers(&self) -> Option<&[String]> {
        self.headers.as_deref()
    }

    /// Replaces the headers. Only allowed before anything was written.
    pub fn set_headers<S: AsRef<str>>(&mut self, headers: &[S]) -> TextResult<()> {
        if self.headers_written || self.record_count > 0 {
            return Err(TextError::TextWriting(
                "Headers cannot be changed once writing has started".to_string(),
            ));
        }
        if headers.is_empty() {
            return Err(TextError::TextWriting("Headers cannot be empty".to_string()));
        }
        let names: Vec<String> = headers.iter().map(|h| h.as_ref().to_string()).collect();
        self.headers = Some(Arc::from(names));
        self.mask = None;
        self.resolve_mask_from_headers()
    }

    /// Writes the header row explicitly.
    ///
    /// Fails when header writing is automatic, when the headers were already
    /// written, after the first record or when no header is defined.
    pub fn write_headers(&mut self) -> TextResult<()> {
        if self.settings.writes_headers() {
            return Err(TextError::TextWriting(
                "Headers are written automatically and cannot be written explicitly".to_string(),
            ));
        }
        self.write_header_row()
    }

    pub fn write_row(&mut self, values: &[Option<&str>]) -> TextResult<()> {
        self.write_pending_headers()?;

        if self.settings.skip_empty_rows && values.iter().all(Option::is_none) {
            debug!("Skipping empty row in session {}", self.session_id);
            return Ok(());
        }

        if self.mask.is_none() {
            self.resolve_mask_from_row(values.len())?;
        }
        let placed = match &self.mask {
            Some(mask) => mask.scatter(values)?,
            None => values.to_vec(),
        };
        let prepared = prepare(&placed, &self.settings);
        let refs: Vec<Option<&str>> = prepared.iter().map(|value| value.as_deref()).collect();

        if let Err(err) = self.escaper.escape_row(&refs, self.output.row_mut()) {
            self.output.discard_row();
            return Err(err);
        }
        self.output.commit_row()?;
        self.record_count += 1;
        Ok(())
    }

    /// Writes a row where every value is present.
    pub fn write_values<S: AsRef<str>>(&mut self, values: &[S]) -> TextResult<()> {
        let values: Vec<Option<&str>> = values.iter().map(|value| Some(value.as_ref())).collect();
        self.write_row(&values)
    }

    /// Converts `record` through `schema` and writes it.
    pub fn write_record<T, S: SchemaProvider<T> + ?Sized>(
        &mut self,
        schema: &S,
        record: &T,
    ) -> TextResult<()> {
        if self.headers.is_none() && self.record_count == 0 && !self.headers_written {
            if let Some(headers) = schema.headers() {
                self.set_headers(&headers)?;
            }
        }
        let values = schema.write_record(record)?;
        let refs: Vec<Option<&str>> = values.iter().map(|value| value.as_deref()).collect();
        self.write_row(&refs)
    }

    /// Writes every row supplied by `producer`, returning how many were
    /// handed to the writer.
    pub fn write_rows(&mut self, producer: &mut dyn RowProducer) -> TextResult<u64> {
        if self.headers.is_none() && self.record_count == 0 && !self.headers_written {
            if let Some(headers) = producer.headers() {
                self.set_headers(&headers)?;
            }
        }

        let mut count = 0;
        while let Some(values) = producer.next_row()? {
            let refs: Vec<Option<&str>> = values.iter().map(|value| value.as_deref()).collect();
            self.write_row(&refs)?;
            count += 1;
        }
        Ok(count)
    }

    /// Writes a comment line, prefixed with the format's comment character.
    pub fn comment_row(&mut self, text: &str) -> TextResult<()> {
        let Some(comment) = self.settings.format.common().comment else {
            return Err(TextError::TextWriting(
                "Comments are disabled for this format".to_string(),
            ));
        };
        if text.contains(['\n', '\r']) {
            return Err(TextError::TextWriting(
                "Comments cannot span several lines".to_string(),
            ));
        }
        self.output.append_char(comment);
        self.output.append(text);
        self.output.commit_row()?;
        Ok(())
    }

    /// Number of data rows written (headers and comments excluded).
    pub fn record_count(&self) -> u64 {
        self.record_count
    }

    pub fn lines_written(&self) -> u64 {
        self.output.lines_written()
    }

    pub fn flush(&mut self) -> TextResult<()> {
        self.output.flush()?;
        Ok(())
    }

    /// Writes pending automatic headers, flushes and returns the output.
    pub fn finish(mut self) -> TextResult<W> {
        self.write_pending_headers()?;
        info!(
            "End of writing session {}: {} records, {} lines",
            self.session_id,
            self.record_count,
            self.output.lines_written()
        );
        Ok(self.output.into_inner()?)
    }

    fn write_pending_headers(&mut self) -> TextResult<()> {
        if self.settings.writes_headers() && !self.headers_written && self.headers.is_some() {
            self.write_header_row()?;
        }
        Ok(())
    }

    fn write_header_row(&mut self) -> TextResult<()> {
        if self.headers_written {
            return Err(TextError::TextWriting(
                "Headers have already been written".to_string(),
            ));
        }
        if self.record_count > 0 {
            return Err(TextError::TextWriting(
                "Headers cannot be written after records".to_string(),
            ));
        }
        let Some(headers) = self.headers.clone() else {
            return Err(TextError::TextWriting(
                "Cannot write headers: no headers defined".to_string(),
            ));
        };

        let names: Vec<Option<&str>> = headers.iter().map(|h| Some(h.as_str())).collect();
        if let Err(err) = self.escaper.escape_row(&names, self.output.row_mut()) {
            self.output.discard_row();
            return Err(err);
        }
        self.output.commit_row()?;
        self.headers_written = true;
        debug!("Headers written in session {}: {:?}", self.session_id, headers);
        Ok(())
    }

    fn resolve_mask_from_headers(&mut self) -> TextResult<()> {
        if let (Some(selection), Some(headers)) = (&self.settings.selection, &self.headers) {
            let mask =
                SelectionMask::resolve(selection, Some(headers), 0, self.settings.column_reordering)?;
            self.mask = Some(mask);
        }
        Ok(())
    }

    fn resolve_mask_from_row(&mut self, values: usize) -> TextResult<()> {
        let Some(selection) = &self.settings.selection else {
            return Ok(());
        };
        let width = match selection {
            FieldSelection::IncludeIndexes(indexes) => {
                indexes.iter().max().map_or(0, |max| max + 1)
            }
            FieldSelection::ExcludeIndexes(indexes) => values + indexes.len(),
            _ => values,
        };
        let mask = SelectionMask::resolve(selection, None, width, self.settings.column_reordering)?;
        self.mask = Some(mask);
        Ok(())
    }
}

fn prepare<'v, F>(values: &[Option<&'v str>], settings: &'v WriterSettings<F>) -> Vec<Option<Cow<'v, str>>> {
    values
        .iter()
        .map(|value| match value {
            None => settings.null_value.as_deref().map(Cow::Borrowed),
            Some(value) => {
                let value = if settings.trim_values { value.trim() } else { value };
                if value.is_empty() {
                    Some(Cow::Borrowed(settings.empty_value.as_deref().unwrap_or("")))
                } else {
                    Some(Cow::Borrowed(value))
                }
            }
        })
        .collect()
}

/// Fluent assembly of writer settings, shared by every format.
pub struct WriterBuilder<F: Format> {
    pub(crate) settings: WriterSettings<F>,
}

impl<F: Format + Default> Default for WriterBuilder<F> {
    fn default() -> Self {
        Self::from_settings(WriterSettings::default())
    }
}

impl<F: Format + Default> WriterBuilder<F> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<F: Format> WriterBuilder<F> {
    pub fn from_settings(settings: WriterSettings<F>) -> Self {
        Self { settings }
    }

    pub fn format(mut self, format: F) -> Self {
        self.settings.format = format;
        self
    }

    pub fn headers(mut self, headers: &[&str]) -> Self {
        self.settings.headers = Some(headers.iter().map(|h| h.to_string()).collect());
        self
    }

    /// Writes the headers automatically before the first row.
    pub fn has_headers(mut self, yes: bool) -> Self {
        self.settings.header_writing_enabled = Some(yes);
        self
    }

    pub fn select_fields(mut self, names: &[&str]) -> Self {
        self.settings.selection = Some(FieldSelection::IncludeNames(
            names.iter().map(|n| n.to_string()).collect(),
        ));
        self
    }

    pub fn select_indexes(mut self, indexes: &[usize]) -> Self {
        self.settings.selection = Some(FieldSelection::IncludeIndexes(indexes.to_vec()));
        self
    }

    pub fn exclude_fields(mut self, names: &[&str]) -> Self {
        self.settings.selection = Some(FieldSelection::ExcludeNames(
            names.iter().map(|n| n.to_string()).collect(),
        ));
        self
    }

    pub fn exclude_indexes(mut self, indexes: &[usize]) -> Self {
        self.settings.selection = Some(FieldSelection::ExcludeIndexes(indexes.to_vec()));
        self
    }

    pub fn column_reordering(mut self, yes: bool) -> Self {
        self.settings.column_reordering = yes;
        self
    }

    pub fn empty_value(mut self, value: &str) -> Self {
        self.settings.empty_value = Some(value.to_string());
        self
    }

    pub fn null_value(mut self, value: &str) -> Self {
        self.settings.null_value = Some(value.to_string());
        self
    }

    pub fn trim_values(mut self, yes: bool) -> Self {
        self.settings.trim_values = yes;
        self
    }

    pub fn skip_empty_rows(mut self, yes: bool) -> Self {
        self.settings.skip_empty_rows = yes;
        self
    }

    pub fn line_separator(mut self, separator: &str) -> Self {
        self.settings.format.common_mut().line_separator =
            LineSeparator::Explicit(separator.to_string());
        self
    }

    pub fn comment(mut self, comment: Option<char>) -> Self {
        self.settings.format.common_mut().comment = comment;
        self
    }

    pub fn output_buffer_size(mut self, size: usize) -> Self {
        self.settings.output_buffer_size = size;
        self
    }

    /// Fills unset headers and header writing flag from a schema provider.
    pub fn configure_from<T, S: SchemaProvider<T> + ?Sized>(mut self, schema: &S) -> Self {
        self.settings = self.settings.configure_from(schema);
        self
    }

    pub fn build(self) -> TextResult<Arc<WriterSettings<F>>> {
        self.settings.freeze()
    }

    pub fn from_writer<W: Write>(self, wtr: W) -> TextResult<TextWriter<F, W>> {
        TextWriter::new(self.settings.freeze()?, wtr)
    }

    pub fn from_path<P: AsRef<Path>>(self, path: P) -> TextResult<TextWriter<F, File>> {
        let file = File::create(path)?;
        self.from_writer(file)
    }
}

#[cfg(all(test, feature = "csv"))]
mod tests {
    use std::error::Error;

    use crate::{error::TextError, item::csv::CsvWriterBuilder};

    #[test]
    fn automatic_headers_are_written_once_before_the_first_row() -> Result<(), Box<dyn Error>> {
        let mut writer = CsvWriterBuilder::new()
            .headers(&["quantity", "symbol", "id"])
            .has_headers(true)
            .from_writer(Vec::new())?;

        writer.write_values(&["23.4", "IBM", "1"])?;
        writer.write_values(&["10", "MSFT", "2"])?;
        assert!(matches!(writer.write_headers(), Err(TextError::TextWriting(_))));

        let out = String::from_utf8(writer.finish()?)?;
        assert_eq!(out, "quantity,symbol,id\n23.4,IBM,1\n10,MSFT,2\n");
        Ok(())
    }

    #[test]
    fn automatic_headers_are_written_even_without_rows() -> Result<(), Box<dyn Error>> {
        let writer = CsvWriterBuilder::new()
            .headers(&["a", "b"])
            .has_headers(true)
            .from_writer(Vec::new())?;
        assert_eq!(String::from_utf8(writer.finish()?)?, "a,b\n");
        Ok(())
    }

    #[test]
    fn explicit_headers_are_written_at_most_once() -> Result<(), Box<dyn Error>> {
        let mut writer = CsvWriterBuilder::new()
            .headers(&["a", "b"])
            .from_writer(Vec::new())?;
        writer.write_headers()?;
        assert!(matches!(writer.write_headers(), Err(TextError::TextWriting(_))));
        writer.write_values(&["1", "2"])?;
        assert_eq!(String::from_utf8(writer.finish()?)?, "a,b\n1,2\n");
        Ok(())
    }

    #[test]
    fn explicit_headers_need_headers() -> Result<(), Box<dyn Error>> {
        let mut writer = CsvWriterBuilder::new().from_writer(Vec::new())?;
        assert!(matches!(writer.write_headers(), Err(TextError::TextWriting(_))));
        Ok(())
    }

    #[test]
    fn selected_values_are_placed_in_header_order() -> Result<(), Box<dyn Error>> {
        let mut writer = CsvWriterBuilder::new()
            .headers(&["quantity", "symbol", "id"])
            .select_fields(&["id", "symbol"])
            .has_headers(true)
            .from_writer(Vec::new())?;
        writer.write_values(&["1", "IBM"])?;
        assert_eq!(
            String::from_utf8(writer.finish()?)?,
            "quantity,symbol,id\n,IBM,1\n"
        );
        Ok(())
    }

    #[test]
    fn selected_values_keep_their_columns_without_reordering() -> Result<(), Box<dyn Error>> {
        let mut writer = CsvWriterBuilder::new()
            .headers(&["quantity", "symbol", "id"])
            .select_fields(&["id", "quantity"])
            .column_reordering(false)
            .from_writer(Vec::new())?;
        writer.write_values(&["1", "23.4"])?;
        assert!(matches!(
            writer.write_values(&["2", "5", "extra"]),
            Err(TextError::TextWriting(_))
        ));
        assert_eq!(writer.record_count(), 1);
        assert_eq!(String::from_utf8(writer.finish()?)?, "23.4,,1\n");
        Ok(())
    }

    #[test]
    fn substitutions_and_empty_rows() -> Result<(), Box<dyn Error>> {
        let mut writer = CsvWriterBuilder::new()
            .empty_value("?")
            .null_value("NULL")
            .trim_values(true)
            .from_writer(Vec::new())?;
        writer.write_row(&[Some("  a "), Some("   "), None])?;
        writer.write_row(&[None, None])?;
        writer.write_row(&[])?;
        assert_eq!(writer.record_count(), 1);
        assert_eq!(String::from_utf8(writer.finish()?)?, "a,?,NULL\n");
        Ok(())
    }

    #[test]
    fn comments_use_the_format_comment_character() -> Result<(), Box<dyn Error>> {
        let mut writer = CsvWriterBuilder::new().from_writer(Vec::new())?;
        writer.comment_row(" generated")?;
        writer.write_values(&["x"])?;
        assert_eq!(String::from_utf8(writer.finish()?)?, "# generated\nx\n");

        let mut writer = CsvWriterBuilder::new().comment(None).from_writer(Vec::new())?;
        assert!(writer.comment_row("nope").is_err());
        Ok(())
    }

    #[test]
    fn headers_cannot_change_after_writing() -> Result<(), Box<dyn Error>> {
        let mut writer = CsvWriterBuilder::new().from_writer(Vec::new())?;
        writer.write_values(&["x"])?;
        assert!(writer.set_headers(&["a"]).is_err());
        Ok(())
    }
}
