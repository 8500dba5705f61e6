use std::{
    borrow::Cow,
    fs::File,
    io::Read,
    path::Path,
    sync::Arc,
    time::Instant,
};

use log::{debug, error, info, warn};

use crate::error::{TextError, TextResult};

use super::{
    context::{CancellationToken, ParsingContext, SessionStatus, SessionSummary},
    format::{Format, LineSeparator},
    input::CharInput,
    item::{RowConsumer, RowTokenizer, SessionOutcome, TokenizerStatus},
    row::{RawRow, Row},
    schema::SchemaProvider,
    selection::{FieldSelection, SelectionMask},
    settings::ParserSettings,
};

type ErrorHandler = Box<dyn FnMut(&TextError, &ParsingContext) + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParserState {
    New,
    Running,
    Finished(SessionStatus),
}

/// A parsing session over one input.
///
/// The session pulls rows from the format's tokenizer one at a time,
/// establishes the header set, applies the field selection and value
/// substitutions, and hands the resulting rows to the caller or to a
/// [`RowConsumer`]. Recoverable errors are skipped until the configured
/// error tolerance is exceeded.
pub struct Parser<F: Format, R: Read> {
    settings: Arc<ParserSettings<F>>,
    input: CharInput<R>,
    tokenizer: F::Tokenizer,
    raw: RawRow,
    context: ParsingContext,
    mask: Option<SelectionMask>,
    unchecked_indexes: bool,
    row_headers: Option<Arc<[String]>>,
    state: ParserState,
    started: Instant,
    error_handler: Option<ErrorHandler>,
    cancellation: Option<CancellationToken>,
}

impl<F: Format, R: Read> Parser<F, R> {
    pub fn new(settings: Arc<ParserSettings<F>>, reader: R) -> Self {
        let detect = settings.line_separator_detection
            || settings.format.common().line_separator.is_auto();
        let input = CharInput::with_capacity(reader, settings.input_buffer_size, detect);
        let tokenizer = settings.format.tokenizer(&settings);
        let raw = RawRow::with_limits(settings.max_columns, settings.max_chars_per_column);

        Self {
            settings,
            input,
            tokenizer,
            raw,
            context: ParsingContext::new(),
            mask: None,
            unchecked_indexes: false,
            row_headers: None,
            state: ParserState::New,
            started: Instant::now(),
            error_handler: None,
            cancellation: None,
        }
    }

    /// Calls `handler` for every recoverable error skipped by the session.
    pub fn with_error_handler(
        mut self,
        handler: impl FnMut(&TextError, &ParsingContext) + Send + 'static,
    ) -> Self {
        self.error_handler = Some(Box::new(handler));
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub fn settings(&self) -> &ParserSettings<F> {
        &self.settings
    }

    pub fn context(&self) -> &ParsingContext {
        &self.context
    }

    /// Header set of the input, reading the header row if needed.
    pub fn headers(&mut self) -> TextResult<Option<&[String]>> {
        if self.state == ParserState::New {
            if let Err(err) = self.begin() {
                self.fail(&err);
                return Err(err);
            }
        }
        Ok(self.context.headers())
    }

    /// Parses the next record. The row borrows the parser's buffer and is
    /// valid until the next call.
    pub fn parse_next(&mut self) -> TextResult<Option<Row<'_>>> {
        if self.advance()? {
            Ok(Some(self.current_row()))
        } else {
            Ok(None)
        }
    }

    /// Iterator over the remaining records, as owned rows.
    pub fn rows(&mut self) -> Rows<'_, F, R> {
        Rows { parser: self }
    }

    pub fn parse_all(&mut self) -> TextResult<Vec<Row<'static>>> {
        self.rows().collect()
    }

    /// Runs the whole session, feeding every record to `consumer`.
    ///
    /// Recoverable errors returned by the consumer count against the error
    /// tolerance like malformed rows do.
    pub fn parse(&mut self, consumer: &mut dyn RowConsumer) -> TextResult<SessionSummary> {
        let result = self.run(consumer);
        let summary = self.summary();

        match result {
            Ok(()) => {
                consumer.close(SessionOutcome::Completed(&summary));
                Ok(summary)
            }
            Err(err) => {
                consumer.close(SessionOutcome::Failed {
                    summary: &summary,
                    error: &err,
                });
                Err(err)
            }
        }
    }

    /// Ends the session; later calls return no rows.
    pub fn stop(&mut self) {
        if !matches!(self.state, ParserState::Finished(_)) {
            self.finish(SessionStatus::Stopped);
        }
    }

    /// Counters of the session so far.
    pub fn summary(&self) -> SessionSummary {
        let status = match self.state {
            ParserState::Finished(status) => status,
            _ => SessionStatus::Stopped,
        };
        SessionSummary::from_context(&self.context, status, self.started, self.input.line_count())
    }

    fn run(&mut self, consumer: &mut dyn RowConsumer) -> TextResult<()> {
        if self.state == ParserState::New {
            if let Err(err) = self.begin() {
                self.fail(&err);
                return Err(err);
            }
        }
        consumer.open(self.row_headers.as_deref(), &self.context)?;

        while self.advance()? {
            let consumed = {
                let row = self.current_row();
                consumer.consume(&row, &self.context)
            };
            match consumed {
                Ok(()) => {}
                Err(err) if err.is_recoverable() => {
                    if let Err(err) = self.register_error(err) {
                        self.fail(&err);
                        return Err(err);
                    }
                }
                Err(err) => {
                    self.fail(&err);
                    return Err(err);
                }
            }
        }
        Ok(())
    }

    fn begin(&mut self) -> TextResult<()> {
        self.state = ParserState::Running;
        self.started = Instant::now();
        info!(
            "Start of {} parsing session {}",
            self.settings.format.name(),
            self.context.session_id()
        );

        let mut skipped = 0;
        while skipped < self.settings.rows_to_skip && self.next_raw()? {
            skipped += 1;
        }

        let extracted = if self.settings.header_extraction && self.next_raw()? {
            Some(self.raw.to_vec())
        } else {
            None
        };

        let headers: Option<Arc<[String]>> = self
            .settings
            .known_headers()
            .or(extracted)
            .map(Arc::from);
        debug!("Session {} headers: {:?}", self.context.session_id(), headers);
        self.context.set_headers(headers.clone());
        self.row_headers = headers;

        if let Some(selection) = self.settings.selection.clone() {
            if let Some(headers) = self.context.headers() {
                let reorder = self.settings.column_reordering;
                let mask = if selection.is_by_name() {
                    SelectionMask::resolve(&selection, Some(headers), 0, reorder)?
                } else {
                    // indexes may exist past the headers, checked on the first row
                    self.unchecked_indexes = true;
                    SelectionMask::resolve_provisional(&selection, headers, reorder)?
                };
                self.apply_mask(mask);
            }
        }
        Ok(())
    }

    fn advance(&mut self) -> TextResult<bool> {
        match self.try_advance() {
            Ok(advanced) => Ok(advanced),
            Err(err) => {
                self.fail(&err);
                Err(err)
            }
        }
    }

    fn try_advance(&mut self) -> TextResult<bool> {
        match self.state {
            ParserState::New => self.begin()?,
            ParserState::Running => {}
            ParserState::Finished(_) => return Ok(false),
        }

        if let Some(limit) = self.settings.record_limit {
            if self.context.record_count() >= limit {
                self.finish(SessionStatus::Completed);
                return Ok(false);
            }
        }

        if !self.next_raw()? {
            self.finish(SessionStatus::Completed);
            return Ok(false);
        }

        if self.mask.is_none() {
            if let Some(selection) = &self.settings.selection {
                let mask = SelectionMask::resolve(
                    selection,
                    None,
                    self.raw.len(),
                    self.settings.column_reordering,
                )?;
                self.apply_mask(mask);
            }
        }

        if self.unchecked_indexes {
            self.unchecked_indexes = false;
            if let Some(selection) = &self.settings.selection {
                let headers = self.context.headers().map_or(0, <[String]>::len);
                selection.check_indexes(headers.max(self.raw.len()))?;
            }
        }

        self.context.increment_records();
        Ok(true)
    }

    /// Reads the next raw row, skipping malformed ones within tolerance.
    fn next_raw(&mut self) -> TextResult<bool> {
        loop {
            if let Some(token) = &self.cancellation {
                if token.is_cancelled() {
                    return Err(TextError::Cancelled {
                        rows: self.context.record_count(),
                    });
                }
            }

            let status = self.tokenizer.next_row(&mut self.input, &mut self.raw);
            self.sync_position();

            match status {
                Ok(TokenizerStatus::Row) => {
                    self.context.increment_row();
                    return Ok(true);
                }
                Ok(TokenizerStatus::EndOfInput) => return Ok(false),
                Err(err) if err.is_recoverable() => {
                    self.context.increment_row();
                    let err = match err {
                        TextError::MalformedInput { line, message, .. } => {
                            TextError::MalformedInput {
                                line,
                                row: self.context.current_row(),
                                message,
                            }
                        }
                        other => other,
                    };
                    self.tokenizer.recover(&mut self.input)?;
                    self.sync_position();
                    self.register_error(err)?;
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn register_error(&mut self, err: TextError) -> TextResult<()> {
        self.context.set_content(self.raw.content());
        let count = self.context.increment_errors();
        let tolerance = self.settings.error_tolerance;

        if count > tolerance {
            return Err(TextError::ToleranceExceeded {
                tolerance,
                count,
                last: Box::new(err),
            });
        }

        warn!(
            "Skipping row {} of session {}: {}",
            self.context.current_row(),
            self.context.session_id(),
            err
        );
        if let Some(handler) = self.error_handler.as_mut() {
            handler(&err, &self.context);
        }
        Ok(())
    }

    fn apply_mask(&mut self, mask: SelectionMask) {
        if mask.headers().is_some() {
            self.row_headers = mask.headers().cloned();
        }
        self.context.set_selected_headers(self.row_headers.clone());
        self.mask = Some(mask);
    }

    fn sync_position(&mut self) {
        self.context.update_position(
            self.input.current_line(),
            self.input.current_column(),
            self.input.char_index(),
        );
        self.context
            .set_line_separator(self.input.detected_line_separator());
    }

    fn current_row(&self) -> Row<'_> {
        let settings = &self.settings;
        let values = match &self.mask {
            Some(mask) => mask
                .sources(self.raw.len())
                .map(|source| match source {
                    Some(index) => substitute(self.raw.get(index), settings),
                    None => None,
                })
                .collect(),
            None => self
                .raw
                .iter()
                .map(|value| substitute(Some(value), settings))
                .collect(),
        };
        Row::new(values, self.row_headers.clone())
    }

    fn finish(&mut self, status: SessionStatus) {
        self.state = ParserState::Finished(status);
        info!(
            "End of parsing session {} ({:?}): {} records, {} rows, {} errors",
            self.context.session_id(),
            status,
            self.context.record_count(),
            self.context.current_row(),
            self.context.error_count()
        );
    }

    fn fail(&mut self, err: &TextError) {
        if matches!(self.state, ParserState::Finished(SessionStatus::Failed)) {
            return;
        }
        if let TextError::Cancelled { .. } = err {
            self.finish(SessionStatus::Stopped);
            return;
        }
        self.state = ParserState::Finished(SessionStatus::Failed);
        error!(
            "Parsing session {} failed at line {}: {}",
            self.context.session_id(),
            self.context.current_line(),
            err
        );
    }
}

fn substitute<'a, F>(value: Option<&'a str>, settings: &ParserSettings<F>) -> Option<Cow<'a, str>> {
    match value {
        None => settings.null_value.clone().map(Cow::Owned),
        Some("") => Some(
            settings
                .empty_value
                .clone()
                .map_or(Cow::Borrowed(""), Cow::Owned),
        ),
        Some(value) => Some(Cow::Borrowed(value)),
    }
}

/// Iterator returned by [`Parser::rows`].
pub struct Rows<'p, F: Format, R: Read> {
    parser: &'p mut Parser<F, R>,
}

impl<F: Format, R: Read> Iterator for Rows<'_, F, R> {
    type Item = TextResult<Row<'static>>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.parser.parse_next() {
            Ok(Some(row)) => Some(Ok(row.into_owned())),
            Ok(None) => None,
            Err(err) => Some(Err(err)),
        }
    }
}

/// Fluent assembly of parser settings, shared by every format.
///
/// Format-specific options are added by each format module.
pub struct ParserBuilder<F: Format> {
    pub(crate) settings: ParserSettings<F>,
    error_handler: Option<ErrorHandler>,
    cancellation: Option<CancellationToken>,
}

impl<F: Format + Default> Default for ParserBuilder<F> {
    fn default() -> Self {
        Self::from_settings(ParserSettings::default())
    }
}

impl<F: Format + Default> ParserBuilder<F> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<F: Format> ParserBuilder<F> {
    pub fn from_settings(settings: ParserSettings<F>) -> Self {
        Self {
            settings,
            error_handler: None,
            cancellation: None,
        }
    }

    pub fn format(mut self, format: F) -> Self {
        self.settings.format = format;
        self
    }

    /// Uses the first row of the input as header row.
    pub fn has_headers(mut self, yes: bool) -> Self {
        self.settings.header_extraction = yes;
        self
    }

    pub fn headers(mut self, headers: &[&str]) -> Self {
        self.settings.headers = Some(headers.iter().map(|h| h.to_string()).collect());
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

    /// Trims leading and trailing whitespace of unquoted values.
    pub fn trim_values(mut self, yes: bool) -> Self {
        self.settings.ignore_leading_whitespace = yes;
        self.settings.ignore_trailing_whitespace = yes;
        self
    }

    pub fn ignore_leading_whitespace(mut self, yes: bool) -> Self {
        self.settings.ignore_leading_whitespace = yes;
        self
    }

    pub fn ignore_trailing_whitespace(mut self, yes: bool) -> Self {
        self.settings.ignore_trailing_whitespace = yes;
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

    pub fn max_chars_per_column(mut self, max: usize) -> Self {
        self.settings.max_chars_per_column = max;
        self
    }

    pub fn max_columns(mut self, max: usize) -> Self {
        self.settings.max_columns = max;
        self
    }

    pub fn skip_empty_lines(mut self, yes: bool) -> Self {
        self.settings.skip_empty_lines = yes;
        self
    }

    pub fn comment_processing(mut self, yes: bool) -> Self {
        self.settings.comment_processing = yes;
        self
    }

    pub fn comment(mut self, comment: Option<char>) -> Self {
        self.settings.format.common_mut().comment = comment;
        self
    }

    pub fn line_separator(mut self, separator: LineSeparator) -> Self {
        self.settings.format.common_mut().line_separator = separator;
        self
    }

    pub fn line_separator_detection(mut self, yes: bool) -> Self {
        self.settings.line_separator_detection = yes;
        self
    }

    pub fn rows_to_skip(mut self, rows: u64) -> Self {
        self.settings.rows_to_skip = rows;
        self
    }

    pub fn record_limit(mut self, limit: u64) -> Self {
        self.settings.record_limit = Some(limit);
        self
    }

    pub fn error_tolerance(mut self, tolerance: usize) -> Self {
        self.settings.error_tolerance = tolerance;
        self
    }

    pub fn input_buffer_size(mut self, size: usize) -> Self {
        self.settings.input_buffer_size = size;
        self
    }

    pub fn error_handler(
        mut self,
        handler: impl FnMut(&TextError, &ParsingContext) + Send + 'static,
    ) -> Self {
        self.error_handler = Some(Box::new(handler));
        self
    }

    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Fills unset headers from a schema provider.
    pub fn configure_from<T, S: SchemaProvider<T> + ?Sized>(mut self, schema: &S) -> Self {
        self.settings = self.settings.configure_from(schema);
        self
    }

    /// Validates and freezes the settings, for sharing between sessions.
    pub fn build(self) -> TextResult<Arc<ParserSettings<F>>> {
        self.settings.freeze()
    }

    pub fn from_reader<R: Read>(self, rdr: R) -> TextResult<Parser<F, R>> {
        let settings = self.settings.freeze()?;
        let mut parser = Parser::new(settings, rdr);
        parser.error_handler = self.error_handler;
        parser.cancellation = self.cancellation;
        Ok(parser)
    }

    pub fn from_path<P: AsRef<Path>>(self, path: P) -> TextResult<Parser<F, File>> {
        let file = File::open(path)?;
        self.from_reader(file)
    }
}
