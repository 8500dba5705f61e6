use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, Instant},
};

use uuid::Uuid;

/// Shared flag used to stop a running session.
///
/// Sessions check the flag between rows only, so a cancelled session never
/// leaves a value half-tokenized.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Cursor state of one parsing session.
#[derive(Debug, Clone)]
pub struct ParsingContext {
    session_id: Uuid,
    line: u64,
    column: u64,
    char_index: u64,
    row_number: u64,
    record_count: u64,
    error_count: usize,
    headers: Option<Arc<[String]>>,
    selected_headers: Option<Arc<[String]>>,
    current_content: String,
    line_separator: Option<&'static str>,
}

impl ParsingContext {
    pub(crate) fn new() -> Self {
        Self {
            session_id: Uuid::new_v4(),
            line: 1,
            column: 0,
            char_index: 0,
            row_number: 0,
            record_count: 0,
            error_count: 0,
            headers: None,
            selected_headers: None,
            current_content: String::new(),
            line_separator: None,
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Line (1-based) the cursor is on.
    pub fn current_line(&self) -> u64 {
        self.line
    }

    pub fn current_column(&self) -> u64 {
        self.column
    }

    /// Number of characters consumed so far.
    pub fn current_char(&self) -> u64 {
        self.char_index
    }

    /// Number of raw rows produced by the tokenizer, headers and skipped
    /// rows included.
    pub fn current_row(&self) -> u64 {
        self.row_number
    }

    /// Number of records delivered.
    pub fn record_count(&self) -> u64 {
        self.record_count
    }

    /// Number of recoverable errors met so far.
    pub fn error_count(&self) -> usize {
        self.error_count
    }

    /// Header set of the input, as established for the session.
    pub fn headers(&self) -> Option<&[String]> {
        self.headers.as_deref()
    }

    /// Headers of the selected columns, in output order.
    pub fn selected_headers(&self) -> Option<&[String]> {
        self.selected_headers.as_deref()
    }

    /// Content of the row being assembled, or of the last row parsed.
    pub fn current_content(&self) -> &str {
        &self.current_content
    }

    /// First line separator met in the input, when detection is enabled.
    pub fn line_separator(&self) -> Option<&'static str> {
        self.line_separator
    }

    pub(crate) fn update_position(&mut self, line: u64, column: u64, char_index: u64) {
        self.line = line;
        self.column = column;
        self.char_index = char_index;
    }

    pub(crate) fn set_line_separator(&mut self, separator: Option<&'static str>) {
        if self.line_separator.is_none() {
            self.line_separator = separator;
        }
    }

    pub(crate) fn increment_row(&mut self) {
        self.row_number += 1;
    }

    pub(crate) fn increment_records(&mut self) {
        self.record_count += 1;
    }

    pub(crate) fn increment_errors(&mut self) -> usize {
        self.error_count += 1;
        self.error_count
    }

    pub(crate) fn set_headers(&mut self, headers: Option<Arc<[String]>>) {
        self.headers = headers;
    }

    pub(crate) fn set_selected_headers(&mut self, headers: Option<Arc<[String]>>) {
        self.selected_headers = headers;
    }

    pub(crate) fn set_content(&mut self, content: &str) {
        self.current_content.clear();
        self.current_content.push_str(content);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// The input was read to its end (or to the record limit).
    Completed,
    /// The session was stopped or cancelled before the end of input.
    Stopped,
    Failed,
}

/// Counters of a finished session.
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub session_id: Uuid,
    pub status: SessionStatus,
    pub start: Instant,
    pub end: Instant,
    pub duration: Duration,
    pub record_count: u64,
    pub row_count: u64,
    pub line_count: u64,
    pub error_count: usize,
}

impl SessionSummary {
    pub(crate) fn from_context(
        context: &ParsingContext,
        status: SessionStatus,
        start: Instant,
        line_count: u64,
    ) -> Self {
        Self {
            session_id: context.session_id(),
            status,
            start,
            end: Instant::now(),
            duration: start.elapsed(),
            record_count: context.record_count(),
            row_count: context.current_row(),
            line_count,
            error_count: context.error_count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::{CancellationToken, ParsingContext, SessionStatus, SessionSummary};

    #[test]
    fn cancellation_is_visible_through_clones() {
        let token = CancellationToken::new();
        let shared = token.clone();
        assert!(!shared.is_cancelled());
        token.cancel();
        assert!(shared.is_cancelled());
    }

    #[test]
    fn first_line_separator_is_kept() {
        let mut context = ParsingContext::new();
        context.set_line_separator(None);
        context.set_line_separator(Some("\r\n"));
        context.set_line_separator(Some("\n"));
        assert_eq!(context.line_separator(), Some("\r\n"));
    }

    #[test]
    fn summary_reflects_the_context_counters() {
        let mut context = ParsingContext::new();
        context.increment_row();
        context.increment_row();
        context.increment_records();
        assert_eq!(context.increment_errors(), 1);

        let summary = SessionSummary::from_context(&context, SessionStatus::Completed, Instant::now(), 2);
        assert_eq!(summary.session_id, context.session_id());
        assert_eq!(summary.row_count, 2);
        assert_eq!(summary.record_count, 1);
        assert_eq!(summary.error_count, 1);
        assert_eq!(summary.line_count, 2);
    }
}
