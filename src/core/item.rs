use std::io::Read;

use crate::error::{TextError, TextResult};

use super::{
    context::{ParsingContext, SessionSummary},
    input::CharInput,
    row::{RawRow, Row},
};

/// What a tokenizer call produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenizerStatus {
    /// A row (possibly with zero fields) was written into the raw row.
    Row,
    /// The input is exhausted, nothing was produced.
    EndOfInput,
}

/// Format-specific state machine turning characters into rows.
pub trait RowTokenizer {
    /// Reads the next row into `row`, clearing it first.
    ///
    /// Recoverable problems are reported as [`TextError::MalformedInput`];
    /// the caller then invokes [`recover`](Self::recover) before asking for
    /// the next row.
    fn next_row<R: Read>(
        &mut self,
        input: &mut CharInput<R>,
        row: &mut RawRow,
    ) -> TextResult<TokenizerStatus>;

    /// Moves the input past the rest of a malformed row.
    fn recover<R: Read>(&mut self, input: &mut CharInput<R>) -> TextResult<()>;
}

/// Format-specific encoder turning values into one line of text.
pub trait RowEscaper {
    /// Appends the encoded values of a row (without line separator) to
    /// `out`. `None` values are nulls.
    fn escape_row(&mut self, values: &[Option<&str>], out: &mut String) -> TextResult<()>;
}

/// How a session ended, as reported to [`RowConsumer::close`].
#[derive(Debug)]
pub enum SessionOutcome<'a> {
    Completed(&'a SessionSummary),
    Failed {
        summary: &'a SessionSummary,
        error: &'a TextError,
    },
}

/// Receives the rows of a parsing session.
///
/// `open` is called once, after the header set is known; `consume` once per
/// row in input order; `close` once at the end, whether the session
/// succeeded or not.
pub trait RowConsumer {
    fn open(&mut self, _headers: Option<&[String]>, _context: &ParsingContext) -> TextResult<()> {
        Ok(())
    }

    /// Handles one row. Returning a recoverable error (a conversion error,
    /// typically) counts against the session's error tolerance instead of
    /// aborting it.
    fn consume(&mut self, row: &Row<'_>, context: &ParsingContext) -> TextResult<()>;

    fn close(&mut self, _outcome: SessionOutcome<'_>) {}
}

/// Supplies the rows of a writing session.
pub trait RowProducer {
    /// Header set for the rows, if the producer knows it.
    fn headers(&self) -> Option<Vec<String>> {
        None
    }

    /// Next row to write, `None` at end of data.
    fn next_row(&mut self) -> TextResult<Option<Vec<Option<String>>>>;
}
