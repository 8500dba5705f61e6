use std::io::{self, Write};

use log::debug;

/// Default number of bytes held before the pending rows are flushed.
pub const DEFAULT_OUTPUT_BUFFER_SIZE: usize = 64 * 1024;

/// A buffered character sink.
///
/// Rows are assembled in a scratch buffer and only become visible to the
/// underlying writer once committed: a row abandoned half-way (because a
/// value could not be converted, for instance) is discarded and never
/// reaches the output.
///
/// A failed write is fatal: pending rows are dropped and every later commit
/// or flush returns an error, so no byte is ever written twice.
pub struct CharOutput<W: Write> {
    writer: W,
    row: String,
    pending: String,
    capacity: usize,
    line_separator: String,
    rows_written: u64,
    lines_written: u64,
    failed: bool,
}

impl<W: Write> CharOutput<W> {
    pub fn new(writer: W, line_separator: impl Into<String>, capacity: usize) -> Self {
        let capacity = capacity.max(16);
        Self {
            writer,
            row: String::new(),
            pending: String::with_capacity(capacity),
            capacity,
            line_separator: line_separator.into(),
            rows_written: 0,
            lines_written: 0,
            failed: false,
        }
    }

    /// Scratch buffer holding the row being assembled.
    pub fn row_mut(&mut self) -> &mut String {
        &mut self.row
    }

    pub fn row(&self) -> &str {
        &self.row
    }

    pub fn append(&mut self, text: &str) {
        self.row.push_str(text);
    }

    pub fn append_char(&mut self, ch: char) {
        self.row.push(ch);
    }

    pub fn line_separator(&self) -> &str {
        &self.line_separator
    }

    /// Terminates the current row and moves it to the pending buffer,
    /// flushing when the buffer is full.
    pub fn commit_row(&mut self) -> io::Result<()> {
        if self.failed {
            self.row.clear();
            return Err(broken());
        }
        self.lines_written += 1 + self.row.matches('\n').count() as u64;
        self.pending.push_str(&self.row);
        self.pending.push_str(&self.line_separator);
        self.row.clear();
        self.rows_written += 1;

        if self.pending.len() >= self.capacity {
            self.write_pending()?;
        }
        Ok(())
    }

    /// Drops the row being assembled.
    pub fn discard_row(&mut self) {
        self.row.clear();
    }

    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    /// Number of physical lines written, counting line breaks embedded in
    /// quoted values.
    pub fn lines_written(&self) -> u64 {
        self.lines_written
    }

    /// Writes pending rows and flushes the underlying writer.
    pub fn flush(&mut self) -> io::Result<()> {
        self.write_pending()?;
        if let Err(err) = self.writer.flush() {
            self.failed = true;
            return Err(err);
        }
        Ok(())
    }

    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    /// Flushes everything and returns the underlying writer.
    pub fn into_inner(mut self) -> io::Result<W> {
        self.flush()?;
        Ok(self.writer)
    }

    fn write_pending(&mut self) -> io::Result<()> {
        if self.failed {
            return Err(broken());
        }
        if self.pending.is_empty() {
            return Ok(());
        }
        debug!("Flushing {} bytes of output", self.pending.len());
        let result = self.writer.write_all(self.pending.as_bytes());
        self.pending.clear();
        if result.is_err() {
            self.failed = true;
        }
        result
    }
}

fn broken() -> io::Error {
    io::Error::other("output is unusable after a failed write")
}
