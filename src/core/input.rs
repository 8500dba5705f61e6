use std::io::{self, ErrorKind, Read};

use log::debug;

/// Character every line terminator is normalized to.
pub const NEWLINE: char = '\n';

/// Default number of bytes pulled from the source per read.
pub const DEFAULT_INPUT_BUFFER_SIZE: usize = 64 * 1024;

/// A buffered character source with line tracking.
///
/// `CharInput` decodes UTF-8 from any [`Read`] implementation in fixed-size
/// chunks, so memory stays bounded no matter how large the source is.
/// `\r\n`, lone `\r` and lone `\n` are all seen by the tokenizer as a single
/// [`NEWLINE`], and each of them increments the line counter exactly once.
///
/// Normalization can be switched off temporarily (for instance inside a
/// quoted value that must keep its original line endings); raw `\r` and
/// `\n` are then returned as they are, but terminators are still counted
/// once each.
pub struct CharInput<R> {
    reader: R,
    bytes: Vec<u8>,
    pending: Vec<u8>,
    chars: Vec<char>,
    pos: usize,
    eof: bool,
    normalize: bool,
    detect_separator: bool,
    detected_separator: Option<&'static str>,
    line_count: u64,
    column: u64,
    char_index: u64,
}

impl<R: Read> CharInput<R> {
    /// Creates an input with the default buffer size and no separator
    /// detection.
    pub fn new(reader: R) -> Self {
        Self::with_capacity(reader, DEFAULT_INPUT_BUFFER_SIZE, false)
    }

    /// Creates an input reading `capacity` bytes at a time.
    ///
    /// When `detect_separator` is set, the first line terminator found in the
    /// input is remembered and exposed by
    /// [`detected_line_separator`](Self::detected_line_separator).
    pub fn with_capacity(reader: R, capacity: usize, detect_separator: bool) -> Self {
        let capacity = capacity.max(16);
        Self {
            reader,
            bytes: vec![0; capacity],
            pending: Vec::with_capacity(4),
            chars: Vec::with_capacity(capacity),
            pos: 0,
            eof: false,
            normalize: true,
            detect_separator,
            detected_separator: None,
            line_count: 0,
            column: 0,
            char_index: 0,
        }
    }

    /// Enables or disables line-ending normalization.
    pub fn set_normalize(&mut self, normalize: bool) {
        self.normalize = normalize;
    }

    pub fn is_normalizing(&self) -> bool {
        self.normalize
    }

    /// Number of line terminators consumed so far.
    pub fn line_count(&self) -> u64 {
        self.line_count
    }

    /// One-based number of the line the cursor is on.
    pub fn current_line(&self) -> u64 {
        self.line_count + 1
    }

    /// Characters consumed since the last line terminator.
    pub fn current_column(&self) -> u64 {
        self.column
    }

    /// Characters consumed since the start of the input (a `\r\n` pair read
    /// while normalizing counts as two).
    pub fn char_index(&self) -> u64 {
        self.char_index
    }

    /// First line separator seen in the input, if detection is enabled.
    pub fn detected_line_separator(&self) -> Option<&'static str> {
        self.detected_separator
    }

    /// Consumes and returns the next character, `None` at end of input.
    pub fn next_char(&mut self) -> io::Result<Option<char>> {
        if !self.fill(0)? {
            return Ok(None);
        }
        let ch = self.chars[self.pos];
        self.advance();

        match ch {
            '\r' => {
                let crlf = self.fill(0)? && self.chars[self.pos] == '\n';
                if self.normalize {
                    if crlf {
                        self.advance();
                        self.note_separator("\r\n");
                    } else {
                        self.note_separator("\r");
                    }
                    self.end_line();
                    Ok(Some(NEWLINE))
                } else {
                    if crlf {
                        // the '\n' that follows closes the line
                        self.note_separator("\r\n");
                        self.column += 1;
                    } else {
                        self.note_separator("\r");
                        self.end_line();
                    }
                    Ok(Some('\r'))
                }
            }
            '\n' => {
                self.note_separator("\n");
                self.end_line();
                Ok(Some('\n'))
            }
            other => {
                self.column += 1;
                Ok(Some(other))
            }
        }
    }

    /// Returns the next character without consuming it. A pending `\r` is
    /// reported as [`NEWLINE`] while normalizing.
    pub fn peek_char(&mut self) -> io::Result<Option<char>> {
        if !self.fill(0)? {
            return Ok(None);
        }
        let ch = self.chars[self.pos];
        if self.normalize && ch == '\r' {
            Ok(Some(NEWLINE))
        } else {
            Ok(Some(ch))
        }
    }

    /// Returns the raw character `n` positions ahead of the cursor
    /// (`peek_ahead(0)` is the next character) without consuming anything.
    pub fn peek_ahead(&mut self, n: usize) -> io::Result<Option<char>> {
        if !self.fill(n)? {
            return Ok(None);
        }
        Ok(Some(self.chars[self.pos + n]))
    }

    /// Returns `true` if the upcoming raw characters equal `expected`.
    pub fn starts_with(&mut self, expected: &[char]) -> io::Result<bool> {
        for (offset, wanted) in expected.iter().enumerate() {
            if self.peek_ahead(offset)? != Some(*wanted) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Consumes `count` characters.
    pub fn skip(&mut self, count: usize) -> io::Result<()> {
        for _ in 0..count {
            if self.next_char()?.is_none() {
                break;
            }
        }
        Ok(())
    }

    /// Consumes everything up to and including the next line terminator.
    ///
    /// Returns `false` if the input was already exhausted.
    pub fn skip_line(&mut self) -> io::Result<bool> {
        let normalize = self.normalize;
        self.normalize = true;
        let mut consumed = false;
        let result = loop {
            match self.next_char() {
                Ok(Some(NEWLINE)) => break Ok(true),
                Ok(Some(_)) => consumed = true,
                Ok(None) => break Ok(consumed),
                Err(error) => break Err(error),
            }
        };
        self.normalize = normalize;
        result
    }

    pub fn is_exhausted(&mut self) -> io::Result<bool> {
        Ok(!self.fill(0)?)
    }

    fn advance(&mut self) {
        self.pos += 1;
        self.char_index += 1;
    }

    fn end_line(&mut self) {
        self.line_count += 1;
        self.column = 0;
    }

    fn note_separator(&mut self, separator: &'static str) {
        if self.detect_separator && self.detected_separator.is_none() {
            debug!("Detected line separator {:?}", separator);
            self.detected_separator = Some(separator);
        }
    }

    /// Makes sure the character at `pos + wanted` is decoded. Returns `false`
    /// when the input ends before it.
    fn fill(&mut self, wanted: usize) -> io::Result<bool> {
        while self.chars.len() - self.pos <= wanted {
            if self.eof {
                return Ok(false);
            }
            self.load()?;
        }
        Ok(true)
    }

    fn load(&mut self) -> io::Result<()> {
        if self.pos > 0 {
            self.chars.drain(..self.pos);
            self.pos = 0;
        }

        let read = loop {
            match self.reader.read(&mut self.bytes) {
                Ok(read) => break read,
                Err(error) if error.kind() == ErrorKind::Interrupted => continue,
                Err(error) => return Err(error),
            }
        };

        if read == 0 {
            self.eof = true;
            if !self.pending.is_empty() {
                return Err(io::Error::new(
                    ErrorKind::InvalidData,
                    "incomplete UTF-8 sequence at end of input",
                ));
            }
            return Ok(());
        }

        self.pending.extend_from_slice(&self.bytes[..read]);
        let valid = match std::str::from_utf8(&self.pending) {
            Ok(text) => {
                self.chars.extend(text.chars());
                self.pending.len()
            }
            Err(error) if error.error_len().is_none() => {
                // a multi-byte sequence is split across two reads
                let valid = error.valid_up_to();
                let text = std::str::from_utf8(&self.pending[..valid])
                    .map_err(|e| io::Error::new(ErrorKind::InvalidData, e))?;
                self.chars.extend(text.chars());
                valid
            }
            Err(error) => return Err(io::Error::new(ErrorKind::InvalidData, error)),
        };
        self.pending.drain(..valid);
        Ok(())
    }
}
