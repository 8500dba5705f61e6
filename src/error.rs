use thiserror::Error;

/// Result type used across parsing and writing sessions.
pub type TextResult<T> = Result<T, TextError>;

#[derive(Error, Debug)]
/// Text parsing / writing error
pub enum TextError {
    /// Invalid settings, detected before any row is processed.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Input that the tokenizer could not turn into a row.
    #[error("Malformed input at line {line} (row {row}): {message}")]
    MalformedInput {
        line: u64,
        row: u64,
        message: String,
    },

    /// A field converter rejected a value.
    #[error("Conversion error on column {column}: {message}")]
    Conversion { column: usize, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Text writing error: {0}")]
    TextWriting(String),

    #[error("Session cancelled after {rows} rows")]
    Cancelled { rows: u64 },

    #[error("Error tolerance of {tolerance} exceeded after {count} errors, last error: {last}")]
    ToleranceExceeded {
        tolerance: usize,
        count: usize,
        last: Box<TextError>,
    },
}

impl TextError {
    /// Returns `true` for errors counted against the error tolerance
    /// instead of aborting the session immediately.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            TextError::MalformedInput { .. } | TextError::Conversion { .. }
        )
    }

    pub(crate) fn conversion(column: usize, message: impl Into<String>) -> Self {
        TextError::Conversion {
            column,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::{self, ErrorKind};

    use super::TextError;

    #[test]
    fn recoverable_errors_are_malformed_input_and_conversion() {
        let malformed = TextError::MalformedInput {
            line: 3,
            row: 2,
            message: "unterminated quote".to_string(),
        };
        assert!(malformed.is_recoverable());
        assert!(TextError::conversion(1, "not a number").is_recoverable());

        assert!(!TextError::Configuration("bad".to_string()).is_recoverable());
        assert!(!TextError::TextWriting("twice".to_string()).is_recoverable());
        assert!(!TextError::from(io::Error::new(ErrorKind::Other, "disk")).is_recoverable());
        assert!(!TextError::Cancelled { rows: 1 }.is_recoverable());
    }

    #[test]
    fn tolerance_error_reports_last_error() {
        let error = TextError::ToleranceExceeded {
            tolerance: 2,
            count: 3,
            last: Box::new(TextError::conversion(0, "boom")),
        };
        assert_eq!(
            error.to_string(),
            "Error tolerance of 2 exceeded after 3 errors, last error: Conversion error on column 0: boom"
        );
    }
}
