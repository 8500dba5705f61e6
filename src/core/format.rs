use std::fmt::Debug;

use serde::{Deserialize, Serialize};

use crate::error::{TextError, TextResult};

use super::{
    item::{RowEscaper, RowTokenizer},
    settings::{ParserSettings, WriterSettings},
};

/// How rows are terminated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineSeparator {
    /// Any of `\r\n`, `\r` or `\n` ends a row; the first one found is
    /// remembered. Writers fall back to `\n`.
    Auto,
    /// The given line ending (`\n`, `\r` or `\r\n`) is written; parsers still
    /// accept every line ending.
    Explicit(String),
}

impl Default for LineSeparator {
    fn default() -> Self {
        LineSeparator::Explicit("\n".to_string())
    }
}

impl LineSeparator {
    /// Separator written after each row.
    pub fn for_writing(&self) -> &str {
        match self {
            LineSeparator::Auto => "\n",
            LineSeparator::Explicit(separator) => separator,
        }
    }

    pub fn is_auto(&self) -> bool {
        matches!(self, LineSeparator::Auto)
    }
}

/// Settings shared by every text format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommonFormat {
    pub line_separator: LineSeparator,
    /// Lines starting with this character are comments. `None` disables
    /// comments for the format.
    pub comment: Option<char>,
}

impl Default for CommonFormat {
    fn default() -> Self {
        Self {
            line_separator: LineSeparator::default(),
            comment: Some('#'),
        }
    }
}

impl CommonFormat {
    pub fn is_comment(&self, ch: char) -> bool {
        self.comment == Some(ch)
    }

    pub fn validate(&self) -> TextResult<()> {
        if let LineSeparator::Explicit(separator) = &self.line_separator {
            if !matches!(separator.as_str(), "\n" | "\r" | "\r\n") {
                return Err(TextError::Configuration(format!(
                    "Invalid line separator {:?}: expected \"\\n\", \"\\r\" or \"\\r\\n\"",
                    separator
                )));
            }
        }
        if let Some(comment) = self.comment {
            if comment == '\n' || comment == '\r' {
                return Err(TextError::Configuration(
                    "Comment character cannot be a line ending".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Describes one concrete text format and builds the components that read
/// and write it.
pub trait Format: Clone + Debug + Send + Sync + 'static {
    type Tokenizer: RowTokenizer;
    type Escaper: RowEscaper;

    /// Short name used in log messages.
    fn name(&self) -> &'static str;

    fn common(&self) -> &CommonFormat;

    fn common_mut(&mut self) -> &mut CommonFormat;

    /// Checks the format description is consistent.
    fn validate(&self) -> TextResult<()> {
        self.common().validate()
    }

    fn tokenizer(&self, settings: &ParserSettings<Self>) -> Self::Tokenizer;

    fn escaper(&self, settings: &WriterSettings<Self>) -> Self::Escaper;

    /// Headers implied by the format itself, if any.
    fn declared_headers(&self) -> Option<Vec<String>> {
        None
    }
}
