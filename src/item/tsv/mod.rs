/// Tab-separated values.
///
/// TSV has no quoting: tabs, line breaks and the escape character itself are
/// written as escape sequences (`\t`, `\n`, `\r`, `\\`). With line joining
/// enabled, an escape character at the end of a line joins it with the next
/// one, keeping the line break in the value.
///
/// ```
/// use rowscan::item::tsv::{TsvParserBuilder, TsvWriterBuilder};
///
/// let mut writer = TsvWriterBuilder::new().from_writer(Vec::new()).unwrap();
/// writer.write_values(&["a\tb", "c"]).unwrap();
/// let text = String::from_utf8(writer.finish().unwrap()).unwrap();
/// assert_eq!(text, "a\\tb\tc\n");
///
/// let mut parser = TsvParserBuilder::new().from_reader(text.as_bytes()).unwrap();
/// let row = parser.parse_next().unwrap().unwrap();
/// assert_eq!(row.get(0), Some("a\tb"));
/// ```
pub mod tsv_reader;
pub mod tsv_writer;

use serde::{Deserialize, Serialize};

use crate::{
    core::{
        format::{CommonFormat, Format},
        parser::{Parser, ParserBuilder},
        settings::{ParserSettings, WriterSettings},
        writer::{TextWriter, WriterBuilder},
    },
    error::{TextError, TextResult},
};

use self::{tsv_reader::TsvTokenizer, tsv_writer::TsvEscaper};

pub const TAB: char = '\t';

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TsvFormat {
    #[serde(flatten)]
    pub common: CommonFormat,
    pub escape: char,
    /// An escape character followed by a line break keeps the line break in
    /// the value.
    pub line_joining: bool,
}

impl Default for TsvFormat {
    fn default() -> Self {
        Self {
            common: CommonFormat::default(),
            escape: '\\',
            line_joining: false,
        }
    }
}

impl Format for TsvFormat {
    type Tokenizer = TsvTokenizer;
    type Escaper = TsvEscaper;

    fn name(&self) -> &'static str {
        "tsv"
    }

    fn common(&self) -> &CommonFormat {
        &self.common
    }

    fn common_mut(&mut self) -> &mut CommonFormat {
        &mut self.common
    }

    fn validate(&self) -> TextResult<()> {
        self.common.validate()?;
        if matches!(self.escape, TAB | '\n' | '\r') {
            return Err(TextError::Configuration(format!(
                "Escape character {:?} cannot be a tab or a line ending",
                self.escape
            )));
        }
        if let Some(comment) = self.common.comment {
            if comment == TAB || comment == self.escape {
                return Err(TextError::Configuration(format!(
                    "Comment character {:?} conflicts with the tab or the escape",
                    comment
                )));
            }
        }
        Ok(())
    }

    fn tokenizer(&self, settings: &ParserSettings<Self>) -> TsvTokenizer {
        TsvTokenizer::new(self, settings)
    }

    fn escaper(&self, _settings: &WriterSettings<Self>) -> TsvEscaper {
        TsvEscaper::new(self)
    }
}

pub type TsvParser<R> = Parser<TsvFormat, R>;
pub type TsvWriter<W> = TextWriter<TsvFormat, W>;
pub type TsvParserBuilder = ParserBuilder<TsvFormat>;
pub type TsvWriterBuilder = WriterBuilder<TsvFormat>;

impl ParserBuilder<TsvFormat> {
    pub fn escape(mut self, escape: char) -> Self {
        self.settings.format.escape = escape;
        self
    }

    pub fn line_joining(mut self, yes: bool) -> Self {
        self.settings.format.line_joining = yes;
        self
    }
}

impl WriterBuilder<TsvFormat> {
    pub fn escape(mut self, escape: char) -> Self {
        self.settings.format.escape = escape;
        self
    }

    pub fn line_joining(mut self, yes: bool) -> Self {
        self.settings.format.line_joining = yes;
        self
    }
}
