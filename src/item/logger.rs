use log::info;

use crate::{
    core::{
        context::ParsingContext,
        item::{RowConsumer, SessionOutcome},
        row::Row,
    },
    error::TextResult,
};

/// Logs every row it receives, for debugging purposes.
#[derive(Default)]
pub struct LoggerConsumer {
    rows: u64,
}

impl LoggerConsumer {
    pub fn rows(&self) -> u64 {
        self.rows
    }
}

impl RowConsumer for LoggerConsumer {
    fn open(&mut self, headers: Option<&[String]>, _context: &ParsingContext) -> TextResult<()> {
        info!("Headers:{:?}", headers);
        Ok(())
    }

    fn consume(&mut self, row: &Row<'_>, context: &ParsingContext) -> TextResult<()> {
        self.rows += 1;
        info!("Row {}:{:?}", context.current_row(), row.as_strs());
        Ok(())
    }

    fn close(&mut self, outcome: SessionOutcome<'_>) {
        match outcome {
            SessionOutcome::Completed(summary) => {
                info!("Logged {} rows of session {}", self.rows, summary.session_id)
            }
            SessionOutcome::Failed { summary, error } => info!(
                "Logged {} rows of session {} before it failed: {}",
                self.rows, summary.session_id, error
            ),
        }
    }
}

#[cfg(all(test, feature = "csv"))]
mod tests {
    use crate::item::csv::CsvParserBuilder;

    use super::LoggerConsumer;

    #[test]
    fn counts_logged_rows() {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut consumer = LoggerConsumer::default();
        CsvParserBuilder::new()
            .from_reader("a,b\nc,d\n".as_bytes())
            .unwrap()
            .parse(&mut consumer)
            .unwrap();
        assert_eq!(consumer.rows(), 2);
    }
}
