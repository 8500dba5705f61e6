use std::marker::PhantomData;

use log::debug;

use crate::{
    core::{
        context::ParsingContext,
        item::{RowConsumer, RowProducer, SessionOutcome},
        row::Row,
        schema::SchemaProvider,
    },
    error::TextResult,
};

/// Collects every parsed row.
#[derive(Debug, Default)]
pub struct RowListConsumer {
    headers: Option<Vec<String>>,
    rows: Vec<Row<'static>>,
}

impl RowListConsumer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn headers(&self) -> Option<&[String]> {
        self.headers.as_deref()
    }

    pub fn rows(&self) -> &[Row<'static>] {
        &self.rows
    }

    pub fn values(&self) -> Vec<Vec<Option<String>>> {
        self.rows.iter().map(Row::to_vec).collect()
    }

    pub fn into_rows(self) -> Vec<Row<'static>> {
        self.rows
    }
}

impl RowConsumer for RowListConsumer {
    fn open(&mut self, headers: Option<&[String]>, _context: &ParsingContext) -> TextResult<()> {
        self.headers = headers.map(<[String]>::to_vec);
        Ok(())
    }

    fn consume(&mut self, row: &Row<'_>, _context: &ParsingContext) -> TextResult<()> {
        self.rows.push(row.clone().into_owned());
        Ok(())
    }
}

/// Converts every parsed row into a record through a schema provider.
///
/// Rows the schema cannot convert are reported as conversion errors and
/// count against the session's error tolerance.
pub struct RecordListConsumer<T, S> {
    schema: S,
    records: Vec<T>,
    failed: bool,
    _marker: PhantomData<fn() -> T>,
}

impl<T, S: SchemaProvider<T>> RecordListConsumer<T, S> {
    pub fn new(schema: S) -> Self {
        Self {
            schema,
            records: Vec::new(),
            failed: false,
            _marker: PhantomData,
        }
    }

    pub fn records(&self) -> &[T] {
        &self.records
    }

    /// `true` if the session ended with an error.
    pub fn failed(&self) -> bool {
        self.failed
    }

    pub fn into_records(self) -> Vec<T> {
        self.records
    }
}

impl<T, S: SchemaProvider<T>> RowConsumer for RecordListConsumer<T, S> {
    fn consume(&mut self, row: &Row<'_>, _context: &ParsingContext) -> TextResult<()> {
        let record = self.schema.read_record(row)?;
        self.records.push(record);
        Ok(())
    }

    fn close(&mut self, outcome: SessionOutcome<'_>) {
        self.failed = matches!(outcome, SessionOutcome::Failed { .. });
        debug!("Collected {} records", self.records.len());
    }
}

/// Supplies rows from any iterator of value lists.
pub struct IterRowProducer<I> {
    headers: Option<Vec<String>>,
    rows: I,
}

impl<I> IterRowProducer<I>
where
    I: Iterator<Item = Vec<Option<String>>>,
{
    pub fn new(rows: I) -> Self {
        Self {
            headers: None,
            rows,
        }
    }

    pub fn with_headers(mut self, headers: &[&str]) -> Self {
        self.headers = Some(headers.iter().map(|h| h.to_string()).collect());
        self
    }
}

impl<I> RowProducer for IterRowProducer<I>
where
    I: Iterator<Item = Vec<Option<String>>>,
{
    fn headers(&self) -> Option<Vec<String>> {
        self.headers.clone()
    }

    fn next_row(&mut self) -> TextResult<Option<Vec<Option<String>>>> {
        Ok(self.rows.next())
    }
}
