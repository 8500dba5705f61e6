#![allow(dead_code)]

mod mocks;

pub use mocks::{MockFile, MockSource};

/// Values of every row, with absent values as `None`.
pub fn values<'a>(rows: impl IntoIterator<Item = &'a rowscan::core::row::Row<'static>>) -> Vec<Vec<Option<String>>> {
    rows.into_iter().map(|row| row.to_vec()).collect()
}

/// Rows made only of present values.
pub fn strings(rows: &[&[&str]]) -> Vec<Vec<Option<String>>> {
    rows.iter()
        .map(|row| row.iter().map(|value| Some(value.to_string())).collect())
        .collect()
}
