#[cfg(feature = "csv")]
/// This module provides the CSV format: tokenizer, escaper and builders.
pub mod csv;

#[cfg(feature = "tsv")]
/// This module provides the TSV format: tokenizer, escaper and builders.
pub mod tsv;

#[cfg(feature = "fixed-width")]
/// This module provides the fixed-width format: tokenizer, escaper and builders.
pub mod fixed_width;

/// Row consumers and producers collecting to and from memory.
pub mod collect;

#[cfg(feature = "logger")]
/// This module provides a row consumer logging every row, useful for debugging purposes.
pub mod logger;
