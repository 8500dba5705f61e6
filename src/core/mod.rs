/// Consumer, producer, tokenizer and escaper contracts.
pub mod item;

/// Buffered character source with line ending normalization.
pub mod input;

/// Buffered character sink committing whole rows.
pub mod output;

/// Raw and resolved rows.
pub mod row;

pub mod format;

pub mod selection;

/// Per-session cursor state, cancellation and session summaries.
pub mod context;

pub mod settings;

pub mod schema;

/// Read side of the row pipeline.
pub mod parser;

/// Write side of the row pipeline.
pub mod writer;
