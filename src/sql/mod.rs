//! SQL Statement Classification
//!
//! Pure, total classification of SQL text into reads and writes, plus
//! script splitting for multi-statement payloads. Used by the write-path
//! guard before anything reaches the database.

mod classifier;

pub use classifier::{is_write, split_statements};
