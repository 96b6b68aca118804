//! Core data types and I/O operations.

pub mod clock;
pub mod loaders;
pub mod writers;

pub use clock::ElapsedLog;
pub use loaders::{open_input, read_records, LoaderError, TimeStepRecord};
pub use writers::{write_type_counts, TypeCounts, WriteError};
