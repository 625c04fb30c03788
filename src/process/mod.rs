// src/process/mod.rs
//! Row normalization: the generic value pass, the fixers and their lookup tables.

pub mod convert;
pub mod date_parser;
pub mod fixers;
pub mod lookups;
pub mod utils;

pub use convert::{CanonicalRecord, RowConverter, RowError};
pub use fixers::{Fixer, FixerKind};
pub use lookups::StatusTable;
