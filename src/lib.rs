//! Schema reconciliation and row normalization for the electoral authority's
//! open data archives.

pub mod diagnose;
pub mod dialect;
pub mod error;
pub mod extract;
pub mod extractors;
pub mod fetch;
pub mod process;
pub mod schema;
pub mod settings;
pub mod sink;

pub use error::{JobId, NormalizeError};
pub use extract::{extract, ExtractRows};
pub use extractors::{DataType, Extractor};
pub use schema::{ElectionYear, HeaderRegistry};
