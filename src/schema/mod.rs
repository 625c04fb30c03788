pub mod buckets;
pub mod evolution;
pub mod store;
pub mod types;
pub mod write;

pub use buckets::YearBuckets;
pub use evolution::{build_canonical_header, discover_era_files, HeaderHistory, HistoricalFieldEntry};
pub use store::{HeaderRegistry, CANONICAL_ERA};
pub use types::{era_sort_key, CanonicalSchema, ElectionYear, FieldDefinition, YearSchema};
pub use write::write_canonical_header;
