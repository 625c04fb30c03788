//! Row sinks: where canonical rows of one data type end up.
//!
//! A sink receives the rows of one year at a time. A year is either
//! committed or rolled back as a whole, so a job that fails halfway leaves
//! no partial rows behind.

pub mod csv;
pub mod parquet;

use anyhow::{bail, Result};
use clap::ValueEnum;
use std::path::{Path, PathBuf};

use crate::process::CanonicalRecord;
use crate::schema::ElectionYear;

pub use self::csv::CsvSink;
pub use self::parquet::ParquetSink;

pub trait RowSink: Send {
    fn begin_year(&mut self, year: ElectionYear) -> Result<()>;

    fn write_record(&mut self, record: &CanonicalRecord) -> Result<()>;

    /// Makes the rows written since `begin_year` part of the output.
    fn commit_year(&mut self) -> Result<()>;

    /// Discards the rows written since `begin_year`.
    fn rollback_year(&mut self) -> Result<()>;

    /// Closes the output and returns where it was written.
    fn finish(self: Box<Self>) -> Result<PathBuf>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Csv,
    Parquet,
}

/// Sink writing the rows of data type `prefix` under `out_dir`.
pub fn open_sink(format: OutputFormat, out_dir: &Path, prefix: &str) -> Result<Box<dyn RowSink>> {
    Ok(match format {
        OutputFormat::Csv => Box::new(CsvSink::create(out_dir.join(format!("{}.csv", prefix)))?),
        OutputFormat::Parquet => Box::new(ParquetSink::create(out_dir.join(prefix), prefix)?),
    })
}

/// Fails when `record` does not follow the column layout `header`.
pub(crate) fn check_layout(header: &[String], record: &CanonicalRecord) -> Result<()> {
    let names = record.schema().names();
    if names != header {
        bail!(
            "record layout changed: expected {} columns starting with {:?}, got {} starting with {:?}",
            header.len(),
            header.first(),
            names.len(),
            names.first()
        );
    }
    Ok(())
}
