use std::{fmt, path::PathBuf};
use thiserror::Error;

use crate::process::convert::RowError;
use crate::schema::ElectionYear;

/// The (data type, year) an extraction job is working on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobId {
    pub data_type: &'static str,
    pub year: ElectionYear,
}

impl JobId {
    pub fn new(data_type: &'static str, year: ElectionYear) -> Self {
        Self { data_type, year }
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.data_type, self.year)
    }
}

/// Every failure that aborts a (data type, year) extraction.
#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("{job}: configuration error: {reason}")]
    Config { job: JobId, reason: String },

    #[error("schema file {}: {reason}", path.display())]
    SchemaFile { path: PathBuf, reason: String },

    #[error("{job}: {member}: no {table} entry for {value:?}")]
    Lookup {
        job: JobId,
        member: String,
        table: &'static str,
        value: String,
    },

    #[error("{job}: {member} record {record}: expected {expected} columns, found {found}")]
    MalformedRecord {
        job: JobId,
        member: String,
        record: u64,
        expected: usize,
        found: usize,
    },

    #[error("{job}: {} is neither a ZIP nor a RAR archive", path.display())]
    ArchiveFormat { job: JobId, path: PathBuf },

    #[error("{job}: reading archive {}: {reason}", path.display())]
    Archive {
        job: JobId,
        path: PathBuf,
        reason: String,
    },

    #[error("{job}: {member} record {record}: CSV tokenization failed")]
    Csv {
        job: JobId,
        member: String,
        record: u64,
        #[source]
        source: csv::Error,
    },

    #[error("{context}: input is not valid {encoding}")]
    Decode {
        context: String,
        encoding: &'static str,
    },

    #[error("{context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl NormalizeError {
    /// Attaches job and position to a converter failure.
    pub fn from_row(job: JobId, member: &str, record: u64, err: RowError) -> Self {
        match err {
            RowError::ColumnCount { expected, found } => NormalizeError::MalformedRecord {
                job,
                member: member.to_string(),
                record,
                expected,
                found,
            },
            RowError::Lookup { table, value } => NormalizeError::Lookup {
                job,
                member: member.to_string(),
                table,
                value,
            },
            other @ RowError::UnknownField { .. } => NormalizeError::Config {
                job,
                reason: other.to_string(),
            },
        }
    }

    /// Re-labels a job-less failure (schema file, decoding) as a configuration
    /// error of `job`, keeping its message.
    pub fn in_job(self, job: JobId) -> Self {
        match self {
            err @ NormalizeError::SchemaFile { .. } => NormalizeError::Config {
                job,
                reason: err.to_string(),
            },
            other => other,
        }
    }
}
