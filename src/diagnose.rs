//! Column-count diagnostic for raw data files.
//!
//! Every physical line is tokenized on its own, so a quoted field that spans
//! lines shows up as two short lines: that is usually the defect looked for.

use anyhow::{Context, Result};
use std::{fs, path::Path};
use tracing::{debug, instrument};

use crate::dialect::{decode, Dialect, TextEncoding};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMismatch {
    /// Zero-based line index; the header is line 0.
    pub line: usize,
    pub found: usize,
    pub raw: String,
    pub fields: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ColumnReport {
    /// Column count of the header line; `None` for an empty file.
    pub expected: Option<usize>,
    pub lines: usize,
    pub mismatches: Vec<ColumnMismatch>,
}

impl ColumnReport {
    pub fn is_clean(&self) -> bool {
        self.mismatches.is_empty()
    }
}

fn tokenize_line(dialect: &Dialect, line: &str) -> Vec<String> {
    let mut reader = dialect.raw_reader(line.as_bytes());
    match reader.records().next() {
        Some(Ok(record)) => record.iter().map(str::to_string).collect(),
        // an unbalanced quote still counts as what the tokenizer saw: nothing
        Some(Err(_)) | None => Vec::new(),
    }
}

/// Compares the field count of every line with the header line's.
pub fn count_columns(text: &str, dialect: Dialect) -> ColumnReport {
    let mut report = ColumnReport::default();
    for (idx, line) in text.lines().enumerate() {
        report.lines += 1;
        let fields = tokenize_line(&dialect, line);
        let Some(expected) = report.expected else {
            report.expected = Some(fields.len());
            continue;
        };
        if fields.len() != expected {
            report.mismatches.push(ColumnMismatch {
                line: idx,
                found: fields.len(),
                raw: line.to_string(),
                fields,
            });
        }
    }
    report
}

#[instrument(level = "info", skip(path), fields(path = %path.display()))]
pub fn count_columns_in_file(
    path: &Path,
    encoding: TextEncoding,
    dialect: Dialect,
) -> Result<ColumnReport> {
    let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let text = decode(&bytes, encoding, &path.display().to_string())?;
    let report = count_columns(&text, dialect);
    debug!(
        lines = report.lines,
        mismatches = report.mismatches.len(),
        "columns counted"
    );
    Ok(report)
}
