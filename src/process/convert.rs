use std::{collections::HashMap, fmt, sync::Arc};
use thiserror::Error;

use super::fixers::Fixer;
use super::utils::normalize_value;
use crate::schema::CanonicalSchema;

/// Marker of the progress line a streaming download tool appends to files.
pub const PROGRESS_MARKER: &str = "elapsed";

/// Why a single raw record could not be converted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RowError {
    #[error("expected {expected} columns, found {found}")]
    ColumnCount { expected: usize, found: usize },

    #[error("no {table} entry for {value:?}")]
    Lookup { table: &'static str, value: String },

    #[error("fixer `{fixer}` refers to `{field}`, which is not a canonical field")]
    UnknownField { fixer: &'static str, field: String },
}

/// One output row: a value for every canonical field, in canonical order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalRecord {
    schema: Arc<CanonicalSchema>,
    values: Vec<String>,
}

impl CanonicalRecord {
    pub fn schema(&self) -> &Arc<CanonicalSchema> {
        &self.schema
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.schema
            .position(name)
            .map(|idx| self.values[idx].as_str())
    }

    /// Replaces the value of `name`; returns false when it is not canonical.
    pub fn set(&mut self, name: &str, value: String) -> bool {
        match self.schema.position(name) {
            Some(idx) => {
                self.values[idx] = value;
                true
            }
            None => false,
        }
    }

    pub(crate) fn field(&self, fixer: &'static str, name: &str) -> Result<&str, RowError> {
        self.get(name).ok_or_else(|| RowError::UnknownField {
            fixer,
            field: name.to_string(),
        })
    }

    pub(crate) fn set_field(
        &mut self,
        fixer: &'static str,
        name: &str,
        value: String,
    ) -> Result<(), RowError> {
        if self.set(name, value) {
            Ok(())
        } else {
            Err(RowError::UnknownField {
                fixer,
                field: name.to_string(),
            })
        }
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn into_values(self) -> Vec<String> {
        self.values
    }

    /// `(canonical name, value)` pairs in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.schema
            .names()
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().map(String::as_str))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Turns raw records of one column layout into canonical records.
///
/// Built once per (column layout, canonical schema); a layout change (an
/// embedded header) means building a new converter.
#[derive(Clone)]
pub struct RowConverter {
    canonical: Arc<CanonicalSchema>,
    /// For every canonical field, the raw column feeding it, if any.
    sources: Vec<Option<usize>>,
    width: usize,
    fixers: Arc<[Fixer]>,
}

impl fmt::Debug for RowConverter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RowConverter")
            .field("width", &self.width)
            .field("canonical", &self.canonical.names())
            .field("fixers", &self.fixers.iter().map(|x| x.name).collect::<Vec<_>>())
            .finish()
    }
}

impl RowConverter {
    /// `columns` are the resolved names of the raw columns in file order.
    /// Fails when a fixer names a field the canonical schema lacks.
    pub fn new<S: AsRef<str>>(
        columns: &[S],
        canonical: Arc<CanonicalSchema>,
        fixers: Arc<[Fixer]>,
    ) -> Result<Self, RowError> {
        for fixer in fixers.iter() {
            if let Some(missing) = fixer.fields().into_iter().find(|f| !canonical.contains(f)) {
                return Err(RowError::UnknownField {
                    fixer: fixer.name,
                    field: missing.to_string(),
                });
            }
        }

        // a repeated name keeps its last column, as a name->value map would
        let mut by_name: HashMap<&str, usize> = HashMap::with_capacity(columns.len());
        for (idx, name) in columns.iter().enumerate() {
            by_name.insert(name.as_ref(), idx);
        }
        let sources = canonical
            .names()
            .iter()
            .map(|name| by_name.get(name.as_str()).copied())
            .collect();

        Ok(Self {
            sources,
            width: columns.len(),
            canonical,
            fixers,
        })
    }

    pub fn canonical(&self) -> &Arc<CanonicalSchema> {
        &self.canonical
    }

    /// `Ok(None)` for records that carry no data: the download tool's
    /// progress trailer and the lone empty field of a blank line.
    pub fn convert<S: AsRef<str>>(&self, raw: &[S]) -> Result<Option<CanonicalRecord>, RowError> {
        if raw.len() == 1 && self.width != 1 {
            let only = raw[0].as_ref();
            if only.trim().is_empty() || only.to_lowercase().contains(PROGRESS_MARKER) {
                return Ok(None);
            }
        }
        if raw.len() != self.width {
            return Err(RowError::ColumnCount {
                expected: self.width,
                found: raw.len(),
            });
        }

        let values = self
            .sources
            .iter()
            .map(|source| match source {
                Some(idx) => normalize_value(raw[*idx].as_ref()),
                None => String::new(),
            })
            .collect();
        let mut record = CanonicalRecord {
            schema: Arc::clone(&self.canonical),
            values,
        };
        for fixer in self.fixers.iter() {
            fixer.apply(&mut record)?;
        }
        Ok(Some(record))
    }
}
