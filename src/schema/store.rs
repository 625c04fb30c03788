use std::{
    collections::HashMap,
    fs,
    io::Cursor,
    path::{Path, PathBuf},
    sync::{Arc, PoisonError, RwLock},
};
use once_cell::sync::OnceCell;
use tracing::debug;

use super::{CanonicalSchema, FieldDefinition, YearSchema};
use crate::dialect::{decode, Dialect, TextEncoding};
use crate::error::NormalizeError;
use crate::process::lookups::{StatusTable, STATUS_TABLE_FILE};

/// Suffix of the canonical header file of a data type: `<prefix>-final.csv`.
pub const CANONICAL_ERA: &str = "final";

type CacheKey = (PathBuf, TextEncoding);

/// Process-wide cache of header definition files.
///
/// Files are parsed once per (path, encoding) and never invalidated; the
/// definitions do not change while the process runs, so concurrent jobs may
/// share one registry.
pub struct HeaderRegistry {
    dir: PathBuf,
    cache: RwLock<HashMap<CacheKey, Arc<Vec<FieldDefinition>>>>,
    status: OnceCell<Arc<StatusTable>>,
}

impl HeaderRegistry {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            cache: RwLock::new(HashMap::new()),
            status: OnceCell::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the year schema (`<prefix>-<era>.csv`) or canonical schema
    /// (`<prefix>-final.csv`) of a data type.
    pub fn schema_path(&self, prefix: &str, era: &str) -> PathBuf {
        self.dir.join(format!("{}-{}.csv", prefix, era))
    }

    /// Parsed rows of a header definition file, memoized.
    pub fn read_header(
        &self,
        path: &Path,
        encoding: TextEncoding,
    ) -> Result<Arc<Vec<FieldDefinition>>, NormalizeError> {
        let key = (path.to_path_buf(), encoding);
        if let Some(rows) = self
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return Ok(Arc::clone(rows));
        }

        let rows = Arc::new(parse_header_file(path, encoding)?);
        debug!(path = %path.display(), rows = rows.len(), "loaded header file");

        // a concurrent loader may have won the race; both parsed the same file
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        Ok(Arc::clone(cache.entry(key).or_insert(rows)))
    }

    pub fn year_schema(&self, prefix: &str, era: &str) -> Result<YearSchema, NormalizeError> {
        let path = self.schema_path(prefix, era);
        let rows = self.read_header(&path, TextEncoding::Utf8)?;
        YearSchema::new(era, rows.as_ref().clone())
            .map_err(|reason| NormalizeError::SchemaFile { path, reason })
    }

    pub fn canonical_schema(&self, prefix: &str) -> Result<CanonicalSchema, NormalizeError> {
        let path = self.schema_path(prefix, CANONICAL_ERA);
        let rows = self.read_header(&path, TextEncoding::Utf8)?;
        CanonicalSchema::new(&rows).map_err(|reason| NormalizeError::SchemaFile { path, reason })
    }

    /// Year schema of `era` together with the canonical schema of the data type.
    pub fn load(
        &self,
        prefix: &str,
        era: &str,
    ) -> Result<(YearSchema, CanonicalSchema), NormalizeError> {
        Ok((self.year_schema(prefix, era)?, self.canonical_schema(prefix)?))
    }

    /// Candidacy status table, loaded on first use.
    pub fn status_table(&self) -> Result<Arc<StatusTable>, NormalizeError> {
        self.status
            .get_or_try_init(|| StatusTable::load(&self.dir.join(STATUS_TABLE_FILE)).map(Arc::new))
            .map(Arc::clone)
    }

    /// Number of distinct files cached so far.
    pub fn cached_files(&self) -> usize {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

fn parse_header_file(
    path: &Path,
    encoding: TextEncoding,
) -> Result<Vec<FieldDefinition>, NormalizeError> {
    let bytes = fs::read(path).map_err(|e| NormalizeError::SchemaFile {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let text = decode(&bytes, encoding, &path.display().to_string())?;

    let mut rdr = Dialect::SCHEMA_FILE.header_reader(Cursor::new(text.into_bytes()));
    let mut rows = Vec::new();
    for (idx, result) in rdr.deserialize::<FieldDefinition>().enumerate() {
        let mut row = result.map_err(|e| NormalizeError::SchemaFile {
            path: path.to_path_buf(),
            reason: format!("row {}: {}", idx + 1, e),
        })?;
        row.raw_name = row.raw_name.trim().to_string();
        row.canonical_name = row.canonical_name.trim().to_string();
        rows.push(row);
    }
    Ok(rows)
}
