//! Process-wide lookup tables used by the fixers.

use once_cell::sync::Lazy;
use serde::Deserialize;
use std::{collections::HashMap, fs, io::Cursor, path::Path};

use super::utils::normalize_value;
use crate::dialect::{decode, Dialect, TextEncoding};
use crate::error::NormalizeError;

/// Retired jurisdiction codes and their replacements.
pub const REGION_SUBSTITUTIONS: [(&str, &str); 2] = [("BH", "BA"), ("LB", "ZZ")];

/// Office code marking a plebiscite question instead of an office.
pub const PLEBISCITE_CODE: &str = "91";
pub const PLEBISCITE_LABEL: &str = "OPCAO PLEBISCITO";

/// Canonical office spelling to office code.
pub static OFFICE_CODES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("PRESIDENTE", "1"),
        ("VICE-PRESIDENTE", "2"),
        ("GOVERNADOR", "3"),
        ("VICE-GOVERNADOR", "4"),
        ("SENADOR", "5"),
        ("DEPUTADO FEDERAL", "6"),
        ("DEPUTADO ESTADUAL", "7"),
        ("DEPUTADO DISTRITAL", "8"),
        ("1O SUPLENTE SENADOR", "9"),
        ("2O SUPLENTE SENADOR", "10"),
        ("PREFEITO", "11"),
        ("VICE-PREFEITO", "12"),
        ("VEREADOR", "13"),
    ])
});

/// Normalized office description (as it reaches the fixers) to canonical spelling.
///
/// `1º` written as UTF-8 and read as Latin-1 becomes `1Âº`, which accent
/// stripping turns into `1AO`; some releases drop the ordinal sign entirely.
pub static OFFICE_SPELLINGS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    let mut map = HashMap::from([
        ("1O SUPLENTE", "1O SUPLENTE SENADOR"),
        ("1 SUPLENTE", "1O SUPLENTE SENADOR"),
        ("1 SUPLENTE SENADOR", "1O SUPLENTE SENADOR"),
        ("1AO SUPLENTE", "1O SUPLENTE SENADOR"),
        ("1AO SUPLENTE SENADOR", "1O SUPLENTE SENADOR"),
        ("2O SUPLENTE", "2O SUPLENTE SENADOR"),
        ("2 SUPLENTE", "2O SUPLENTE SENADOR"),
        ("2 SUPLENTE SENADOR", "2O SUPLENTE SENADOR"),
        ("2AO SUPLENTE", "2O SUPLENTE SENADOR"),
        ("2AO SUPLENTE SENADOR", "2O SUPLENTE SENADOR"),
        ("VICE PREFEITO", "VICE-PREFEITO"),
    ]);
    for &canonical in OFFICE_CODES.keys() {
        map.insert(canonical, canonical);
    }
    map
});

/// Canonical spelling and code of an office description, if known.
pub fn office(description: &str) -> Option<(&'static str, &'static str)> {
    let canonical = *OFFICE_SPELLINGS.get(description)?;
    let code = *OFFICE_CODES.get(canonical)?;
    Some((canonical, code))
}

#[derive(Debug, Deserialize)]
struct StatusRow {
    code: String,
    description: String,
    new_code: String,
    new_description: String,
}

/// Candidacy status re-mapping: `(code, description)` to the later taxonomy.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StatusTable {
    pairs: HashMap<(String, String), (String, String)>,
}

/// File name of the status table inside the headers directory.
pub const STATUS_TABLE_FILE: &str = "situacao-candidatura.csv";

impl StatusTable {
    /// Loads `code,description,new_code,new_description` rows (UTF-8).
    /// Keys are normalized the same way converted values are.
    pub fn load(path: &Path) -> Result<Self, NormalizeError> {
        let schema_err = |reason: String| NormalizeError::SchemaFile {
            path: path.to_path_buf(),
            reason,
        };
        let bytes = fs::read(path).map_err(|e| schema_err(e.to_string()))?;
        let text = decode(&bytes, TextEncoding::Utf8, &path.display().to_string())?;

        let mut table = StatusTable::default();
        let mut rdr = Dialect::SCHEMA_FILE.header_reader(Cursor::new(text.into_bytes()));
        for (idx, row) in rdr.deserialize::<StatusRow>().enumerate() {
            let row = row.map_err(|e| schema_err(format!("row {}: {}", idx + 1, e)))?;
            let key = (normalize_value(&row.code), normalize_value(&row.description));
            let value = (
                normalize_value(&row.new_code),
                normalize_value(&row.new_description),
            );
            if table.pairs.insert(key.clone(), value).is_some() {
                return Err(schema_err(format!(
                    "status pair ({}, {}) appears twice",
                    key.0, key.1
                )));
            }
        }
        Ok(table)
    }

    pub fn get(&self, code: &str, description: &str) -> Option<(&str, &str)> {
        self.pairs
            .get(&(code.to_string(), description.to_string()))
            .map(|(c, d)| (c.as_str(), d.as_str()))
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

impl FromIterator<((String, String), (String, String))> for StatusTable {
    fn from_iter<T: IntoIterator<Item = ((String, String), (String, String))>>(iter: T) -> Self {
        Self {
            pairs: iter.into_iter().collect(),
        }
    }
}
