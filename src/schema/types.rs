// src/schema/types.rs

use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fmt, str::FromStr};

/// One row of a year schema or canonical schema file.
///
/// Year schema files carry `raw_name,canonical_name[,description]`; the canonical
/// file carries `canonical_name,description`. The legacy Portuguese column names
/// (`nome_tse`, `nome_final`, `descricao`) are accepted as aliases.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Eq, Hash, Default)]
pub struct FieldDefinition {
    #[serde(default, alias = "nome_tse")]
    pub raw_name: String,
    #[serde(default, alias = "nome_final")]
    pub canonical_name: String,
    #[serde(default, alias = "descricao")]
    pub description: String,
}

impl FieldDefinition {
    pub fn new(raw_name: &str, canonical_name: &str) -> Self {
        Self {
            raw_name: raw_name.to_string(),
            canonical_name: canonical_name.to_string(),
            description: String::new(),
        }
    }

    /// Name this column is keyed by once read: the canonical name when the
    /// column is kept, otherwise the raw name.
    pub fn resolved_name(&self) -> &str {
        if self.canonical_name.is_empty() {
            &self.raw_name
        } else {
            &self.canonical_name
        }
    }
}

/// An election year, optionally the supplementary release of that year.
///
/// Orders by year first, with the supplementary release right after its base year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElectionYear {
    pub year: u16,
    pub supplementary: bool,
}

pub const SUPPLEMENTARY_SUFFIX: &str = "-suplementar";

impl ElectionYear {
    pub const fn regular(year: u16) -> Self {
        Self {
            year,
            supplementary: false,
        }
    }

    pub const fn supplementary(year: u16) -> Self {
        Self {
            year,
            supplementary: true,
        }
    }
}

impl fmt::Display for ElectionYear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.supplementary {
            write!(f, "{}{}", self.year, SUPPLEMENTARY_SUFFIX)
        } else {
            write!(f, "{}", self.year)
        }
    }
}

impl FromStr for ElectionYear {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (digits, supplementary) = match s.strip_suffix(SUPPLEMENTARY_SUFFIX) {
            Some(base) => (base, true),
            None => (s, false),
        };
        let year = digits
            .parse::<u16>()
            .map_err(|_| format!("invalid election year `{}`", s))?;
        Ok(Self {
            year,
            supplementary,
        })
    }
}

/// Sort key for a header era identifier such as `1996`, `2014-suplementar`
/// or `1994-PI`: the leading year, then the suffix, with bare years first.
pub fn era_sort_key(era: &str) -> (u32, &str) {
    let digits = era.chars().take_while(|c| c.is_ascii_digit()).count();
    let year = era[..digits].parse::<u32>().unwrap_or(u32::MAX);
    (year, &era[digits..])
}

/// Raw column layout for one (data type, header era).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YearSchema {
    pub era: String,
    pub fields: Vec<FieldDefinition>,
}

impl YearSchema {
    /// Builds a year schema, rejecting duplicate raw names.
    pub fn new(era: impl Into<String>, fields: Vec<FieldDefinition>) -> Result<Self, String> {
        let mut seen = HashMap::with_capacity(fields.len());
        for (idx, field) in fields.iter().enumerate() {
            if let Some(prev) = seen.insert(field.raw_name.as_str(), idx) {
                return Err(format!(
                    "raw name `{}` appears twice (rows {} and {})",
                    field.raw_name,
                    prev + 1,
                    idx + 1
                ));
            }
        }
        Ok(Self {
            era: era.into(),
            fields,
        })
    }

    /// Column names in file order, keyed the way the converter looks them up.
    pub fn column_names(&self) -> Vec<String> {
        self.fields
            .iter()
            .map(|f| f.resolved_name().to_string())
            .collect()
    }

    /// Maps an embedded header row (raw names, in the order the file ships
    /// them) onto resolved column names. Fails on the first raw name this
    /// schema does not know.
    pub fn resolve_embedded<S: AsRef<str>>(&self, header: &[S]) -> Result<Vec<String>, String> {
        let by_raw: HashMap<&str, &str> = self
            .fields
            .iter()
            .map(|f| (f.raw_name.as_str(), f.resolved_name()))
            .collect();
        header
            .iter()
            .map(|name| {
                let name = name.as_ref().trim();
                by_raw
                    .get(name)
                    .map(|resolved| resolved.to_string())
                    .ok_or_else(|| {
                        format!(
                            "embedded header column `{}` is not in header era {}",
                            name, self.era
                        )
                    })
            })
            .collect()
    }
}

/// Stable output contract of a data type: column order and the full field set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalSchema {
    names: Vec<String>,
    descriptions: Vec<String>,
    index: HashMap<String, usize>,
}

impl CanonicalSchema {
    /// Builds the schema from canonical file rows; rows without a canonical name
    /// are ignored, duplicated canonical names are rejected.
    pub fn new(fields: &[FieldDefinition]) -> Result<Self, String> {
        let mut schema = Self {
            names: Vec::with_capacity(fields.len()),
            descriptions: Vec::with_capacity(fields.len()),
            index: HashMap::with_capacity(fields.len()),
        };
        for field in fields.iter().filter(|f| !f.canonical_name.is_empty()) {
            schema.push(&field.canonical_name, &field.description)?;
        }
        Ok(schema)
    }

    fn push(&mut self, name: &str, description: &str) -> Result<(), String> {
        if self.index.contains_key(name) {
            return Err(format!("canonical name `{}` appears twice", name));
        }
        self.index.insert(name.to_string(), self.names.len());
        self.names.push(name.to_string());
        self.descriptions.push(description.to_string());
        Ok(())
    }

    /// Returns a copy with `leading` columns placed before every other field.
    pub fn with_leading_fields(&self, leading: &[&str]) -> Result<Self, String> {
        if leading.is_empty() {
            return Ok(self.clone());
        }
        let mut schema = Self {
            names: Vec::with_capacity(self.len() + leading.len()),
            descriptions: Vec::with_capacity(self.len() + leading.len()),
            index: HashMap::with_capacity(self.len() + leading.len()),
        };
        for name in leading {
            schema.push(name, "")?;
        }
        for (name, description) in self.names.iter().zip(&self.descriptions) {
            schema.push(name, description)?;
        }
        Ok(schema)
    }

    /// Returns a copy with `trailing` columns appended after every other
    /// field; names the schema already has are left where they are.
    pub fn with_trailing_fields(&self, trailing: &[&str]) -> Self {
        let mut schema = self.clone();
        for name in trailing {
            if !schema.contains(name) {
                // cannot fail: the name was just checked
                let _ = schema.push(name, "");
            }
        }
        schema
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn description(&self, name: &str) -> Option<&str> {
        self.position(name).map(|idx| self.descriptions[idx].as_str())
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
