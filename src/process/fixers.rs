//! Field-specific fixers applied after the generic value normalization.
//!
//! Every fixer is a pure transform over one or more canonical fields. Data
//! types declare an ordered table of them; see `Extractor::fixers`.

use std::sync::Arc;

use super::convert::{CanonicalRecord, RowError};
use super::date_parser::fix_date;
use super::lookups::{self, StatusTable, PLEBISCITE_CODE, PLEBISCITE_LABEL, REGION_SUBSTITUTIONS};
use super::utils::digits;

pub const DOCUMENT_DIGITS: usize = 11;

/// Taxpayer document: digits only, left-padded to eleven. All zeros, or more
/// digits than a document can hold, means no document.
pub fn fix_document(value: &str) -> String {
    let digits = digits(value);
    if digits.len() > DOCUMENT_DIGITS || digits.bytes().all(|b| b == b'0') {
        return String::new();
    }
    format!("{:0>width$}", digits, width = DOCUMENT_DIGITS)
}

pub fn fix_voter_id(value: &str) -> String {
    digits(value)
}

/// Undoes an upstream encoding artifact around apostrophes.
pub fn fix_name(value: &str) -> String {
    let value = value
        .replace(['`', '´', '\u{2018}', '\u{2019}'], "'")
        .replace("' ", "'");
    match value.chars().next() {
        Some(first) if "',.]".contains(first) => value[first.len_utf8()..].to_string(),
        _ => value,
    }
}

/// Exact-match substitution of retired jurisdiction codes; anything else
/// passes through untouched.
pub fn fix_region(value: &str) -> String {
    REGION_SUBSTITUTIONS
        .iter()
        .find(|(retired, _)| *retired == value)
        .map_or(value, |(_, current)| *current)
        .to_string()
}

pub fn fix_decimal(value: &str) -> String {
    value.replace(',', ".")
}

/// Date as `YYYY-MM-DD`, or empty when it cannot be trusted.
pub fn fix_date_value(value: &str) -> String {
    fix_date(value).unwrap_or_default()
}

/// Office `(code, description, question)` after normalization.
///
/// Code `91` is a plebiscite question: the description becomes the question
/// text. Any other description must be a known spelling; the code is then
/// derived from the canonical spelling.
pub fn fix_office(code: &str, description: &str) -> Result<(String, String, String), RowError> {
    if code == PLEBISCITE_CODE {
        return Ok((
            code.to_string(),
            PLEBISCITE_LABEL.to_string(),
            description.to_string(),
        ));
    }
    let (canonical, code) = lookups::office(description).ok_or_else(|| RowError::Lookup {
        table: "office description",
        value: description.to_string(),
    })?;
    Ok((code.to_string(), canonical.to_string(), String::new()))
}

/// Candidacy status pair re-mapped to the later taxonomy. An empty pair
/// passes through.
pub fn fix_status(
    table: &StatusTable,
    code: &str,
    description: &str,
) -> Result<(String, String), RowError> {
    if code.is_empty() && description.is_empty() {
        return Ok((String::new(), String::new()));
    }
    table
        .get(code, description)
        .map(|(c, d)| (c.to_string(), d.to_string()))
        .ok_or_else(|| RowError::Lookup {
            table: "candidacy status",
            value: format!("{} / {}", code, description),
        })
}

#[derive(Debug, Clone)]
pub enum FixerKind {
    /// A single-field string transform.
    Value {
        field: &'static str,
        apply: fn(&str) -> String,
    },
    /// Overwrites a field with a per-job constant.
    Constant { field: &'static str, value: String },
    Office {
        code: &'static str,
        description: &'static str,
        question: Option<&'static str>,
    },
    Status {
        code: &'static str,
        description: &'static str,
        table: Arc<StatusTable>,
    },
}

/// A named entry of a data type's fixer table.
#[derive(Debug, Clone)]
pub struct Fixer {
    pub name: &'static str,
    pub kind: FixerKind,
}

impl Fixer {
    pub fn value(name: &'static str, field: &'static str, apply: fn(&str) -> String) -> Self {
        Self {
            name,
            kind: FixerKind::Value { field, apply },
        }
    }

    pub fn constant(name: &'static str, field: &'static str, value: impl Into<String>) -> Self {
        Self {
            name,
            kind: FixerKind::Constant {
                field,
                value: value.into(),
            },
        }
    }

    pub fn office(code: &'static str, description: &'static str, question: Option<&'static str>) -> Self {
        Self {
            name: "office",
            kind: FixerKind::Office {
                code,
                description,
                question,
            },
        }
    }

    pub fn status(code: &'static str, description: &'static str, table: Arc<StatusTable>) -> Self {
        Self {
            name: "status",
            kind: FixerKind::Status {
                code,
                description,
                table,
            },
        }
    }

    /// Canonical fields this fixer reads or writes.
    pub fn fields(&self) -> Vec<&'static str> {
        match &self.kind {
            FixerKind::Value { field, .. } | FixerKind::Constant { field, .. } => vec![*field],
            FixerKind::Office {
                code,
                description,
                question,
            } => {
                let mut fields = vec![*code, *description];
                fields.extend(question);
                fields
            }
            FixerKind::Status {
                code, description, ..
            } => vec![*code, *description],
        }
    }

    pub fn apply(&self, record: &mut CanonicalRecord) -> Result<(), RowError> {
        match &self.kind {
            FixerKind::Value { field, apply } => {
                let fixed = apply(record.field(self.name, field)?);
                record.set_field(self.name, field, fixed)
            }
            FixerKind::Constant { field, value } => {
                record.set_field(self.name, field, value.clone())
            }
            FixerKind::Office {
                code,
                description,
                question,
            } => {
                let (new_code, new_description, new_question) = fix_office(
                    record.field(self.name, code)?,
                    record.field(self.name, description)?,
                )?;
                record.set_field(self.name, code, new_code)?;
                record.set_field(self.name, description, new_description)?;
                match question {
                    Some(question) => record.set_field(self.name, question, new_question),
                    None => Ok(()),
                }
            }
            FixerKind::Status {
                code,
                description,
                table,
            } => {
                let (new_code, new_description) = fix_status(
                    table,
                    record.field(self.name, code)?,
                    record.field(self.name, description)?,
                )?;
                record.set_field(self.name, code, new_code)?;
                record.set_field(self.name, description, new_description)
            }
        }
    }
}
