//! Canonical header builder: merges every era's year schema of a data type
//! into one documented canonical header.

use anyhow::{Context, Result};
use glob::glob;
use once_cell::sync::Lazy;
use regex::Regex;
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};
use tracing::{debug, info, warn};

use super::store::HeaderRegistry;
use super::types::{era_sort_key, FieldDefinition, YearSchema};
use super::write::write_canonical_header;
use crate::dialect::TextEncoding;

/// Era identifier inside a schema file name: from the first four-digit run
/// up to the extension.
static ERA_IN_FILE_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{4}.*)\.csv$").expect("static regex"));

/// Everything known about one canonical field across eras.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoricalFieldEntry {
    pub canonical_name: String,
    pub description: String,
    /// `(era, raw_name)` in merge order, one per distinct raw name.
    pub known_as: Vec<(String, String)>,
    /// First era the field appeared in, unless that is the baseline era.
    pub introduced_on: Option<String>,
}

impl HistoricalFieldEntry {
    /// Description with the historical names (and introduction era) appended;
    /// always ends with a period.
    pub fn documented_description(&self) -> String {
        let mut text = self.description.trim().trim_end_matches('.').to_string();
        let known_as = self
            .known_as
            .iter()
            .map(|(era, raw)| format!("{} ({})", raw, era))
            .collect::<Vec<_>>()
            .join(", ");
        if !known_as.is_empty() {
            if !text.is_empty() {
                text.push_str(". ");
            }
            text.push_str("Known upstream as: ");
            text.push_str(&known_as);
        }
        if let Some(era) = &self.introduced_on {
            if !text.is_empty() {
                text.push_str(". ");
            }
            text.push_str("Introduced in ");
            text.push_str(era);
        }
        if !text.ends_with('.') {
            text.push('.');
        }
        text
    }
}

/// Convergent merge of year schemas, fed in chronological era order.
#[derive(Debug, Default)]
pub struct HeaderHistory {
    baseline: Option<String>,
    entries: Vec<HistoricalFieldEntry>,
    index: HashMap<String, usize>,
}

impl HeaderHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one era in. The first era merged is the baseline.
    pub fn merge(&mut self, schema: &YearSchema) {
        let baseline = self
            .baseline
            .get_or_insert_with(|| schema.era.clone())
            .clone();

        for field in &schema.fields {
            if field.canonical_name.is_empty() {
                continue;
            }
            match self.index.get(&field.canonical_name) {
                Some(&idx) => {
                    let entry = &mut self.entries[idx];
                    if entry.description.is_empty() && !field.description.is_empty() {
                        entry.description = field.description.clone();
                    }
                    if !entry.known_as.iter().any(|(_, raw)| *raw == field.raw_name) {
                        entry
                            .known_as
                            .push((schema.era.clone(), field.raw_name.clone()));
                    }
                }
                None => {
                    self.index
                        .insert(field.canonical_name.clone(), self.entries.len());
                    self.entries.push(HistoricalFieldEntry {
                        canonical_name: field.canonical_name.clone(),
                        description: field.description.clone(),
                        known_as: vec![(schema.era.clone(), field.raw_name.clone())],
                        introduced_on: (schema.era != baseline).then(|| schema.era.clone()),
                    });
                }
            }
        }
    }

    pub fn get(&self, canonical_name: &str) -> Option<&HistoricalFieldEntry> {
        self.index.get(canonical_name).map(|&idx| &self.entries[idx])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries ordered by `(bucket(name), name)`.
    pub fn into_ordered<F>(self, bucket: F) -> Vec<HistoricalFieldEntry>
    where
        F: Fn(&str) -> u8,
    {
        let mut entries = self.entries;
        entries.sort_by(|a, b| {
            (bucket(&a.canonical_name), &a.canonical_name)
                .cmp(&(bucket(&b.canonical_name), &b.canonical_name))
        });
        entries
    }
}

/// Year schema files of `prefix` in `dir`, tagged with their era and sorted
/// chronologically (bare years before suffixed eras of the same year).
pub fn discover_era_files(dir: &Path, prefix: &str) -> Result<Vec<(String, PathBuf)>> {
    let pattern = format!(
        "{}/{}-*.csv",
        glob::Pattern::escape(&dir.to_string_lossy()),
        prefix
    );
    let mut files = Vec::new();
    for entry in glob(&pattern).context("invalid glob pattern for header discovery")? {
        let path = match entry {
            Ok(p) => p,
            Err(e) => {
                warn!("cannot read glob entry: {:?}", e);
                continue;
            }
        };
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        match ERA_IN_FILE_NAME.captures(name) {
            Some(caps) => files.push((caps[1].to_string(), path.clone())),
            None => debug!(file = name, "not a year schema file"),
        }
    }
    files.sort_by(|(era_a, path_a), (era_b, path_b)| {
        era_sort_key(era_a)
            .cmp(&era_sort_key(era_b))
            .then_with(|| path_a.cmp(path_b))
    });
    Ok(files)
}

/// Builds `<prefix>-final.csv` from every year schema of the data type and
/// returns the number of canonical fields written.
pub fn build_canonical_header<F>(
    registry: &HeaderRegistry,
    prefix: &str,
    bucket: F,
    out_path: &Path,
) -> Result<usize>
where
    F: Fn(&str) -> u8,
{
    let files = discover_era_files(registry.dir(), prefix)?;
    if files.is_empty() {
        anyhow::bail!(
            "no year schema files for `{}` in {}",
            prefix,
            registry.dir().display()
        );
    }

    let mut history = HeaderHistory::new();
    for (era, path) in &files {
        let rows = registry.read_header(path, TextEncoding::Utf8)?;
        let schema = YearSchema::new(era.clone(), rows.as_ref().clone())
            .map_err(|reason| anyhow::anyhow!("{}: {}", path.display(), reason))?;
        debug!(prefix, era = %era, columns = schema.fields.len(), "merging era");
        history.merge(&schema);
    }

    let rows: Vec<FieldDefinition> = history
        .into_ordered(bucket)
        .iter()
        .map(|entry| FieldDefinition {
            raw_name: String::new(),
            canonical_name: entry.canonical_name.clone(),
            description: entry.documented_description(),
        })
        .collect();
    write_canonical_header(out_path, &rows)
        .with_context(|| format!("writing canonical header for `{}`", prefix))?;

    info!(prefix, eras = files.len(), fields = rows.len(), path = %out_path.display(), "canonical header written");
    Ok(rows.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn schema(era: &str, fields: &[(&str, &str, &str)]) -> YearSchema {
        YearSchema::new(
            era,
            fields
                .iter()
                .map(|(raw, canonical, description)| FieldDefinition {
                    raw_name: raw.to_string(),
                    canonical_name: canonical.to_string(),
                    description: description.to_string(),
                })
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn merge_seeds_appends_and_marks_introductions() {
        let mut history = HeaderHistory::new();
        history.merge(&schema(
            "1996",
            &[
                ("SIGLA_UF", "sigla_uf", "Estado"),
                ("DATA_GERACAO", "", ""),
                ("CPF_CANDIDATO", "cpf", ""),
            ],
        ));
        history.merge(&schema(
            "2012",
            &[
                ("SIGLA_UF", "sigla_uf", ""),
                ("CPF_CANDIDATO", "cpf", "CPF do candidato"),
                ("NM_EMAIL", "email", "E-mail"),
            ],
        ));
        history.merge(&schema(
            "2018",
            &[
                ("SG_UF", "sigla_uf", ""),
                ("NR_CPF_CANDIDATO", "cpf", ""),
                ("NM_EMAIL", "email", ""),
            ],
        ));

        assert_eq!(history.len(), 3);
        let uf = history.get("sigla_uf").unwrap();
        assert_eq!(
            uf.known_as,
            vec![
                ("1996".to_string(), "SIGLA_UF".to_string()),
                ("2018".to_string(), "SG_UF".to_string()),
            ]
        );
        assert_eq!(uf.introduced_on, None);

        let email = history.get("email").unwrap();
        assert_eq!(email.introduced_on.as_deref(), Some("2012"));
        assert_eq!(email.known_as.len(), 1);

        // late description fills an empty seed
        assert_eq!(history.get("cpf").unwrap().description, "CPF do candidato");
    }

    #[test]
    fn history_only_grows_and_never_repeats_a_raw_name() {
        let eras = [
            schema("1994", &[("A", "a", ""), ("B", "b", "")]),
            schema("2014", &[("A", "a", ""), ("B2", "b", "")]),
            schema("2014-suplementar", &[("B2", "b", ""), ("B", "b", "")]),
            schema("2018", &[("A3", "a", ""), ("B3", "b", "")]),
        ];
        let mut history = HeaderHistory::new();
        let mut previous = HashMap::new();
        for era in &eras {
            history.merge(era);
            for name in ["a", "b"] {
                let entry = history.get(name).unwrap();
                let len = entry.known_as.len();
                assert!(len >= previous.get(name).copied().unwrap_or(0));
                previous.insert(name, len);

                let mut raws: Vec<&str> = entry.known_as.iter().map(|(_, r)| r.as_str()).collect();
                raws.sort();
                raws.dedup();
                assert_eq!(raws.len(), len);
            }
        }
        assert_eq!(previous["b"], 3);
    }

    #[test]
    fn documented_description_always_ends_with_a_period() {
        let entry = HistoricalFieldEntry {
            canonical_name: "email".into(),
            description: "E-mail do candidato.".into(),
            known_as: vec![("2012".into(), "NM_EMAIL".into())],
            introduced_on: Some("2012".into()),
        };
        assert_eq!(
            entry.documented_description(),
            "E-mail do candidato. Known upstream as: NM_EMAIL (2012). Introduced in 2012."
        );

        let bare = HistoricalFieldEntry {
            canonical_name: "x".into(),
            description: String::new(),
            known_as: vec![("1996".into(), "X".into()), ("2018".into(), "X_2".into())],
            introduced_on: None,
        };
        assert_eq!(
            bare.documented_description(),
            "Known upstream as: X (1996), X_2 (2018)."
        );
    }

    #[test]
    fn ordering_uses_bucket_then_name() {
        let mut history = HeaderHistory::new();
        history.merge(&schema(
            "2006",
            &[("V", "valor", ""), ("UF", "sigla_uf", ""), ("ANO", "ano_eleicao", "")],
        ));
        let ordered = history.into_ordered(|name| match name {
            "ano_eleicao" => 0,
            "sigla_uf" => 1,
            _ => 3,
        });
        let names: Vec<&str> = ordered.iter().map(|e| e.canonical_name.as_str()).collect();
        assert_eq!(names, vec!["ano_eleicao", "sigla_uf", "valor"]);
    }

    #[test]
    fn discovers_eras_in_chronological_order() -> Result<()> {
        let dir = tempdir()?;
        for name in [
            "receita-candidatos-2016.csv",
            "receita-candidatos-2014-suplementar.csv",
            "receita-comites-2014.csv",
            "receita-candidatos-2014.csv",
            "receita-final.csv",
            "despesa-candidatos-2014.csv",
        ] {
            fs::write(dir.path().join(name), "raw_name,canonical_name\n")?;
        }
        let files = discover_era_files(dir.path(), "receita")?;
        let found: Vec<(&str, String)> = files
            .iter()
            .map(|(era, path)| {
                (
                    era.as_str(),
                    path.file_name().unwrap().to_string_lossy().into_owned(),
                )
            })
            .collect();
        assert_eq!(
            found,
            vec![
                ("2014", "receita-candidatos-2014.csv".to_string()),
                ("2014", "receita-comites-2014.csv".to_string()),
                ("2014-suplementar", "receita-candidatos-2014-suplementar.csv".to_string()),
                ("2016", "receita-candidatos-2016.csv".to_string()),
            ]
        );
        Ok(())
    }

    #[test]
    fn builds_the_final_file_from_era_files() -> Result<()> {
        let dir = tempdir()?;
        fs::write(
            dir.path().join("bem-declarado-2006.csv"),
            "raw_name,canonical_name,description\nSIGLA_UF,sigla_uf,Estado\nVALOR_BEM,valor,Valor do bem\nDATA_GERACAO,,\n",
        )?;
        fs::write(
            dir.path().join("bem-declarado-2014.csv"),
            "raw_name,canonical_name,description\nSG_UF,sigla_uf,\nVR_BEM_CANDIDATO,valor,\nDT_ULTIMA_ATUALIZACAO,data_atualizacao,Data\n",
        )?;
        let registry = HeaderRegistry::new(dir.path());
        let out = dir.path().join("bem-declarado-final.csv");
        let written = build_canonical_header(&registry, "bem-declarado", |name| {
            if name == "sigla_uf" { 1 } else { 3 }
        }, &out)?;
        assert_eq!(written, 3);

        let canonical = registry.canonical_schema("bem-declarado")?;
        assert_eq!(canonical.names(), &["sigla_uf", "data_atualizacao", "valor"]);
        assert_eq!(
            canonical.description("valor"),
            Some("Valor do bem. Known upstream as: VALOR_BEM (2006), VR_BEM_CANDIDATO (2014).")
        );
        assert_eq!(
            canonical.description("data_atualizacao"),
            Some("Data. Known upstream as: DT_ULTIMA_ATUALIZACAO (2014). Introduced in 2014.")
        );
        Ok(())
    }

    #[test]
    fn missing_era_files_is_an_error() {
        let dir = tempdir().unwrap();
        let registry = HeaderRegistry::new(dir.path());
        let err = build_canonical_header(&registry, "votacao-zona", |_| 0, &dir.path().join("x.csv"))
            .unwrap_err();
        assert!(err.to_string().contains("votacao-zona"));
    }
}
