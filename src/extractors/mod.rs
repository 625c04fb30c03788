//! One `Extractor` per published data type.

pub mod assets;
pub mod candidacy;
pub mod finance;
pub mod votes;

use clap::ValueEnum;
use std::{borrow::Cow, fmt};
use url::Url;

use crate::dialect::Dialect;
use crate::error::NormalizeError;
use crate::process::Fixer;
use crate::schema::{ElectionYear, HeaderRegistry};

pub use assets::DeclaredAssets;
pub use candidacy::Candidacy;
pub use finance::{Finance, Movement};
pub use votes::VoteTally;

/// Marker column of the self-describing header row some releases embed.
pub const ELECTION_YEAR_MARKER: &str = "ANO_ELEICAO";

/// Everything that differs between data types. The extraction state machine
/// in `crate::extract` is shared.
pub trait Extractor: Send + Sync {
    /// Data type name, used in logs, errors and output file names.
    fn name(&self) -> &'static str;

    /// Prefix of this data type's schema files in the headers directory.
    fn header_prefix(&self) -> &'static str {
        self.name()
    }

    /// Every election year this data type is published for.
    fn years(&self) -> Vec<ElectionYear>;

    /// Archive location relative to the authority's base URL.
    fn url_path(&self, year: ElectionYear) -> String;

    fn url(&self, base: &Url, year: ElectionYear) -> Result<Url, url::ParseError> {
        base.join(&self.url_path(year))
    }

    /// Local file name of the cached archive.
    fn filename(&self, year: ElectionYear) -> String;

    /// Whether an archive member holds rows of this data type.
    fn is_valid_member(&self, member: &str, year: ElectionYear) -> bool;

    /// Header era of `member`; `None` when the year has no known layout.
    fn header_era(&self, member: &str, year: ElectionYear) -> Option<String>;

    /// Column names that only ever appear in an embedded header row.
    fn header_markers(&self) -> &'static [&'static str] {
        &[ELECTION_YEAR_MARKER]
    }

    /// Text repair applied to a decoded member before tokenization.
    fn repair_text<'a>(&self, text: &'a str, _year: ElectionYear) -> Cow<'a, str> {
        Cow::Borrowed(text)
    }

    fn dialect(&self, _text: &str) -> Dialect {
        Dialect::TSE
    }

    /// Output columns placed before the canonical schema's own.
    fn leading_columns(&self) -> &'static [&'static str] {
        &[]
    }

    /// Output columns filled by fixers only, never read from a source file.
    fn derived_columns(&self) -> &'static [&'static str] {
        &[]
    }

    /// Ordered fixer table for `year`.
    fn fixers(
        &self,
        year: ElectionYear,
        registry: &HeaderRegistry,
    ) -> Result<Vec<Fixer>, NormalizeError>;

    /// Documentation bucket of a canonical column; columns sort by
    /// `(bucket, name)` in the canonical header.
    fn order_column(&self, name: &str) -> u8;

    /// Whether the archive may be a RAR instead of a ZIP.
    fn allows_rar(&self) -> bool {
        false
    }

    fn is_supported(&self, year: ElectionYear) -> bool {
        self.years().contains(&year)
    }
}

/// Even election years from `from` to `to`, inclusive.
pub(crate) fn even_years(from: u16, to: u16) -> Vec<ElectionYear> {
    (from..=to)
        .step_by(2)
        .map(ElectionYear::regular)
        .collect()
}

/// File name part of an archive member path.
pub fn member_basename(member: &str) -> &str {
    member.rsplit(['/', '\\']).next().unwrap_or(member)
}

static CANDIDACY: Candidacy = Candidacy;
static DECLARED_ASSETS: DeclaredAssets = DeclaredAssets;
static VOTE_TALLY: VoteTally = VoteTally;
static FINANCE_REVENUE: Finance = Finance {
    movement: Movement::Revenue,
};
static FINANCE_EXPENSE: Finance = Finance {
    movement: Movement::Expense,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, ValueEnum)]
pub enum DataType {
    Candidatura,
    BemDeclarado,
    VotacaoZona,
    Receita,
    Despesa,
}

impl DataType {
    pub const ALL: [DataType; 5] = [
        DataType::Candidatura,
        DataType::BemDeclarado,
        DataType::VotacaoZona,
        DataType::Receita,
        DataType::Despesa,
    ];

    pub fn extractor(self) -> &'static dyn Extractor {
        match self {
            DataType::Candidatura => &CANDIDACY,
            DataType::BemDeclarado => &DECLARED_ASSETS,
            DataType::VotacaoZona => &VOTE_TALLY,
            DataType::Receita => &FINANCE_REVENUE,
            DataType::Despesa => &FINANCE_EXPENSE,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extractor().name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn member_basename_drops_directories() {
        assert_eq!(member_basename("2010/ReceitasCandidatos.txt"), "ReceitasCandidatos.txt");
        assert_eq!(member_basename("x.csv"), "x.csv");
    }

    #[test]
    fn every_data_type_has_a_distinct_name_and_years() {
        let mut names: Vec<&str> = DataType::ALL.iter().map(|t| t.extractor().name()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), 5);
        for data_type in DataType::ALL {
            let extractor = data_type.extractor();
            let years = extractor.years();
            assert!(!years.is_empty());
            assert!(years.windows(2).all(|w| w[0] < w[1]), "{data_type}");
            assert_eq!(
                data_type.to_possible_value().unwrap().get_name(),
                extractor.name()
            );
        }
    }

    #[test]
    fn every_supported_year_has_a_header_era_and_url() {
        let base = Url::parse("http://agencia.tse.jus.br/estatistica/sead/odsele/").unwrap();
        // finance eras depend on member naming per year; covered in finance.rs
        let members = [
            (DataType::Candidatura, "consulta_cand_2010_AC.txt"),
            (DataType::BemDeclarado, "bem_candidato_2010_AC.txt"),
            (DataType::VotacaoZona, "votacao_candidato_munzona_2010_AC.txt"),
        ];
        for (data_type, member) in members {
            let extractor = data_type.extractor();
            for year in extractor.years() {
                assert!(
                    extractor.header_era(member, year).is_some(),
                    "{data_type} {year}"
                );
            }
        }
        for data_type in DataType::ALL {
            let extractor = data_type.extractor();
            for year in extractor.years() {
                let url = extractor.url(&base, year).unwrap();
                assert!(url.as_str().ends_with(".zip"), "{url}");
                assert!(url.as_str().starts_with(base.as_str()), "{url}");
            }
        }
    }
}
