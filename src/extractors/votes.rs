use super::{even_years, Extractor};
use crate::error::NormalizeError;
use crate::process::fixers::{fix_name, fix_region};
use crate::process::Fixer;
use crate::schema::{ElectionYear, HeaderRegistry, YearBuckets};

const ERAS: YearBuckets = YearBuckets(&[
    (1994, 2012, "1994"),
    (2014, 2016, "2014"),
    (2018, 2018, "2018"),
]);

/// Votes per candidate, municipality and zone (`votacao_candidato_munzona`).
#[derive(Debug, Clone, Copy, Default)]
pub struct VoteTally;

impl Extractor for VoteTally {
    fn name(&self) -> &'static str {
        "votacao-zona"
    }

    fn years(&self) -> Vec<ElectionYear> {
        even_years(1996, 2018)
    }

    fn url_path(&self, year: ElectionYear) -> String {
        format!(
            "votacao_candidato_munzona/votacao_candidato_munzona_{}.zip",
            year.year
        )
    }

    fn filename(&self, year: ElectionYear) -> String {
        format!("votacao-zona-{}.zip", year)
    }

    fn is_valid_member(&self, member: &str, _year: ElectionYear) -> bool {
        member.starts_with("votacao_candidato_munzona_")
    }

    fn header_era(&self, _member: &str, year: ElectionYear) -> Option<String> {
        ERAS.resolve(year.year).map(str::to_string)
    }

    fn fixers(
        &self,
        _year: ElectionYear,
        _registry: &HeaderRegistry,
    ) -> Result<Vec<Fixer>, NormalizeError> {
        Ok(vec![
            Fixer::value("region", "sigla_uf", fix_region),
            Fixer::value("name", "nome", fix_name),
            Fixer::office("codigo_cargo", "descricao_cargo", None),
        ])
    }

    /// Election, round, geography, party, application, votes.
    fn order_column(&self, name: &str) -> u8 {
        if name.ends_with("_eleicao") {
            0
        } else if name.ends_with("_turno") {
            1
        } else if ["_ue", "_uf", "_municipio"].iter().any(|s| name.ends_with(s)) {
            2
        } else if ["_legenda", "_coligacao", "_partido"]
            .iter()
            .any(|s| name.ends_with(s))
        {
            3
        } else if name.contains("zona") || name.contains("voto") {
            5
        } else {
            4
        }
    }
}
