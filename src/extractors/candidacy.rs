use std::borrow::Cow;

use super::{even_years, Extractor};
use crate::dialect::fix_wrong_quotes;
use crate::error::NormalizeError;
use crate::process::fixers::{fix_date_value, fix_document, fix_name, fix_region, fix_voter_id};
use crate::process::Fixer;
use crate::schema::{ElectionYear, HeaderRegistry, YearBuckets};

const ERAS: YearBuckets = YearBuckets(&[
    (1996, 2010, "1996"),
    (2012, 2012, "2012"),
    (2014, 2018, "2018"),
]);

/// Candidacy rolls (`consulta_cand`).
#[derive(Debug, Clone, Copy, Default)]
pub struct Candidacy;

impl Extractor for Candidacy {
    fn name(&self) -> &'static str {
        "candidatura"
    }

    fn years(&self) -> Vec<ElectionYear> {
        even_years(1996, 2018)
    }

    fn url_path(&self, year: ElectionYear) -> String {
        format!("consulta_cand/consulta_cand_{}.zip", year.year)
    }

    fn filename(&self, year: ElectionYear) -> String {
        format!("candidatura-{}.zip", year)
    }

    fn is_valid_member(&self, member: &str, _year: ElectionYear) -> bool {
        let name = member.to_lowercase();
        name.starts_with("consulta_cand_") && !name.contains("_brasil.csv")
    }

    fn header_era(&self, _member: &str, year: ElectionYear) -> Option<String> {
        ERAS.resolve(year.year).map(str::to_string)
    }

    /// Some state files escape embedded quotes wrongly.
    fn repair_text<'a>(&self, text: &'a str, _year: ElectionYear) -> Cow<'a, str> {
        fix_wrong_quotes(text)
    }

    /// Plebiscite question, split off the office description.
    fn derived_columns(&self) -> &'static [&'static str] {
        &["pergunta"]
    }

    fn fixers(
        &self,
        _year: ElectionYear,
        registry: &HeaderRegistry,
    ) -> Result<Vec<Fixer>, NormalizeError> {
        Ok(vec![
            Fixer::value("document", "cpf", fix_document),
            Fixer::value("name", "nome", fix_name),
            Fixer::value("region", "sigla_uf", fix_region),
            Fixer::value("region", "sigla_uf_nascimento", fix_region),
            Fixer::value("voter-id", "titulo_eleitoral", fix_voter_id),
            Fixer::value("date", "data_nascimento", fix_date_value),
            Fixer::office("codigo_cargo", "descricao_cargo", Some("pergunta")),
            Fixer::status(
                "codigo_situacao_candidatura",
                "descricao_situacao_candidatura",
                registry.status_table()?,
            ),
        ])
    }

    /// Election, round, geography, person, party, application.
    fn order_column(&self, name: &str) -> u8 {
        if name.contains("eleicao") && !name.contains("idade") && !name.contains("reeleicao") {
            0
        } else if name.contains("turno") {
            1
        } else if name.ends_with("_ue") || name == "sigla_uf" {
            2
        } else if name.contains("titulo") {
            3
        } else if ["coligacao", "legenda", "partido", "agremiacao"]
            .iter()
            .any(|part| name.contains(part))
        {
            4
        } else if ["candidat", "cargo", "reeleicao", "despesa", "declara", "urna", "posse"]
            .iter()
            .any(|part| name.contains(part))
            || name == "idade_data_eleicao"
            || name == "numero_sequencial"
        {
            5
        } else {
            3
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn member_filter_skips_national_files() {
        let year = ElectionYear::regular(2014);
        assert!(Candidacy.is_valid_member("consulta_cand_2014_SP.txt", year));
        assert!(Candidacy.is_valid_member("CONSULTA_CAND_2014_AC.TXT", year));
        assert!(!Candidacy.is_valid_member("consulta_cand_2014_BRASIL.csv", year));
        assert!(!Candidacy.is_valid_member("leiame.pdf", year));
    }

    #[test]
    fn eras_follow_layout_changes() {
        let era = |y| Candidacy.header_era("consulta_cand_x_SP.txt", ElectionYear::regular(y));
        assert_eq!(era(1996).as_deref(), Some("1996"));
        assert_eq!(era(2010).as_deref(), Some("1996"));
        assert_eq!(era(2012).as_deref(), Some("2012"));
        assert_eq!(era(2016).as_deref(), Some("2018"));
        assert_eq!(era(1994), None);
        assert_eq!(era(2020), None);
    }

    #[test]
    fn locations() {
        let year = ElectionYear::regular(2018);
        assert_eq!(Candidacy.url_path(year), "consulta_cand/consulta_cand_2018.zip");
        assert_eq!(Candidacy.filename(year), "candidatura-2018.zip");
    }

    #[test]
    fn column_ordering_buckets() {
        assert_eq!(Candidacy.order_column("ano_eleicao"), 0);
        assert_eq!(Candidacy.order_column("idade_data_eleicao"), 5);
        assert_eq!(Candidacy.order_column("numero_turno"), 1);
        assert_eq!(Candidacy.order_column("sigla_ue"), 2);
        assert_eq!(Candidacy.order_column("titulo_eleitoral"), 3);
        assert_eq!(Candidacy.order_column("sigla_partido"), 4);
        assert_eq!(Candidacy.order_column("codigo_cargo"), 5);
        assert_eq!(Candidacy.order_column("nome"), 3);
    }
}
