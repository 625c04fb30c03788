use std::borrow::Cow;

use super::{even_years, member_basename, Extractor};
use crate::dialect::{sniff_dialect, wrap_quoted_lines, Dialect};
use crate::error::NormalizeError;
use crate::process::Fixer;
use crate::schema::{ElectionYear, HeaderRegistry};

/// Output column holding the election year of a finance row.
pub const YEAR_COLUMN: &str = "ano_eleicao";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Movement {
    Revenue,
    Expense,
}

impl Movement {
    pub fn label(self) -> &'static str {
        match self {
            Movement::Revenue => "receita",
            Movement::Expense => "despesa",
        }
    }
}

/// Campaign finance filings (`prestacao_contas`), one movement type each.
///
/// Revenues and expenses ship in the same archive; the header era is
/// `<organization>-<year>`, the organization being read off the member name.
#[derive(Debug, Clone, Copy)]
pub struct Finance {
    pub movement: Movement,
}

/// Organization (`candidatos`, `comites`, `partidos`...) a member reports on,
/// following each year's naming convention.
pub fn organization(member: &str, base_year: u16) -> Option<String> {
    let name = member_basename(member);
    match base_year {
        2002 | 2004 | 2006 => Some(if name.contains("Comit") {
            "comites".to_string()
        } else {
            "candidatos".to_string()
        }),
        2010 => {
            let marker = if name.contains("Receitas") {
                "Receitas"
            } else {
                "Despesas"
            };
            let (_, rest) = name.split_once(marker)?;
            let org = rest
                .trim_end_matches(".txt")
                .trim_end_matches(".csv")
                .to_lowercase();
            (!org.is_empty()).then_some(org)
        }
        2008 | 2012 | 2014 | 2016 | 2018 => name
            .split('_')
            .nth(1)
            .filter(|org| !org.is_empty())
            .map(str::to_string),
        _ => None,
    }
}

impl Extractor for Finance {
    fn name(&self) -> &'static str {
        self.movement.label()
    }

    fn years(&self) -> Vec<ElectionYear> {
        let mut years = even_years(2002, 2018);
        years.push(ElectionYear::supplementary(2014));
        years.push(ElectionYear::supplementary(2016));
        years.sort();
        years
    }

    fn url_path(&self, year: ElectionYear) -> String {
        let release = match (year.year, year.supplementary) {
            (2014, true) => "contas_final_sup_2014".to_string(),
            (2016, true) => "contas_final_sup_2016".to_string(),
            (2012, false) | (2014, false) => format!("final_{}", year.year),
            (2016, false) => "contas_final_2016".to_string(),
            (2018, false) => "de_contas_eleitorais_candidatos_2018".to_string(),
            (y, _) => format!("contas_{}", y),
        };
        format!("prestacao_contas/prestacao_{}.zip", release)
    }

    fn filename(&self, year: ElectionYear) -> String {
        format!("prestacao-contas-{}.zip", year)
    }

    /// Movement type and text extension; national (`br`) and supplementary
    /// (`sup`) files only in the releases that need them.
    fn is_valid_member(&self, member: &str, year: ElectionYear) -> bool {
        let name = member.to_lowercase();
        let is_movement = name.contains(self.movement.label());
        let is_text = name.ends_with(".csv") || name.ends_with(".txt");
        let regional = !name.contains("br") || year.year == 2008;
        let regular_file = !name.contains("sup");
        is_movement && is_text && ((regional && regular_file) || year.supplementary)
    }

    /// Supplementary releases name members after their base year.
    fn header_era(&self, member: &str, year: ElectionYear) -> Option<String> {
        let base_year = if year.supplementary { 2014 } else { year.year };
        let org = organization(member, base_year)?;
        Some(format!("{}-{}", org, year))
    }

    /// Releases from 2010 on ship a header row, named in prose until 2016.
    fn header_markers(&self) -> &'static [&'static str] {
        &["UF", "SG_UF", "SG_UE_SUP", "SITUACAOCADASTRAL"]
    }

    /// 2004 and 2008 lines lose their outer quotes.
    fn repair_text<'a>(&self, text: &'a str, year: ElectionYear) -> Cow<'a, str> {
        if !year.supplementary && matches!(year.year, 2004 | 2008) {
            wrap_quoted_lines(text)
        } else {
            Cow::Borrowed(text)
        }
    }

    fn dialect(&self, text: &str) -> Dialect {
        sniff_dialect(text)
    }

    fn leading_columns(&self) -> &'static [&'static str] {
        &[YEAR_COLUMN]
    }

    fn fixers(
        &self,
        year: ElectionYear,
        _registry: &HeaderRegistry,
    ) -> Result<Vec<Fixer>, NormalizeError> {
        Ok(vec![Fixer::constant("election-year", YEAR_COLUMN, year.year.to_string())])
    }

    fn allows_rar(&self) -> bool {
        true
    }

    /// Geography, person, party, counterpart, movement.
    fn order_column(&self, name: &str) -> u8 {
        if name.contains("uf") || name.contains("ue") || name == "municipio" {
            0
        } else if name.contains("sequencial") || name.contains("candidato") {
            1
        } else if name.contains("partido") || name.contains("comite") {
            2
        } else if name.contains("doador") || name.contains("fornecedor") {
            3
        } else if ["receita", "despesa", "recurso"].iter().any(|s| name.contains(s)) {
            4
        } else {
            5
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REVENUE: Finance = Finance {
        movement: Movement::Revenue,
    };
    const EXPENSE: Finance = Finance {
        movement: Movement::Expense,
    };

    #[test]
    fn organization_follows_each_years_naming() {
        assert_eq!(organization("ReceitasCandidatos.txt", 2010).as_deref(), Some("candidatos"));
        assert_eq!(organization("2010/DespesasComites.txt", 2010).as_deref(), Some("comites"));
        assert_eq!(organization("Receitas.txt", 2010), None);
        assert_eq!(
            organization("receitas_partidos_2014_SP.txt", 2014).as_deref(),
            Some("partidos")
        );
        assert_eq!(organization("Receitas Comitê.csv", 2006).as_deref(), Some("comites"));
        assert_eq!(organization("Receitas Candidato.csv", 2002).as_deref(), Some("candidatos"));
        assert_eq!(organization("receitas.csv", 2012), None);
        assert_eq!(organization("receitas_candidatos.csv", 2000), None);
    }

    #[test]
    fn supplementary_eras_use_base_year_naming() {
        let year = ElectionYear::supplementary(2016);
        assert_eq!(
            REVENUE.header_era("receitas_candidatos_sup_2016_AC.txt", year).as_deref(),
            Some("candidatos-2016-suplementar")
        );
        assert_eq!(
            EXPENSE
                .header_era("DespesasCandidatos.txt", ElectionYear::regular(2010))
                .as_deref(),
            Some("candidatos-2010")
        );
    }

    #[test]
    fn member_validity() {
        let y2014 = ElectionYear::regular(2014);
        assert!(REVENUE.is_valid_member("receitas_candidatos_2014_AC.txt", y2014));
        assert!(!EXPENSE.is_valid_member("receitas_candidatos_2014_AC.txt", y2014));
        assert!(!REVENUE.is_valid_member("receitas_candidatos_2014_brasil.txt", y2014));
        assert!(!REVENUE.is_valid_member("receitas_candidatos_sup_2014_AC.txt", y2014));
        assert!(!REVENUE.is_valid_member("receitas_candidatos_2014_AC.pdf", y2014));

        // national files are the only 2008 layout
        let y2008 = ElectionYear::regular(2008);
        assert!(REVENUE.is_valid_member("receitas_candidatos_2008_brasil.csv", y2008));

        let sup = ElectionYear::supplementary(2014);
        assert!(REVENUE.is_valid_member("receitas_candidatos_sup_2014_brasil.txt", sup));
    }

    #[test]
    fn release_urls_and_filenames() {
        assert_eq!(
            REVENUE.url_path(ElectionYear::supplementary(2014)),
            "prestacao_contas/prestacao_contas_final_sup_2014.zip"
        );
        assert_eq!(
            REVENUE.url_path(ElectionYear::regular(2012)),
            "prestacao_contas/prestacao_final_2012.zip"
        );
        assert_eq!(
            REVENUE.url_path(ElectionYear::regular(2004)),
            "prestacao_contas/prestacao_contas_2004.zip"
        );
        assert_eq!(
            EXPENSE.filename(ElectionYear::supplementary(2016)),
            "prestacao-contas-2016-suplementar.zip"
        );
        assert_eq!(REVENUE.years().len(), 11);
    }

    #[test]
    fn repairs_only_the_broken_years() {
        let text = "AC\";\"1\n";
        assert!(matches!(
            REVENUE.repair_text(text, ElectionYear::regular(2006)),
            Cow::Borrowed(_)
        ));
        assert_eq!(
            REVENUE.repair_text(text, ElectionYear::regular(2008)),
            "\"AC\";\"1\"\n"
        );
    }

    #[test]
    fn column_ordering_buckets() {
        assert_eq!(REVENUE.order_column("sigla_uf"), 0);
        assert_eq!(REVENUE.order_column("numero_candidato"), 1);
        assert_eq!(REVENUE.order_column("sigla_partido"), 2);
        assert_eq!(REVENUE.order_column("nome_doador"), 3);
        assert_eq!(REVENUE.order_column("valor_receita"), 4);
        assert_eq!(REVENUE.order_column("cargo"), 5);
    }
}
