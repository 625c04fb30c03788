use super::{even_years, Extractor};
use crate::error::NormalizeError;
use crate::process::fixers::{fix_decimal, fix_region};
use crate::process::Fixer;
use crate::schema::{ElectionYear, HeaderRegistry, YearBuckets};

const ERAS: YearBuckets = YearBuckets(&[(2006, 2012, "2006"), (2014, 2018, "2014")]);

/// Assets declared by candidates (`bem_candidato`).
#[derive(Debug, Clone, Copy, Default)]
pub struct DeclaredAssets;

impl Extractor for DeclaredAssets {
    fn name(&self) -> &'static str {
        "bem-declarado"
    }

    fn years(&self) -> Vec<ElectionYear> {
        even_years(2006, 2018)
    }

    fn url_path(&self, year: ElectionYear) -> String {
        format!("bem_candidato/bem_candidato_{}.zip", year.year)
    }

    fn filename(&self, year: ElectionYear) -> String {
        format!("bem-declarado-{}.zip", year)
    }

    fn is_valid_member(&self, member: &str, _year: ElectionYear) -> bool {
        let name = member.to_lowercase();
        name.starts_with("bem_candidato") && !name.contains("_brasil.csv")
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
            Fixer::value("decimal", "valor", fix_decimal),
        ])
    }

    /// Election, geography, application, declared item.
    fn order_column(&self, name: &str) -> u8 {
        if name.ends_with("_eleicao") {
            0
        } else if name.ends_with("_ue") || name == "sigla_uf" {
            1
        } else if name == "numero_sequencial" {
            2
        } else {
            3
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn members_eras_and_order() {
        let year = ElectionYear::regular(2012);
        assert!(DeclaredAssets.is_valid_member("bem_candidato_2012_RJ.txt", year));
        assert!(!DeclaredAssets.is_valid_member("bem_candidato_2012_BRASIL.csv", year));
        assert_eq!(DeclaredAssets.header_era("", year).as_deref(), Some("2006"));
        assert_eq!(
            DeclaredAssets.header_era("", ElectionYear::regular(2018)).as_deref(),
            Some("2014")
        );
        assert_eq!(DeclaredAssets.header_era("", ElectionYear::regular(2004)), None);
        assert_eq!(DeclaredAssets.order_column("data_eleicao"), 0);
        assert_eq!(DeclaredAssets.order_column("numero_sequencial"), 2);
        assert_eq!(DeclaredAssets.order_column("valor"), 3);
    }
}
