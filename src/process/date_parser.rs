use chrono::{Datelike, NaiveDate, Utc};

/// Input layouts tried in order; the first that parses wins. Two-digit years
/// land in the past: a `%y` year after the current one is moved back a century.
const DATE_PATTERNS: [&str; 6] = [
    "%d/%m/%y",
    "%d/%m/%Y",
    "%Y-%m-%d",
    "%Y%m%d",
    "%d%m%Y",
    "%d-%b-%y",
];

fn is_placeholder(s: &str) -> bool {
    s.is_empty()
        || s.starts_with("XX")
        || s.chars().all(|c| c == '0' || !c.is_ascii_alphanumeric())
}

/// Normalizes a date to `YYYY-MM-DD`, or `None` when it cannot be trusted.
///
/// The year is written unpadded, so a three-digit year (a century lost
/// upstream, e.g. `941`) gets its leading `1` restored when it starts with
/// `9`; anything else not exactly ten characters long is rejected.
pub fn fix_date(value: &str) -> Option<String> {
    let s = value.trim();
    if is_placeholder(s) {
        return None;
    }

    let (pattern, mut date) = DATE_PATTERNS
        .iter()
        .find_map(|pattern| Some((*pattern, NaiveDate::parse_from_str(s, pattern).ok()?)))?;
    if pattern.contains("%y") && date.year() > Utc::now().year() {
        date = date.with_year(date.year() - 100)?;
    }

    let mut iso = format!("{}-{:02}-{:02}", date.year(), date.month(), date.day());
    if iso.len() == 9 && iso.starts_with('9') {
        iso.insert(0, '1');
    }
    (iso.len() == 10).then_some(iso)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepted_layouts_become_iso_dates() {
        assert_eq!(fix_date("03/09/1941").as_deref(), Some("1941-09-03"));
        assert_eq!(fix_date("1941-09-03").as_deref(), Some("1941-09-03"));
        assert_eq!(fix_date("19410903").as_deref(), Some("1941-09-03"));
        assert_eq!(fix_date("03091941").as_deref(), Some("1941-09-03"));
        assert_eq!(fix_date("03/09/98").as_deref(), Some("1998-09-03"));
        assert_eq!(fix_date("03-SEP-98").as_deref(), Some("1998-09-03"));
        assert_eq!(fix_date(" 25/12/2004 ").as_deref(), Some("2004-12-25"));
    }

    #[test]
    fn two_digit_years_are_never_in_the_future() {
        assert_eq!(fix_date("25/12/45").as_deref(), Some("1945-12-25"));
        assert_eq!(fix_date("07-JUL-60").as_deref(), Some("1960-07-07"));
        assert_eq!(fix_date("01/10/18").as_deref(), Some("2018-10-01"));
        assert_eq!(fix_date("03/09/98").as_deref(), Some("1998-09-03"));
    }

    #[test]
    fn lost_century_gets_its_one_back() {
        assert_eq!(fix_date("03/09/941").as_deref(), Some("1941-09-03"));
        assert_eq!(fix_date("941-09-03").as_deref(), Some("1941-09-03"));
    }

    #[test]
    fn untrustworthy_dates_are_rejected() {
        for value in ["", "00/00/0000", "00000000", "XX/XX/XXXX", "XX/XX/", "31/02/2000"] {
            assert_eq!(fix_date(value), None, "{value:?}");
        }
        // three-digit years outside the lost-century shape
        assert_eq!(fix_date("03/09/841"), None);
        // five-digit years never make a ten-character date
        assert_eq!(fix_date("+19410-09-03"), None);
    }

    #[test]
    fn output_is_always_ten_characters() {
        for value in ["1/1/1", "01/01/0001", "12/31/1999", "1999", "ABC", "7/7/77"] {
            if let Some(date) = fix_date(value) {
                assert_eq!(date.len(), 10, "{value:?} -> {date}");
            }
        }
    }
}
