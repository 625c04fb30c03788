/// Sorted, inclusive year ranges, each mapped to the header era in force.
///
/// The authority changes column layouts only occasionally; one era covers
/// every election year between two layout changes.
#[derive(Debug, Clone, Copy)]
pub struct YearBuckets(pub &'static [(u16, u16, &'static str)]);

impl YearBuckets {
    pub fn resolve(&self, year: u16) -> Option<&'static str> {
        self.0
            .iter()
            .find(|(from, to, _)| (*from..=*to).contains(&year))
            .map(|(_, _, era)| *era)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BUCKETS: YearBuckets = YearBuckets(&[(1994, 2012, "1994"), (2014, 2016, "2014"), (2018, 2018, "2018")]);

    #[test]
    fn years_resolve_to_their_bucket() {
        assert_eq!(BUCKETS.resolve(1994), Some("1994"));
        assert_eq!(BUCKETS.resolve(2012), Some("1994"));
        assert_eq!(BUCKETS.resolve(2016), Some("2014"));
        assert_eq!(BUCKETS.resolve(2018), Some("2018"));
        assert_eq!(BUCKETS.resolve(2020), None);
        assert_eq!(BUCKETS.resolve(1990), None);
    }

    #[test]
    fn buckets_are_sorted_and_disjoint() {
        for pair in BUCKETS.0.windows(2) {
            assert!(pair[0].1 < pair[1].0);
        }
    }
}
