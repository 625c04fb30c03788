//! Text decoding, CSV dialects and the pre-tokenization repair filters.

pub mod decode;
pub mod repair;
pub mod sniff;

use csv::{Reader, ReaderBuilder, Terminator};
use std::io::Read;

pub use decode::{decode, TextEncoding};
pub use repair::{fix_wrong_quotes, wrap_quoted_lines};
pub use sniff::sniff_dialect;

/// Delimiter and quote character of a delimited text file.
///
/// Quoting is honoured only where present, the doubled quote is the only
/// escape, and records end at `\n` or `\r\n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dialect {
    pub delimiter: u8,
    pub quote: u8,
}

impl Dialect {
    /// Layout of the electoral authority's data files.
    pub const TSE: Dialect = Dialect {
        delimiter: b';',
        quote: b'"',
    };

    /// Layout of the header definition files shipped with this crate.
    pub const SCHEMA_FILE: Dialect = Dialect {
        delimiter: b',',
        quote: b'"',
    };

    fn builder(&self) -> ReaderBuilder {
        let mut builder = ReaderBuilder::new();
        builder
            .delimiter(self.delimiter)
            .quote(self.quote)
            .double_quote(true)
            .escape(None)
            .quoting(true)
            .terminator(Terminator::CRLF);
        builder
    }

    /// Reader yielding every line as a record, header line included.
    /// Field counts are not enforced here; the row converter checks them.
    pub fn raw_reader<R: Read>(&self, rdr: R) -> Reader<R> {
        self.builder()
            .has_headers(false)
            .flexible(true)
            .from_reader(rdr)
    }

    /// Reader treating the first line as column names (schema files).
    pub fn header_reader<R: Read>(&self, rdr: R) -> Reader<R> {
        self.builder()
            .has_headers(true)
            .flexible(true)
            .from_reader(rdr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tse_dialect_handles_doubled_quotes_and_mixed_line_endings() {
        let text = "\"1\";\"SONIA \"\"MEREU\"\"\";\"2\"\r\n\"3\";\"SEM ASPAS\";4\n";
        let mut rdr = Dialect::TSE.raw_reader(text.as_bytes());
        let rows: Vec<Vec<String>> = rdr
            .records()
            .map(|r| r.unwrap().iter().map(str::to_string).collect())
            .collect();
        assert_eq!(
            rows,
            vec![
                vec!["1", "SONIA \"MEREU\"", "2"],
                vec!["3", "SEM ASPAS", "4"],
            ]
        );
    }
}
