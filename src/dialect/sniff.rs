use super::Dialect;

/// Characters of decoded text inspected when sniffing.
pub const SNIFF_SAMPLE_CHARS: usize = 1024;

const DELIMITERS: [u8; 4] = [b';', b',', b'\t', b'|'];

/// Guesses delimiter and quote character from the start of a file.
///
/// Each candidate delimiter is counted per line (outside double quotes); the
/// one whose most common non-zero count covers the most lines wins, earlier
/// candidates winning ties. Falls back to the authority's dialect.
pub fn sniff_dialect(text: &str) -> Dialect {
    let end = text
        .char_indices()
        .nth(SNIFF_SAMPLE_CHARS)
        .map(|(idx, _)| idx)
        .unwrap_or(text.len());
    let sample = &text[..end];

    let mut lines: Vec<&str> = sample.lines().filter(|l| !l.trim().is_empty()).collect();
    // the last line is usually cut mid-record
    if end < text.len() && lines.len() > 1 {
        lines.pop();
    }
    if lines.is_empty() {
        return Dialect::TSE;
    }

    let mut best: Option<(usize, u8)> = None;
    for delimiter in DELIMITERS {
        let consistency = consistency(&lines, delimiter);
        if consistency == 0 {
            continue;
        }
        if best.map_or(true, |(score, _)| consistency > score) {
            best = Some((consistency, delimiter));
        }
    }

    let delimiter = best.map(|(_, d)| d).unwrap_or(Dialect::TSE.delimiter);
    Dialect {
        delimiter,
        quote: sniff_quote(sample, delimiter),
    }
}

/// Number of lines sharing the most frequent non-zero count of `delimiter`.
fn consistency(lines: &[&str], delimiter: u8) -> usize {
    let counts: Vec<usize> = lines
        .iter()
        .map(|line| count_outside_quotes(line, delimiter))
        .collect();
    counts
        .iter()
        .filter(|&&c| c > 0)
        .map(|&c| counts.iter().filter(|&&other| other == c).count())
        .max()
        .unwrap_or(0)
}

fn count_outside_quotes(line: &str, delimiter: u8) -> usize {
    let mut quoted = false;
    let mut count = 0;
    for b in line.bytes() {
        if b == b'"' {
            quoted = !quoted;
        } else if b == delimiter && !quoted {
            count += 1;
        }
    }
    count
}

fn sniff_quote(sample: &str, delimiter: u8) -> u8 {
    let delimiter = delimiter as char;
    let opening = |quote: char| {
        sample
            .lines()
            .map(|line| {
                let starts = usize::from(line.starts_with(quote));
                starts + line.matches(&format!("{delimiter}{quote}")).count()
            })
            .sum::<usize>()
    };
    if opening('\'') > opening('"') {
        b'\''
    } else {
        b'"'
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_semicolons_with_commas_in_values() {
        let text = "\"AC\";\"1,50\";\"JOSE\"\n\"SP\";\"2,00\";\"MARIA\"\n";
        assert_eq!(sniff_dialect(text), Dialect::TSE);
    }

    #[test]
    fn detects_commas_and_tabs() {
        let text = "UF,VALOR,NOME\nAC,150,JOSE\nSP,200,MARIA\n";
        assert_eq!(sniff_dialect(text).delimiter, b',');

        let text = "UF\tVALOR\tNOME\nAC\t1;5\tJOSE\nSP\t2\tMARIA\n";
        assert_eq!(sniff_dialect(text).delimiter, b'\t');
    }

    #[test]
    fn detects_single_quote_fields() {
        let text = "'AC';'1';'JOSE'\n'SP';'2';'MARIA'\n";
        let dialect = sniff_dialect(text);
        assert_eq!(dialect.delimiter, b';');
        assert_eq!(dialect.quote, b'\'');
    }

    #[test]
    fn only_looks_at_the_sample_prefix() {
        let mut text = String::new();
        for _ in 0..200 {
            text.push_str("A;B;C\n");
        }
        text.push_str("x,y,z,w,v,u,t\n");
        assert_eq!(sniff_dialect(&text).delimiter, b';');
    }

    #[test]
    fn falls_back_to_tse_dialect() {
        assert_eq!(sniff_dialect(""), Dialect::TSE);
        assert_eq!(sniff_dialect("SOZINHO\n"), Dialect::TSE);
    }
}
