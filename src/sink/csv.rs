use anyhow::{bail, Context, Result};
use std::{
    fs::{self, File},
    io::{Seek, SeekFrom},
    path::PathBuf,
};
use tracing::{debug, info};

use super::{check_layout, RowSink};
use crate::process::CanonicalRecord;
use crate::schema::ElectionYear;

/// One CSV file per data type, every year appended in order.
///
/// The header is taken from the first record written. Rolling a year back
/// truncates the file to the end of the last committed year.
pub struct CsvSink {
    path: PathBuf,
    tmp_path: PathBuf,
    writer: ::csv::Writer<File>,
    header: Option<Vec<String>>,
    committed: u64,
    year: Option<ElectionYear>,
    rows_in_year: u64,
    rows: u64,
}

impl CsvSink {
    pub fn create(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating output directory {}", parent.display()))?;
        }
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .with_context(|| format!("invalid output path {}", path.display()))?;
        let tmp_path = path.with_file_name(format!(".{}.tmp", file_name));
        let file = File::create(&tmp_path)
            .with_context(|| format!("creating {}", tmp_path.display()))?;
        Ok(Self {
            writer: ::csv::WriterBuilder::new().from_writer(file),
            path,
            tmp_path,
            header: None,
            committed: 0,
            year: None,
            rows_in_year: 0,
            rows: 0,
        })
    }

    fn open_year(&self) -> Result<ElectionYear> {
        self.year
            .context("no year in progress; call begin_year first")
    }
}

impl RowSink for CsvSink {
    fn begin_year(&mut self, year: ElectionYear) -> Result<()> {
        if let Some(open) = self.year {
            bail!("year {} still open when starting {}", open, year);
        }
        self.year = Some(year);
        self.rows_in_year = 0;
        Ok(())
    }

    fn write_record(&mut self, record: &CanonicalRecord) -> Result<()> {
        self.open_year()?;
        match &self.header {
            Some(header) => check_layout(header, record)?,
            None => {
                let header = record.schema().names().to_vec();
                self.writer
                    .write_record(&header)
                    .context("writing CSV header")?;
                self.header = Some(header);
            }
        }
        self.writer
            .write_record(record.values())
            .context("writing CSV record")?;
        self.rows_in_year += 1;
        Ok(())
    }

    fn commit_year(&mut self) -> Result<()> {
        let year = self.open_year()?;
        self.writer.flush().context("flushing CSV output")?;
        // `&File` seeks and truncates; the writer only hands out shared access
        let mut file = self.writer.get_ref();
        self.committed = file
            .stream_position()
            .context("reading CSV output position")?;
        self.rows += self.rows_in_year;
        debug!(%year, rows = self.rows_in_year, bytes = self.committed, "year committed");
        self.year = None;
        Ok(())
    }

    fn rollback_year(&mut self) -> Result<()> {
        let year = self.open_year()?;
        self.writer.flush().context("flushing CSV output")?;
        let mut file = self.writer.get_ref();
        file.set_len(self.committed)
            .context("truncating CSV output")?;
        file.seek(SeekFrom::Start(self.committed))
            .context("rewinding CSV output")?;
        if self.committed == 0 {
            self.header = None;
        }
        debug!(%year, discarded = self.rows_in_year, "year rolled back");
        self.year = None;
        Ok(())
    }

    fn finish(mut self: Box<Self>) -> Result<PathBuf> {
        if self.year.is_some() {
            self.rollback_year()?;
        }
        let CsvSink {
            path,
            tmp_path,
            mut writer,
            rows,
            ..
        } = *self;
        writer.flush().context("flushing CSV output")?;
        drop(writer);
        fs::rename(&tmp_path, &path).with_context(|| {
            format!("renaming {} to {}", tmp_path.display(), path.display())
        })?;
        info!(path = %path.display(), rows, "CSV output written");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::{Fixer, RowConverter};
    use crate::schema::{CanonicalSchema, FieldDefinition};
    use std::sync::Arc;
    use tempfile::tempdir;

    fn converter(names: &[&str]) -> RowConverter {
        let rows: Vec<FieldDefinition> = names.iter().map(|n| FieldDefinition::new("", n)).collect();
        let canonical = Arc::new(CanonicalSchema::new(&rows).unwrap());
        let fixers: Arc<[Fixer]> = Vec::new().into();
        RowConverter::new(names, canonical, fixers).unwrap()
    }

    fn record(conv: &RowConverter, values: &[&str]) -> CanonicalRecord {
        conv.convert(values).unwrap().unwrap()
    }

    #[test]
    fn rolled_back_year_leaves_no_rows() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("out").join("bem-declarado.csv");
        let conv = converter(&["sigla_uf", "valor"]);

        let mut sink: Box<dyn RowSink> = Box::new(CsvSink::create(path.clone())?);
        sink.begin_year(ElectionYear::regular(2006))?;
        sink.write_record(&record(&conv, &["AC", "1.5"]))?;
        sink.commit_year()?;

        sink.begin_year(ElectionYear::regular(2008))?;
        sink.write_record(&record(&conv, &["SP", "2"]))?;
        sink.write_record(&record(&conv, &["RJ", "3"]))?;
        sink.rollback_year()?;

        sink.begin_year(ElectionYear::regular(2010))?;
        sink.write_record(&record(&conv, &["MG", "4"]))?;
        sink.commit_year()?;

        assert!(!path.exists());
        let written = sink.finish()?;
        assert_eq!(written, path);
        assert_eq!(fs::read_to_string(&path)?, "sigla_uf,valor\nAC,1.5\nMG,4\n");
        Ok(())
    }

    #[test]
    fn header_goes_with_a_rolled_back_first_year() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("votacao-zona.csv");
        let conv = converter(&["nome"]);

        let mut sink: Box<dyn RowSink> = Box::new(CsvSink::create(path.clone())?);
        sink.begin_year(ElectionYear::regular(1996))?;
        sink.write_record(&record(&conv, &["ANA"]))?;
        sink.rollback_year()?;
        sink.begin_year(ElectionYear::regular(1998))?;
        sink.write_record(&record(&conv, &["BIA"]))?;
        sink.commit_year()?;
        sink.finish()?;

        assert_eq!(fs::read_to_string(&path)?, "nome\nBIA\n");
        Ok(())
    }

    #[test]
    fn layout_change_and_missing_year_are_errors() -> Result<()> {
        let dir = tempdir()?;
        let mut sink = CsvSink::create(dir.path().join("x.csv"))?;
        let first = converter(&["a", "b"]);
        let other = converter(&["a", "c"]);

        assert!(sink.write_record(&record(&first, &["1", "2"])).is_err());
        sink.begin_year(ElectionYear::regular(2002))?;
        assert!(sink.begin_year(ElectionYear::regular(2004)).is_err());
        sink.write_record(&record(&first, &["1", "2"]))?;
        let err = sink.write_record(&record(&other, &["1", "2"])).unwrap_err();
        assert!(err.to_string().contains("layout"), "{err}");
        Ok(())
    }
}
