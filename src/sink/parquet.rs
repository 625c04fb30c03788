use anyhow::{bail, Context, Result};
use arrow::array::{ArrayRef, StringBuilder};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use ::parquet::arrow::ArrowWriter;
use ::parquet::basic::Compression;
use ::parquet::file::properties::WriterProperties;
use std::{
    fs::{self, File},
    path::PathBuf,
    sync::Arc,
};
use tracing::{debug, info, warn};

use super::{check_layout, RowSink};
use crate::process::CanonicalRecord;
use crate::schema::ElectionYear;

pub const DEFAULT_BATCH_ROWS: usize = 8_192;

/// Temporary file of the year in progress, opened with its first row.
struct YearFile {
    tmp_path: PathBuf,
    final_path: PathBuf,
    schema: SchemaRef,
    writer: ArrowWriter<File>,
    columns: Vec<StringBuilder>,
    buffered: usize,
    rows: u64,
}

impl YearFile {
    fn flush_batch(&mut self) -> Result<()> {
        if self.buffered == 0 {
            return Ok(());
        }
        let arrays: Vec<ArrayRef> = self
            .columns
            .iter_mut()
            .map(|builder| Arc::new(builder.finish()) as ArrayRef)
            .collect();
        let batch = RecordBatch::try_new(Arc::clone(&self.schema), arrays)
            .context("assembling record batch")?;
        self.writer
            .write(&batch)
            .context("writing batch to Parquet")?;
        self.rows += self.buffered as u64;
        self.buffered = 0;
        Ok(())
    }
}

/// Parquet dataset partitioned by year: `<dir>/ano=<year>/<prefix>-<year>.parquet`.
///
/// Every canonical field is a nullable Utf8 column. A year's file appears
/// under its final name only once the year is committed; a year without
/// rows produces no file.
pub struct ParquetSink {
    dir: PathBuf,
    prefix: String,
    batch_rows: usize,
    header: Option<(Vec<String>, SchemaRef)>,
    year: Option<ElectionYear>,
    current: Option<YearFile>,
    written: Vec<PathBuf>,
}

impl ParquetSink {
    pub fn create(dir: PathBuf, prefix: &str) -> Result<Self> {
        fs::create_dir_all(&dir)
            .with_context(|| format!("creating output directory {}", dir.display()))?;
        Ok(Self {
            dir,
            prefix: prefix.to_string(),
            batch_rows: DEFAULT_BATCH_ROWS,
            header: None,
            year: None,
            current: None,
            written: Vec::new(),
        })
    }

    pub fn with_batch_rows(mut self, rows: usize) -> Self {
        self.batch_rows = rows.max(1);
        self
    }

    fn open_year(&self) -> Result<ElectionYear> {
        self.year
            .context("no year in progress; call begin_year first")
    }

    fn arrow_schema(&mut self, record: &CanonicalRecord) -> Result<SchemaRef> {
        if let Some((header, schema)) = &self.header {
            check_layout(header, record)?;
            return Ok(Arc::clone(schema));
        }
        let names = record.schema().names().to_vec();
        let fields: Vec<Field> = names
            .iter()
            .map(|name| Field::new(name, DataType::Utf8, true))
            .collect();
        let schema = Arc::new(Schema::new(fields));
        self.header = Some((names, Arc::clone(&schema)));
        Ok(schema)
    }

    fn open_year_file(&self, year: ElectionYear, schema: SchemaRef) -> Result<YearFile> {
        let partition = self.dir.join(format!("ano={}", year));
        fs::create_dir_all(&partition).context("creating partition directory")?;
        let final_name = format!("{}-{}.parquet", self.prefix, year);
        let tmp_path = partition.join(format!("{}.tmp", final_name));
        let final_path = partition.join(final_name);

        let tmp_file = File::create(&tmp_path).context("creating temporary Parquet file")?;
        let props = WriterProperties::builder()
            .set_compression(Compression::SNAPPY)
            .build();
        let writer = ArrowWriter::try_new(tmp_file, Arc::clone(&schema), Some(props))
            .context("initializing Parquet writer")?;
        Ok(YearFile {
            tmp_path,
            final_path,
            columns: (0..schema.fields().len())
                .map(|_| StringBuilder::new())
                .collect(),
            schema,
            writer,
            buffered: 0,
            rows: 0,
        })
    }
}

impl RowSink for ParquetSink {
    fn begin_year(&mut self, year: ElectionYear) -> Result<()> {
        if let Some(open) = self.year {
            bail!("year {} still open when starting {}", open, year);
        }
        self.year = Some(year);
        Ok(())
    }

    fn write_record(&mut self, record: &CanonicalRecord) -> Result<()> {
        let year = self.open_year()?;
        let schema = self.arrow_schema(record)?;
        let batch_rows = self.batch_rows;
        let file = match self.current.take() {
            Some(file) => file,
            None => self.open_year_file(year, schema)?,
        };
        let file = self.current.insert(file);

        for (builder, value) in file.columns.iter_mut().zip(record.values()) {
            builder.append_value(value);
        }
        file.buffered += 1;
        if file.buffered >= batch_rows {
            file.flush_batch()?;
        }
        Ok(())
    }

    fn commit_year(&mut self) -> Result<()> {
        let year = self.open_year()?;
        self.year = None;
        let Some(mut file) = self.current.take() else {
            debug!(%year, "year committed without rows");
            return Ok(());
        };
        file.flush_batch()?;
        file.writer.close().context("closing Parquet writer")?;
        fs::rename(&file.tmp_path, &file.final_path).context("renaming Parquet file")?;
        debug!(%year, rows = file.rows, path = %file.final_path.display(), "year committed");
        self.written.push(file.final_path);
        Ok(())
    }

    fn rollback_year(&mut self) -> Result<()> {
        let year = self.open_year()?;
        self.year = None;
        if let Some(file) = self.current.take() {
            let YearFile {
                tmp_path, writer, ..
            } = file;
            drop(writer);
            if let Err(e) = fs::remove_file(&tmp_path) {
                warn!(path = %tmp_path.display(), error = %e, "could not remove partial Parquet file");
            }
        }
        debug!(%year, "year rolled back");
        Ok(())
    }

    fn finish(mut self: Box<Self>) -> Result<PathBuf> {
        if self.year.is_some() {
            self.rollback_year()?;
        }
        info!(dir = %self.dir.display(), files = self.written.len(), "Parquet output written");
        Ok(self.dir)
    }
}
