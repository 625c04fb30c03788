//! Archive row extraction: members -> decoded, repaired text -> records ->
//! canonical rows, one (data type, year) at a time.

pub mod archive;

use csv::{StringRecord, StringRecordsIntoIter};
use std::{
    io::Cursor,
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing::{debug, info, instrument, Span};

use crate::dialect::{decode, TextEncoding};
use crate::error::{JobId, NormalizeError};
use crate::extractors::Extractor;
use crate::process::{CanonicalRecord, Fixer, RowConverter};
use crate::schema::{CanonicalSchema, ElectionYear, HeaderRegistry, YearSchema};

pub use archive::{detect_kind, ArchiveKind, Member, MemberReader};

/// Column layout of the member being read.
///
/// `Pending` until the first record has been seen: that record may be an
/// embedded header that replaces the configured layout.
enum SchemaState {
    Pending {
        year_schema: YearSchema,
        converter: RowConverter,
    },
    Resolved(RowConverter),
}

impl SchemaState {
    fn converter(&self) -> &RowConverter {
        match self {
            SchemaState::Pending { converter, .. } => converter,
            SchemaState::Resolved(converter) => converter,
        }
    }
}

/// Per-job values shared by every member.
struct JobContext<'a> {
    job: JobId,
    extractor: &'a dyn Extractor,
    registry: &'a HeaderRegistry,
    canonical: Arc<CanonicalSchema>,
    fixers: Arc<[Fixer]>,
}

impl JobContext<'_> {
    fn converter<S: AsRef<str>>(
        &self,
        member: &str,
        record: u64,
        columns: &[S],
    ) -> Result<RowConverter, NormalizeError> {
        RowConverter::new(columns, Arc::clone(&self.canonical), Arc::clone(&self.fixers))
            .map_err(|e| NormalizeError::from_row(self.job, member, record, e))
    }
}

struct MemberRows {
    name: String,
    records: StringRecordsIntoIter<Cursor<Vec<u8>>>,
    state: SchemaState,
    read: u64,
    emitted: u64,
}

fn is_embedded_header(record: &StringRecord, markers: &[&str]) -> bool {
    record.iter().any(|field| markers.contains(&field.trim()))
}

impl MemberRows {
    fn open(ctx: &JobContext<'_>, member: archive::Member) -> Result<Self, NormalizeError> {
        let year = ctx.job.year;
        let era = ctx
            .extractor
            .header_era(&member.name, year)
            .ok_or_else(|| NormalizeError::Config {
                job: ctx.job,
                reason: format!("no header era for member {}", member.name),
            })?;
        let year_schema = ctx
            .registry
            .year_schema(ctx.extractor.header_prefix(), &era)
            .map_err(|e| e.in_job(ctx.job))?;

        let context = format!("{}: {}", ctx.job, member.name);
        let text = decode(&member.bytes, TextEncoding::Latin1, &context)?;
        drop(member.bytes);
        let repaired = match ctx.extractor.repair_text(&text, year) {
            std::borrow::Cow::Owned(fixed) => Some(fixed),
            std::borrow::Cow::Borrowed(_) => None,
        };
        let text = repaired.unwrap_or(text);
        let dialect = ctx.extractor.dialect(&text);

        info!(
            member = %member.name,
            era = %era,
            delimiter = %(dialect.delimiter as char),
            "reading member"
        );

        let converter = ctx.converter(&member.name, 0, &year_schema.column_names())?;
        Ok(Self {
            records: dialect
                .raw_reader(Cursor::new(text.into_bytes()))
                .into_records(),
            name: member.name,
            state: SchemaState::Pending {
                year_schema,
                converter,
            },
            read: 0,
            emitted: 0,
        })
    }

    /// Moves out of `Pending` on the first record. Returns true when that
    /// record was an embedded header, which is not data.
    fn resolve(
        &mut self,
        ctx: &JobContext<'_>,
        record: &StringRecord,
        line: u64,
    ) -> Result<bool, NormalizeError> {
        let SchemaState::Pending {
            year_schema,
            converter,
        } = &self.state
        else {
            return Ok(false);
        };
        if !is_embedded_header(record, ctx.extractor.header_markers()) {
            self.state = SchemaState::Resolved(converter.clone());
            return Ok(false);
        }

        let header: Vec<&str> = record.iter().collect();
        let columns = year_schema
            .resolve_embedded(&header)
            .map_err(|reason| NormalizeError::Config {
                job: ctx.job,
                reason: format!("{}: {}", self.name, reason),
            })?;
        debug!(member = %self.name, columns = columns.len(), "embedded header overrides layout");
        let converter = ctx.converter(&self.name, line, &columns)?;
        self.state = SchemaState::Resolved(converter);
        Ok(true)
    }

    fn next_row(&mut self, ctx: &JobContext<'_>) -> Result<Option<CanonicalRecord>, NormalizeError> {
        while let Some(result) = self.records.next() {
            self.read += 1;
            let record = result.map_err(|source| NormalizeError::Csv {
                job: ctx.job,
                member: self.name.clone(),
                record: self.read,
                source,
            })?;
            let line = record.position().map_or(self.read, |p| p.line());

            if self.resolve(ctx, &record, line)? {
                continue;
            }
            let fields: Vec<&str> = record.iter().collect();
            match self.state.converter().convert(&fields) {
                Ok(Some(row)) => {
                    self.emitted += 1;
                    return Ok(Some(row));
                }
                Ok(None) => debug!(member = %self.name, line, "skipped non-data record"),
                Err(e) => return Err(NormalizeError::from_row(ctx.job, &self.name, line, e)),
            }
        }
        Ok(None)
    }
}

/// Lazy, fatal-once stream of canonical rows for one (data type, year).
///
/// The first error is yielded and the stream ends; the archive is closed
/// when the iterator is dropped.
pub struct ExtractRows<'a> {
    ctx: JobContext<'a>,
    path: PathBuf,
    members: MemberReader,
    current: Option<MemberRows>,
    members_read: usize,
    rows: u64,
    done: bool,
    span: Span,
}

impl<'a> ExtractRows<'a> {
    pub fn job(&self) -> JobId {
        self.ctx.job
    }

    pub fn canonical(&self) -> &Arc<CanonicalSchema> {
        &self.ctx.canonical
    }

    pub fn rows(&self) -> u64 {
        self.rows
    }

    pub fn members_read(&self) -> usize {
        self.members_read
    }

    fn open_next_member(&mut self) -> Result<Option<MemberRows>, NormalizeError> {
        let extractor = self.ctx.extractor;
        let year = self.ctx.job.year;
        let member = self
            .members
            .next_member(|name| extractor.is_valid_member(name, year))
            .map_err(|reason| NormalizeError::Archive {
                job: self.ctx.job,
                path: self.path.clone(),
                reason,
            })?;
        match member {
            Some(member) => {
                self.members_read += 1;
                MemberRows::open(&self.ctx, member).map(Some)
            }
            None => Ok(None),
        }
    }

    fn advance(&mut self) -> Result<Option<CanonicalRecord>, NormalizeError> {
        loop {
            let member = match self.current.as_mut() {
                Some(member) => member,
                None => match self.open_next_member()? {
                    Some(member) => {
                        self.current = Some(member);
                        continue;
                    }
                    None => {
                        info!(members = self.members_read, rows = self.rows, "extraction finished");
                        return Ok(None);
                    }
                },
            };
            if let Some(row) = member.next_row(&self.ctx)? {
                self.rows += 1;
                return Ok(Some(row));
            }
            debug!(member = %member.name, read = member.read, rows = member.emitted, "member done");
            self.current = None;
        }
    }
}

impl Iterator for ExtractRows<'_> {
    type Item = Result<CanonicalRecord, NormalizeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let span = self.span.clone();
        let _entered = span.enter();
        match self.advance() {
            Ok(Some(row)) => Some(Ok(row)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                self.current = None;
                Some(Err(e))
            }
        }
    }
}

/// Opens the archive of `year` and prepares its row stream.
///
/// Configuration problems (unpublished year, missing or invalid canonical
/// schema, a fixer naming an unknown field) fail here, before any row.
#[instrument(level = "info", skip(extractor, registry, archive_path), fields(data_type = extractor.name(), year = %year))]
pub fn extract<'a>(
    extractor: &'a dyn Extractor,
    registry: &'a HeaderRegistry,
    archive_path: &Path,
    year: ElectionYear,
) -> Result<ExtractRows<'a>, NormalizeError> {
    let job = JobId::new(extractor.name(), year);
    if !extractor.is_supported(year) {
        return Err(NormalizeError::Config {
            job,
            reason: format!("{} is not published for year {}", extractor.name(), year),
        });
    }

    let canonical = registry
        .canonical_schema(extractor.header_prefix())
        .map_err(|e| e.in_job(job))?
        .with_leading_fields(extractor.leading_columns())
        .map_err(|reason| NormalizeError::Config { job, reason })?
        .with_trailing_fields(extractor.derived_columns());
    let fixers: Arc<[Fixer]> = extractor
        .fixers(year, registry)
        .map_err(|e| e.in_job(job))?
        .into();

    let ctx = JobContext {
        job,
        extractor,
        registry,
        canonical: Arc::new(canonical),
        fixers,
    };
    // fixer fields are checked against the canonical schema up front
    ctx.converter("", 0, &[] as &[&str])?;

    let members = MemberReader::open(job, archive_path, extractor.allows_rar())?;
    info!(path = %archive_path.display(), columns = ctx.canonical.len(), "extraction started");

    Ok(ExtractRows {
        ctx,
        path: archive_path.to_path_buf(),
        members,
        current: None,
        members_read: 0,
        rows: 0,
        done: false,
        span: Span::current(),
    })
}
