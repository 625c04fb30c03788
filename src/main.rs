use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use eleicoes::{
    diagnose::count_columns_in_file,
    dialect::{Dialect, TextEncoding},
    extract,
    extractors::{DataType, Extractor},
    fetch::{self, archive_path},
    schema::{build_canonical_header, ElectionYear, HeaderRegistry, CANONICAL_ERA},
    settings::Settings,
    sink::{open_sink, OutputFormat, RowSink},
};
use rayon::prelude::*;
use reqwest::Client;
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::{sync::Semaphore, time::Instant};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "eleicoes", version, about = "Normalize the electoral authority's open data")]
struct Cli {
    /// YAML settings file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory with year schema files and canonical headers
    #[arg(long, global = true)]
    headers: Option<PathBuf>,

    #[arg(long, global = true)]
    download_dir: Option<PathBuf>,

    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Normalize the archives of a data type into one output
    Extract {
        #[arg(value_enum)]
        data_type: DataType,
        /// Years to process (comma-separated, e.g. 2014,2014-suplementar); all by default
        #[arg(long, value_delimiter = ',')]
        years: Vec<ElectionYear>,
        #[arg(long, value_enum, default_value_t)]
        format: OutputFormat,
        /// Download missing archives first
        #[arg(long)]
        download: bool,
        /// Download again even when the archive exists
        #[arg(long)]
        force: bool,
    },
    /// Rebuild the canonical header of each data type from its year schemas
    Headers {
        #[arg(value_enum)]
        data_types: Vec<DataType>,
    },
    /// Download the archives of a data type
    Download {
        #[arg(value_enum)]
        data_type: DataType,
        #[arg(long, value_delimiter = ',')]
        years: Vec<ElectionYear>,
        #[arg(long)]
        force: bool,
    },
    /// Report lines whose column count differs from the header line's
    CountColumns {
        file: PathBuf,
        #[arg(long, default_value_t = ';')]
        delimiter: char,
        #[arg(long, value_enum, default_value_t = TextEncoding::Latin1)]
        encoding: TextEncoding,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();

    std::panic::set_hook(Box::new(|info| {
        eprintln!("panic: {:?}", info);
    }));

    // ─── 2) settings, command-line overrides last ────────────────────
    let cli = Cli::parse();
    let mut settings = Settings::load_or_default(cli.config.as_deref())?;
    if let Some(dir) = cli.headers {
        settings.headers_dir = dir;
    }
    if let Some(dir) = cli.download_dir {
        settings.download_dir = dir;
    }
    if let Some(dir) = cli.output_dir {
        settings.output_dir = dir;
    }

    match cli.command {
        Command::Extract {
            data_type,
            years,
            format,
            download,
            force,
        } => run_extract(&settings, data_type, &years, format, download, force).await,
        Command::Headers { data_types } => build_headers(&settings, &data_types),
        Command::Download {
            data_type,
            years,
            force,
        } => {
            let extractor = data_type.extractor();
            let years = select_years(extractor, &years)?;
            let failures = download_years(&settings, extractor, &years, force).await?;
            report_failures(data_type, years.len(), &failures)
        }
        Command::CountColumns {
            file,
            delimiter,
            encoding,
        } => run_count_columns(&file, delimiter, encoding),
    }
}

/// Requested years, or every published year when none are given. Unknown
/// years are rejected before any work starts.
fn select_years(extractor: &dyn Extractor, requested: &[ElectionYear]) -> Result<Vec<ElectionYear>> {
    let available = extractor.years();
    if requested.is_empty() {
        return Ok(available);
    }
    let unknown: Vec<String> = requested
        .iter()
        .filter(|y| !available.contains(y))
        .map(ToString::to_string)
        .collect();
    if !unknown.is_empty() {
        let available: Vec<String> = available.iter().map(ToString::to_string).collect();
        bail!(
            "{} is not published for year(s) {} (available: {})",
            extractor.name(),
            unknown.join(", "),
            available.join(", ")
        );
    }
    let mut years = requested.to_vec();
    years.sort();
    years.dedup();
    Ok(years)
}

fn report_failures(data_type: DataType, total: usize, failures: &[(ElectionYear, String)]) -> Result<()> {
    if failures.is_empty() {
        info!(%data_type, years = total, "all years done");
        return Ok(());
    }
    for (year, reason) in failures {
        error!(%data_type, %year, "failed: {}", reason);
    }
    let years: Vec<String> = failures.iter().map(|(y, _)| y.to_string()).collect();
    bail!(
        "{}: {} of {} years failed ({})",
        data_type,
        failures.len(),
        total,
        years.join(", ")
    )
}

async fn download_years(
    settings: &Settings,
    extractor: &'static dyn Extractor,
    years: &[ElectionYear],
    force: bool,
) -> Result<Vec<(ElectionYear, String)>> {
    let client = Client::new();
    let base = settings.base_url()?;
    let sem = Arc::new(Semaphore::new(settings.download_concurrency.max(1)));

    let mut handles = Vec::with_capacity(years.len());
    for &year in years {
        let client = client.clone();
        let base = base.clone();
        let dir = settings.download_dir.clone();
        let sem = Arc::clone(&sem);
        handles.push((
            year,
            tokio::spawn(async move {
                let _permit = sem.acquire_owned().await?;
                let start = Instant::now();
                let outcome = fetch::download(&client, extractor, &base, year, &dir, force).await?;
                info!(%year, elapsed = ?start.elapsed(), path = %outcome.path().display(), "archive ready");
                Ok::<_, anyhow::Error>(outcome)
            }),
        ));
    }

    let mut failures = Vec::new();
    for (year, handle) in handles {
        match handle.await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => failures.push((year, format!("download: {:#}", e))),
            Err(e) => failures.push((year, format!("download task: {}", e))),
        }
    }
    Ok(failures)
}

async fn run_extract(
    settings: &Settings,
    data_type: DataType,
    years: &[ElectionYear],
    format: OutputFormat,
    download: bool,
    force: bool,
) -> Result<()> {
    let extractor = data_type.extractor();
    let mut years = select_years(extractor, years)?;

    let mut failures = Vec::new();
    if download {
        failures = download_years(settings, extractor, &years, force).await?;
        years.retain(|y| !failures.iter().any(|(failed, _)| failed == y));
    }
    let total = years.len() + failures.len();

    let registry = HeaderRegistry::new(&settings.headers_dir);
    let sink = open_sink(format, &settings.output_dir, extractor.name())?;
    let download_dir = settings.download_dir.clone();

    // extraction is CPU-bound and synchronous
    let (path, extract_failures) = tokio::task::spawn_blocking(move || {
        extract_years(extractor, &registry, &download_dir, &years, sink)
    })
    .await
    .context("extraction task panicked")??;
    failures.extend(extract_failures);
    info!(%data_type, path = %path.display(), "output written");

    report_failures(data_type, total, &failures)
}

/// Runs every year through `sink`, committing the ones that succeed.
fn extract_years(
    extractor: &dyn Extractor,
    registry: &HeaderRegistry,
    download_dir: &Path,
    years: &[ElectionYear],
    mut sink: Box<dyn RowSink>,
) -> Result<(PathBuf, Vec<(ElectionYear, String)>)> {
    let mut failures = Vec::new();
    for &year in years {
        let archive = archive_path(extractor, download_dir, year);
        let start = Instant::now();
        sink.begin_year(year)?;
        match extract_year(extractor, registry, &archive, year, sink.as_mut()) {
            Ok(rows) => {
                sink.commit_year()?;
                info!(%year, rows, elapsed = ?start.elapsed(), "year extracted");
            }
            Err(e) => {
                sink.rollback_year()?;
                warn!(%year, "year discarded: {:#}", e);
                failures.push((year, format!("{:#}", e)));
            }
        }
    }
    Ok((sink.finish()?, failures))
}

fn extract_year(
    extractor: &dyn Extractor,
    registry: &HeaderRegistry,
    archive: &Path,
    year: ElectionYear,
    sink: &mut dyn RowSink,
) -> Result<u64> {
    let mut rows = extract(extractor, registry, archive, year)?;
    for row in rows.by_ref() {
        sink.write_record(&row?)?;
    }
    debug!(%year, members = rows.members_read(), "archive members read");
    Ok(rows.rows())
}

/// Canonical headers are independent per data type and built in parallel.
fn build_headers(settings: &Settings, data_types: &[DataType]) -> Result<()> {
    let data_types = if data_types.is_empty() {
        DataType::ALL.to_vec()
    } else {
        data_types.to_vec()
    };
    let registry = HeaderRegistry::new(&settings.headers_dir);

    let results: Vec<(DataType, Result<usize>)> = data_types
        .par_iter()
        .map(|&data_type| {
            let extractor = data_type.extractor();
            let prefix = extractor.header_prefix();
            let out = registry.schema_path(prefix, CANONICAL_ERA);
            let built = build_canonical_header(&registry, prefix, |name| extractor.order_column(name), &out);
            (data_type, built)
        })
        .collect();

    let mut failed = 0;
    for (data_type, result) in results {
        match result {
            Ok(columns) => info!(%data_type, columns, "canonical header written"),
            Err(e) => {
                failed += 1;
                error!(%data_type, "canonical header failed: {:#}", e);
            }
        }
    }
    if failed > 0 {
        bail!("{} canonical header(s) failed", failed);
    }
    Ok(())
}

fn run_count_columns(file: &Path, delimiter: char, encoding: TextEncoding) -> Result<()> {
    if !delimiter.is_ascii() {
        bail!("delimiter must be a single ASCII character, got {:?}", delimiter);
    }
    let dialect = Dialect {
        delimiter: delimiter as u8,
        ..Dialect::TSE
    };
    let report = count_columns_in_file(file, encoding, dialect)?;
    let Some(expected) = report.expected else {
        println!("{}: empty file", file.display());
        return Ok(());
    };
    println!("{} columns detected in the header line", expected);
    for (n, mismatch) in report.mismatches.iter().enumerate() {
        println!(
            "[{:06}] line {}: {} columns (expected {})",
            n + 1,
            mismatch.line,
            mismatch.found,
            expected
        );
        println!("    raw line: {:?}", mismatch.raw);
        println!("    parsed:   {:?}", mismatch.fields);
    }
    if report.is_clean() {
        println!("no column-count mismatches found");
    } else {
        println!("\n{} mismatched line(s)", report.mismatches.len());
    }
    Ok(())
}
