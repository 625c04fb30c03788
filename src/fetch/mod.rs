//! Archive downloader: one archive per (data type, year), cached on disk.

use anyhow::{Context, Result};
use futures_util::StreamExt;
use reqwest::Client;
use std::path::{Path, PathBuf};
use tokio::{fs, io::AsyncWriteExt};
use tracing::{debug, info, instrument};
use url::Url;

use crate::extractors::Extractor;
use crate::schema::ElectionYear;

const PROGRESS_EVERY_BYTES: u64 = 50 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// The archive was already on disk and `force` was not set.
    Cached(PathBuf),
    Downloaded { path: PathBuf, bytes: u64 },
}

impl DownloadOutcome {
    pub fn path(&self) -> &Path {
        match self {
            DownloadOutcome::Cached(path) => path,
            DownloadOutcome::Downloaded { path, .. } => path,
        }
    }
}

/// Local path of the archive of `year` under `dir`.
pub fn archive_path(extractor: &dyn Extractor, dir: &Path, year: ElectionYear) -> PathBuf {
    dir.join(extractor.filename(year))
}

/// Fetches the archive of `year` into `dir`, unless it is already there.
///
/// The body is streamed to a temporary file that is renamed once complete,
/// so an interrupted download never looks like a cached archive.
#[instrument(level = "info", skip(client, extractor, base_url, dir), fields(data_type = extractor.name(), year = %year))]
pub async fn download(
    client: &Client,
    extractor: &dyn Extractor,
    base_url: &Url,
    year: ElectionYear,
    dir: &Path,
    force: bool,
) -> Result<DownloadOutcome> {
    let dest = archive_path(extractor, dir, year);
    if !force && fs::try_exists(&dest).await.unwrap_or(false) {
        debug!(path = %dest.display(), "archive already downloaded");
        return Ok(DownloadOutcome::Cached(dest));
    }

    let url = extractor
        .url(base_url, year)
        .with_context(|| format!("building URL for {} {}", extractor.name(), year))?;
    fs::create_dir_all(dir)
        .await
        .with_context(|| format!("creating download directory {}", dir.display()))?;

    info!(%url, "downloading");
    let response = client
        .get(url.clone())
        .send()
        .await
        .with_context(|| format!("Failed to send request to {}", url))?
        .error_for_status()
        .with_context(|| format!("HTTP error from {}", url))?;

    let tmp = dest.with_file_name(format!(".{}.part", extractor.filename(year)));
    let mut file = fs::File::create(&tmp)
        .await
        .with_context(|| format!("creating {}", tmp.display()))?;
    let mut stream = response.bytes_stream();
    let mut total = 0u64;
    let mut next_report = PROGRESS_EVERY_BYTES;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.context("Failed to read chunk from response")?;
        file.write_all(&chunk)
            .await
            .with_context(|| format!("writing {}", tmp.display()))?;
        total += chunk.len() as u64;
        if total >= next_report {
            debug!(mb = total / (1024 * 1024), "download progress");
            next_report += PROGRESS_EVERY_BYTES;
        }
    }
    file.flush().await?;
    drop(file);

    fs::rename(&tmp, &dest)
        .await
        .with_context(|| format!("renaming {} to {}", tmp.display(), dest.display()))?;
    info!(path = %dest.display(), bytes = total, "download complete");
    Ok(DownloadOutcome::Downloaded {
        path: dest,
        bytes: total,
    })
}
