use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path, path::PathBuf};
use url::Url;

pub const DEFAULT_BASE_URL: &str = "http://agencia.tse.jus.br/estatistica/sead/odsele/";

/// Directories and endpoint used by the command line.
///
/// Every key is optional in the YAML file; missing keys keep their default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Downloaded archives.
    pub download_dir: PathBuf,
    /// Normalized CSV/Parquet output.
    pub output_dir: PathBuf,
    /// Year schema files, canonical headers and lookup tables.
    pub headers_dir: PathBuf,
    pub base_url: String,
    /// Concurrent downloads.
    pub download_concurrency: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            download_dir: PathBuf::from("data/download"),
            output_dir: PathBuf::from("data/output"),
            headers_dir: PathBuf::from("headers"),
            base_url: DEFAULT_BASE_URL.to_string(),
            download_concurrency: 2,
        }
    }
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading settings file {}", path.display()))?;
        serde_yaml::from_str(&text)
            .with_context(|| format!("parsing settings file {}", path.display()))
    }

    /// Settings from `path` when given, defaults otherwise.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn base_url(&self) -> Result<Url> {
        let mut raw = self.base_url.clone();
        // Url::join drops the last segment of a base without a trailing slash
        if !raw.ends_with('/') {
            raw.push('/');
        }
        Url::parse(&raw).with_context(|| format!("invalid base URL {}", self.base_url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn partial_file_keeps_defaults() -> Result<()> {
        let mut file = NamedTempFile::new()?;
        writeln!(file, "output_dir: /srv/eleicoes\nbase_url: http://localhost:8080/odsele")?;
        let settings = Settings::load(file.path())?;
        assert_eq!(settings.output_dir, PathBuf::from("/srv/eleicoes"));
        assert_eq!(settings.download_dir, PathBuf::from("data/download"));
        assert_eq!(settings.headers_dir, PathBuf::from("headers"));
        assert_eq!(
            settings.base_url()?.join("a.zip")?.as_str(),
            "http://localhost:8080/odsele/a.zip"
        );
        Ok(())
    }

    #[test]
    fn missing_or_broken_file_is_an_error() -> Result<()> {
        assert!(Settings::load(Path::new("/nonexistent/settings.yaml")).is_err());
        let mut file = NamedTempFile::new()?;
        writeln!(file, "download_concurrency: many")?;
        let err = Settings::load(file.path()).unwrap_err();
        assert!(format!("{err:#}").contains("parsing settings file"));
        assert_eq!(Settings::load_or_default(None)?, Settings::default());
        Ok(())
    }
}
