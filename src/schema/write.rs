use anyhow::{Context, Result};
use csv::WriterBuilder;
use std::{
    fs,
    path::{Path, PathBuf},
};

use super::FieldDefinition;

/// Writes a canonical header file (`canonical_name,description`).
///
/// Written to a hidden temp file next to `path` and renamed over it, so a
/// reader never sees a partial file.
pub fn write_canonical_header<P: AsRef<Path>>(path: P, rows: &[FieldDefinition]) -> Result<()> {
    let path = path.as_ref();
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "header.csv".into());
    let tmp_path: PathBuf = dir.join(format!(".{}.tmp", file_name));

    {
        let mut writer = WriterBuilder::new()
            .from_path(&tmp_path)
            .with_context(|| format!("creating {}", tmp_path.display()))?;
        writer.write_record(["canonical_name", "description"])?;
        for row in rows {
            writer
                .write_record([&row.canonical_name, &row.description])
                .with_context(|| format!("writing {}", row.canonical_name))?;
        }
        writer
            .flush()
            .with_context(|| format!("flushing {}", tmp_path.display()))?;
    }

    fs::rename(&tmp_path, path).with_context(|| {
        format!("renaming {} -> {}", tmp_path.display(), path.display())
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn writes_header_and_quotes_commas() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("headers").join("bem-declarado-final.csv");
        let rows = vec![FieldDefinition {
            canonical_name: "valor".into(),
            description: "Valor, em reais. Known upstream as: VALOR_BEM (2006).".into(),
            ..Default::default()
        }];
        write_canonical_header(&path, &rows)?;

        let text = fs::read_to_string(&path)?;
        assert_eq!(
            text,
            "canonical_name,description\nvalor,\"Valor, em reais. Known upstream as: VALOR_BEM (2006).\"\n"
        );
        // no temp file left behind
        assert_eq!(fs::read_dir(path.parent().unwrap())?.count(), 1);
        Ok(())
    }

    #[test]
    fn empty_rows_still_write_the_header_line() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("despesa-final.csv");
        write_canonical_header(&path, &[])?;
        assert_eq!(fs::read_to_string(&path)?, "canonical_name,description\n");
        Ok(())
    }
}
