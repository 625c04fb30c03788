use std::{
    fs::File,
    io::{BufReader, Read},
    path::Path,
};
use tracing::debug;
use unrar::{CursorBeforeHeader, OpenArchive, Process};
use zip::ZipArchive;

use crate::error::{JobId, NormalizeError};

const ZIP_SIGNATURE: &[u8] = b"PK\x03\x04";
const RAR_SIGNATURE: &[u8] = b"Rar!";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    Zip,
    Rar,
}

/// Archive kind from the leading bytes of `path`.
pub fn detect_kind(job: JobId, path: &Path) -> Result<ArchiveKind, NormalizeError> {
    let mut head = [0u8; 10];
    let mut file = File::open(path).map_err(|e| NormalizeError::Io {
        context: format!("{}: opening {}", job, path.display()),
        source: e,
    })?;
    let mut filled = 0;
    while filled < head.len() {
        match file.read(&mut head[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                return Err(NormalizeError::Io {
                    context: format!("{}: reading {}", job, path.display()),
                    source: e,
                })
            }
        }
    }
    let head = &head[..filled];
    if head.starts_with(ZIP_SIGNATURE) {
        Ok(ArchiveKind::Zip)
    } else if head.starts_with(RAR_SIGNATURE) {
        Ok(ArchiveKind::Rar)
    } else {
        Err(NormalizeError::ArchiveFormat {
            job,
            path: path.to_path_buf(),
        })
    }
}

/// One decompressed archive member.
#[derive(Debug)]
pub struct Member {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Sequential reader over the members of a ZIP or RAR archive.
///
/// Members are read whole, one at a time, in archive order; members rejected
/// by the filter are skipped without being decompressed.
pub enum MemberReader {
    Zip {
        archive: ZipArchive<BufReader<File>>,
        next: usize,
    },
    Rar {
        cursor: Option<OpenArchive<Process, CursorBeforeHeader>>,
    },
}

impl MemberReader {
    pub fn open(job: JobId, path: &Path, allow_rar: bool) -> Result<Self, NormalizeError> {
        let archive_err = |reason: String| NormalizeError::Archive {
            job,
            path: path.to_path_buf(),
            reason,
        };
        match detect_kind(job, path)? {
            ArchiveKind::Zip => {
                let file = File::open(path).map_err(|e| NormalizeError::Io {
                    context: format!("{}: opening {}", job, path.display()),
                    source: e,
                })?;
                let archive =
                    ZipArchive::new(BufReader::new(file)).map_err(|e| archive_err(e.to_string()))?;
                debug!(path = %path.display(), members = archive.len(), "opened zip");
                Ok(MemberReader::Zip { archive, next: 0 })
            }
            ArchiveKind::Rar if allow_rar => {
                let cursor = unrar::Archive::new(path)
                    .open_for_processing()
                    .map_err(|e| archive_err(e.to_string()))?;
                debug!(path = %path.display(), "opened rar");
                Ok(MemberReader::Rar {
                    cursor: Some(cursor),
                })
            }
            ArchiveKind::Rar => Err(NormalizeError::ArchiveFormat {
                job,
                path: path.to_path_buf(),
            }),
        }
    }

    /// Next file member accepted by `keep`, or `None` once exhausted.
    /// The `String` error is the archive library's message.
    pub fn next_member<F>(&mut self, mut keep: F) -> Result<Option<Member>, String>
    where
        F: FnMut(&str) -> bool,
    {
        match self {
            MemberReader::Zip { archive, next } => {
                while *next < archive.len() {
                    let idx = *next;
                    *next += 1;
                    let mut entry = archive.by_index(idx).map_err(|e| e.to_string())?;
                    let name = entry.name().to_string();
                    if entry.is_dir() || !keep(&name) {
                        continue;
                    }
                    let mut bytes = Vec::with_capacity(entry.size() as usize);
                    entry
                        .read_to_end(&mut bytes)
                        .map_err(|e| format!("{}: {}", name, e))?;
                    return Ok(Some(Member { name, bytes }));
                }
                Ok(None)
            }
            MemberReader::Rar { cursor } => {
                while let Some(before_header) = cursor.take() {
                    let Some(before_file) = before_header.read_header().map_err(|e| e.to_string())?
                    else {
                        return Ok(None);
                    };
                    let header = before_file.entry();
                    let name = header.filename.to_string_lossy().replace('\\', "/");
                    if header.is_directory() || !keep(&name) {
                        *cursor = Some(before_file.skip().map_err(|e| e.to_string())?);
                        continue;
                    }
                    let (bytes, rest) = before_file
                        .read()
                        .map_err(|e| format!("{}: {}", name, e))?;
                    *cursor = Some(rest);
                    return Ok(Some(Member { name, bytes }));
                }
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ElectionYear;
    use std::io::Write;
    use tempfile::NamedTempFile;
    use zip::write::FileOptions;
    use zip::CompressionMethod;

    fn rar_fixture() -> std::path::PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/prestacao-contas-2010.rar")
    }

    fn job() -> JobId {
        JobId::new("receita", ElectionYear::regular(2010))
    }

    fn zip_with(members: &[(&str, &[u8])]) -> anyhow::Result<NamedTempFile> {
        let mut tmp = NamedTempFile::new()?;
        {
            let mut zip = zip::ZipWriter::new(tmp.as_file_mut());
            let options: FileOptions<'_, ()> =
                FileOptions::default().compression_method(CompressionMethod::Deflated);
            for (name, body) in members {
                zip.start_file(*name, options)?;
                zip.write_all(body)?;
            }
            zip.finish()?;
        }
        Ok(tmp)
    }

    #[test]
    fn zip_members_are_filtered_in_archive_order() -> anyhow::Result<()> {
        let tmp = zip_with(&[
            ("leiame.pdf", b"%PDF".as_slice()),
            ("b_AC.txt", b"1;2\n".as_slice()),
            ("a_SP.txt", b"3;4\n".as_slice()),
        ])?;
        assert_eq!(detect_kind(job(), tmp.path())?, ArchiveKind::Zip);

        let mut reader = MemberReader::open(job(), tmp.path(), false)?;
        let keep = |name: &str| name.ends_with(".txt");
        let first = reader.next_member(keep).unwrap().unwrap();
        assert_eq!(first.name, "b_AC.txt");
        assert_eq!(first.bytes, b"1;2\n");
        let second = reader.next_member(keep).unwrap().unwrap();
        assert_eq!(second.name, "a_SP.txt");
        assert!(reader.next_member(keep).unwrap().is_none());
        Ok(())
    }

    #[test]
    fn unknown_signature_is_an_archive_format_error() -> anyhow::Result<()> {
        let mut tmp = NamedTempFile::new()?;
        tmp.write_all(b"<html>not found</html>")?;
        let err = detect_kind(job(), tmp.path()).unwrap_err();
        assert!(matches!(err, NormalizeError::ArchiveFormat { .. }));
        assert!(err.to_string().contains("receita 2010"));

        let mut empty = NamedTempFile::new()?;
        empty.flush()?;
        assert!(matches!(
            detect_kind(job(), empty.path()),
            Err(NormalizeError::ArchiveFormat { .. })
        ));
        Ok(())
    }

    #[test]
    fn rar_signature_is_rejected_where_not_allowed() -> anyhow::Result<()> {
        let mut tmp = NamedTempFile::new()?;
        tmp.write_all(b"Rar!\x1a\x07\x00garbage")?;
        assert_eq!(detect_kind(job(), tmp.path())?, ArchiveKind::Rar);
        assert!(matches!(
            MemberReader::open(job(), tmp.path(), false),
            Err(NormalizeError::ArchiveFormat { .. })
        ));
        Ok(())
    }

    #[test]
    fn rar_members_are_filtered_and_read_whole() -> anyhow::Result<()> {
        let path = rar_fixture();
        assert_eq!(detect_kind(job(), &path)?, ArchiveKind::Rar);

        let mut reader = MemberReader::open(job(), &path, true)?;
        assert!(matches!(reader, MemberReader::Rar { .. }));
        let mut seen = Vec::new();
        let keep = |name: &str| {
            seen.push(name.to_string());
            name.contains("Receitas")
        };
        let member = reader.next_member(keep).unwrap().unwrap();
        assert_eq!(member.name, "AC/ReceitasCandidatos.txt");
        assert_eq!(seen, vec!["AC/DespesasCandidatos.txt", "AC/ReceitasCandidatos.txt"]);
        assert!(member.bytes.starts_with(b"\"Data e hora\";\"Sequencial Candidato\";\"UF\""));
        assert!(member.bytes.ends_with(b"\"250,00\";\"\";\"\";\"\";\"\"\r\n"));
        // Latin-1 on disk
        assert!(member.bytes.windows(5).any(|w| w == b"Jos\xe9 "));

        assert!(reader.next_member(|_| true).unwrap().is_none());
        Ok(())
    }
}
