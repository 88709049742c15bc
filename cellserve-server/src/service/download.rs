//! Download Service
//!
//! Packs the output directory of a job into a zip archive.

use cellserve_core::domain::job::JobId;
use std::io::{self, Cursor, Write};
use std::path::{Path, PathBuf};
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use crate::state::AppState;

/// A zipped output directory
#[derive(Debug)]
pub struct JobArchive {
    pub id: JobId,
    pub bytes: Vec<u8>,
}

impl JobArchive {
    /// Name offered to the client for the attachment
    pub fn file_name(&self) -> String {
        format!("{}.zip", self.id)
    }
}

/// Zips every file under the output directory of a job
///
/// Returns `None` when the id is malformed or the job has no output directory.
pub async fn build_archive(
    state: &AppState,
    raw_id: Option<&str>,
) -> io::Result<Option<JobArchive>> {
    let Some(id) = raw_id.and_then(|raw| JobId::parse(raw).ok()) else {
        return Ok(None);
    };

    let dir = state.config.output_dir(&id);
    if !tokio::fs::try_exists(&dir).await? {
        return Ok(None);
    }

    let bytes = tokio::task::spawn_blocking(move || zip_dir(&dir))
        .await
        .map_err(io::Error::other)??;

    tracing::debug!("Archive of job {} is {} byte(s)", id, bytes.len());
    Ok(Some(JobArchive { id, bytes }))
}

fn zip_dir(dir: &Path) -> io::Result<Vec<u8>> {
    let mut files = Vec::new();
    collect_files(dir, &mut files)?;
    files.sort();

    let options =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));

    for path in files {
        let name = archive_name(dir, &path);
        writer.start_file(name, options).map_err(io::Error::other)?;
        writer.write_all(&std::fs::read(&path)?)?;
    }

    let cursor = writer.finish().map_err(io::Error::other)?;
    Ok(cursor.into_inner())
}

fn collect_files(dir: &Path, files: &mut Vec<PathBuf>) -> io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            collect_files(&path, files)?;
        } else {
            files.push(path);
        }
    }
    Ok(())
}

/// Path of a file relative to the archive root, with `/` separators
fn archive_name(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|part| part.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::TempDir;

    #[test]
    fn test_zip_dir_keeps_nested_paths() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("b_output.tif"), b"mask").unwrap();
        std::fs::write(dir.path().join("a_overlay.png"), b"overlay").unwrap();
        std::fs::create_dir(dir.path().join("extra")).unwrap();
        std::fs::write(dir.path().join("extra").join("log.txt"), b"log").unwrap();

        let bytes = zip_dir(dir.path()).unwrap();
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();

        let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
        names.sort();
        assert_eq!(names, vec!["a_overlay.png", "b_output.tif", "extra/log.txt"]);

        let mut contents = String::new();
        archive
            .by_name("extra/log.txt")
            .unwrap()
            .read_to_string(&mut contents)
            .unwrap();
        assert_eq!(contents, "log");
    }

    #[test]
    fn test_zip_dir_of_empty_directory() {
        let dir = TempDir::new().unwrap();

        let bytes = zip_dir(dir.path()).unwrap();
        let archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();

        assert_eq!(archive.len(), 0);
    }
}
