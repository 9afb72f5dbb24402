//! File output helpers: write-then-rename and content hashing.
//!
//! Exports and reports are written to a `.tmp` sibling and renamed into place,
//! so the target path only ever holds a complete file from a finished run.

use crate::error::ChurnError;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// A fully written `.tmp` file waiting to be renamed onto its target.
///
/// Dropping it without [`StagedFile::commit`] removes the temporary file and
/// leaves the target as it was.
#[derive(Debug)]
pub struct StagedFile {
    tmp: Option<PathBuf>,
    path: PathBuf,
}

impl StagedFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Move the staged file onto its target path.
    pub fn commit(mut self) -> Result<(), ChurnError> {
        match self.tmp.take() {
            Some(tmp) => std::fs::rename(&tmp, &self.path).map_err(|e| {
                let _ = std::fs::remove_file(&tmp);
                ChurnError::from(e)
            }),
            None => Ok(()),
        }
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if let Some(tmp) = self.tmp.take() {
            let _ = std::fs::remove_file(tmp);
        }
    }
}

/// Write the `.tmp` sibling of `path` through `write` without touching `path`.
///
/// Parent directories are created. If `write` fails the temporary file is
/// removed.
pub fn stage<F>(path: &Path, write: F) -> Result<StagedFile, ChurnError>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<(), ChurnError>,
{
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = tmp_path(path);
    let staged = StagedFile {
        tmp: Some(tmp.clone()),
        path: path.to_path_buf(),
    };
    let mut writer = BufWriter::new(File::create(&tmp)?);
    write(&mut writer)?;
    writer.flush()?;
    writer.get_ref().sync_all()?;
    Ok(staged)
}

/// Write a file through `write`, then atomically move it to `path`.
///
/// If anything fails `path` is left as it was.
pub fn write_atomically<F>(path: &Path, write: F) -> Result<(), ChurnError>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<(), ChurnError>,
{
    stage(path, write)?.commit()
}

/// Serialize `data` as pretty JSON and write it atomically.
pub fn write_json_atomically<T: serde::Serialize>(
    path: &Path,
    data: &T,
) -> Result<(), ChurnError> {
    write_atomically(path, |writer| {
        serde_json::to_writer_pretty(&mut *writer, data)?;
        writer.write_all(b"\n")?;
        Ok(())
    })
}

/// SHA-256 of a file's contents, lowercase hex.
pub fn sha256_file(path: &Path) -> Result<String, ChurnError> {
    let content = std::fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&content);
    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use tempfile::TempDir;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        rows: usize,
    }

    #[test]
    fn test_write_atomically_creates_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("out.csv");
        write_atomically(&path, |w| {
            w.write_all(b"a,b\n")?;
            Ok(())
        })
        .unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "a,b\n");
        assert!(!tmp_path(&path).exists());
    }

    #[test]
    fn test_failed_write_keeps_previous_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.csv");
        std::fs::write(&path, "previous\n").unwrap();

        let result = write_atomically(&path, |w| {
            w.write_all(b"partial")?;
            Err(ChurnError::schema("boom"))
        });
        assert!(result.is_err());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "previous\n");
        assert!(!tmp_path(&path).exists());
    }

    #[test]
    fn test_uncommitted_stage_leaves_target_alone() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.csv");
        std::fs::write(&path, "previous\n").unwrap();

        let staged = stage(&path, |w| {
            w.write_all(b"next\n")?;
            Ok(())
        })
        .unwrap();
        assert_eq!(staged.path(), path.as_path());
        assert_eq!(std::fs::read_to_string(tmp_path(&path)).unwrap(), "next\n");
        drop(staged);

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "previous\n");
        assert!(!tmp_path(&path).exists());

        stage(&path, |w| {
            w.write_all(b"next\n")?;
            Ok(())
        })
        .unwrap()
        .commit()
        .unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "next\n");
    }

    #[test]
    fn test_json_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("report.json");
        write_json_atomically(&path, &Sample { rows: 7 }).unwrap();
        let loaded: Sample =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded, Sample { rows: 7 });
    }

    #[test]
    fn test_sha256_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("abc.txt");
        std::fs::write(&path, "abc").unwrap();
        assert_eq!(
            sha256_file(&path).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
