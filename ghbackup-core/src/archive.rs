//! Archiver: packs destination_root into a `.zip` and removes the original
//!
//! Entry names are relative to the parent of destination_root, so the archive
//! holds a single top-level folder named after it. The uncompressed tree is
//! only deleted once the archive has been finished and synced to disk.

use std::fs::{self, File};
use std::io::{self, Seek, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::{Error, Result};

/// What ended up in a finished archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveSummary {
    /// Path of the written archive
    pub archive_path: PathBuf,
    /// Regular files stored
    pub files: usize,
    /// Uncompressed bytes stored
    pub bytes: u64,
}

/// Writes deflate-compressed zip archives of a directory tree
#[derive(Debug, Clone, Copy)]
pub struct Archiver {
    compression: CompressionMethod,
}

impl Default for Archiver {
    fn default() -> Self {
        Self {
            compression: CompressionMethod::Deflated,
        }
    }
}

impl Archiver {
    /// Create an archiver using deflate compression
    pub fn new() -> Self {
        Self::default()
    }

    /// Pack `root` into `writer` and hand the finished writer back
    ///
    /// Does not touch `root`.
    pub fn write_archive<W: Write + Seek>(&self, root: &Path, writer: W) -> Result<W> {
        self.pack(root, writer)
            .map(|(writer, _, _)| writer)
            .map_err(|message| Error::Archive {
                path: root.to_path_buf(),
                message,
            })
    }

    /// Pack `root` into `archive_path`, then delete `root`
    ///
    /// On any archive failure the partial archive is removed and `root` is
    /// left untouched.
    pub fn compress(&self, root: &Path, archive_path: &Path) -> Result<ArchiveSummary> {
        self.compress_with(root, archive_path, |path| File::create(path), File::sync_all)
    }

    /// [`Archiver::compress`] with the archive sink supplied by `open`
    ///
    /// `open` must create the file at the path it is given; `sync` runs after
    /// the archive is finished and before `root` is removed.
    fn compress_with<W, O, S>(
        &self,
        root: &Path,
        archive_path: &Path,
        open: O,
        sync: S,
    ) -> Result<ArchiveSummary>
    where
        W: Write + Seek,
        O: FnOnce(&Path) -> io::Result<W>,
        S: FnOnce(&W) -> io::Result<()>,
    {
        let archive_err = |message: String| Error::Archive {
            path: archive_path.to_path_buf(),
            message,
        };

        let root = fs::canonicalize(root).map_err(|e| Error::filesystem(root, e))?;
        if let Some(parent) = archive_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if let Ok(parent) = fs::canonicalize(parent) {
                if parent.starts_with(&root) {
                    return Err(archive_err(
                        "archive must be written outside the directory being archived".to_string(),
                    ));
                }
            }
        }

        info!(root = %root.display(), archive = %archive_path.display(), "Creating archive");

        let sink =
            open(archive_path).map_err(|e| archive_err(format!("cannot open for writing: {}", e)))?;

        let packed = self.pack(&root, sink).and_then(|(sink, files, bytes)| {
            sync(&sink).map_err(|e| format!("failed to flush archive: {}", e))?;
            Ok((files, bytes))
        });

        let (files, bytes) = match packed {
            Ok(counts) => counts,
            Err(message) => {
                if let Err(e) = fs::remove_file(archive_path) {
                    warn!(archive = %archive_path.display(), error = %e, "Failed to remove partial archive");
                }
                return Err(archive_err(message));
            }
        };

        info!(
            archive = %archive_path.display(),
            files,
            bytes,
            "Archive written; removing uncompressed copy"
        );

        fs::remove_dir_all(&root).map_err(|e| Error::filesystem(&root, e))?;

        Ok(ArchiveSummary {
            archive_path: archive_path.to_path_buf(),
            files,
            bytes,
        })
    }

    fn pack<W: Write + Seek>(
        &self,
        root: &Path,
        writer: W,
    ) -> std::result::Result<(W, usize, u64), String> {
        let base = root.parent().unwrap_or(Path::new(""));
        let options = SimpleFileOptions::default().compression_method(self.compression);
        let mut zip = ZipWriter::new(writer);
        let mut files = 0usize;
        let mut bytes = 0u64;

        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = entry.map_err(|e| format!("failed to walk directory: {}", e))?;
            let path = entry.path();
            let name = entry_name(base, path)?;

            if entry.file_type().is_dir() {
                zip.add_directory(name, options)
                    .map_err(|e| format!("failed to add directory {}: {}", path.display(), e))?;
            } else if entry.file_type().is_file() {
                zip.start_file(name, options)
                    .map_err(|e| format!("failed to start entry {}: {}", path.display(), e))?;
                let mut source = File::open(path)
                    .map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
                bytes += io::copy(&mut source, &mut zip)
                    .map_err(|e| format!("failed to write {}: {}", path.display(), e))?;
                files += 1;
            } else {
                debug!(path = %path.display(), "Skipping non-regular file");
            }
        }

        let writer = zip
            .finish()
            .map_err(|e| format!("failed to finish archive: {}", e))?;

        Ok((writer, files, bytes))
    }
}

// Zip entry names always use '/' regardless of platform.
fn entry_name(base: &Path, path: &Path) -> std::result::Result<String, String> {
    let relative = path
        .strip_prefix(base)
        .map_err(|_| format!("{} is outside {}", path.display(), base.display()))?;

    Ok(relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Read};
    use tempfile::TempDir;

    fn sample_tree(temp: &TempDir) -> PathBuf {
        let root = temp.path().join("github_alice_source_2024-01-01_00-00");
        fs::create_dir_all(root.join("a")).unwrap();
        fs::create_dir_all(root.join("b")).unwrap();
        fs::write(root.join("a/x.txt"), b"contents of x").unwrap();
        fs::write(root.join("b/y.txt"), b"contents of y\n").unwrap();
        root
    }

    fn read_entry<R: Read + Seek>(archive: &mut zip::ZipArchive<R>, name: &str) -> Vec<u8> {
        let mut entry = archive.by_name(name).unwrap();
        let mut buf = Vec::new();
        entry.read_to_end(&mut buf).unwrap();
        buf
    }

    #[test]
    fn test_entry_name() {
        assert_eq!(
            entry_name(Path::new("/tmp"), Path::new("/tmp/root/a/x.txt")).unwrap(),
            "root/a/x.txt"
        );
        assert!(entry_name(Path::new("/var"), Path::new("/tmp/root")).is_err());
    }

    #[test]
    fn test_write_archive_to_memory() {
        let temp = TempDir::new().unwrap();
        let root = sample_tree(&temp);

        let cursor = Archiver::new()
            .write_archive(&root, Cursor::new(Vec::new()))
            .unwrap();

        let mut archive = zip::ZipArchive::new(cursor).unwrap();
        assert_eq!(
            read_entry(&mut archive, "github_alice_source_2024-01-01_00-00/a/x.txt"),
            b"contents of x"
        );
        let entry = archive
            .by_name("github_alice_source_2024-01-01_00-00/b/y.txt")
            .unwrap();
        assert_eq!(entry.compression(), CompressionMethod::Deflated);
        // write_archive never deletes
        assert!(root.exists());
    }

    /// Accepts a fixed number of bytes, then fails every write
    #[derive(Debug)]
    struct FailingWriter<W> {
        inner: W,
        written: usize,
        budget: usize,
    }

    impl<W> FailingWriter<W> {
        fn new(inner: W, budget: usize) -> Self {
            Self {
                inner,
                written: 0,
                budget,
            }
        }
    }

    impl<W: Write> Write for FailingWriter<W> {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.written + buf.len() > self.budget {
                return Err(io::Error::other("disk full"));
            }
            let n = self.inner.write(buf)?;
            self.written += n;
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            self.inner.flush()
        }
    }

    impl<W: Seek> Seek for FailingWriter<W> {
        fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64> {
            self.inner.seek(pos)
        }
    }

    #[test]
    fn test_mid_write_failure_is_archive_error() {
        let temp = TempDir::new().unwrap();
        let root = sample_tree(&temp);
        let writer = FailingWriter::new(Cursor::new(Vec::new()), 64);

        let err = Archiver::new().write_archive(&root, writer).unwrap_err();
        assert!(matches!(err, Error::Archive { .. }));
        assert!(root.join("a/x.txt").exists());
    }

    #[test]
    fn test_compress_mid_write_failure_keeps_tree_and_removes_partial() {
        let temp = TempDir::new().unwrap();
        let root = sample_tree(&temp);
        let archive_path = temp.path().join("backup.zip");

        let err = Archiver::new()
            .compress_with(
                &root,
                &archive_path,
                |path| File::create(path).map(|f| FailingWriter::new(f, 64)),
                |_| Ok(()),
            )
            .unwrap_err();

        match err {
            Error::Archive { path, .. } => assert_eq!(path, archive_path),
            other => panic!("expected archive error, got {:?}", other),
        }
        assert!(!archive_path.exists());
        assert_eq!(fs::read(root.join("a/x.txt")).unwrap(), b"contents of x");
        assert_eq!(fs::read(root.join("b/y.txt")).unwrap(), b"contents of y\n");
    }

    #[test]
    fn test_failed_sync_keeps_tree() {
        let temp = TempDir::new().unwrap();
        let root = sample_tree(&temp);
        let archive_path = temp.path().join("backup.zip");

        let err = Archiver::new()
            .compress_with(&root, &archive_path, |path| File::create(path), |_| {
                Err(io::Error::other("fsync failed"))
            })
            .unwrap_err();

        assert!(matches!(err, Error::Archive { .. }));
        assert!(!archive_path.exists());
        assert!(root.join("a/x.txt").is_file());
    }
}
