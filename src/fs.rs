//! Filesystem collaborator.
//!
//! The engine talks to storage through [`FileSystem`], an object-safe async
//! trait covering directory creation, recursive listing, and streaming file
//! handles. Paths are forward-slash strings so partition segments compose the
//! same way on every backend.

use std::{io, path::PathBuf};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncSeek, AsyncWrite};

/// Readable file handle: the parquet async reader consumes anything that is
/// `AsyncRead + AsyncSeek`.
pub trait InputFile: AsyncRead + AsyncSeek + Send + Unpin {}
impl<T: AsyncRead + AsyncSeek + Send + Unpin> InputFile for T {}

/// Writable file handle.
pub trait OutputFile: AsyncWrite + Send + Unpin {}
impl<T: AsyncWrite + Send + Unpin> OutputFile for T {}

/// A listing request: everything under `base_dir`, optionally recursing into
/// subdirectories.
#[derive(Clone, Debug)]
pub struct FileSelector {
    pub base_dir: String,
    pub recursive: bool,
}

impl FileSelector {
    pub fn new(base_dir: impl Into<String>) -> Self {
        Self {
            base_dir: base_dir.into(),
            recursive: true,
        }
    }

    pub fn with_recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }
}

/// One listing result.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileEntry {
    pub path: String,
    pub is_dir: bool,
}

#[async_trait]
pub trait FileSystem: Send + Sync {
    async fn create_dir_all(&self, path: &str) -> io::Result<()>;

    /// List entries under the selector. Order is unspecified here; discovery
    /// sorts lexicographically for determinism.
    async fn list(&self, selector: &FileSelector) -> io::Result<Vec<FileEntry>>;

    async fn open_input(&self, path: &str) -> io::Result<Box<dyn InputFile>>;

    /// Open for writing, creating or truncating the file.
    async fn open_output(&self, path: &str) -> io::Result<Box<dyn OutputFile>>;

    async fn remove_file(&self, path: &str) -> io::Result<()>;

    async fn remove_dir_all(&self, path: &str) -> io::Result<()>;
}

/// Join path components with a single `/`.
pub(crate) fn join_path(base: &str, child: &str) -> String {
    let base = base.trim_end_matches('/');
    if base.is_empty() {
        child.to_string()
    } else {
        format!("{base}/{child}")
    }
}

/// The path components of `path` below `base`, or `None` if `path` is not
/// under `base`.
pub(crate) fn segments_below<'a>(base: &str, path: &'a str) -> Option<Vec<&'a str>> {
    let base = base.trim_end_matches('/');
    let rest = if base.is_empty() {
        path
    } else {
        path.strip_prefix(base)?.strip_prefix('/')?
    };
    Some(rest.split('/').filter(|s| !s.is_empty()).collect())
}

/// [`FileSystem`] over the local disk via `tokio::fs`.
#[derive(Clone, Copy, Debug, Default)]
pub struct LocalFileSystem;

impl LocalFileSystem {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl FileSystem for LocalFileSystem {
    async fn create_dir_all(&self, path: &str) -> io::Result<()> {
        tokio::fs::create_dir_all(path).await
    }

    async fn list(&self, selector: &FileSelector) -> io::Result<Vec<FileEntry>> {
        let mut entries = Vec::new();
        let mut pending = vec![PathBuf::from(&selector.base_dir)];

        while let Some(dir) = pending.pop() {
            let mut read_dir = tokio::fs::read_dir(&dir).await?;
            while let Some(entry) = read_dir.next_entry().await? {
                let file_type = entry.file_type().await?;
                let path = entry.path().to_string_lossy().replace('\\', "/");
                let is_dir = file_type.is_dir();
                if is_dir && selector.recursive {
                    pending.push(entry.path());
                }
                entries.push(FileEntry { path, is_dir });
            }
        }

        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(entries)
    }

    async fn open_input(&self, path: &str) -> io::Result<Box<dyn InputFile>> {
        let file = tokio::fs::File::open(path).await?;
        Ok(Box::new(file))
    }

    async fn open_output(&self, path: &str) -> io::Result<Box<dyn OutputFile>> {
        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .open(path)
            .await?;
        Ok(Box::new(file))
    }

    async fn remove_file(&self, path: &str) -> io::Result<()> {
        tokio::fs::remove_file(path).await
    }

    async fn remove_dir_all(&self, path: &str) -> io::Result<()> {
        tokio::fs::remove_dir_all(path).await
    }
}
