//! Local filesystem backend
//!
//! Keys are paths, resolved against an optional root directory.
//! Reads and writes go through streams so callers that want to
//! process bytes incrementally can; `download`/`upload` are the
//! whole-buffer conveniences built on top of them.

use crate::backend::{Locality, StorageBackend};
use crate::error::StorageError;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};

/// Local filesystem storage
#[derive(Debug, Clone, Default)]
pub struct LocalStorage {
    root: Option<PathBuf>,
}

impl LocalStorage {
    /// Create storage resolving keys against the working directory
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self { root: None }
    }

    /// With a root directory for relative keys
    #[inline]
    #[must_use]
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    /// Resolve a key to a filesystem path
    ///
    /// # Errors
    ///
    /// Returns `InvalidKey` for an empty key.
    pub fn resolve(&self, key: &str) -> Result<PathBuf, StorageError> {
        if key.trim().is_empty() {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        let path = Path::new(key);
        Ok(match &self.root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        })
    }

    /// Open a read stream on `key`
    ///
    /// # Errors
    ///
    /// `NotFound` when the file does not exist, `Io` for anything else.
    pub async fn open_read_stream(&self, key: &str) -> Result<File, StorageError> {
        let path = self.resolve(key)?;
        File::open(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::NotFound {
                    key: key.to_string(),
                }
            } else {
                StorageError::io_error(&path, e)
            }
        })
    }

    /// Open a write stream on `key`, truncating any existing file
    ///
    /// # Errors
    ///
    /// Returns `Io` if the file cannot be created.
    pub async fn open_write_stream(&self, key: &str) -> Result<LocalSink, StorageError> {
        let path = self.resolve(key)?;
        let file = File::create(&path)
            .await
            .map_err(|e| StorageError::io_error(&path, e))?;
        Ok(LocalSink {
            path,
            writer: BufWriter::new(file),
            written: 0,
        })
    }
}

/// Write half of a local file
///
/// Bytes are durable only after [`LocalSink::finish`] returns.
#[derive(Debug)]
pub struct LocalSink {
    path: PathBuf,
    writer: BufWriter<File>,
    written: u64,
}

impl LocalSink {
    /// Append a chunk
    ///
    /// # Errors
    ///
    /// Returns `Io` on write failure.
    pub async fn write(&mut self, chunk: &[u8]) -> Result<(), StorageError> {
        self.writer
            .write_all(chunk)
            .await
            .map_err(|e| StorageError::io_error(&self.path, e))?;
        self.written += chunk.len() as u64;
        Ok(())
    }

    /// Flush and sync to disk, returning the number of bytes written
    ///
    /// # Errors
    ///
    /// Returns `Io` if the flush or sync fails.
    pub async fn finish(mut self) -> Result<u64, StorageError> {
        self.writer
            .flush()
            .await
            .map_err(|e| StorageError::io_error(&self.path, e))?;
        self.writer
            .get_ref()
            .sync_all()
            .await
            .map_err(|e| StorageError::io_error(&self.path, e))?;
        Ok(self.written)
    }

    /// Destination path
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait::async_trait]
impl StorageBackend for LocalStorage {
    async fn download(&self, key: &str) -> Result<Bytes, StorageError> {
        let mut file = self.open_read_stream(key).await?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf)
            .await
            .map_err(|e| StorageError::io_error(key, e))?;

        tracing::debug!(key, bytes = buf.len(), "read local file");
        Ok(Bytes::from(buf))
    }

    async fn upload(&self, key: &str, body: Bytes) -> Result<(), StorageError> {
        let mut sink = self.open_write_stream(key).await?;
        sink.write(&body).await?;
        let written = sink.finish().await?;

        tracing::debug!(key, bytes = written, "wrote local file");
        Ok(())
    }

    fn locality(&self) -> Locality {
        Locality::Local
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn round_trip_is_byte_identical() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new().with_root(dir.path());
        let body = Bytes::from_static(&[0xff, 0xd8, 0x00, 0x01, 0x02, 0xff, 0xd9]);

        storage.upload("out.jpg", body.clone()).await.unwrap();
        let back = storage.download("out.jpg").await.unwrap();

        assert_eq!(back, body);
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new().with_root(dir.path());

        let err = storage.download("nope.jpg").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn empty_key_rejected() {
        let storage = LocalStorage::new();
        assert!(matches!(
            storage.download("").await,
            Err(StorageError::InvalidKey(_))
        ));
    }

    #[tokio::test]
    async fn sink_reports_bytes_written() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new().with_root(dir.path());

        let mut sink = storage.open_write_stream("chunks.bin").await.unwrap();
        sink.write(b"abc").await.unwrap();
        sink.write(b"defg").await.unwrap();
        assert_eq!(sink.finish().await.unwrap(), 7);

        let on_disk = std::fs::read(dir.path().join("chunks.bin")).unwrap();
        assert_eq!(on_disk, b"abcdefg");
    }

    #[test]
    fn absolute_keys_ignore_root() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new().with_root("/somewhere/else");
        let absolute = dir.path().join("a.jpg");

        let resolved = storage.resolve(absolute.to_str().unwrap()).unwrap();
        assert_eq!(resolved, absolute);
    }
}
