//! File downloads with attachment headers.
//!
//! A `DownloadResponse` owns the open file. The handle is closed when the
//! response is consumed or dropped, whichever comes first, so every exit
//! path of the code streaming it releases the file.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};

use drugquery_common::{DrugQueryError, Result};

/// Generic binary content type that makes browsers save instead of render.
pub const FORCE_DOWNLOAD: &str = "application/force-download";

#[derive(Debug)]
pub struct DownloadResponse {
    pub content_type: &'static str,
    pub content_disposition: String,
    pub filename: String,
    path: PathBuf,
    file: File,
}

impl DownloadResponse {
    /// Open `path` read-only. A missing file is `NotFound`.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => DrugQueryError::NotFound(format!("file {}", path.display())),
            _ => DrugQueryError::Io(e),
        })?;

        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(Self {
            content_type: FORCE_DOWNLOAD,
            content_disposition: format!("attachment; filename=\"{filename}\""),
            filename,
            path: path.to_path_buf(),
            file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stream the whole file into `out`, then close it.
    pub async fn copy_to<W>(mut self, out: &mut W) -> Result<u64>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        Ok(tokio::io::copy(&mut self.file, out).await?)
    }

    /// Read the whole file into memory, then close it.
    pub async fn into_bytes(mut self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.file.read_to_end(&mut buf).await?;
        Ok(buf)
    }

    /// Hand over the raw reader for custom streaming.
    pub fn into_reader(self) -> impl AsyncRead + Unpin {
        self.file
    }
}
