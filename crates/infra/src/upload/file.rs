//! Upload descriptors for multipart file parts.

use std::fmt;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use roe_domain::{Result, RoeError};
use tokio::io::{AsyncRead, AsyncReadExt};
use url::Url;

use super::sniff::detect_content_type;

const DEFAULT_FILENAME: &str = "upload";

/// Boxed byte stream accepted as an upload source.
pub type UploadReader = Box<dyn AsyncRead + Send + Unpin>;

enum Source {
    Path(PathBuf),
    Reader(UploadReader),
    Bytes(Bytes),
    Url(String),
}

/// A file to send with an agent run.
///
/// Exactly one source is set: a local path, a reader, an in-memory buffer or
/// a remote URL. URL uploads are sent as plain form values and never read
/// locally.
pub struct FileUpload {
    source: Source,
    filename: Option<String>,
    mime_type: Option<String>,
    max_bytes: Option<u64>,
}

impl fmt::Debug for FileUpload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let source = match &self.source {
            Source::Path(path) => format!("path({})", path.display()),
            Source::Reader(_) => "reader".to_owned(),
            Source::Bytes(data) => format!("bytes({})", data.len()),
            Source::Url(url) => format!("url({url})"),
        };
        f.debug_struct("FileUpload")
            .field("source", &source)
            .field("filename", &self.filename)
            .field("mime_type", &self.mime_type)
            .field("max_bytes", &self.max_bytes)
            .finish()
    }
}

/// A fully read upload, ready to become a multipart part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePart {
    pub field: String,
    pub filename: String,
    pub content_type: String,
    pub data: Bytes,
}

impl FileUpload {
    fn with_source(source: Source) -> Self {
        Self { source, filename: None, mime_type: None, max_bytes: None }
    }

    /// Upload read from a local file.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self::with_source(Source::Path(path.into()))
    }

    /// Upload drained from an async reader.
    pub fn from_reader<R>(reader: R) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        Self::with_source(Source::Reader(Box::new(reader)))
    }

    /// Upload from in-memory bytes.
    pub fn from_bytes(data: impl Into<Bytes>) -> Self {
        Self::with_source(Source::Bytes(data.into()))
    }

    /// Remote file the server fetches itself.
    pub fn from_url(url: impl Into<String>) -> Self {
        Self::with_source(Source::Url(url.into()))
    }

    /// Override the filename sent in the multipart part.
    #[must_use]
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    /// Skip content sniffing and send this type.
    #[must_use]
    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    /// Reject sources larger than `max_bytes`.
    #[must_use]
    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = Some(max_bytes);
        self
    }

    /// Local path of a path upload.
    pub fn path(&self) -> Option<&Path> {
        match &self.source {
            Source::Path(path) => Some(path),
            _ => None,
        }
    }

    /// Remote location of a URL upload.
    pub fn url(&self) -> Option<&str> {
        match &self.source {
            Source::Url(url) => Some(url),
            _ => None,
        }
    }

    /// True for URL uploads whose URL has both a scheme and a host.
    pub fn is_url(&self) -> bool {
        self.url().and_then(|raw| Url::parse(raw).ok()).is_some_and(|url| url.has_host())
    }

    /// Explicit content type, if set.
    pub fn mime_type(&self) -> Option<&str> {
        self.mime_type.as_deref()
    }

    /// Explicit name, else the path's base name, else the URL's last
    /// segment, else `upload`.
    pub fn filename(&self) -> String {
        if let Some(name) = self.filename.as_deref().filter(|n| !n.is_empty()) {
            return name.to_owned();
        }
        let derived = match &self.source {
            Source::Path(path) => {
                path.file_name().map(|name| name.to_string_lossy().into_owned())
            }
            Source::Url(raw) => url_basename(raw),
            Source::Reader(_) | Source::Bytes(_) => None,
        };
        derived.filter(|n| !n.is_empty()).unwrap_or_else(|| DEFAULT_FILENAME.to_owned())
    }

    /// Read the whole source and resolve its filename and content type.
    ///
    /// Local files are opened before they are inspected, so the checks apply
    /// to the file actually read.
    pub async fn into_part(self, field: &str) -> Result<FilePart> {
        let filename = self.filename();
        let data = match self.source {
            Source::Path(ref path) => read_path(path, self.max_bytes).await?,
            Source::Reader(reader) => read_limited(reader, self.max_bytes).await.map_err(|err| {
                RoeError::invalid_input(format!("read upload for {field}: {err}"))
            })??,
            Source::Bytes(ref data) => {
                check_size(data.len() as u64, self.max_bytes)
                    .map_err(|max| RoeError::invalid_input(exceeds(&filename, max)))?;
                data.clone()
            }
            Source::Url(_) => {
                return Err(RoeError::invalid_input(
                    "file upload requires a path, reader or bytes; URL uploads are sent as form values",
                ))
            }
        };

        let content_type = detect_content_type(self.mime_type.as_deref(), &filename, &data);
        Ok(FilePart { field: field.to_owned(), filename, content_type, data })
    }
}

async fn read_path(path: &Path, max_bytes: Option<u64>) -> Result<Bytes> {
    let file_error = |message: String| RoeError::File { path: path.to_path_buf(), message };

    let file = tokio::fs::File::open(path).await.map_err(|err| file_error(format!("open: {err}")))?;
    let metadata = file.metadata().await.map_err(|err| file_error(format!("stat: {err}")))?;
    if metadata.is_dir() {
        return Err(file_error("is a directory, file upload requires a file".to_owned()));
    }
    if metadata.len() == 0 {
        return Err(file_error("is empty".to_owned()));
    }
    check_size(metadata.len(), max_bytes)
        .map_err(|max| file_error(format!("exceeds max size of {max} bytes")))?;

    let data = read_limited(file, max_bytes)
        .await
        .map_err(|err| file_error(format!("read: {err}")))?
        .map_err(|_| file_error(format!("exceeds max size of {} bytes", max_bytes.unwrap_or(0))))?;
    if data.is_empty() {
        return Err(file_error("is empty".to_owned()));
    }
    Ok(data)
}

/// Read to the end, stopping one byte past `max_bytes`. The inner result is
/// the size violation.
async fn read_limited<R>(reader: R, max_bytes: Option<u64>) -> std::io::Result<Result<Bytes>>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    match max_bytes {
        Some(max) => {
            reader.take(max.saturating_add(1)).read_to_end(&mut buf).await?;
            if buf.len() as u64 > max {
                return Ok(Err(RoeError::invalid_input(format!(
                    "upload exceeds max size of {max} bytes"
                ))));
            }
        }
        None => {
            let mut reader = reader;
            reader.read_to_end(&mut buf).await?;
        }
    }
    Ok(Ok(Bytes::from(buf)))
}

fn check_size(len: u64, max_bytes: Option<u64>) -> std::result::Result<(), u64> {
    match max_bytes {
        Some(max) if len > max => Err(max),
        _ => Ok(()),
    }
}

fn exceeds(filename: &str, max: u64) -> String {
    format!("{filename} exceeds max size of {max} bytes")
}

fn url_basename(raw: &str) -> Option<String> {
    let url = Url::parse(raw).ok()?;
    url.path_segments()?.rev().find(|segment| !segment.is_empty()).map(str::to_owned)
}
