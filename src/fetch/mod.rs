//! Document fetching
//!
//! Resolves a caller-supplied reference to a local temporary file.

mod http;

use std::fmt;
use std::path::Path;

use async_trait::async_trait;
use reqwest::Url;
use tempfile::TempPath;

pub use http::HttpFetcher;

/// Locator for a remote document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentReference(Url);

/// Reasons a reference is rejected before any network traffic
#[derive(Debug, thiserror::Error)]
pub enum InvalidReference {
    #[error("pdf_url must not be empty")]
    Empty,

    #[error("pdf_url is not a valid URL: {0}")]
    Malformed(String),

    #[error("pdf_url must use http or https, got '{0}'")]
    UnsupportedScheme(String),

    #[error("pdf_url has no host")]
    MissingHost,
}

impl DocumentReference {
    pub fn parse(raw: &str) -> Result<Self, InvalidReference> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(InvalidReference::Empty);
        }

        let url = Url::parse(raw).map_err(|e| InvalidReference::Malformed(e.to_string()))?;
        match url.scheme() {
            "http" | "https" => {}
            other => return Err(InvalidReference::UnsupportedScheme(other.to_string())),
        }
        if url.host_str().map_or(true, str::is_empty) {
            return Err(InvalidReference::MissingHost);
        }

        Ok(Self(url))
    }

    pub fn url(&self) -> &Url {
        &self.0
    }
}

impl fmt::Display for DocumentReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

/// A downloaded document on disk
///
/// The file is removed when this value is dropped.
#[derive(Debug)]
pub struct DocumentFile {
    path: TempPath,
    size: u64,
}

impl DocumentFile {
    pub fn new(path: TempPath, size: u64) -> Self {
        Self { path, size }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size(&self) -> u64 {
        self.size
    }
}

/// Fetch errors
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("{0}")]
    Unreachable(String),

    #[error("server responded with HTTP {status} for {url}")]
    BadStatus { status: u16, url: String },

    #[error("failed to store downloaded content: {0}")]
    IoFailure(#[from] std::io::Error),

    #[error("document exceeds the {limit} byte limit")]
    TooLarge { limit: u64 },
}

/// Retrieves a document into a scratch directory
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Download `reference` into a new temporary file inside `dest_dir`.
    ///
    /// On failure nothing is left behind in `dest_dir`.
    async fn fetch(&self, reference: &DocumentReference, dest_dir: &Path) -> Result<DocumentFile, FetchError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_reference() {
        let reference = DocumentReference::parse("  https://example.com/docs/a.pdf ").unwrap();
        assert_eq!(reference.to_string(), "https://example.com/docs/a.pdf");
        assert_eq!(reference.url().host_str(), Some("example.com"));
    }

    #[test]
    fn test_parse_invalid_references() {
        assert!(matches!(DocumentReference::parse(""), Err(InvalidReference::Empty)));
        assert!(matches!(DocumentReference::parse("   "), Err(InvalidReference::Empty)));
        assert!(matches!(
            DocumentReference::parse("not a url"),
            Err(InvalidReference::Malformed(_))
        ));
        assert!(matches!(
            DocumentReference::parse("file:///etc/passwd"),
            Err(InvalidReference::UnsupportedScheme(_))
        ));
        assert!(matches!(
            DocumentReference::parse("ftp://example.com/a.pdf"),
            Err(InvalidReference::UnsupportedScheme(_))
        ));
    }

    #[test]
    fn test_document_file_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let temp = tempfile::NamedTempFile::new_in(dir.path()).unwrap();
        let path = temp.path().to_path_buf();

        let document = DocumentFile::new(temp.into_temp_path(), 0);
        assert!(path.exists());
        drop(document);
        assert!(!path.exists());
    }
}
