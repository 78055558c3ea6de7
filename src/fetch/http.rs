//! HTTP fetcher
//!
//! Streams the response body straight into a temporary file so peak memory
//! stays bounded by the chunk size, not the document size.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::io::AsyncWriteExt;

use super::{DocumentFile, DocumentReference, FetchError, Fetcher};

/// Downloads documents over HTTP(S)
#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    max_bytes: u64,
}

impl HttpFetcher {
    pub fn new(timeout: Duration, max_bytes: u64) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("pdf-ocr-server/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client, max_bytes })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, reference: &DocumentReference, dest_dir: &Path) -> Result<DocumentFile, FetchError> {
        let response = self
            .client
            .get(reference.url().clone())
            .send()
            .await
            .map_err(|e| FetchError::Unreachable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::BadStatus {
                status: status.as_u16(),
                url: reference.to_string(),
            });
        }

        if let Some(length) = response.content_length() {
            if length > self.max_bytes {
                return Err(FetchError::TooLarge { limit: self.max_bytes });
            }
        }

        // The temp path deletes the file on drop, so every early return
        // below cleans up the partial download.
        let (file, temp_path) = tempfile::Builder::new()
            .prefix("document-")
            .suffix(".pdf")
            .tempfile_in(dest_dir)?
            .into_parts();
        let mut file = tokio::fs::File::from_std(file);

        let mut written: u64 = 0;
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| FetchError::Unreachable(e.to_string()))?;
            written += chunk.len() as u64;
            if written > self.max_bytes {
                return Err(FetchError::TooLarge { limit: self.max_bytes });
            }
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        file.sync_all().await?;

        tracing::debug!("Downloaded {} bytes from {} to {}", written, reference, temp_path.display());

        Ok(DocumentFile::new(temp_path, written))
    }
}
