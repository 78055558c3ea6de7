//! Document ingestion pipeline
//!
//! Fetch -> rasterize -> OCR every page -> aggregate, as a linear state
//! machine:
//!
//! ```text
//! Fetching -> Rasterizing -> Recognizing -> Aggregating -> Succeeded
//!     \____________\______________\______________\---> Failed
//! ```
//!
//! Any failure is terminal and no partial text is ever returned. All temporary
//! artifacts live in a per-request [`Workspace`] owned by the run, so they are
//! released on every exit path: success, failure, timeout, or the caller
//! dropping the request.

mod aggregate;
mod workspace;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use futures::{stream, StreamExt, TryStreamExt};
use tracing::Instrument;

use crate::fetch::{DocumentFile, DocumentReference, FetchError, Fetcher};
use crate::ocr::{OcrError, OcrProvider, PageText};
use crate::raster::{PageImage, RasterError, Rasterizer};

pub use aggregate::{aggregate, page_marker};
pub use workspace::Workspace;

/// Pipeline errors, tagged with the stage that failed
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Error downloading file: {0}")]
    Fetch(#[source] FetchError),

    #[error("Error rendering PDF: {0}")]
    Raster(#[source] RasterError),

    #[error("OCR failed on page {page}: {source}")]
    Ocr {
        page: usize,
        #[source]
        source: OcrError,
    },

    #[error("Failed to prepare scratch space: {0}")]
    Workspace(#[source] std::io::Error),

    #[error("Processing timed out after {0} seconds")]
    TimedOut(u64),
}

impl PipelineError {
    /// Name of the stage the run was in when it failed
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Fetch(_) | Self::Workspace(_) => "fetching",
            Self::Raster(_) => "rasterizing",
            Self::Ocr { .. } => "recognizing",
            Self::TimedOut(_) => "timed out",
        }
    }
}

/// Pipeline settings
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Root for per-request workspaces (system temp dir if unset)
    pub scratch_dir: Option<PathBuf>,
    /// Pages recognized at once; 1 keeps recognition strictly sequential
    pub ocr_concurrency: usize,
    pub request_timeout: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            scratch_dir: None,
            ocr_concurrency: 1,
            request_timeout: Duration::from_secs(300),
        }
    }
}

/// Run state; each variant owns exactly what the next step consumes
enum Stage {
    Fetching,
    Rasterizing(DocumentFile),
    Recognizing(Vec<PageImage>),
    Aggregating(Vec<PageText>),
    Succeeded(String),
}

impl Stage {
    fn name(&self) -> &'static str {
        match self {
            Stage::Fetching => "fetching",
            Stage::Rasterizing(_) => "rasterizing",
            Stage::Recognizing(_) => "recognizing",
            Stage::Aggregating(_) => "aggregating",
            Stage::Succeeded(_) => "succeeded",
        }
    }
}

/// Pipeline orchestrator
#[derive(Clone)]
pub struct Pipeline {
    fetcher: Arc<dyn Fetcher>,
    rasterizer: Arc<dyn Rasterizer>,
    ocr: Arc<dyn OcrProvider>,
    settings: PipelineSettings,
}

impl Pipeline {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        rasterizer: Arc<dyn Rasterizer>,
        ocr: Arc<dyn OcrProvider>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            fetcher,
            rasterizer,
            ocr,
            settings,
        }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Extract the text of every page of the referenced document.
    pub async fn process(&self, reference: &DocumentReference) -> Result<String, PipelineError> {
        let request_id = uuid::Uuid::new_v4().simple().to_string();
        let span = tracing::info_span!("pipeline", request_id = %&request_id[..8], url = %reference);
        let timeout = self.settings.request_timeout;

        async move {
            // Timing out drops the run, and with it the workspace and any
            // in-flight page tasks.
            match tokio::time::timeout(timeout, self.run(reference, &request_id)).await {
                Ok(Ok(text)) => Ok(text),
                Ok(Err(e)) => {
                    tracing::warn!("Pipeline failed while {}: {}", e.stage(), e);
                    Err(e)
                }
                Err(_) => {
                    tracing::warn!("Pipeline timed out after {:?}", timeout);
                    Err(PipelineError::TimedOut(timeout.as_secs()))
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn run(&self, reference: &DocumentReference, request_id: &str) -> Result<String, PipelineError> {
        let workspace = Workspace::create(self.settings.scratch_dir.as_deref(), &request_id[..8])
            .map_err(PipelineError::Workspace)?;

        let mut stage = Stage::Fetching;
        loop {
            tracing::debug!("Pipeline stage: {}", stage.name());
            stage = match stage {
                Stage::Fetching => {
                    let document = self
                        .fetcher
                        .fetch(reference, workspace.path())
                        .await
                        .map_err(PipelineError::Fetch)?;
                    tracing::info!("Downloaded {} bytes", document.size());
                    Stage::Rasterizing(document)
                }
                Stage::Rasterizing(document) => {
                    let pages = self
                        .rasterizer
                        .rasterize(&document)
                        .await
                        .map_err(PipelineError::Raster)?;
                    // The document is no longer needed once pages exist
                    drop(document);
                    tracing::info!("Rendered {} pages", pages.len());
                    Stage::Recognizing(pages)
                }
                Stage::Recognizing(pages) => {
                    Stage::Aggregating(self.recognize_all(pages, &workspace).await?)
                }
                Stage::Aggregating(results) => Stage::Succeeded(aggregate(results)),
                Stage::Succeeded(text) => return Ok(text),
            };
        }
    }

    /// OCR every page, at most `ocr_concurrency` at a time.
    ///
    /// Results are collected in completion order and put back in page order by
    /// [`aggregate`]. The first failure to complete aborts the run; outstanding
    /// page tasks are dropped, which cancels their engine calls and releases
    /// their staged artifacts.
    async fn recognize_all(
        &self,
        pages: Vec<PageImage>,
        workspace: &Workspace,
    ) -> Result<Vec<PageText>, PipelineError> {
        let ocr = &self.ocr;
        let scratch = workspace.path();
        let concurrency = self.settings.ocr_concurrency.max(1);

        stream::iter(pages)
            .map(move |image| async move {
                tracing::info!("Processing page {}...", image.page);
                let page = image.page;
                ocr.recognize(&image, scratch)
                    .await
                    .map(|result| PageText {
                        page,
                        text: result.text,
                    })
                    .map_err(|source| PipelineError::Ocr { page, source })
            })
            .buffer_unordered(concurrency)
            .try_collect()
            .await
    }
}
