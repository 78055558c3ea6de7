//! Application state management

use std::sync::Arc;

use crate::config::{Config, OcrBackend};
use crate::fetch::HttpFetcher;
use crate::ocr::{GoogleVisionProvider, OcrProvider, TesseractProvider};
use crate::pipeline::{Pipeline, PipelineSettings};
use crate::raster::MupdfRasterizer;

/// Error type for state initialization
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Google Vision selected but no credentials were configured")]
    MissingCredentials,

    #[error("Scratch directory {0} is not usable: {1}")]
    ScratchDir(String, std::io::Error),
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    pipeline: Pipeline,
}

impl AppState {
    /// Build the pipeline from configuration.
    ///
    /// OCR credentials are bound into the provider here, once, before the
    /// server accepts requests.
    pub fn new(config: Config) -> Result<Self, StateError> {
        if let Some(dir) = &config.pipeline.scratch_dir {
            std::fs::create_dir_all(dir).map_err(|e| StateError::ScratchDir(dir.display().to_string(), e))?;
        }

        let fetcher = HttpFetcher::new(config.pipeline.fetch_timeout, config.pipeline.max_document_bytes)?;
        let rasterizer = MupdfRasterizer::new(config.pipeline.render_dpi, config.pipeline.page_format);

        let ocr: Arc<dyn OcrProvider> = match config.ocr.provider {
            OcrBackend::GoogleVision => {
                let credentials = config.ocr.credentials.clone().ok_or(StateError::MissingCredentials)?;
                Arc::new(GoogleVisionProvider::new(
                    &config.ocr.vision_endpoint,
                    credentials,
                    config.ocr.timeout,
                )?)
            }
            OcrBackend::Tesseract => Arc::new(TesseractProvider::new(&config.ocr.language)),
        };
        tracing::info!("OCR provider: {}", ocr.name());

        let pipeline = Pipeline::new(
            Arc::new(fetcher),
            Arc::new(rasterizer),
            ocr,
            PipelineSettings {
                scratch_dir: config.pipeline.scratch_dir.clone(),
                ocr_concurrency: config.pipeline.ocr_concurrency,
                request_timeout: config.pipeline.request_timeout,
            },
        );

        Ok(Self {
            inner: Arc::new(AppStateInner { pipeline }),
        })
    }

    /// Get the pipeline
    pub fn pipeline(&self) -> &Pipeline {
        &self.inner.pipeline
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::VisionCredentials;

    #[test]
    fn test_vision_requires_credentials() {
        let config = Config::default();
        assert!(matches!(AppState::new(config), Err(StateError::MissingCredentials)));
    }

    #[test]
    fn test_build_with_credentials() {
        let scratch = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.ocr.credentials = Some(VisionCredentials::ApiKey("k".to_string()));
        config.pipeline.scratch_dir = Some(scratch.path().join("nested"));
        config.pipeline.ocr_concurrency = 3;

        let state = AppState::new(config).unwrap();

        assert!(scratch.path().join("nested").is_dir());
        assert_eq!(state.pipeline().settings().ocr_concurrency, 3);
    }

    #[test]
    fn test_build_tesseract() {
        let mut config = Config::default();
        config.ocr.provider = OcrBackend::Tesseract;
        assert!(AppState::new(config).is_ok());
    }
}
