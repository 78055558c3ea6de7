//! OCR Providers
//!
//! Defines the provider trait implemented by every recognition backend.

use std::path::Path;

use async_trait::async_trait;

use super::types::{OcrError, PageText};
use crate::raster::PageImage;

/// OCR provider trait
#[async_trait]
pub trait OcrProvider: Send + Sync {
    /// Short engine name used in logs and error messages
    fn name(&self) -> &'static str;

    /// Recognize the text on one page.
    ///
    /// `scratch_dir` belongs to the current request. Providers that need the
    /// image on disk must stage it there behind a guard that removes it when
    /// the call returns, fails or is cancelled.
    async fn recognize(&self, image: &PageImage, scratch_dir: &Path) -> Result<PageText, OcrError>;
}
