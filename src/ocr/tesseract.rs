//! Tesseract OCR provider
//!
//! Runs the local `tesseract` CLI. The page image is staged in the request's
//! scratch directory for the duration of the call only.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::provider::OcrProvider;
use super::types::{OcrError, PageText};
use crate::raster::PageImage;

const ENGINE: &str = "Tesseract";

/// Tesseract OCR provider
pub struct TesseractProvider {
    binary: String,
    language: String,
}

impl TesseractProvider {
    pub fn new(language: &str) -> Self {
        Self::with_binary("tesseract", language)
    }

    pub fn with_binary(binary: &str, language: &str) -> Self {
        Self {
            binary: binary.to_string(),
            language: language.to_string(),
        }
    }
}

#[async_trait]
impl OcrProvider for TesseractProvider {
    fn name(&self) -> &'static str {
        ENGINE
    }

    async fn recognize(&self, image: &PageImage, scratch_dir: &Path) -> Result<PageText, OcrError> {
        // Removed on drop, including when this future is cancelled
        let staged = tempfile::Builder::new()
            .prefix(&format!("page-{}-", image.page))
            .suffix(&format!(".{}", image.format.extension()))
            .tempfile_in(scratch_dir)?;
        let (file, staged_path) = staged.into_parts();
        let mut file = tokio::fs::File::from_std(file);
        file.write_all(&image.data).await?;
        file.flush().await?;
        drop(file);

        let output = Command::new(&self.binary)
            .arg(&*staged_path)
            .arg("stdout")
            .arg("-l")
            .arg(&self.language)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| OcrError::Unavailable {
                engine: ENGINE,
                reason: format!("Failed to run {}: {}", self.binary, e),
            })?;

        drop(staged_path);

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let message = if stderr.is_empty() {
                format!("exited with {}", output.status)
            } else {
                stderr
            };
            return Err(OcrError::EngineReported {
                engine: ENGINE,
                message,
            });
        }

        Ok(PageText {
            page: image.page,
            text: String::from_utf8_lossy(&output.stdout).trim_end().to_string(),
        })
    }
}
