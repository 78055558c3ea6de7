//! Rasterization
//!
//! Turns a downloaded document into one encoded image per page, in physical
//! page order. The MuPDF backend lives in `renderer`; the trait is the seam the
//! pipeline and its tests depend on.

mod renderer;

use async_trait::async_trait;

use crate::fetch::DocumentFile;

pub use renderer::MupdfRasterizer;

/// Encoding used for rendered pages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
}

impl ImageFormat {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "png" => Some(Self::Png),
            "jpeg" | "jpg" => Some(Self::Jpeg),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
        }
    }
}

/// One rendered page
#[derive(Debug, Clone)]
pub struct PageImage {
    /// Page position (1-indexed)
    pub page: usize,
    pub format: ImageFormat,
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Rasterization errors
#[derive(Debug, thiserror::Error)]
pub enum RasterError {
    #[error("Unsupported document format: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to render page {page}: {reason}")]
    CorruptPage { page: usize, reason: String },

    #[error("Rendering task failed: {0}")]
    TaskFailed(String),
}

/// Converts a document into ordered page images
#[async_trait]
pub trait Rasterizer: Send + Sync {
    /// Render every page. The returned vector is complete and ordered, page 1
    /// first; nothing is retained by the rasterizer afterwards.
    async fn rasterize(&self, document: &DocumentFile) -> Result<Vec<PageImage>, RasterError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_format_names() {
        assert_eq!(ImageFormat::from_name("JPG"), Some(ImageFormat::Jpeg));
        assert_eq!(ImageFormat::from_name("png"), Some(ImageFormat::Png));
        assert_eq!(ImageFormat::from_name("webp"), None);
        assert_eq!(ImageFormat::Jpeg.extension(), "jpg");
    }
}
