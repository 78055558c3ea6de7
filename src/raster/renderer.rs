//! MuPDF page rasterizer
//!
//! Renders every page of a PDF into an encoded image. MuPDF documents are not
//! `Send`, so the whole document is opened, rendered and dropped inside one
//! blocking task.

use std::io::{Cursor, Read};
use std::path::Path;

use async_trait::async_trait;
use image::{DynamicImage, RgbImage};
use mupdf::{Colorspace, Document, Matrix, Pixmap};

use super::{ImageFormat, PageImage, RasterError, Rasterizer};
use crate::fetch::DocumentFile;

/// PDF user space is defined at 72 points per inch
const POINTS_PER_INCH: f32 = 72.0;

/// The PDF header may be preceded by junk, but must start within this window
const HEADER_WINDOW: usize = 1024;

/// Largest page we agree to render, in pixels (a letter page at 600 DPI is ~34M)
const MAX_PAGE_PIXELS: f64 = 100_000_000.0;

/// Rasterizer backed by MuPDF
#[derive(Debug, Clone)]
pub struct MupdfRasterizer {
    dpi: u32,
    format: ImageFormat,
}

impl MupdfRasterizer {
    pub fn new(dpi: u32, format: ImageFormat) -> Self {
        Self {
            dpi: dpi.clamp(36, 600),
            format,
        }
    }

    fn scale(&self) -> f32 {
        self.dpi as f32 / POINTS_PER_INCH
    }
}

impl Default for MupdfRasterizer {
    fn default() -> Self {
        Self::new(200, ImageFormat::Jpeg)
    }
}

#[async_trait]
impl Rasterizer for MupdfRasterizer {
    async fn rasterize(&self, document: &DocumentFile) -> Result<Vec<PageImage>, RasterError> {
        let path = document.path().to_path_buf();
        let scale = self.scale();
        let format = self.format;

        tokio::task::spawn_blocking(move || render_document(&path, scale, format))
            .await
            .map_err(|e| RasterError::TaskFailed(e.to_string()))?
    }
}

fn render_document(path: &Path, scale: f32, format: ImageFormat) -> Result<Vec<PageImage>, RasterError> {
    ensure_pdf_header(path)?;

    let path_str = path.to_string_lossy();
    let doc = Document::open(&*path_str)
        .map_err(|e| RasterError::UnsupportedFormat(format!("Failed to open document: {}", e)))?;
    let page_count = doc
        .page_count()
        .map_err(|e| RasterError::UnsupportedFormat(format!("Failed to read page count: {}", e)))?;
    if page_count <= 0 {
        return Err(RasterError::UnsupportedFormat(
            "Document contains no pages".to_string(),
        ));
    }

    let matrix = Matrix::new_scale(scale, scale);
    let colorspace = Colorspace::device_rgb();

    let mut pages = Vec::with_capacity(page_count as usize);
    for index in 0..page_count {
        let page_number = index as usize + 1;
        let corrupt = |reason: String| RasterError::CorruptPage {
            page: page_number,
            reason,
        };

        let page = doc.load_page(index).map_err(|e| corrupt(e.to_string()))?;
        let bounds = page.bounds().map_err(|e| corrupt(e.to_string()))?;
        let target_width = ((bounds.x1 - bounds.x0) * scale).abs().ceil() as f64;
        let target_height = ((bounds.y1 - bounds.y0) * scale).abs().ceil() as f64;
        if target_width * target_height > MAX_PAGE_PIXELS {
            return Err(corrupt(format!(
                "page is too large to render ({}x{} pixels)",
                target_width, target_height
            )));
        }

        let pixmap = page
            .to_pixmap(&matrix, &colorspace, false, true)
            .map_err(|e| corrupt(e.to_string()))?;
        let (data, width, height) = encode_pixmap(&pixmap, format).map_err(corrupt)?;

        tracing::debug!("Rendered page {} ({}x{}, {} bytes)", page_number, width, height, data.len());

        pages.push(PageImage {
            page: page_number,
            format,
            data,
            width,
            height,
        });
    }

    Ok(pages)
}

/// Reject anything that is not a PDF before handing it to MuPDF, which will
/// happily try to open images and other formats.
fn ensure_pdf_header(path: &Path) -> Result<(), RasterError> {
    let mut file = std::fs::File::open(path)
        .map_err(|e| RasterError::UnsupportedFormat(format!("Failed to read document: {}", e)))?;

    let mut head = Vec::with_capacity(HEADER_WINDOW);
    file.by_ref()
        .take(HEADER_WINDOW as u64)
        .read_to_end(&mut head)
        .map_err(|e| RasterError::UnsupportedFormat(format!("Failed to read document: {}", e)))?;

    if head.windows(5).any(|w| w == b"%PDF-") {
        Ok(())
    } else {
        Err(RasterError::UnsupportedFormat(
            "Content is not a PDF document".to_string(),
        ))
    }
}

fn encode_pixmap(pixmap: &Pixmap, format: ImageFormat) -> Result<(Vec<u8>, u32, u32), String> {
    let width = pixmap.width() as u32;
    let height = pixmap.height() as u32;
    let samples = pixmap.samples();
    let n = pixmap.n() as usize;

    let capacity = (width as usize)
        .checked_mul(height as usize)
        .and_then(|pixels| pixels.checked_mul(3))
        .ok_or_else(|| format!("page of {}x{} pixels does not fit in memory", width, height))?;

    // JPEG has no alpha channel, so both encodings go through RGB
    let mut rgb_buffer = Vec::with_capacity(capacity);
    for y in 0..height as usize {
        for x in 0..width as usize {
            let offset = (y * width as usize + x) * n;
            let r = samples.get(offset).copied().unwrap_or(255);
            let g = samples.get(offset + 1).copied().unwrap_or(r);
            let b = samples.get(offset + 2).copied().unwrap_or(r);
            rgb_buffer.extend_from_slice(&[r, g, b]);
        }
    }

    let img = RgbImage::from_raw(width, height, rgb_buffer)
        .ok_or_else(|| "Failed to create image buffer".to_string())?;

    let mut output = Vec::new();
    let target = match format {
        ImageFormat::Png => image::ImageFormat::Png,
        ImageFormat::Jpeg => image::ImageFormat::Jpeg,
    };
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut output), target)
        .map_err(|e| format!("Failed to encode page image: {}", e))?;

    Ok((output, width, height))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    /// Build a small, well-formed PDF with `pages` blank US-letter pages.
    fn blank_pdf(pages: usize) -> Vec<u8> {
        pdf_with_media_boxes(&vec![[612, 792]; pages])
    }

    /// Build a PDF with one blank page per entry, sized `[width, height]` in points.
    fn pdf_with_media_boxes(boxes: &[[u32; 2]]) -> Vec<u8> {
        let pages = boxes.len();
        let mut objects = vec![
            "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
            format!(
                "<< /Type /Pages /Kids [{}] /Count {} >>",
                (0..pages)
                    .map(|i| format!("{} 0 R", i + 3))
                    .collect::<Vec<_>>()
                    .join(" "),
                pages
            ),
        ];
        for [width, height] in boxes {
            objects.push(format!(
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {} {}] >>",
                width, height
            ));
        }

        let mut out = b"%PDF-1.4\n".to_vec();
        let mut offsets = Vec::new();
        for (i, body) in objects.iter().enumerate() {
            offsets.push(out.len());
            out.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
        }
        let xref_at = out.len();
        out.extend_from_slice(format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1).as_bytes());
        for offset in offsets {
            out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
        }
        out.extend_from_slice(
            format!(
                "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
                objects.len() + 1,
                xref_at
            )
            .as_bytes(),
        );
        out
    }

    fn write_document(dir: &Path, content: &[u8]) -> DocumentFile {
        let mut file = tempfile::NamedTempFile::new_in(dir).unwrap();
        file.write_all(content).unwrap();
        DocumentFile::new(file.into_temp_path(), content.len() as u64)
    }

    #[tokio::test]
    async fn test_rasterize_pages_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let document = write_document(dir.path(), &blank_pdf(3));

        // Low resolution keeps the test fast
        let rasterizer = MupdfRasterizer::new(36, ImageFormat::Png);
        let pages = rasterizer.rasterize(&document).await.unwrap();

        assert_eq!(pages.iter().map(|p| p.page).collect::<Vec<_>>(), vec![1, 2, 3]);
        for page in &pages {
            assert!(page.data.starts_with(&[0x89, b'P', b'N', b'G']));
            assert_eq!(page.width, 306);
        }
    }

    #[tokio::test]
    async fn test_rasterize_jpeg() {
        let dir = tempfile::tempdir().unwrap();
        let document = write_document(dir.path(), &blank_pdf(1));

        let pages = MupdfRasterizer::new(36, ImageFormat::Jpeg)
            .rasterize(&document)
            .await
            .unwrap();

        assert_eq!(pages.len(), 1);
        assert!(pages[0].data.starts_with(&[0xFF, 0xD8]));
    }

    #[tokio::test]
    async fn test_rasterize_rejects_non_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let document = write_document(dir.path(), b"<html>definitely not a pdf</html>");

        let result = MupdfRasterizer::default().rasterize(&document).await;
        assert!(matches!(result, Err(RasterError::UnsupportedFormat(_))));
    }

    #[tokio::test]
    async fn test_oversized_page_is_corrupt_page() {
        let dir = tempfile::tempdir().unwrap();
        // 200 inches square: 120000 pixels a side at 600 DPI
        let document = write_document(dir.path(), &pdf_with_media_boxes(&[[72, 72], [14_400, 14_400]]));

        let result = MupdfRasterizer::new(600, ImageFormat::Jpeg).rasterize(&document).await;

        match result {
            Err(RasterError::CorruptPage { page, reason }) => {
                assert_eq!(page, 2);
                assert!(reason.contains("too large"));
            }
            other => panic!("unexpected result: {:?}", other.map(|pages| pages.len())),
        }
    }

    #[test]
    fn test_dpi_is_clamped() {
        assert_eq!(MupdfRasterizer::new(10_000, ImageFormat::Png).dpi, 600);
        assert_eq!(MupdfRasterizer::new(1, ImageFormat::Png).dpi, 36);
    }
}
