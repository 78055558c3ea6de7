//! OCR Module
//!
//! Turns page images into text. Two backends implement [`OcrProvider`]:
//! - Google Cloud Vision (remote, the default)
//! - Tesseract (local CLI)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use pdf_ocr_server::ocr::{GoogleVisionProvider, OcrProvider, VisionCredentials};
//!
//! let credentials = VisionCredentials::from_secret(&secret)?;
//! let provider = GoogleVisionProvider::new("https://vision.googleapis.com", credentials, timeout)?;
//!
//! let page_text = provider.recognize(&page_image, scratch_dir).await?;
//! ```

mod auth;
mod provider;
mod tesseract;
mod types;
mod vision;

pub use auth::ServiceAccountKey;
pub use provider::OcrProvider;
pub use tesseract::TesseractProvider;
pub use types::{OcrError, PageText};
pub use vision::{CredentialsError, GoogleVisionProvider, VisionCredentials};
