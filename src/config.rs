//! Configuration management for the PDF OCR server
//!
//! Everything is read once at startup from the environment (after `.env` is
//! loaded by `dotenvy`) and is immutable afterwards.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::ocr::VisionCredentials;
use crate::raster::ImageFormat;

/// Configuration errors surfaced at startup
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },

    #[error("Invalid OCR credentials: {0}")]
    Credentials(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub pipeline: PipelineConfig,
    pub ocr: OcrConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Root under which per-request scratch directories are created
    pub scratch_dir: Option<PathBuf>,
    /// Rasterization resolution
    pub render_dpi: u32,
    pub page_format: ImageFormat,
    /// Maximum number of pages recognized at the same time (1 = sequential)
    pub ocr_concurrency: usize,
    pub fetch_timeout: Duration,
    pub request_timeout: Duration,
    pub max_document_bytes: u64,
}

#[derive(Debug, Clone)]
pub struct OcrConfig {
    pub provider: OcrBackend,
    pub vision_endpoint: String,
    pub credentials: Option<VisionCredentials>,
    pub timeout: Duration,
    /// Language passed to tesseract
    pub language: String,
}

/// Which OCR engine serves recognition requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OcrBackend {
    GoogleVision,
    Tesseract,
}

impl OcrBackend {
    fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "google-vision" | "google_vision" | "vision" | "google" => Some(Self::GoogleVision),
            "tesseract" => Some(Self::Tesseract),
            _ => None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8000,
            },
            pipeline: PipelineConfig::default(),
            ocr: OcrConfig {
                provider: OcrBackend::GoogleVision,
                vision_endpoint: "https://vision.googleapis.com".to_string(),
                credentials: None,
                timeout: Duration::from_secs(60),
                language: "eng".to_string(),
            },
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            scratch_dir: None,
            render_dpi: 200,
            page_format: ImageFormat::Jpeg,
            ocr_concurrency: 1,
            fetch_timeout: Duration::from_secs(60),
            request_timeout: Duration::from_secs(300),
            max_document_bytes: 100 * 1024 * 1024,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Config::default();

        let provider = match env::var("OCR_PROVIDER") {
            Ok(value) => OcrBackend::parse(&value).ok_or(ConfigError::Invalid {
                name: "OCR_PROVIDER",
                value,
            })?,
            Err(_) => defaults.ocr.provider,
        };

        let credentials = match env::var("GOOGLE_CREDENTIALS_JSON") {
            Ok(secret) => Some(
                VisionCredentials::from_secret(&secret)
                    .map_err(|e| ConfigError::Credentials(e.to_string()))?,
            ),
            Err(_) => None,
        };
        if provider == OcrBackend::GoogleVision && credentials.is_none() {
            return Err(ConfigError::Missing("GOOGLE_CREDENTIALS_JSON"));
        }

        let page_format = match env::var("PAGE_IMAGE_FORMAT") {
            Ok(value) => ImageFormat::from_name(&value).ok_or(ConfigError::Invalid {
                name: "PAGE_IMAGE_FORMAT",
                value,
            })?,
            Err(_) => defaults.pipeline.page_format,
        };

        let ocr_concurrency = parse_nonzero("OCR_CONCURRENCY", defaults.pipeline.ocr_concurrency)?;
        let render_dpi = parse_nonzero("RENDER_DPI", defaults.pipeline.render_dpi)?;
        let request_timeout = parse_nonzero("REQUEST_TIMEOUT_SECS", defaults.pipeline.request_timeout.as_secs())?;

        Ok(Config {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or(defaults.server.host),
                port: parse_var("SERVER_PORT", defaults.server.port)?,
            },
            pipeline: PipelineConfig {
                scratch_dir: env::var("SCRATCH_DIR").ok().map(PathBuf::from),
                render_dpi,
                page_format,
                ocr_concurrency,
                fetch_timeout: Duration::from_secs(parse_var(
                    "FETCH_TIMEOUT_SECS",
                    defaults.pipeline.fetch_timeout.as_secs(),
                )?),
                request_timeout: Duration::from_secs(request_timeout),
                max_document_bytes: parse_var(
                    "MAX_DOCUMENT_BYTES",
                    defaults.pipeline.max_document_bytes,
                )?,
            },
            ocr: OcrConfig {
                provider,
                vision_endpoint: env::var("VISION_ENDPOINT").unwrap_or(defaults.ocr.vision_endpoint),
                credentials,
                timeout: Duration::from_secs(parse_var(
                    "OCR_TIMEOUT_SECS",
                    defaults.ocr.timeout.as_secs(),
                )?),
                language: env::var("OCR_LANGUAGE").unwrap_or(defaults.ocr.language),
            },
        })
    }
}

fn parse_var<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        Err(_) => Ok(default),
    }
}

/// Like [`parse_var`], but zero is rejected
fn parse_nonzero<T>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr + Default + PartialEq,
{
    let value = parse_var(name, default)?;
    if value == T::default() {
        return Err(ConfigError::Invalid {
            name,
            value: "0".to_string(),
        });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_names() {
        assert_eq!(OcrBackend::parse("google-vision"), Some(OcrBackend::GoogleVision));
        assert_eq!(OcrBackend::parse("Tesseract"), Some(OcrBackend::Tesseract));
        assert_eq!(OcrBackend::parse("ollama"), None);
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.pipeline.render_dpi, 200);
        assert_eq!(config.pipeline.ocr_concurrency, 1);
        assert_eq!(config.pipeline.page_format, ImageFormat::Jpeg);
    }

    #[test]
    fn test_parse_var_rejects_garbage() {
        // Unique name so parallel tests never race on it
        std::env::set_var("PDF_OCR_TEST_BAD_NUMBER", "twelve");
        let result: Result<u32, _> = parse_var("PDF_OCR_TEST_BAD_NUMBER", 1);
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));

        let result: Result<u32, _> = parse_var("PDF_OCR_TEST_UNSET_NUMBER", 7);
        assert_eq!(result.unwrap(), 7);
    }

    #[test]
    fn test_parse_nonzero_rejects_zero() {
        std::env::set_var("PDF_OCR_TEST_ZERO_DPI", "0");
        let result: Result<u32, _> = parse_nonzero("PDF_OCR_TEST_ZERO_DPI", 200);
        assert!(matches!(
            result,
            Err(ConfigError::Invalid { name: "PDF_OCR_TEST_ZERO_DPI", .. })
        ));

        std::env::set_var("PDF_OCR_TEST_ZERO_TIMEOUT", " 0 ");
        let result: Result<u64, _> = parse_nonzero("PDF_OCR_TEST_ZERO_TIMEOUT", 300);
        assert!(result.is_err());

        std::env::set_var("PDF_OCR_TEST_SOME_DPI", "150");
        let result: Result<u32, _> = parse_nonzero("PDF_OCR_TEST_SOME_DPI", 200);
        assert_eq!(result.unwrap(), 150);
    }
}
