//! OCR Types

use serde::Serialize;

/// Recognized text for one page
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageText {
    /// Page number (1-indexed)
    pub page: usize,
    pub text: String,
}

/// OCR error types
#[derive(Debug, thiserror::Error)]
pub enum OcrError {
    /// The engine answered with an explicit error message
    #[error("{engine} error: {message}")]
    EngineReported { engine: &'static str, message: String },

    /// The engine could not be reached or the call was cut off
    #[error("{engine} unavailable: {reason}")]
    Unavailable { engine: &'static str, reason: String },

    /// The engine answered with something we could not interpret
    #[error("{engine} returned an invalid response: {reason}")]
    InvalidResponse { engine: &'static str, reason: String },

    /// The page image could not be staged for the engine
    #[error("Failed to stage page image: {0}")]
    Staging(#[from] std::io::Error),
}

impl OcrError {
    /// Message reported by the engine itself, if any
    pub fn engine_message(&self) -> Option<&str> {
        match self {
            Self::EngineReported { message, .. } => Some(message),
            _ => None,
        }
    }
}
