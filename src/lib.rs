//! PDF OCR Server Library
//!
//! Downloads a PDF, rasterizes each page with MuPDF, runs every page through
//! an OCR engine and returns the page-delimited text. The HTTP binary is in
//! main.rs; everything it wires together is exposed here for tests.
//!
//! # Modules
//!
//! - `fetch`: streaming document download into a scoped temp file
//! - `raster`: page rasterization via MuPDF
//! - `ocr`: OCR providers (Google Cloud Vision, Tesseract)
//! - `pipeline`: the fetch -> rasterize -> OCR -> aggregate orchestrator
//! - `routes`: HTTP endpoints

pub mod config;
pub mod error;
pub mod fetch;
pub mod ocr;
pub mod pipeline;
pub mod raster;
pub mod routes;
pub mod state;
