//! PDF processing endpoint
//!
//! `POST /process-pdf/` takes `{ "pdf_url": ... }`, runs the pipeline and
//! returns `{ "extracted_text": ... }`.

use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::fetch::DocumentReference;
use crate::state::AppState;

/// Create the processing router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/process-pdf/", post(process_pdf))
        .route("/process-pdf", post(process_pdf))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProcessPdfRequest {
    /// URL of the PDF file
    pub pdf_url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProcessPdfResponse {
    pub extracted_text: String,
}

async fn process_pdf(
    State(state): State<AppState>,
    payload: std::result::Result<Json<ProcessPdfRequest>, JsonRejection>,
) -> Result<Json<ProcessPdfResponse>> {
    let Json(request) = payload?;
    let reference = DocumentReference::parse(&request.pdf_url)?;

    tracing::info!("Processing PDF from {}", reference);
    let extracted_text = state.pipeline().process(&reference).await?;

    Ok(Json(ProcessPdfResponse { extracted_text }))
}
