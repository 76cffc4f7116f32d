//! Upload handler
//!
//! Accepts one multipart `file` field, stages it in a request-scoped
//! scratch file, stores it with the provider, and answers with a derived
//! public link. The scratch guard removes the staged file on every exit
//! path. Failures during save, store, or link derivation are internal
//! errors to the caller; the cause stays in the logs.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Multipart, State},
    Json,
};
use megarelay_core::AppError;
use serde::Serialize;

use crate::error::HttpAppError;
use crate::services::link::derive_public_link;
use crate::services::session::storage_session;
use crate::state::AppState;
use crate::utils::scratch::RequestScratch;
use crate::utils::upload::extract_multipart_file;

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub url: String,
}

#[tracing::instrument(skip(state, multipart), fields(operation = "upload_image"))]
pub async fn upload_image(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<UploadResponse>, HttpAppError> {
    let (data, original_filename) = extract_multipart_file(multipart).await?;

    // The scratch guard owns the staged file for the rest of the request.
    let scratch = RequestScratch::new(&state.config.upload_dir)?;
    let temp_path = scratch.upload_path(&original_filename)?;

    tokio::fs::write(&temp_path, &data).await.map_err(|e| {
        tracing::error!(error = %e, path = %temp_path.display(), "failed to persist upload");
        AppError::Internal("failed to persist uploaded file".to_string())
    })?;
    tracing::info!(
        filename = %original_filename,
        path = %temp_path.display(),
        size_bytes = data.len(),
        "upload staged to scratch file"
    );

    let session = storage_session(state.gateway.as_ref(), &state.config).await?;

    let descriptor = state
        .gateway
        .store(&session, &temp_path)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "store operation failed");
            AppError::Internal("failed to store file with provider".to_string())
        })?;

    if state.config.export_delay_ms > 0 {
        // Crude fixed wait masking provider-side eventual-consistency lag.
        tokio::time::sleep(Duration::from_millis(state.config.export_delay_ms)).await;
    }

    let url = derive_public_link(state.gateway.as_ref(), &session, &descriptor).await?;
    tracing::info!(url = %url, "upload complete");

    Ok(Json(UploadResponse { url }))
}
