//! Download-relay handler
//!
//! Accepts a public storage link, fetches and decrypts the referenced
//! object server-side through an anonymous session, and streams the raw
//! bytes back inline with a guessed content type. The scratch guard removes
//! the downloaded file on every exit path.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, StatusCode},
    response::Response,
};
use megarelay_core::AppError;
use megarelay_storage::{looks_like_public_link, PublicLink};
use serde::Deserialize;
use tokio_util::io::ReaderStream;

use crate::error::{HttpAppError, ValidatedJson};
use crate::state::AppState;
use crate::utils::scratch::RequestScratch;

#[derive(Debug, Deserialize)]
pub struct FetchImageRequest {
    pub mega_url: String,
}

#[tracing::instrument(skip(state, request), fields(operation = "get_image_from_mega_link"))]
pub async fn get_image_from_mega_link(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<FetchImageRequest>,
) -> Result<Response, HttpAppError> {
    let url = request.mega_url.trim();
    if url.is_empty() {
        return Err(AppError::InvalidInput("mega_url must not be empty".to_string()).into());
    }

    // Shallow format guard; runs before any network work.
    if !looks_like_public_link(url) {
        return Err(AppError::InvalidInput(
            "mega_url is not a recognizable public storage link".to_string(),
        )
        .into());
    }

    let link = PublicLink::parse(url)?;

    let scratch = RequestScratch::new(&state.config.upload_dir)?;

    let session = state.gateway.login_anonymous().await.map_err(|e| {
        tracing::error!(error = %e, "anonymous session establishment failed");
        AppError::Upstream("could not establish an anonymous storage session".to_string())
    })?;

    let local_path = state
        .gateway
        .fetch_public(&session, &link, scratch.path())
        .await?;

    // Trust only image guesses from the extension; anything else streams as
    // generic binary.
    let content_type = mime_guess::from_path(&local_path)
        .iter()
        .find(|m| m.type_() == mime_guess::mime::IMAGE)
        .map(|m| m.to_string())
        .unwrap_or_else(|| "application/octet-stream".to_string());

    let file_name = local_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("download")
        .to_string();

    let file = tokio::fs::File::open(&local_path).await.map_err(|e| {
        tracing::error!(error = %e, path = %local_path.display(), "failed to open fetched object");
        AppError::Internal("failed to read fetched object".to_string())
    })?;

    tracing::info!(
        path = %local_path.display(),
        content_type = %content_type,
        "relaying fetched object"
    );

    // The scratch guard unlinks the file when this handler returns; the
    // already-open handle keeps the bytes readable until the stream ends.
    let body = Body::from_stream(ReaderStream::new(file));

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(
            header::CONTENT_DISPOSITION,
            format!("inline; filename=\"{}\"", file_name),
        )
        .body(body)
        .map_err(|e| {
            tracing::error!(error = %e, "failed to build response");
            AppError::Internal("failed to build response".to_string())
        })?;

    Ok(response)
}
