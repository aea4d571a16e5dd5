use std::path::PathBuf;

use axum::{
    body::Body,
    extract::State,
    http::header,
    response::{IntoResponse, Response},
};
use mime_guess::MimeGuess;
use tokio::fs::File;
use tokio_util::io::ReaderStream;

use super::AppState;
use crate::{
    error::{ApiError, ApiResult},
    extractors::PathParams,
};

/// Streams an object written by the local object store.
pub(super) async fn serve_media(
    State(state): State<AppState>,
    PathParams(file): PathParams<String>,
) -> ApiResult<Response> {
    let path = state
        .objects
        .locate(&file)
        .ok_or_else(|| ApiError::bad_request("Invalid media file name"))?;
    stream_file(path).await
}

async fn stream_file(path: PathBuf) -> ApiResult<Response> {
    let file = File::open(&path)
        .await
        .map_err(|_| ApiError::not_found("Media file not found"))?;
    let length = file.metadata().await.ok().map(|meta| meta.len());

    let stream = ReaderStream::new(file);
    let mut response = Body::from_stream(stream).into_response();
    let headers = response.headers_mut();
    if let Some(mime) = MimeGuess::from_path(&path).first() {
        if let Ok(value) = mime.to_string().parse() {
            headers.insert(header::CONTENT_TYPE, value);
        }
    }
    if let Some(length) = length {
        headers.insert(header::CONTENT_LENGTH, length.into());
    }

    Ok(response)
}
