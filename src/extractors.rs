//! Request extractors whose rejections are [`ApiError`]s, so malformed input
//! reaches the client as a 400 failure envelope instead of axum's plain-text
//! rejection bodies.

use std::collections::HashMap;

use axum::extract::{
    FromRequest, FromRequestParts, Multipart, Request,
    multipart::{Field, MultipartError},
    rejection::{JsonRejection, PathRejection, QueryRejection},
};
use tempfile::NamedTempFile;
use tokio::{fs::File, io::AsyncWriteExt};

use crate::{
    error::{ApiError, ApiResult},
    id::ObjectId,
};

#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct JsonBody<T>(pub T);

#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct QueryParams<T>(pub T);

#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct PathParams<T>(pub T);

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::bad_request("Invalid request body").with_details([rejection.body_text()])
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::bad_request("Invalid query parameters").with_details([rejection.body_text()])
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::bad_request("Invalid path parameters").with_details([rejection.body_text()])
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        let status = err.status();
        let message = if status.is_client_error() && status != axum::http::StatusCode::BAD_REQUEST {
            status.canonical_reason().unwrap_or("Invalid multipart body")
        } else {
            "Invalid multipart body"
        };
        ApiError::new(status, message).with_details([err.body_text()])
    }
}

/// Validates a path segment as an [`ObjectId`] before anything touches the
/// store.
pub fn parse_id(raw: &str, message: &'static str) -> ApiResult<ObjectId> {
    ObjectId::parse(raw).map_err(|_| ApiError::bad_request(message))
}

/// A multipart file part spooled to a temporary file. The file is removed
/// when this value is dropped.
#[derive(Debug)]
pub struct UploadedFile {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub size: u64,
    temp: NamedTempFile,
}

impl UploadedFile {
    pub fn path(&self) -> &std::path::Path {
        self.temp.path()
    }
}

/// A fully read multipart form: text fields by name and spooled file parts.
/// Only the first part with a given name is kept.
#[derive(Debug, Default)]
pub struct MultipartForm {
    fields: HashMap<String, String>,
    files: HashMap<String, UploadedFile>,
}

impl MultipartForm {
    pub async fn collect(mut multipart: Multipart) -> ApiResult<Self> {
        let mut form = Self::default();
        while let Some(field) = multipart.next_field().await? {
            let Some(name) = field.name().map(str::to_owned) else {
                continue;
            };
            if field.file_name().is_some() {
                if form.files.contains_key(&name) {
                    continue;
                }
                let upload = spool(field).await?;
                form.files.insert(name, upload);
            } else {
                let value = field.text().await?;
                form.fields.entry(name).or_insert(value);
            }
        }
        Ok(form)
    }

    /// Trimmed text value; empty values count as absent.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    }

    pub fn take_file(&mut self, name: &str) -> Option<UploadedFile> {
        self.files.remove(name).filter(|file| file.size > 0)
    }
}

async fn spool(mut field: Field<'_>) -> ApiResult<UploadedFile> {
    let file_name = field.file_name().map(str::to_owned);
    let content_type = field.content_type().map(str::to_owned);

    let temp = NamedTempFile::new()
        .map_err(|err| ApiError::upstream("Failed to receive upload", err))?;
    let handle = temp
        .reopen()
        .map_err(|err| ApiError::upstream("Failed to receive upload", err))?;
    let mut out = File::from_std(handle);

    let mut size = 0u64;
    while let Some(chunk) = field.chunk().await? {
        out.write_all(&chunk)
            .await
            .map_err(|err| ApiError::upstream("Failed to receive upload", err))?;
        size += chunk.len() as u64;
    }
    out.flush()
        .await
        .map_err(|err| ApiError::upstream("Failed to receive upload", err))?;

    Ok(UploadedFile {
        file_name,
        content_type,
        size,
        temp,
    })
}

impl<S> FromRequest<S> for MultipartForm
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let multipart = Multipart::from_request(req, state)
            .await
            .map_err(|rejection| {
                ApiError::bad_request("Invalid multipart body").with_details([rejection.body_text()])
            })?;
        Self::collect(multipart).await
    }
}
