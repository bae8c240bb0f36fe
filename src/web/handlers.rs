//! Handlers for the Local bucket's signed `/file` endpoint.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header, HeaderMap},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::bucket::{BucketObject, FileBucket, LocalBucket, Operation, SignedPayload};
use crate::web::error::ApiError;

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Shared state of the HTTP endpoint.
#[derive(Clone)]
pub struct AppState {
    pub bucket: Arc<LocalBucket>,
}

impl AppState {
    pub fn new(bucket: Arc<LocalBucket>) -> Self {
        Self { bucket }
    }
}

/// Query string of a signed request.
#[derive(Debug, Deserialize)]
pub struct SignedQuery {
    pub signed: String,
}

/// Response to a successful upload.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub key: String,
    /// Signed `get` URL for the stored object.
    pub url: String,
}

fn authorize(query: &SignedQuery, operation: Operation) -> Result<String, ApiError> {
    let payload = SignedPayload::from_query(&query.signed)?;
    let key = payload.validate(operation)?;
    Ok(key.to_string())
}

/// GET /file?signed=...
pub async fn download(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SignedQuery>,
) -> Result<Response, ApiError> {
    let key = authorize(&query, Operation::Get)?;
    let object = state.bucket.read_object(&key).await?;
    debug!("Serving object {} ({} bytes)", key, object.body.len());

    Ok(([(header::CONTENT_TYPE, object.info.content_type)], object.body).into_response())
}

/// PUT /file?signed=...
pub async fn upload(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SignedQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<UploadResponse>, ApiError> {
    let key = authorize(&query, Operation::Put)?;
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or(DEFAULT_CONTENT_TYPE)
        .to_string();

    let url = state
        .bucket
        .save_file(&key, BucketObject::new(body.to_vec(), content_type))
        .await?;

    Ok(Json(UploadResponse { key, url }))
}

/// Health check handler.
pub async fn health_check() -> &'static str {
    "OK"
}
