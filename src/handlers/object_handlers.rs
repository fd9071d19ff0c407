//! HTTP handlers for score and edition PDFs.
//! Role checks and tenant scoping sit in front of this service; these
//! handlers only translate requests into `ObjectStore` calls.

use crate::{
    errors::AppError,
    models::{kind::ObjectKind, object::ObjectRecord},
    services::{Stores, object_store::ACCEPTED_MIME_TYPE},
};
use axum::{
    Json,
    body::{Body, Bytes},
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;

/// Query params accepted on upload.
#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    /// Original filename; defaults to the object key.
    pub filename: Option<String>,
}

/// PUT `/{kind}/{*key}`: store a PDF.
pub async fn upload_object(
    State(stores): State<Stores>,
    Path((kind, key)): Path<(ObjectKind, String)>,
    Query(query): Query<UploadQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(media_type)
        .unwrap_or_default();
    let filename = query.filename.unwrap_or_else(|| key.clone());

    let result = stores
        .for_kind(kind)
        .put(&key, content_type, body, &filename)
        .await?;

    Ok((StatusCode::CREATED, Json(result)))
}

/// GET `/{kind}/{*key}`: return the reassembled PDF.
pub async fn get_object(
    State(stores): State<Stores>,
    Path((kind, key)): Path<(ObjectKind, String)>,
) -> Result<Response, AppError> {
    let object = stores
        .for_kind(kind)
        .get(&key)
        .await?
        .ok_or_else(|| AppError::not_found(format!("object `{}` not found", key)))?;
    tracing::debug!(key = %object.key, size = object.size, "serving object");

    let mut response = Response::new(Body::from(object.bytes));
    set_object_headers(
        response.headers_mut(),
        object.size as i64,
        &object.etag,
        &object.filename,
        &object.uploaded_at.to_rfc2822(),
    );
    Ok(response)
}

/// HEAD `/{kind}/{*key}`: same headers as GET but no body.
pub async fn head_object(
    State(stores): State<Stores>,
    Path((kind, key)): Path<(ObjectKind, String)>,
) -> Result<Response, AppError> {
    let record: ObjectRecord = stores
        .for_kind(kind)
        .head(&key)
        .await?
        .ok_or_else(|| AppError::not_found(format!("object `{}` not found", key)))?;

    let mut response = Response::new(Body::empty());
    set_object_headers(
        response.headers_mut(),
        record.size,
        &record.etag,
        &record.filename,
        &record.uploaded_at.to_rfc2822(),
    );
    Ok(response)
}

/// DELETE `/{kind}/{*key}`: remove the object and its chunks.
pub async fn delete_object(
    State(stores): State<Stores>,
    Path((kind, key)): Path<(ObjectKind, String)>,
) -> Result<StatusCode, AppError> {
    if stores.for_kind(kind).delete(&key).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found(format!("object `{}` not found", key)))
    }
}

/// Strip parameters such as `; charset=binary` from a Content-Type value.
fn media_type(value: &str) -> &str {
    value.split(';').next().unwrap_or(value).trim()
}

fn set_object_headers(
    headers: &mut HeaderMap,
    size: i64,
    etag: &str,
    filename: &str,
    last_modified: &str,
) {
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(ACCEPTED_MIME_TYPE),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(size.max(0)));

    if let Ok(value) = HeaderValue::from_str(&format!("\"{}\"", etag)) {
        headers.insert(header::ETAG, value);
    }
    if let Ok(value) = HeaderValue::from_str(last_modified) {
        headers.insert(header::LAST_MODIFIED, value);
    }

    let disposition = format!("inline; filename=\"{}\"", filename.replace('"', ""));
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
}
