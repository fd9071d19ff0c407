//! Represents a stored PDF object and the results handed back to callers.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

/// Metadata row for one object, without its payload.
///
/// `is_chunked` and `chunk_count` must agree with the chunk rows actually
/// present; the store treats any disagreement as corruption.
#[derive(Serialize, Clone, FromRow, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ObjectRecord {
    /// Caller-supplied object key.
    pub key: String,

    /// Total payload length in bytes.
    pub size: i64,

    /// Original filename of the upload.
    pub filename: String,

    /// When the object was written.
    pub uploaded_at: DateTime<Utc>,

    /// Whether the payload lives in chunk rows rather than inline.
    pub is_chunked: bool,

    /// Number of chunk rows, `None` for inline objects.
    pub chunk_count: Option<i64>,

    /// MD5 hex digest of the full payload.
    pub etag: String,
}

/// A fully reassembled object.
#[derive(Clone, Debug)]
pub struct StoredObject {
    pub key: String,
    pub bytes: Bytes,
    pub size: usize,
    pub filename: String,
    pub uploaded_at: DateTime<Utc>,
    pub etag: String,
}

/// What `put` reports back.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UploadResult {
    pub key: String,
    pub size: usize,
    pub filename: String,
    pub is_chunked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_count: Option<usize>,
}
