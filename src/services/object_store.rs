//! src/services/object_store.rs
//!
//! ObjectStore: keyed PDF storage on top of SQLite rows with a hard per-row
//! size ceiling. Payloads at or under the single-row threshold live inline in
//! the metadata row; larger ones are split into chunk rows and reassembled on
//! read. One implementation serves every object class; the table names come
//! from a [`TableSpec`].

use crate::{
    models::{
        binary::BinaryColumn,
        kind::{TableSpec, is_plain_identifier},
        object::{ObjectRecord, StoredObject, UploadResult},
    },
    services::chunk_codec::{ChunkPolicy, CodecError, normalize, reassemble},
};
use bytes::Bytes;
use chrono::Utc;
use sqlx::{FromRow, QueryBuilder, Row, SqlitePool, sqlite::Sqlite};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, instrument};

/// The only content type `put` accepts.
pub const ACCEPTED_MIME_TYPE: &str = "application/pdf";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("content type `{0}` is not accepted; expected application/pdf")]
    Validation(String),
    #[error("payload of {size} bytes exceeds the {max} byte limit")]
    SizeLimit { size: usize, max: usize },
    #[error("object `{0}` already exists")]
    DuplicateKey(String),
    #[error("`{0}` is not a valid table name")]
    InvalidTableName(String),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Ways stored rows can disagree with their metadata.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Corruption {
    #[error("single-row object has no inline payload")]
    MissingInlineData,
    #[error("single-row object has {found} stray chunk rows")]
    UnexpectedChunks { found: i64 },
    #[error("chunked object has no chunk count")]
    MissingChunkCount,
    #[error("chunked object has no chunk rows")]
    MissingChunks,
    #[error("expected {expected} chunk rows, found {found}")]
    ChunkCountMismatch { expected: i64, found: usize },
    #[error("chunk index {found} where {expected} was expected")]
    NonContiguousIndex { expected: i64, found: i64 },
    #[error("chunk {index} has no payload")]
    MissingChunkData { index: i64 },
    #[error("chunk {index} records {recorded} bytes but holds {actual}")]
    ChunkSizeMismatch {
        index: i64,
        recorded: i64,
        actual: usize,
    },
    #[error("payload is {actual} bytes but metadata records {expected}")]
    SizeMismatch { expected: i64, actual: usize },
    #[error("checksum {computed} does not match recorded {expected}")]
    ChecksumMismatch { expected: String, computed: String },
}

/// Outcome of reading an object, keeping "never written" apart from
/// "written but damaged".
#[derive(Debug)]
pub enum Lookup {
    Found(StoredObject),
    NotFound,
    Corrupt(Corruption),
}

/// One chunk row after normalization.
#[derive(Debug)]
struct ChunkRow {
    index: i64,
    recorded_size: i64,
    data: Option<Bytes>,
}

/// ObjectStore provides the three operations on chunked objects:
/// - `put` validates, then writes the metadata row plus any chunk rows in one
///   transaction
/// - `get` reads metadata, fetches chunks in index order and reassembles
/// - `delete` removes chunk rows and the metadata row together
///
/// It holds no state between calls beyond the pool handle; all shared state
/// lives in SQLite.
#[derive(Clone)]
pub struct ObjectStore {
    /// Shared SQLite connection pool.
    pub db: Arc<SqlitePool>,

    tables: TableSpec,
    policy: ChunkPolicy,
}

impl ObjectStore {
    /// Create a store over `tables`. Table names are checked here because they
    /// end up interpolated into SQL.
    pub fn new(db: Arc<SqlitePool>, tables: TableSpec, policy: ChunkPolicy) -> StoreResult<Self> {
        for name in [&tables.metadata_table, &tables.chunk_table] {
            if !is_plain_identifier(name) {
                return Err(StoreError::InvalidTableName(name.clone()));
            }
        }
        Ok(Self { db, tables, policy })
    }

    pub fn tables(&self) -> &TableSpec {
        &self.tables
    }

    pub fn policy(&self) -> ChunkPolicy {
        self.policy
    }

    /// Create the metadata and chunk tables if they do not exist yet.
    pub async fn migrate(&self) -> StoreResult<()> {
        let sql = schema_sql(&self.tables);
        let statements = schema_statements(&sql);
        debug!(
            "Running {} schema statements for {}",
            statements.len(),
            self.tables.metadata_table
        );
        for stmt in statements {
            sqlx::query(stmt).execute(&*self.db).await?;
        }
        Ok(())
    }

    /// Store `bytes` under `key`.
    ///
    /// The MIME check runs before the size check, and both run before any I/O.
    /// A key that already has a metadata row is rejected with `DuplicateKey`;
    /// there is no replace path.
    #[instrument(skip(self, bytes), fields(table = %self.tables.metadata_table, size = bytes.len()))]
    pub async fn put(
        &self,
        key: &str,
        mime_type: &str,
        bytes: Bytes,
        filename: &str,
    ) -> StoreResult<UploadResult> {
        if mime_type != ACCEPTED_MIME_TYPE {
            return Err(StoreError::Validation(mime_type.to_string()));
        }
        let max = self.policy.max_object_size();
        if bytes.len() > max {
            return Err(StoreError::SizeLimit {
                size: bytes.len(),
                max,
            });
        }

        let size = bytes.len();
        let etag = format!("{:x}", md5::compute(&bytes));
        let is_chunked = self.policy.needs_chunking(size);
        let slices = if is_chunked {
            self.policy.split(&bytes)
        } else {
            Vec::new()
        };
        let chunk_count = is_chunked.then_some(slices.len());
        let inline_data: Option<&[u8]> = (!is_chunked).then_some(&bytes[..]);

        let mut tx = self.db.begin().await?;

        let insert_meta = format!(
            "INSERT INTO {} (key, size, filename, uploaded_at, is_chunked, chunk_count, etag, inline_data)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            self.tables.metadata_table
        );
        let inserted = sqlx::query(&insert_meta)
            .bind(key)
            .bind(size as i64)
            .bind(filename)
            .bind(Utc::now())
            .bind(is_chunked)
            .bind(chunk_count.map(|n| n as i64))
            .bind(&etag)
            .bind(inline_data)
            .execute(&mut *tx)
            .await;
        match inserted {
            Ok(_) => {}
            Err(err) if is_unique_violation(&err) => {
                return Err(StoreError::DuplicateKey(key.to_string()));
            }
            Err(err) => return Err(StoreError::Sqlx(err)),
        }

        if is_chunked {
            let mut builder = QueryBuilder::<Sqlite>::new(format!(
                "INSERT INTO {} (object_key, chunk_index, data, size) ",
                self.tables.chunk_table
            ));
            builder.push_values(slices.iter().enumerate(), |mut row, (index, slice)| {
                row.push_bind(key)
                    .push_bind(index as i64)
                    .push_bind(&slice[..])
                    .push_bind(slice.len() as i64);
            });
            builder.build().execute(&mut *tx).await?;
        }

        tx.commit().await?;

        info!(key, is_chunked, chunks = slices.len(), "stored object");
        Ok(UploadResult {
            key: key.to_string(),
            size,
            filename: filename.to_string(),
            is_chunked,
            chunk_count,
        })
    }

    /// Fetch only the metadata row.
    pub async fn head(&self, key: &str) -> StoreResult<Option<ObjectRecord>> {
        let sql = format!(
            "SELECT key, size, filename, uploaded_at, is_chunked, chunk_count, etag
             FROM {} WHERE key = ?",
            self.tables.metadata_table
        );
        let record = sqlx::query_as::<_, ObjectRecord>(&sql)
            .bind(key)
            .fetch_optional(&*self.db)
            .await?;
        Ok(record)
    }

    /// Read and reassemble an object, reporting corruption as a distinct
    /// outcome instead of folding it into "not found".
    ///
    /// Row-format errors (a payload column that is neither a buffer nor a
    /// byte array) are returned as `StoreError::Codec`.
    #[instrument(skip(self), fields(table = %self.tables.metadata_table))]
    pub async fn lookup(&self, key: &str) -> StoreResult<Lookup> {
        let sql = format!(
            "SELECT key, size, filename, uploaded_at, is_chunked, chunk_count, etag, inline_data
             FROM {} WHERE key = ?",
            self.tables.metadata_table
        );
        let Some(row) = sqlx::query(&sql)
            .bind(key)
            .fetch_optional(&*self.db)
            .await?
        else {
            return Ok(Lookup::NotFound);
        };
        let record = ObjectRecord::from_row(&row)?;

        let bytes = if record.is_chunked {
            let chunks = self.fetch_chunks(key).await?;
            match assemble_chunks(record.chunk_count, chunks) {
                Ok(bytes) => bytes,
                Err(corruption) => return Ok(Lookup::Corrupt(corruption)),
            }
        } else {
            let stray = self.count_chunks(key).await?;
            if stray > 0 {
                return Ok(Lookup::Corrupt(Corruption::UnexpectedChunks { found: stray }));
            }
            match BinaryColumn::from_row(&row, "inline_data")? {
                Some(column) => normalize(column)?,
                None => return Ok(Lookup::Corrupt(Corruption::MissingInlineData)),
            }
        };

        if let Err(corruption) = verify_payload(&record, &bytes) {
            return Ok(Lookup::Corrupt(corruption));
        }

        Ok(Lookup::Found(StoredObject {
            key: record.key,
            size: bytes.len(),
            bytes,
            filename: record.filename,
            uploaded_at: record.uploaded_at,
            etag: record.etag,
        }))
    }

    /// Read an object. Both "never written" and "corrupt" come back as `None`;
    /// corruption is additionally reported as an error event.
    pub async fn get(&self, key: &str) -> StoreResult<Option<StoredObject>> {
        match self.lookup(key).await? {
            Lookup::Found(object) => Ok(Some(object)),
            Lookup::NotFound => {
                debug!(key, "object not found");
                Ok(None)
            }
            Lookup::Corrupt(reason) => {
                error!(
                    key,
                    table = %self.tables.metadata_table,
                    %reason,
                    "corrupt object: metadata present but payload rows inconsistent"
                );
                Ok(None)
            }
        }
    }

    /// Delete an object and all of its chunk rows. Returns whether a metadata
    /// row existed.
    #[instrument(skip(self), fields(table = %self.tables.metadata_table))]
    pub async fn delete(&self, key: &str) -> StoreResult<bool> {
        let delete_chunks = format!(
            "DELETE FROM {} WHERE object_key = ?",
            self.tables.chunk_table
        );
        let delete_meta = format!("DELETE FROM {} WHERE key = ?", self.tables.metadata_table);

        let mut tx = self.db.begin().await?;
        let chunks = sqlx::query(&delete_chunks)
            .bind(key)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query(&delete_meta)
            .bind(key)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        let existed = result.rows_affected() > 0;
        debug!(
            key,
            existed,
            chunks = chunks.rows_affected(),
            "deleted object"
        );
        Ok(existed)
    }

    async fn count_chunks(&self, key: &str) -> StoreResult<i64> {
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE object_key = ?",
            self.tables.chunk_table
        );
        let found = sqlx::query_scalar::<_, i64>(&sql)
            .bind(key)
            .fetch_one(&*self.db)
            .await?;
        Ok(found)
    }

    async fn fetch_chunks(&self, key: &str) -> StoreResult<Vec<ChunkRow>> {
        let sql = format!(
            "SELECT chunk_index, size, data FROM {}
             WHERE object_key = ? ORDER BY chunk_index ASC",
            self.tables.chunk_table
        );
        let rows = sqlx::query(&sql).bind(key).fetch_all(&*self.db).await?;

        rows.iter()
            .map(|row| -> StoreResult<ChunkRow> {
                let data = BinaryColumn::from_row(row, "data")?
                    .map(normalize)
                    .transpose()?;
                Ok(ChunkRow {
                    index: row.try_get("chunk_index")?,
                    recorded_size: row.try_get("size")?,
                    data,
                })
            })
            .collect()
    }
}

/// Check chunk rows (already ordered by index) against the metadata's count
/// and join them.
fn assemble_chunks(expected: Option<i64>, chunks: Vec<ChunkRow>) -> Result<Bytes, Corruption> {
    let expected = expected.ok_or(Corruption::MissingChunkCount)?;
    if chunks.is_empty() {
        return Err(Corruption::MissingChunks);
    }
    if chunks.len() as i64 != expected {
        return Err(Corruption::ChunkCountMismatch {
            expected,
            found: chunks.len(),
        });
    }

    let mut slices = Vec::with_capacity(chunks.len());
    for (position, chunk) in chunks.into_iter().enumerate() {
        if chunk.index != position as i64 {
            return Err(Corruption::NonContiguousIndex {
                expected: position as i64,
                found: chunk.index,
            });
        }
        let data = chunk.data.ok_or(Corruption::MissingChunkData { index: chunk.index })?;
        if data.len() as i64 != chunk.recorded_size {
            return Err(Corruption::ChunkSizeMismatch {
                index: chunk.index,
                recorded: chunk.recorded_size,
                actual: data.len(),
            });
        }
        slices.push(data);
    }
    Ok(reassemble(&slices))
}

fn verify_payload(record: &ObjectRecord, bytes: &Bytes) -> Result<(), Corruption> {
    if bytes.len() as i64 != record.size {
        return Err(Corruption::SizeMismatch {
            expected: record.size,
            actual: bytes.len(),
        });
    }
    let computed = format!("{:x}", md5::compute(bytes));
    if computed != record.etag {
        return Err(Corruption::ChecksumMismatch {
            expected: record.etag.clone(),
            computed,
        });
    }
    Ok(())
}

fn schema_sql(tables: &TableSpec) -> String {
    format!(
        r#"
        CREATE TABLE IF NOT EXISTS {meta} (
            key          TEXT PRIMARY KEY NOT NULL,
            size         INTEGER NOT NULL,
            filename     TEXT NOT NULL,
            uploaded_at  TEXT NOT NULL,
            is_chunked   INTEGER NOT NULL DEFAULT 0,
            chunk_count  INTEGER,
            etag         TEXT NOT NULL,
            inline_data  BLOB
        );

        CREATE TABLE IF NOT EXISTS {chunks} (
            object_key   TEXT NOT NULL,
            chunk_index  INTEGER NOT NULL,
            data         BLOB NOT NULL,
            size         INTEGER NOT NULL,
            PRIMARY KEY (object_key, chunk_index),
            FOREIGN KEY (object_key) REFERENCES {meta}(key) ON DELETE CASCADE
        );
        "#,
        meta = tables.metadata_table,
        chunks = tables.chunk_table,
    )
}

/// Split a schema script into individual statements.
fn schema_statements(sql: &str) -> Vec<&str> {
    sql.split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Return true if SQLx error indicates a unique constraint violation.
fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db_err) if db_err.message().to_ascii_lowercase().contains("unique")
    )
}
