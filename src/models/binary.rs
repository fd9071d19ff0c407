//! Row formats a binary column can come back in.
//!
//! SQLite hands back a BLOB for anything this crate writes, but rows written
//! by older clients hold a JSON array of byte values in a TEXT cell. Both are
//! accepted on read; [`crate::services::chunk_codec::normalize`] turns either
//! into canonical bytes.

use crate::services::{
    chunk_codec::CodecError,
    object_store::{StoreError, StoreResult},
};
use sqlx::{Row, TypeInfo, ValueRef, sqlite::SqliteRow};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BinaryColumn {
    /// Contiguous buffer (SQLite `BLOB`).
    Buffer(Vec<u8>),
    /// Array of integer byte values (JSON text).
    ByteArray(Vec<i64>),
}

impl BinaryColumn {
    /// Read `column` from `row`, returning `None` for SQL `NULL`.
    ///
    /// Any storage class other than BLOB or TEXT, or TEXT that does not parse
    /// as an integer array, is an integration error and fails immediately.
    pub fn from_row(row: &SqliteRow, column: &str) -> StoreResult<Option<Self>> {
        let type_name = {
            let raw = row.try_get_raw(column)?;
            if raw.is_null() {
                return Ok(None);
            }
            raw.type_info().name().to_string()
        };

        match type_name.as_str() {
            "BLOB" => Ok(Some(Self::Buffer(
                row.try_get_unchecked::<Vec<u8>, _>(column)?,
            ))),
            "TEXT" => {
                let text = row.try_get_unchecked::<String, _>(column)?;
                let values = serde_json::from_str::<Vec<i64>>(&text).map_err(|err| {
                    CodecError::UnrecognizedEncoding(format!(
                        "text column `{}` is not a byte array: {}",
                        column, err
                    ))
                })?;
                Ok(Some(Self::ByteArray(values)))
            }
            other => Err(StoreError::Codec(CodecError::UnrecognizedEncoding(
                format!("column `{}` has storage class {}", column, other),
            ))),
        }
    }
}
