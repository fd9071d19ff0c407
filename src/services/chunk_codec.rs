//! Chunk codec: splits oversized payloads into bounded row-sized pieces and
//! joins them back together.
//!
//! Everything here is pure: no I/O, no shared state. The object store decides
//! *when* to chunk by asking the [`ChunkPolicy`], and the codec only ever sees
//! canonical [`Bytes`] (see [`normalize`] for the row-format boundary).

use crate::models::binary::BinaryColumn;
use bytes::{Bytes, BytesMut};
use thiserror::Error;

/// Maximum bytes per chunk row (floor of 1.9 MiB). Kept below the per-row
/// limit to leave room for row overhead.
pub const CHUNK_SIZE: usize = 1_992_294;

/// Largest payload stored inline in the metadata row. Equal to the backing
/// store's per-row binary limit; a payload of exactly this size is not chunked.
pub const SINGLE_ROW_THRESHOLD: usize = 2 * 1024 * 1024;

/// Upper bound on chunks per object. `MAX_OBJECT_SIZE` is derived from it.
pub const MAX_CHUNKS: usize = 5;

/// Hard ceiling on accepted uploads (~9.5MB).
pub const MAX_OBJECT_SIZE: usize = CHUNK_SIZE * MAX_CHUNKS;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("invalid chunk policy: {0}")]
    InvalidPolicy(String),
    #[error("unrecognized binary encoding: {0}")]
    UnrecognizedEncoding(String),
    #[error("byte value {value} at offset {offset} is outside 0..=255")]
    ByteOutOfRange { offset: usize, value: i64 },
}

/// Size limits governing single-row vs. chunked layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPolicy {
    chunk_size: usize,
    single_row_threshold: usize,
    max_object_size: usize,
}

impl Default for ChunkPolicy {
    fn default() -> Self {
        Self {
            chunk_size: CHUNK_SIZE,
            single_row_threshold: SINGLE_ROW_THRESHOLD,
            max_object_size: MAX_OBJECT_SIZE,
        }
    }
}

impl ChunkPolicy {
    /// Build a policy, rejecting combinations that would let a chunk exceed
    /// the per-row limit or an object ceiling that does not fit in `usize`
    /// (with one byte of headroom for the request body limit).
    pub fn new(
        chunk_size: usize,
        single_row_threshold: usize,
        max_chunks: usize,
    ) -> Result<Self, CodecError> {
        if chunk_size == 0 {
            return Err(CodecError::InvalidPolicy("chunk size must be non-zero".into()));
        }
        if chunk_size >= single_row_threshold {
            return Err(CodecError::InvalidPolicy(format!(
                "chunk size {} must be below the single-row threshold {}",
                chunk_size, single_row_threshold
            )));
        }
        if max_chunks == 0 {
            return Err(CodecError::InvalidPolicy("max chunks must be at least 1".into()));
        }
        let max_object_size = chunk_size
            .checked_mul(max_chunks)
            .filter(|max| max.checked_add(1).is_some())
            .ok_or_else(|| {
                CodecError::InvalidPolicy(format!(
                    "{} chunks of {} bytes overflows the object size limit",
                    max_chunks, chunk_size
                ))
            })?;
        Ok(Self {
            chunk_size,
            single_row_threshold,
            max_object_size,
        })
    }

    /// Default sizes with a deployment-specific chunk ceiling.
    pub fn with_max_chunks(max_chunks: usize) -> Result<Self, CodecError> {
        Self::new(CHUNK_SIZE, SINGLE_ROW_THRESHOLD, max_chunks)
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn single_row_threshold(&self) -> usize {
        self.single_row_threshold
    }

    pub fn max_object_size(&self) -> usize {
        self.max_object_size
    }

    pub fn needs_chunking(&self, size: usize) -> bool {
        size > self.single_row_threshold
    }

    /// Number of chunks `split` produces for a payload of `size` bytes.
    pub fn chunk_count(&self, size: usize) -> usize {
        size.div_ceil(self.chunk_size)
    }

    /// Split `bytes` into `chunk_count(len)` slices. Every slice but the last
    /// is exactly `chunk_size` long; slices share the input's allocation.
    pub fn split(&self, bytes: &Bytes) -> Vec<Bytes> {
        let mut slices = Vec::with_capacity(self.chunk_count(bytes.len()));
        let mut offset = 0;
        while offset < bytes.len() {
            let end = offset + self.chunk_size.min(bytes.len() - offset);
            slices.push(bytes.slice(offset..end));
            offset = end;
        }
        slices
    }
}

/// Concatenate slices that are already in index order into one buffer.
pub fn reassemble<B: AsRef<[u8]>>(slices: &[B]) -> Bytes {
    let total: usize = slices.iter().map(|s| s.as_ref().len()).sum();
    let mut out = BytesMut::with_capacity(total);
    for slice in slices {
        out.extend_from_slice(slice.as_ref());
    }
    out.freeze()
}

/// Convert whichever row format the store handed back into canonical bytes.
pub fn normalize(column: BinaryColumn) -> Result<Bytes, CodecError> {
    match column {
        BinaryColumn::Buffer(buf) => Ok(Bytes::from(buf)),
        BinaryColumn::ByteArray(values) => values
            .into_iter()
            .enumerate()
            .map(|(offset, value)| {
                u8::try_from(value).map_err(|_| CodecError::ByteOutOfRange { offset, value })
            })
            .collect::<Result<Vec<u8>, _>>()
            .map(Bytes::from),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patterned(len: usize) -> Bytes {
        Bytes::from((0..len).map(|i| (i % 251) as u8).collect::<Vec<u8>>())
    }

    #[test]
    fn default_constants_hold_their_relationships() {
        let policy = ChunkPolicy::default();
        assert!(policy.chunk_size() < policy.single_row_threshold());
        assert_eq!(policy.max_object_size(), MAX_OBJECT_SIZE);
        assert_eq!(MAX_OBJECT_SIZE % CHUNK_SIZE, 0);
        assert_eq!(MAX_OBJECT_SIZE, 9_961_470);
    }

    #[test]
    fn threshold_is_inclusive_on_single_row_side() {
        let policy = ChunkPolicy::default();
        assert!(!policy.needs_chunking(0));
        assert!(!policy.needs_chunking(SINGLE_ROW_THRESHOLD - 1));
        assert!(!policy.needs_chunking(SINGLE_ROW_THRESHOLD));
        assert!(policy.needs_chunking(SINGLE_ROW_THRESHOLD + 1));
    }

    #[test]
    fn chunk_count_rounds_up() {
        let policy = ChunkPolicy::default();
        assert_eq!(policy.chunk_count(1), 1);
        assert_eq!(policy.chunk_count(CHUNK_SIZE), 1);
        assert_eq!(policy.chunk_count(CHUNK_SIZE + 1), 2);
        assert_eq!(policy.chunk_count(SINGLE_ROW_THRESHOLD + 1), 2);
        assert_eq!(policy.chunk_count(5 * 1024 * 1024), 3);
        assert_eq!(policy.chunk_count(MAX_OBJECT_SIZE), 5);
    }

    #[test]
    fn split_sizes_every_slice_but_the_last_to_chunk_size() {
        let policy = ChunkPolicy::new(10, 16, 5).unwrap();
        let input = patterned(37);
        let slices = policy.split(&input);

        assert_eq!(slices.len(), 4);
        assert!(slices[..3].iter().all(|s| s.len() == 10));
        assert_eq!(slices[3].len(), 7);
        assert_eq!(reassemble(&slices), input);
    }

    #[test]
    fn split_exact_multiple_has_full_last_slice() {
        let policy = ChunkPolicy::new(8, 16, 5).unwrap();
        let slices = policy.split(&patterned(24));
        assert_eq!(slices.len(), 3);
        assert_eq!(slices[2].len(), 8);
    }

    #[test]
    fn split_short_input_yields_one_slice() {
        let policy = ChunkPolicy::default();
        let input = patterned(3);
        let slices = policy.split(&input);
        assert_eq!(slices, vec![input]);
    }

    #[test]
    fn split_and_reassemble_empty() {
        let policy = ChunkPolicy::default();
        assert!(policy.split(&Bytes::new()).is_empty());
        assert!(reassemble::<Bytes>(&[]).is_empty());
    }

    #[test]
    fn reassemble_inverts_split_at_full_scale() {
        let policy = ChunkPolicy::default();
        for len in [SINGLE_ROW_THRESHOLD + 1, 5 * 1024 * 1024, MAX_OBJECT_SIZE] {
            let input = patterned(len);
            let slices = policy.split(&input);
            assert_eq!(slices.len(), policy.chunk_count(len));
            let last = slices.last().unwrap().len();
            assert_eq!(last, len - CHUNK_SIZE * (slices.len() - 1));
            assert_eq!(reassemble(&slices), input);
        }
    }

    #[test]
    fn policy_rejects_chunk_not_below_threshold() {
        assert!(matches!(
            ChunkPolicy::new(16, 16, 5),
            Err(CodecError::InvalidPolicy(_))
        ));
        assert!(ChunkPolicy::new(0, 16, 5).is_err());
        assert!(ChunkPolicy::with_max_chunks(0).is_err());
    }

    #[test]
    fn policy_rejects_overflowing_object_ceiling() {
        assert!(matches!(
            ChunkPolicy::with_max_chunks(usize::MAX / 1000),
            Err(CodecError::InvalidPolicy(_))
        ));
        assert!(matches!(
            ChunkPolicy::new(usize::MAX / 2, usize::MAX, 2),
            Err(CodecError::InvalidPolicy(_))
        ));
        let policy = ChunkPolicy::with_max_chunks(10).unwrap();
        assert_eq!(policy.max_object_size(), CHUNK_SIZE * 10);
    }

    #[test]
    fn normalize_accepts_both_row_formats() {
        let buffer = normalize(BinaryColumn::Buffer(vec![0, 127, 255])).unwrap();
        let array = normalize(BinaryColumn::ByteArray(vec![0, 127, 255])).unwrap();
        assert_eq!(buffer, array);
        assert_eq!(&buffer[..], &[0, 127, 255]);
    }

    #[test]
    fn normalize_rejects_out_of_range_values() {
        let err = normalize(BinaryColumn::ByteArray(vec![1, 256])).unwrap_err();
        assert_eq!(err, CodecError::ByteOutOfRange { offset: 1, value: 256 });
        assert!(normalize(BinaryColumn::ByteArray(vec![-1])).is_err());
    }
}
