//! Object classes and the tables each one is stored in.

use serde::Deserialize;

/// The two object classes the service stores. Both share one storage
/// implementation and differ only in table names.
#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    #[serde(rename = "scores")]
    Score,
    #[serde(rename = "editions")]
    Edition,
}

impl ObjectKind {
    pub const ALL: [ObjectKind; 2] = [ObjectKind::Score, ObjectKind::Edition];

    pub fn tables(self) -> TableSpec {
        match self {
            ObjectKind::Score => TableSpec::new("score_files", "score_file_chunks"),
            ObjectKind::Edition => TableSpec::new("edition_files", "edition_file_chunks"),
        }
    }
}

/// Table names for one store instance.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableSpec {
    pub metadata_table: String,
    pub chunk_table: String,
}

impl TableSpec {
    pub fn new(metadata_table: impl Into<String>, chunk_table: impl Into<String>) -> Self {
        Self {
            metadata_table: metadata_table.into(),
            chunk_table: chunk_table.into(),
        }
    }
}

/// Table names are interpolated into SQL, so only plain identifiers pass.
pub fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers() {
        assert!(is_plain_identifier("score_files"));
        assert!(is_plain_identifier("_t1"));
        assert!(!is_plain_identifier(""));
        assert!(!is_plain_identifier("1abc"));
        assert!(!is_plain_identifier("files; DROP TABLE x"));
        assert!(!is_plain_identifier("a-b"));
    }

    #[test]
    fn kinds_use_distinct_tables() {
        let score = ObjectKind::Score.tables();
        let edition = ObjectKind::Edition.tables();
        assert_ne!(score.metadata_table, edition.metadata_table);
        assert_ne!(score.chunk_table, edition.chunk_table);
    }

    #[test]
    fn kinds_deserialize_from_path_segments() {
        let kind: ObjectKind = serde_json::from_str("\"editions\"").unwrap();
        assert_eq!(kind, ObjectKind::Edition);
        assert!(serde_json::from_str::<ObjectKind>("\"buckets\"").is_err());
    }
}
