//! Storage services: the pure chunk codec and the SQLite-backed object store
//! built on it, plus the per-kind store set shared by the HTTP handlers.

pub mod chunk_codec;
pub mod object_store;

use crate::models::kind::ObjectKind;
use chunk_codec::ChunkPolicy;
use object_store::{ObjectStore, StoreResult};
use sqlx::SqlitePool;
use std::sync::Arc;

/// One [`ObjectStore`] per object kind, all on the same pool.
#[derive(Clone)]
pub struct Stores {
    pub scores: ObjectStore,
    pub editions: ObjectStore,
}

impl Stores {
    pub fn open(db: Arc<SqlitePool>, policy: ChunkPolicy) -> StoreResult<Self> {
        Ok(Self {
            scores: ObjectStore::new(db.clone(), ObjectKind::Score.tables(), policy)?,
            editions: ObjectStore::new(db, ObjectKind::Edition.tables(), policy)?,
        })
    }

    pub fn for_kind(&self, kind: ObjectKind) -> &ObjectStore {
        match kind {
            ObjectKind::Score => &self.scores,
            ObjectKind::Edition => &self.editions,
        }
    }

    /// Create every kind's tables.
    pub async fn migrate(&self) -> StoreResult<()> {
        for kind in ObjectKind::ALL {
            self.for_kind(kind).migrate().await?;
        }
        Ok(())
    }

    /// Largest upload any store accepts.
    pub fn max_object_size(&self) -> usize {
        self.scores
            .policy()
            .max_object_size()
            .max(self.editions.policy().max_object_size())
    }
}
