//! Versioned document cache
//!
//! A collection-scoped get/put/flush layer over the `cache_documents`
//! table. Every stored document is stamped with the running build's
//! `source_version`; readers accept a document only when major.minor
//! matches, so a miss and a stale version are indistinguishable to the
//! caller and both trigger a rebuild.
//!
//! Writes are full overwrites: delete everything matching the key, then
//! insert the new document. Nothing is ever merged in place.

use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::{Row, SqlitePool};
use strata_common::{Result, SourceVersion};
use tracing::{debug, warn};

/// Document cache over one SQLite pool.
#[derive(Clone)]
pub struct CacheStore {
    pool: SqlitePool,
    running: SourceVersion,
}

impl CacheStore {
    /// Cache keyed by the running build's name and version.
    pub fn new(pool: SqlitePool) -> Result<Self> {
        let running = SourceVersion::running(env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))?;
        Ok(Self { pool, running })
    }

    /// Override the running version; used by tests to exercise the gate.
    pub fn with_version(pool: SqlitePool, running: SourceVersion) -> Self {
        Self { pool, running }
    }

    /// Fetch a document. `None` on miss or on version mismatch; the
    /// `ignore_version` flag skips the gate. Nonexistent keys never raise.
    pub async fn get<T: DeserializeOwned>(
        &self,
        collection: &str,
        key_id: i32,
        ignore_version: bool,
    ) -> Result<Option<T>> {
        let row = sqlx::query(
            r#"
            SELECT source_version, payload
            FROM cache_documents
            WHERE collection = ? AND key_id = ?
            "#,
        )
        .bind(collection)
        .bind(key_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        if !ignore_version {
            let stamp: String = row.get("source_version");
            match SourceVersion::parse(&stamp) {
                Ok(stored) if self.running.accepts(&stored) => {}
                Ok(stored) => {
                    debug!(
                        collection,
                        key_id,
                        stored = %stored,
                        running = %self.running,
                        "Cached document version mismatch, treating as miss"
                    );
                    return Ok(None);
                }
                Err(e) => {
                    warn!(collection, key_id, error = %e, "Unparseable source_version, treating as miss");
                    return Ok(None);
                }
            }
        }

        let payload: String = row.get("payload");
        Ok(Some(serde_json::from_str(&payload)?))
    }

    /// Store a document: stamp, delete-many by key, insert. The delete and
    /// insert run in one transaction so a racing reader sees either the old
    /// document or the new one, never neither.
    pub async fn put<T: Serialize>(&self, collection: &str, key_id: i32, document: &T) -> Result<()> {
        let payload = serde_json::to_string(document)?;
        let stamp = self.running.stamp();

        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM cache_documents WHERE collection = ? AND key_id = ?")
            .bind(collection)
            .bind(key_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            r#"
            INSERT INTO cache_documents (collection, key_id, source_version, payload)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(collection)
        .bind(key_id)
        .bind(&stamp)
        .bind(&payload)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        debug!(collection, key_id, version = %stamp, "Cached document written");
        Ok(())
    }

    /// Delete every document in the collection. Used for forced rebuilds.
    pub async fn flush(&self, collection: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM cache_documents WHERE collection = ?")
            .bind(collection)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init::init_tables;
    use serde::{Deserialize, Serialize};
    use sqlx::sqlite::SqlitePoolOptions;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Doc {
        id: i32,
        name: String,
    }

    async fn setup() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .connect("sqlite::memory:")
            .await
            .unwrap();
        init_tables(&pool).await.unwrap();
        pool
    }

    fn store_at(pool: &SqlitePool, version: &str) -> CacheStore {
        CacheStore::with_version(
            pool.clone(),
            SourceVersion::running("strata-builder", version).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_miss_on_nonexistent_key() {
        let pool = setup().await;
        let cache = store_at(&pool, "0.1.0");
        let doc: Option<Doc> = cache.get("site_cache", 42, false).await.unwrap();
        assert!(doc.is_none());
    }

    #[tokio::test]
    async fn test_put_get_roundtrip() {
        let pool = setup().await;
        let cache = store_at(&pool, "0.1.0");
        let doc = Doc {
            id: 1,
            name: "Birka".to_string(),
        };
        cache.put("site_cache", 1, &doc).await.unwrap();
        let read: Doc = cache.get("site_cache", 1, false).await.unwrap().unwrap();
        assert_eq!(read, doc);
    }

    #[tokio::test]
    async fn test_put_overwrites_never_merges() {
        let pool = setup().await;
        let cache = store_at(&pool, "0.1.0");
        cache
            .put("site_cache", 1, &Doc { id: 1, name: "old".into() })
            .await
            .unwrap();
        cache
            .put("site_cache", 1, &Doc { id: 1, name: "new".into() })
            .await
            .unwrap();

        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM cache_documents WHERE collection = 'site_cache' AND key_id = 1",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(count, 1);

        let read: Doc = cache.get("site_cache", 1, false).await.unwrap().unwrap();
        assert_eq!(read.name, "new");
    }

    #[tokio::test]
    async fn test_version_gate() {
        let pool = setup().await;
        let writer = store_at(&pool, "1.2.3");
        writer
            .put("site_cache", 1, &Doc { id: 1, name: "stamped".into() })
            .await
            .unwrap();

        // Patch drift tolerated
        let patch_reader = store_at(&pool, "1.2.9");
        let doc: Option<Doc> = patch_reader.get("site_cache", 1, false).await.unwrap();
        assert!(doc.is_some());

        // Minor bump treated as a miss
        let minor_reader = store_at(&pool, "1.3.0");
        let doc: Option<Doc> = minor_reader.get("site_cache", 1, false).await.unwrap();
        assert!(doc.is_none());

        // Override flag skips the gate
        let doc: Option<Doc> = minor_reader.get("site_cache", 1, true).await.unwrap();
        assert!(doc.is_some());
    }

    #[tokio::test]
    async fn test_flush_empties_collection() {
        let pool = setup().await;
        let cache = store_at(&pool, "0.1.0");
        for id in 1..=3 {
            cache
                .put("site_cache", id, &Doc { id, name: "x".into() })
                .await
                .unwrap();
        }
        assert_eq!(cache.flush("site_cache").await.unwrap(), 3);
        let doc: Option<Doc> = cache.get("site_cache", 1, false).await.unwrap();
        assert!(doc.is_none());
    }
}
