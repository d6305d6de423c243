//! FragmentStore implementation over libSQL

use crate::{schema, LibsqlFragmentStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{params, Row};
use rag_core::error::{Error, Result};
use rag_core::store::FragmentStore;
use rag_core::types::{CollectionStats, Fragment};
use tracing::{debug, info};
use uuid::Uuid;

/// Columns selected by every fragment load, in row-mapping order.
const FRAGMENT_COLUMNS: &str = "id, collection, category, content, content_length, \
     combined_embedding, category_embedding, content_embedding, embedding_dimension, \
     source_file, chunk_index, created_at, updated_at";

/// Map a libsql failure onto the store error model. Lock contention is the
/// one retryable condition a local database produces.
fn storage_err(context: &str, e: &libsql::Error) -> Error {
    classify(context, &e.to_string())
}

fn classify(context: &str, message: &str) -> Error {
    let lowered = message.to_lowercase();
    if lowered.contains("busy") || lowered.contains("locked") {
        Error::StorageTransient(format!("{context}: {message}"))
    } else {
        Error::Storage(format!("{context}: {message}"))
    }
}

/// Encode an embedding as little-endian IEEE-754 bytes, 4 per float.
fn embedding_to_blob(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|&f| f.to_le_bytes()).collect()
}

/// Decode a little-endian f32 blob back into an embedding.
fn blob_to_embedding(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| {
            let mut arr = [0u8; 4];
            arr.copy_from_slice(chunk);
            f32::from_le_bytes(arr)
        })
        .collect()
}

fn timestamp_to_datetime(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_default()
}

impl LibsqlFragmentStore {
    fn row_to_fragment(row: &Row) -> Result<Fragment> {
        let get_err = |e: &libsql::Error| Error::Storage(format!("Failed to read column: {e}"));

        let id_text: String = row.get(0).map_err(|e| get_err(&e))?;
        let id = Uuid::parse_str(&id_text)
            .map_err(|e| Error::Storage(format!("Invalid fragment id {id_text}: {e}")))?;

        let combined: Option<Vec<u8>> = row.get(5).map_err(|e| get_err(&e))?;
        let category_emb: Option<Vec<u8>> = row.get(6).map_err(|e| get_err(&e))?;
        let content_emb: Option<Vec<u8>> = row.get(7).map_err(|e| get_err(&e))?;
        let dimension: Option<i64> = row.get(8).map_err(|e| get_err(&e))?;
        let chunk_index: Option<i64> = row.get(10).map_err(|e| get_err(&e))?;
        let created_at: i64 = row.get(11).map_err(|e| get_err(&e))?;
        let updated_at: i64 = row.get(12).map_err(|e| get_err(&e))?;

        let content: String = row.get(3).map_err(|e| get_err(&e))?;
        let content_length: i64 = row.get(4).map_err(|e| get_err(&e))?;

        Ok(Fragment {
            id,
            collection: row.get(1).map_err(|e| get_err(&e))?,
            category: row.get(2).map_err(|e| get_err(&e))?,
            content,
            content_length: usize::try_from(content_length).unwrap_or(0),
            combined_embedding: combined.as_deref().map(blob_to_embedding),
            category_embedding: category_emb.as_deref().map(blob_to_embedding),
            content_embedding: content_emb.as_deref().map(blob_to_embedding),
            embedding_dimension: dimension.and_then(|d| usize::try_from(d).ok()),
            source_file: row.get(9).map_err(|e| get_err(&e))?,
            chunk_index: chunk_index.and_then(|i| u32::try_from(i).ok()),
            created_at: timestamp_to_datetime(created_at),
            updated_at: timestamp_to_datetime(updated_at),
        })
    }

    async fn query_fragments(&self, sql: &str, params: impl libsql::params::IntoParams) -> Result<Vec<Fragment>> {
        let conn = self.connection()?;
        let mut rows = conn
            .query(sql, params)
            .await
            .map_err(|e| storage_err("Failed to query fragments", &e))?;

        let mut fragments = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| storage_err("Failed to fetch fragment row", &e))?
        {
            fragments.push(Self::row_to_fragment(&row)?);
        }
        Ok(fragments)
    }

    async fn scalar_i64(&self, sql: &str, params: impl libsql::params::IntoParams) -> Result<i64> {
        let conn = self.connection()?;
        let mut rows = conn
            .query(sql, params)
            .await
            .map_err(|e| storage_err("Failed to run scalar query", &e))?;
        let row = rows
            .next()
            .await
            .map_err(|e| storage_err("Failed to fetch scalar row", &e))?
            .ok_or_else(|| Error::Storage("Scalar query returned no row".to_string()))?;
        row.get(0)
            .map_err(|e| Error::Storage(format!("Failed to read scalar: {e}")))
    }
}

#[async_trait]
impl FragmentStore for LibsqlFragmentStore {
    async fn init_schema(&self) -> Result<()> {
        let conn = self.connection()?;

        conn.execute(schema::CREATE_FRAGMENTS_TABLE, ())
            .await
            .map_err(|e| storage_err("Failed to create fragments table", &e))?;

        // Columns that arrived after the single-embedding era: probe the
        // live table and add what is missing, leaving legacy rows NULL.
        let mut existing = Vec::new();
        let mut rows = conn
            .query("PRAGMA table_info(fragments)", ())
            .await
            .map_err(|e| storage_err("Failed to inspect fragments table", &e))?;
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| storage_err("Failed to read table info", &e))?
        {
            let name: String = row
                .get(1)
                .map_err(|e| Error::Storage(format!("Failed to read column name: {e}")))?;
            existing.push(name);
        }

        for (column, alter_sql) in schema::MIGRATED_EMBEDDING_COLUMNS {
            if !existing.iter().any(|name| name == column) {
                info!("Migrating fragments table: adding column {}", column);
                conn.execute(alter_sql, ())
                    .await
                    .map_err(|e| storage_err("Failed to add migrated column", &e))?;
            }
        }

        for index_sql in [
            schema::CREATE_COLLECTION_INDEX,
            schema::CREATE_CATEGORY_INDEX,
            schema::CREATE_CONTENT_LENGTH_INDEX,
            schema::CREATE_CREATED_AT_INDEX,
            schema::CREATE_PROVENANCE_INDEX,
        ] {
            conn.execute(index_sql, ())
                .await
                .map_err(|e| storage_err("Failed to create index", &e))?;
        }

        debug!("Fragment schema initialized");
        Ok(())
    }

    async fn bulk_insert(&self, fragments: &[Fragment]) -> Result<()> {
        if fragments.is_empty() {
            return Ok(());
        }
        let conn = self.connection()?;
        let tx = conn
            .transaction()
            .await
            .map_err(|e| storage_err("Failed to begin transaction", &e))?;

        let sql = format!(
            "INSERT INTO fragments ({FRAGMENT_COLUMNS}) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        );

        for fragment in fragments {
            tx.execute(
                &sql,
                params![
                    fragment.id.to_string(),
                    fragment.collection.clone(),
                    fragment.category.clone(),
                    fragment.content.clone(),
                    fragment.content_length as i64,
                    fragment.combined_embedding.as_deref().map(embedding_to_blob),
                    fragment.category_embedding.as_deref().map(embedding_to_blob),
                    fragment.content_embedding.as_deref().map(embedding_to_blob),
                    fragment.embedding_dimension.map(|d| d as i64),
                    fragment.source_file.clone(),
                    fragment.chunk_index.map(i64::from),
                    fragment.created_at.timestamp(),
                    fragment.updated_at.timestamp(),
                ],
            )
            .await
            .map_err(|e| storage_err("Failed to insert fragment", &e))?;
        }

        tx.commit()
            .await
            .map_err(|e| storage_err("Failed to commit fragment batch", &e))?;
        info!("Inserted {} fragments", fragments.len());
        Ok(())
    }

    async fn load_by_collection(&self, collection: &str) -> Result<Vec<Fragment>> {
        let sql = format!(
            "SELECT {FRAGMENT_COLUMNS} FROM fragments \
             WHERE collection = ? ORDER BY chunk_index ASC, created_at ASC"
        );
        let fragments = self.query_fragments(&sql, params![collection]).await?;
        debug!("Loaded {} fragments from {}", fragments.len(), collection);
        Ok(fragments)
    }

    async fn load_paged(
        &self,
        collection: &str,
        page: usize,
        size: usize,
    ) -> Result<Vec<Fragment>> {
        let sql = format!(
            "SELECT {FRAGMENT_COLUMNS} FROM fragments \
             WHERE collection = ? ORDER BY chunk_index ASC, created_at ASC \
             LIMIT ? OFFSET ?"
        );
        self.query_fragments(
            &sql,
            params![collection, size as i64, (page * size) as i64],
        )
        .await
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        let count = self
            .scalar_i64(
                "SELECT COUNT(*) FROM fragments WHERE collection = ?",
                params![collection],
            )
            .await?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    async fn has_any_embeddings(&self, collection: &str) -> Result<bool> {
        let exists = self
            .scalar_i64(
                "SELECT EXISTS(SELECT 1 FROM fragments WHERE collection = ? \
                 AND (combined_embedding IS NOT NULL \
                      OR category_embedding IS NOT NULL \
                      OR content_embedding IS NOT NULL))",
                params![collection],
            )
            .await?;
        Ok(exists != 0)
    }

    async fn collection_exists(&self, collection: &str) -> Result<bool> {
        let exists = self
            .scalar_i64(
                "SELECT EXISTS(SELECT 1 FROM fragments WHERE collection = ?)",
                params![collection],
            )
            .await?;
        Ok(exists != 0)
    }

    async fn list_collections(&self) -> Result<Vec<String>> {
        let conn = self.connection()?;
        let mut rows = conn
            .query(
                "SELECT DISTINCT collection FROM fragments ORDER BY collection",
                (),
            )
            .await
            .map_err(|e| storage_err("Failed to list collections", &e))?;

        let mut collections = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| storage_err("Failed to fetch collection row", &e))?
        {
            collections.push(
                row.get(0)
                    .map_err(|e| Error::Storage(format!("Failed to read collection: {e}")))?,
            );
        }
        Ok(collections)
    }

    async fn delete_collection(&self, collection: &str) -> Result<()> {
        let conn = self.connection()?;
        let deleted = conn
            .execute(
                "DELETE FROM fragments WHERE collection = ?",
                params![collection],
            )
            .await
            .map_err(|e| storage_err("Failed to delete collection", &e))?;
        info!("Deleted collection {} ({} fragments)", collection, deleted);
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let conn = self.connection()?;
        let deleted = conn
            .execute(
                "DELETE FROM fragments WHERE id = ?",
                params![id.to_string()],
            )
            .await
            .map_err(|e| storage_err("Failed to delete fragment", &e))?;
        Ok(deleted > 0)
    }

    async fn update_content(&self, id: Uuid, new_content: &str) -> Result<()> {
        let conn = self.connection()?;
        let updated = conn
            .execute(
                "UPDATE fragments SET content = ?, content_length = ?, updated_at = ? \
                 WHERE id = ?",
                params![
                    new_content,
                    new_content.len() as i64,
                    Utc::now().timestamp(),
                    id.to_string()
                ],
            )
            .await
            .map_err(|e| storage_err("Failed to update fragment content", &e))?;
        if updated == 0 {
            return Err(Error::Storage(format!("Fragment {id} not found")));
        }
        Ok(())
    }

    async fn stats(&self, collection: &str) -> Result<CollectionStats> {
        let conn = self.connection()?;
        let mut rows = conn
            .query(
                "SELECT COUNT(*), COALESCE(SUM(content_length), 0), \
                 COALESCE(SUM(CASE WHEN combined_embedding IS NOT NULL \
                      OR category_embedding IS NOT NULL \
                      OR content_embedding IS NOT NULL THEN 1 ELSE 0 END), 0) \
                 FROM fragments WHERE collection = ?",
                params![collection],
            )
            .await
            .map_err(|e| storage_err("Failed to query collection stats", &e))?;

        let row = rows
            .next()
            .await
            .map_err(|e| storage_err("Failed to fetch stats row", &e))?
            .ok_or_else(|| Error::Storage("Stats query returned no row".to_string()))?;

        let fragment_count: i64 = row
            .get(0)
            .map_err(|e| Error::Storage(format!("Failed to read stats: {e}")))?;
        let total_content_bytes: i64 = row
            .get(1)
            .map_err(|e| Error::Storage(format!("Failed to read stats: {e}")))?;
        let embedded_count: i64 = row
            .get(2)
            .map_err(|e| Error::Storage(format!("Failed to read stats: {e}")))?;

        Ok(CollectionStats {
            fragment_count: usize::try_from(fragment_count).unwrap_or(0),
            total_content_bytes: u64::try_from(total_content_bytes).unwrap_or(0),
            embedded_count: usize::try_from(embedded_count).unwrap_or(0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blob_codec_round_trip() {
        let embedding = vec![0.0_f32, 1.5, -2.25, f32::MIN_POSITIVE];
        let blob = embedding_to_blob(&embedding);
        assert_eq!(blob.len(), 4 * embedding.len());
        assert_eq!(blob_to_embedding(&blob), embedding);
    }

    #[test]
    fn test_blob_is_little_endian() {
        let blob = embedding_to_blob(&[1.0_f32]);
        assert_eq!(blob, 1.0_f32.to_le_bytes().to_vec());
    }

    #[test]
    fn test_lock_contention_classifies_as_transient() {
        assert!(classify("op", "database is locked").is_transient());
        assert!(classify("op", "database table is BUSY").is_transient());
        assert!(!classify("op", "no such table: fragments").is_transient());
    }
}
