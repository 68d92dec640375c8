use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::{PgPool, Row};

use crate::store::{Document, DocumentStore, Filter, StoreError, UpdateOutcome};

/// Postgres-backed document store. Every collection lives in one JSONB
/// table; equality filters compile to `@>` containment so the GIN index
/// applies.
#[derive(Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS documents (collection TEXT NOT NULL, doc JSONB NOT NULL)",
        )
        .execute(&self.pool)
        .await
        .map_err(backend_error)?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS documents_collection_idx ON documents (collection)",
        )
        .execute(&self.pool)
        .await
        .map_err(backend_error)?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS documents_doc_idx ON documents USING GIN (doc jsonb_path_ops)",
        )
        .execute(&self.pool)
        .await
        .map_err(backend_error)?;

        Ok(())
    }
}

fn backend_error(err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => StoreError::Unavailable(err.to_string()),
        other => StoreError::Backend(other.to_string()),
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn find_one(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<Option<Document>, StoreError> {
        let row = sqlx::query(
            "SELECT doc FROM documents WHERE collection = $1 AND doc @> $2 LIMIT 1",
        )
        .bind(collection)
        .bind(filter.as_json())
        .fetch_optional(&self.pool)
        .await
        .map_err(backend_error)?;

        match row {
            Some(row) => {
                let doc: Value = row.try_get("doc").map_err(backend_error)?;
                Ok(Some(doc))
            }
            None => Ok(None),
        }
    }

    async fn find_many(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<Vec<Document>, StoreError> {
        let rows = sqlx::query("SELECT doc FROM documents WHERE collection = $1 AND doc @> $2")
            .bind(collection)
            .bind(filter.as_json())
            .fetch_all(&self.pool)
            .await
            .map_err(backend_error)?;

        let mut docs = Vec::with_capacity(rows.len());
        for row in rows {
            let doc: Value = row.try_get("doc").map_err(backend_error)?;
            docs.push(doc);
        }
        Ok(docs)
    }

    async fn insert_one(&self, collection: &str, doc: Document) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO documents (collection, doc) VALUES ($1, $2)")
            .bind(collection)
            .bind(doc)
            .execute(&self.pool)
            .await
            .map_err(backend_error)?;
        Ok(())
    }

    async fn insert_many(&self, collection: &str, docs: Vec<Document>) -> Result<(), StoreError> {
        // Per-document atomicity is all the design requires; no
        // multi-document transaction.
        for doc in docs {
            self.insert_one(collection, doc).await?;
        }
        Ok(())
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        patch: Document,
        upsert: bool,
    ) -> Result<UpdateOutcome, StoreError> {
        if !patch.is_object() {
            return Err(StoreError::Malformed(format!(
                "patch must be an object, got {patch}"
            )));
        }

        let result = sqlx::query(
            "UPDATE documents SET doc = doc || $3 \
             WHERE ctid IN (SELECT ctid FROM documents WHERE collection = $1 AND doc @> $2 LIMIT 1)",
        )
        .bind(collection)
        .bind(filter.as_json())
        .bind(&patch)
        .execute(&self.pool)
        .await
        .map_err(backend_error)?;

        let matched = result.rows_affected();
        if matched > 0 || !upsert {
            return Ok(UpdateOutcome {
                matched,
                upserted: false,
            });
        }

        let mut fields = match filter.as_json() {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        if let Value::Object(patch_obj) = patch {
            for (key, value) in patch_obj {
                fields.insert(key, value);
            }
        }
        self.insert_one(collection, Value::Object(fields)).await?;

        Ok(UpdateOutcome {
            matched: 0,
            upserted: true,
        })
    }

    async fn count(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS total FROM documents WHERE collection = $1 AND doc @> $2",
        )
        .bind(collection)
        .bind(filter.as_json())
        .fetch_one(&self.pool)
        .await
        .map_err(backend_error)?;

        let total: i64 = row.try_get("total").map_err(backend_error)?;
        Ok(total as u64)
    }
}
