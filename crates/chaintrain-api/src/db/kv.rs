//! Catalog documents in the `kv_documents` table.

use async_trait::async_trait;
use chaintrain_registry::{KeyValueStore, KvError};
use serde_json::Value;
use sqlx::PgPool;

/// [`KeyValueStore`] over a PostgreSQL pool.
#[derive(Debug, Clone)]
pub struct PgKv {
    pool: PgPool,
}

impl PgKv {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn backend_error(e: sqlx::Error) -> KvError {
    KvError::Backend(e.to_string())
}

#[async_trait]
impl KeyValueStore for PgKv {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn get(&self, namespace: &str, key: &str) -> Result<Option<Value>, KvError> {
        sqlx::query_scalar::<_, Value>(
            "SELECT value FROM kv_documents WHERE namespace = $1 AND key = $2",
        )
        .bind(namespace)
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend_error)
    }

    async fn put(&self, namespace: &str, key: &str, value: Value) -> Result<(), KvError> {
        sqlx::query(
            "INSERT INTO kv_documents (namespace, key, value)
             VALUES ($1, $2, $3)
             ON CONFLICT (namespace, key)
             DO UPDATE SET value = EXCLUDED.value, updated_at = now()",
        )
        .bind(namespace)
        .bind(key)
        .bind(&value)
        .execute(&self.pool)
        .await
        .map_err(backend_error)?;
        Ok(())
    }

    async fn list(&self, namespace: &str) -> Result<Vec<(String, Value)>, KvError> {
        sqlx::query_as::<_, (String, Value)>(
            "SELECT key, value FROM kv_documents WHERE namespace = $1 ORDER BY key",
        )
        .bind(namespace)
        .fetch_all(&self.pool)
        .await
        .map_err(backend_error)
    }

    async fn delete(&self, namespace: &str, key: &str) -> Result<bool, KvError> {
        let result = sqlx::query("DELETE FROM kv_documents WHERE namespace = $1 AND key = $2")
            .bind(namespace)
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(backend_error)?;
        Ok(result.rows_affected() > 0)
    }
}
