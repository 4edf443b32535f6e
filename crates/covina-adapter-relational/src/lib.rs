//! Relational store adapter: `PostgreSQL` as the primary backend, with an
//! embedded SQLite database as a last-resort local store.
//!
//! The embedded database exists so that a critical write still lands
//! somewhere when the networked `PostgreSQL` instance is unreachable --
//! `health_check` reports healthy as long as either backend answers, so the
//! rest of the coordinator never needs to know which one served a given
//! call. Each location (table) is created on first use with a uniform
//! `(id, fields, revision)` shape; the adapter does not assume or enforce
//! any particular column layout beyond that.

mod identifier;
mod pool;

use std::collections::HashMap;

use async_trait::async_trait;
use covina_core::{
    Error, HealthStatus, Record, RelationalCapable, Result, StoreAdapter, StoreKind, WriteOutcome,
    WriteRecord,
};
use serde_json::Value;
use tracing::{debug, warn};

use identifier::validate_identifier;
use pool::Backend;

/// Where to find the primary and embedded relational backends.
#[derive(Debug, Clone)]
pub struct RelationalAdapterConfig {
    /// `PostgreSQL` connection string. `None` skips the primary backend
    /// entirely and runs on the embedded store only.
    pub postgres_url: Option<String>,
    /// SQLite file path for the embedded fallback, or `:memory:` for tests.
    pub sqlite_path: String,
    /// Maximum pooled connections per backend.
    pub max_connections: u32,
}

impl Default for RelationalAdapterConfig {
    fn default() -> Self {
        Self {
            postgres_url: None,
            sqlite_path: ":memory:".to_string(),
            max_connections: 5,
        }
    }
}

/// The relational adapter. Construct with [`RelationalAdapter::connect`],
/// which establishes the embedded pool eagerly and the primary pool
/// best-effort.
pub struct RelationalAdapter {
    primary: Option<sqlx::PgPool>,
    embedded: sqlx::SqlitePool,
}

impl RelationalAdapter {
    /// Connect the embedded backend (required) and the primary backend
    /// (best-effort; a failed primary connection downgrades to
    /// embedded-only rather than failing the whole adapter).
    ///
    /// # Errors
    ///
    /// Returns an error only if the embedded SQLite pool cannot be opened.
    pub async fn connect(config: RelationalAdapterConfig) -> Result<Self> {
        let embedded = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.sqlite_path)
            .await
            .map_err(|e| Error::TransientTransport {
                reason: format!("failed to open embedded relational store: {e}"),
            })?;

        let primary = match &config.postgres_url {
            Some(url) => match sqlx::postgres::PgPoolOptions::new()
                .max_connections(config.max_connections)
                .connect(url)
                .await
            {
                Ok(pool) => Some(pool),
                Err(e) => {
                    warn!(error = %e, "primary relational backend unreachable at startup, continuing on embedded store only");
                    None
                }
            },
            None => None,
        };

        Ok(Self { primary, embedded })
    }

    async fn active_backend(&self) -> Backend<'_> {
        if let Some(pool) = &self.primary {
            if sqlx::query("SELECT 1").execute(pool).await.is_ok() {
                return Backend::Postgres(pool);
            }
        }
        Backend::Sqlite(&self.embedded)
    }
}

#[async_trait]
impl StoreAdapter for RelationalAdapter {
    fn store_kind(&self) -> StoreKind {
        StoreKind::Relational
    }

    async fn connect(&self) -> Result<HealthStatus> {
        self.health_check().await
    }

    async fn disconnect(&self) -> Result<()> {
        if let Some(pool) = &self.primary {
            pool.close().await;
        }
        self.embedded.close().await;
        Ok(())
    }

    async fn health_check(&self) -> Result<HealthStatus> {
        let start = std::time::Instant::now();
        if let Some(pool) = &self.primary {
            if sqlx::query("SELECT 1").execute(pool).await.is_ok() {
                return Ok(HealthStatus {
                    healthy: true,
                    latency: start.elapsed(),
                });
            }
        }
        if sqlx::query("SELECT 1").execute(&self.embedded).await.is_ok() {
            debug!("relational health check served by embedded backend");
            return Ok(HealthStatus {
                healthy: true,
                latency: start.elapsed(),
            });
        }
        Err(Error::StoreUnavailable {
            store: StoreKind::Relational,
        })
    }

    async fn write_one(&self, record: WriteRecord) -> Result<WriteOutcome> {
        validate_identifier(&record.location)?;
        let backend = self.active_backend().await;
        pool::ensure_table(&backend, &record.location).await?;
        pool::write_row(&backend, &record).await
    }

    async fn write_batch(&self, records: Vec<WriteRecord>) -> Result<Vec<Result<WriteOutcome>>> {
        let mut out = Vec::with_capacity(records.len());
        for record in records {
            out.push(self.write_one(record).await);
        }
        Ok(out)
    }

    async fn read_one(&self, location: &str, id: &str) -> Result<Option<Record>> {
        validate_identifier(location)?;
        let backend = self.active_backend().await;
        pool::read_row(&backend, location, id).await
    }

    async fn read_batch(&self, location: &str, ids: &[String]) -> Result<HashMap<String, Record>> {
        validate_identifier(location)?;
        let backend = self.active_backend().await;
        let mut out = HashMap::new();
        for id in ids {
            if let Some(record) = pool::read_row(&backend, location, id).await? {
                out.insert(id.clone(), record);
            }
        }
        Ok(out)
    }

    async fn exists_batch(&self, location: &str, ids: &[String]) -> Result<HashMap<String, bool>> {
        let records = self.read_batch(location, ids).await?;
        Ok(ids.iter().map(|id| (id.clone(), records.contains_key(id))).collect())
    }

    async fn delete(&self, location: &str, id: &str) -> Result<bool> {
        validate_identifier(location)?;
        let backend = self.active_backend().await;
        pool::delete_row(&backend, location, id).await
    }

    async fn query_native(&self, query: &str) -> Result<Vec<Record>> {
        let backend = self.active_backend().await;
        pool::query_raw(&backend, query, &[]).await
    }
}

#[async_trait]
impl RelationalCapable for RelationalAdapter {
    async fn read_in(&self, table: &str, ids: &[String]) -> Result<HashMap<String, Record>> {
        self.read_batch(table, ids).await
    }

    async fn query_parameterized(&self, sql: &str, params: &[Value]) -> Result<Vec<Record>> {
        let backend = self.active_backend().await;
        pool::query_raw(&backend, sql, params).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn embedded_only_adapter_is_healthy_with_no_postgres_configured() {
        let adapter = RelationalAdapter::connect(RelationalAdapterConfig::default()).await.unwrap();
        let status = adapter.health_check().await.unwrap();
        assert!(status.healthy);
    }

    #[tokio::test]
    async fn write_then_read_round_trips_on_embedded_backend() {
        let adapter = RelationalAdapter::connect(RelationalAdapterConfig::default()).await.unwrap();
        let mut fields = Record::new();
        fields.insert("name".into(), serde_json::json!("alice"));
        let outcome = adapter
            .write_one(WriteRecord::new("people", fields).with_id("p1"))
            .await
            .unwrap();
        assert_eq!(outcome.id, "p1");

        let read = adapter.read_one("people", "p1").await.unwrap().unwrap();
        assert_eq!(read.get("name"), Some(&serde_json::json!("alice")));
    }

    #[tokio::test]
    async fn delete_removes_row() {
        let adapter = RelationalAdapter::connect(RelationalAdapterConfig::default()).await.unwrap();
        adapter
            .write_one(WriteRecord::new("people", Record::new()).with_id("p2"))
            .await
            .unwrap();
        assert!(adapter.delete("people", "p2").await.unwrap());
        assert!(adapter.read_one("people", "p2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn rejects_invalid_table_name() {
        let adapter = RelationalAdapter::connect(RelationalAdapterConfig::default()).await.unwrap();
        let err = adapter
            .write_one(WriteRecord::new("people; DROP TABLE people;--", Record::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::BadRequest { .. }));
    }
}
