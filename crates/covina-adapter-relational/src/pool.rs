//! Query execution against whichever concrete backend is currently active.
//! Every location gets a uniform `(id, fields, revision)` table, created
//! lazily on first use; `fields` holds the record serialized as JSON text,
//! kept backend-agnostic rather than reaching for `JSONB`/`json1`-specific
//! operators neither dialect shares.

use covina_core::{Error, Record, Result, WriteOutcome, WriteRecord};
use serde_json::Value;
use sqlx::{Column, Row};

/// Which concrete store is currently serving reads/writes.
pub(crate) enum Backend<'a> {
    Postgres(&'a sqlx::PgPool),
    Sqlite(&'a sqlx::SqlitePool),
}

fn transport_err(e: sqlx::Error) -> Error {
    Error::TransientTransport { reason: e.to_string() }
}

pub(crate) async fn ensure_table(backend: &Backend<'_>, location: &str) -> Result<()> {
    let ddl = format!(
        "CREATE TABLE IF NOT EXISTS {location} (id TEXT PRIMARY KEY, fields TEXT NOT NULL, revision TEXT NOT NULL)"
    );
    match backend {
        Backend::Postgres(pool) => {
            sqlx::query(&ddl).execute(*pool).await.map_err(transport_err)?;
        }
        Backend::Sqlite(pool) => {
            sqlx::query(&ddl).execute(*pool).await.map_err(transport_err)?;
        }
    };
    Ok(())
}

async fn current_revision(backend: &Backend<'_>, location: &str, id: &str) -> Result<Option<String>> {
    let sql_pg = format!("SELECT revision FROM {location} WHERE id = $1");
    let sql_lite = format!("SELECT revision FROM {location} WHERE id = ?1");
    let revision = match backend {
        Backend::Postgres(pool) => sqlx::query(&sql_pg)
            .bind(id)
            .fetch_optional(*pool)
            .await
            .map_err(transport_err)?
            .map(|r| r.get::<String, _>("revision")),
        Backend::Sqlite(pool) => sqlx::query(&sql_lite)
            .bind(id)
            .fetch_optional(*pool)
            .await
            .map_err(transport_err)?
            .map(|r| r.get::<String, _>("revision")),
    };
    Ok(revision)
}

pub(crate) async fn write_row(backend: &Backend<'_>, record: &WriteRecord) -> Result<WriteOutcome> {
    let id = record.id.clone().unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    if let Some(parent) = &record.parent_revision {
        match current_revision(backend, &record.location, &id).await? {
            Some(current) if &current != parent => {
                return Err(Error::Conflict {
                    reason: format!("revision mismatch for {id}: expected {parent}, found {current}"),
                });
            }
            _ => {}
        }
    }

    let revision = uuid::Uuid::new_v4().to_string();
    let fields_json = serde_json::to_string(&record.fields).map_err(|e| Error::Other(e.to_string()))?;

    let location = &record.location;
    match backend {
        Backend::Postgres(pool) => {
            let sql = format!(
                "INSERT INTO {location} (id, fields, revision) VALUES ($1, $2, $3) \
                 ON CONFLICT (id) DO UPDATE SET fields = EXCLUDED.fields, revision = EXCLUDED.revision"
            );
            sqlx::query(&sql)
                .bind(&id)
                .bind(&fields_json)
                .bind(&revision)
                .execute(*pool)
                .await
                .map_err(transport_err)?;
        }
        Backend::Sqlite(pool) => {
            let sql = format!("INSERT OR REPLACE INTO {location} (id, fields, revision) VALUES (?1, ?2, ?3)");
            sqlx::query(&sql)
                .bind(&id)
                .bind(&fields_json)
                .bind(&revision)
                .execute(*pool)
                .await
                .map_err(transport_err)?;
        }
    }

    Ok(WriteOutcome {
        id,
        revision: Some(revision),
    })
}

pub(crate) async fn read_row(backend: &Backend<'_>, location: &str, id: &str) -> Result<Option<Record>> {
    let sql_pg = format!("SELECT fields FROM {location} WHERE id = $1");
    let sql_lite = format!("SELECT fields FROM {location} WHERE id = ?1");
    let fields_json = match backend {
        Backend::Postgres(pool) => sqlx::query(&sql_pg)
            .bind(id)
            .fetch_optional(*pool)
            .await
            .map(|row| row.map(|r| r.get::<String, _>("fields"))),
        Backend::Sqlite(pool) => sqlx::query(&sql_lite)
            .bind(id)
            .fetch_optional(*pool)
            .await
            .map(|row| row.map(|r| r.get::<String, _>("fields"))),
    };
    let fields_json = match fields_json {
        Ok(fields_json) => fields_json,
        Err(sqlx::Error::Database(e)) if e.message().contains("no such table") => return Ok(None),
        Err(e) => return Err(transport_err(e)),
    };
    let Some(fields_json) = fields_json else {
        return Ok(None);
    };
    let record: Record = serde_json::from_str(&fields_json).map_err(|e| Error::Other(e.to_string()))?;
    Ok(Some(record))
}

pub(crate) async fn delete_row(backend: &Backend<'_>, location: &str, id: &str) -> Result<bool> {
    let sql_pg = format!("DELETE FROM {location} WHERE id = $1");
    let sql_lite = format!("DELETE FROM {location} WHERE id = ?1");
    let affected = match backend {
        Backend::Postgres(pool) => sqlx::query(&sql_pg)
            .bind(id)
            .execute(*pool)
            .await
            .map_err(transport_err)?
            .rows_affected(),
        Backend::Sqlite(pool) => sqlx::query(&sql_lite)
            .bind(id)
            .execute(*pool)
            .await
            .map_err(transport_err)?
            .rows_affected(),
    };
    Ok(affected > 0)
}

fn bind_pg<'q>(
    mut query: sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>,
    params: &'q [Value],
) -> sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments> {
    for param in params {
        query = match param {
            Value::String(s) => query.bind(s.as_str()),
            Value::Number(n) if n.is_i64() => query.bind(n.as_i64()),
            Value::Number(n) => query.bind(n.as_f64()),
            Value::Bool(b) => query.bind(*b),
            other => query.bind(other.to_string()),
        };
    }
    query
}

fn bind_lite<'q>(
    mut query: sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    params: &'q [Value],
) -> sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
    for param in params {
        query = match param {
            Value::String(s) => query.bind(s.as_str()),
            Value::Number(n) if n.is_i64() => query.bind(n.as_i64()),
            Value::Number(n) => query.bind(n.as_f64()),
            Value::Bool(b) => query.bind(*b),
            other => query.bind(other.to_string()),
        };
    }
    query
}

fn row_to_record_pg(row: &sqlx::postgres::PgRow) -> Record {
    let mut record = Record::new();
    for column in row.columns() {
        let name = column.name();
        if let Ok(value) = row.try_get::<String, _>(name) {
            record.insert(name.to_string(), Value::String(value));
        } else if let Ok(value) = row.try_get::<i64, _>(name) {
            record.insert(name.to_string(), serde_json::json!(value));
        } else if let Ok(value) = row.try_get::<f64, _>(name) {
            record.insert(name.to_string(), serde_json::json!(value));
        } else if let Ok(value) = row.try_get::<bool, _>(name) {
            record.insert(name.to_string(), serde_json::json!(value));
        }
    }
    record
}

fn row_to_record_lite(row: &sqlx::sqlite::SqliteRow) -> Record {
    let mut record = Record::new();
    for column in row.columns() {
        let name = column.name();
        if let Ok(value) = row.try_get::<String, _>(name) {
            record.insert(name.to_string(), Value::String(value));
        } else if let Ok(value) = row.try_get::<i64, _>(name) {
            record.insert(name.to_string(), serde_json::json!(value));
        } else if let Ok(value) = row.try_get::<f64, _>(name) {
            record.insert(name.to_string(), serde_json::json!(value));
        } else if let Ok(value) = row.try_get::<bool, _>(name) {
            record.insert(name.to_string(), serde_json::json!(value));
        }
    }
    record
}

pub(crate) async fn query_raw(backend: &Backend<'_>, sql: &str, params: &[Value]) -> Result<Vec<Record>> {
    let out = match backend {
        Backend::Postgres(pool) => bind_pg(sqlx::query(sql), params)
            .fetch_all(*pool)
            .await
            .map_err(transport_err)?
            .iter()
            .map(row_to_record_pg)
            .collect(),
        Backend::Sqlite(pool) => bind_lite(sqlx::query(sql), params)
            .fetch_all(*pool)
            .await
            .map_err(transport_err)?
            .iter()
            .map(row_to_record_lite)
            .collect(),
    };
    Ok(out)
}
