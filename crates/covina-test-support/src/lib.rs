//! In-memory fake store adapters, used by `covina-batch`, `covina-saga`,
//! `covina-strategy`, and `covina-distributor` to exercise coordination
//! logic without a live backend.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use covina_core::{
    DocumentCapable, Error, GraphCapable, HealthStatus, NeighborMatch, RelationalCapable, Record,
    Result, StoreAdapter, StoreKind, VectorCapable, WriteOutcome, WriteRecord,
};
use dashmap::DashMap;
use parking_lot::Mutex;

/// A fully in-memory adapter implementing every capability trait, keyed by
/// `(location, id)`. Good enough to exercise coordination logic; not a
/// substitute for adapter-crate-level tests against a real store.
pub struct FakeAdapter {
    kind: StoreKind,
    rows: DashMap<(String, String), Record>,
    revisions: DashMap<(String, String), String>,
    edges: DashMap<String, EdgeState>,
    healthy: AtomicBool,
    health_latency: Mutex<Duration>,
    next_id: std::sync::atomic::AtomicU64,
}

struct EdgeState {
    from_id: String,
    to_id: String,
    edge_type: String,
    weight_history: Vec<f64>,
    active: bool,
}

impl FakeAdapter {
    /// Build a healthy fake adapter for `kind` with no stored rows.
    #[must_use]
    pub fn new(kind: StoreKind) -> Self {
        Self {
            kind,
            rows: DashMap::new(),
            revisions: DashMap::new(),
            edges: DashMap::new(),
            healthy: AtomicBool::new(true),
            health_latency: Mutex::new(Duration::from_millis(1)),
            next_id: std::sync::atomic::AtomicU64::new(1),
        }
    }

    /// Flip the simulated health of this adapter, for strategy/distributor
    /// tests that exercise failover.
    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    /// Set the latency `health_check` reports.
    pub fn set_health_latency(&self, latency: Duration) {
        *self.health_latency.lock() = latency;
    }

    /// Number of rows currently stored, across all locations.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    fn fresh_id(&self) -> String {
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        format!("fake-{n}")
    }
}

#[async_trait]
impl StoreAdapter for FakeAdapter {
    fn store_kind(&self) -> StoreKind {
        self.kind
    }

    async fn connect(&self) -> Result<HealthStatus> {
        self.health_check().await
    }

    async fn disconnect(&self) -> Result<()> {
        Ok(())
    }

    async fn health_check(&self) -> Result<HealthStatus> {
        let healthy = self.healthy.load(Ordering::SeqCst);
        if !healthy {
            return Err(Error::StoreUnavailable { store: self.kind });
        }
        Ok(HealthStatus {
            healthy: true,
            latency: *self.health_latency.lock(),
        })
    }

    async fn write_one(&self, record: WriteRecord) -> Result<WriteOutcome> {
        if !self.healthy.load(Ordering::SeqCst) {
            return Err(Error::StoreUnavailable { store: self.kind });
        }
        let id = record.id.clone().unwrap_or_else(|| self.fresh_id());
        let key = (record.location.clone(), id.clone());

        if let Some(parent) = &record.parent_revision {
            if let Some(current) = self.revisions.get(&key) {
                if current.value() != parent {
                    return Err(Error::Conflict {
                        reason: format!("revision mismatch for {id}"),
                    });
                }
            }
        }

        let revision = self.fresh_id();
        self.rows.insert(key.clone(), record.fields);
        self.revisions.insert(key, revision.clone());
        Ok(WriteOutcome {
            id,
            revision: Some(revision),
        })
    }

    async fn write_batch(&self, records: Vec<WriteRecord>) -> Result<Vec<Result<WriteOutcome>>> {
        let mut out = Vec::with_capacity(records.len());
        for record in records {
            out.push(self.write_one(record).await);
        }
        Ok(out)
    }

    async fn read_one(&self, location: &str, id: &str) -> Result<Option<Record>> {
        Ok(self
            .rows
            .get(&(location.to_string(), id.to_string()))
            .map(|r| r.value().clone()))
    }

    async fn read_batch(&self, location: &str, ids: &[String]) -> Result<HashMap<String, Record>> {
        let mut out = HashMap::new();
        for id in ids {
            if let Some(record) = self.rows.get(&(location.to_string(), id.clone())) {
                out.insert(id.clone(), record.value().clone());
            }
        }
        Ok(out)
    }

    async fn exists_batch(&self, location: &str, ids: &[String]) -> Result<HashMap<String, bool>> {
        let mut out = HashMap::new();
        for id in ids {
            let present = self.rows.contains_key(&(location.to_string(), id.clone()));
            out.insert(id.clone(), present);
        }
        Ok(out)
    }

    async fn delete(&self, location: &str, id: &str) -> Result<bool> {
        let key = (location.to_string(), id.to_string());
        self.revisions.remove(&key);
        Ok(self.rows.remove(&key).is_some())
    }

    async fn query_native(&self, _query: &str) -> Result<Vec<Record>> {
        Ok(self.rows.iter().map(|entry| entry.value().clone()).collect())
    }
}

#[async_trait]
impl VectorCapable for FakeAdapter {
    async fn ensure_collection(&self, _collection: &str, _dimension: usize) -> Result<()> {
        Ok(())
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0f32; 8];
        for (i, byte) in text.bytes().enumerate() {
            vector[i % 8] += f32::from(byte) / 255.0;
        }
        Ok(vector)
    }

    async fn nearest_neighbors(
        &self,
        collection: &str,
        vector: &[f32],
        top_k: usize,
        _filter: Option<&Record>,
    ) -> Result<Vec<NeighborMatch>> {
        let mut matches: Vec<NeighborMatch> = self
            .rows
            .iter()
            .filter(|entry| entry.key().0 == collection)
            .map(|entry| {
                let stored = entry
                    .value()
                    .get("embedding")
                    .and_then(|v| v.as_array())
                    .map(|arr| {
                        arr.iter()
                            .filter_map(serde_json::Value::as_f64)
                            .map(|f| f as f32)
                            .collect::<Vec<f32>>()
                    })
                    .unwrap_or_default();
                let distance = euclidean_distance(vector, &stored);
                NeighborMatch {
                    id: entry.key().1.clone(),
                    metadata: entry.value().clone(),
                    distance,
                }
            })
            .collect();
        matches.sort_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap_or(std::cmp::Ordering::Equal));
        matches.truncate(top_k);
        Ok(matches)
    }
}

fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    let len = a.len().max(b.len());
    let mut sum = 0.0f32;
    for i in 0..len {
        let x = a.get(i).copied().unwrap_or(0.0);
        let y = b.get(i).copied().unwrap_or(0.0);
        sum += (x - y) * (x - y);
    }
    sum.sqrt()
}

#[async_trait]
impl GraphCapable for FakeAdapter {
    async fn create_node(&self, label: &str, properties: Record) -> Result<String> {
        let id = self.fresh_id();
        self.rows.insert(("nodes".into(), id.clone()), properties);
        self.rows
            .get_mut(&("nodes".into(), id.clone()))
            .map(|mut r| r.insert("__label".into(), serde_json::json!(label)));
        Ok(id)
    }

    async fn create_edge(
        &self,
        from_id: &str,
        to_id: &str,
        edge_type: &str,
        properties: Record,
    ) -> Result<String> {
        let id = self.fresh_id();
        self.rows.insert(("edges".into(), id.clone()), properties);
        self.edges.insert(
            id.clone(),
            EdgeState {
                from_id: from_id.to_string(),
                to_id: to_id.to_string(),
                edge_type: edge_type.to_string(),
                weight_history: Vec::new(),
                active: true,
            },
        );
        Ok(id)
    }

    async fn update_edge_weight(&self, edge_id: &str, weight: f64) -> Result<()> {
        let mut edge = self
            .edges
            .get_mut(edge_id)
            .ok_or_else(|| Error::BadRequest {
                reason: format!("unknown edge {edge_id}"),
            })?;
        edge.weight_history.push(weight);
        Ok(())
    }

    async fn soft_delete_edge(&self, edge_id: &str) -> Result<()> {
        let mut edge = self
            .edges
            .get_mut(edge_id)
            .ok_or_else(|| Error::BadRequest {
                reason: format!("unknown edge {edge_id}"),
            })?;
        edge.active = false;
        Ok(())
    }

    async fn restore_edge(&self, edge_id: &str) -> Result<()> {
        let mut edge = self
            .edges
            .get_mut(edge_id)
            .ok_or_else(|| Error::BadRequest {
                reason: format!("unknown edge {edge_id}"),
            })?;
        edge.active = true;
        Ok(())
    }

    async fn traverse(&self, start_id: &str, _query: &str) -> Result<Vec<Record>> {
        Ok(self
            .edges
            .iter()
            .filter(|entry| entry.value().from_id == start_id && entry.value().active)
            .map(|entry| {
                let mut record = Record::new();
                record.insert("edge_id".into(), serde_json::json!(entry.key()));
                record.insert("to_id".into(), serde_json::json!(entry.value().to_id));
                record.insert("edge_type".into(), serde_json::json!(entry.value().edge_type));
                record
            })
            .collect())
    }
}

#[async_trait]
impl DocumentCapable for FakeAdapter {
    async fn read_with_revision(
        &self,
        location: &str,
        id: &str,
    ) -> Result<Option<(Record, String)>> {
        let key = (location.to_string(), id.to_string());
        let Some(record) = self.rows.get(&key) else {
            return Ok(None);
        };
        let revision = self
            .revisions
            .get(&key)
            .map(|r| r.value().clone())
            .unwrap_or_default();
        Ok(Some((record.value().clone(), revision)))
    }
}

#[async_trait]
impl RelationalCapable for FakeAdapter {
    async fn read_in(&self, table: &str, ids: &[String]) -> Result<HashMap<String, Record>> {
        self.read_batch(table, ids).await
    }

    async fn query_parameterized(
        &self,
        _sql: &str,
        _params: &[serde_json::Value],
    ) -> Result<Vec<Record>> {
        self.query_native("").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let adapter = FakeAdapter::new(StoreKind::Relational);
        let mut fields = Record::new();
        fields.insert("k".into(), serde_json::json!("v"));
        let outcome = adapter
            .write_one(WriteRecord::new("t", fields).with_id("row-1"))
            .await
            .unwrap();
        assert_eq!(outcome.id, "row-1");
        let read = adapter.read_one("t", "row-1").await.unwrap();
        assert!(read.is_some());
    }

    #[tokio::test]
    async fn unhealthy_adapter_rejects_writes() {
        let adapter = FakeAdapter::new(StoreKind::Vector);
        adapter.set_healthy(false);
        let err = adapter.health_check().await.unwrap_err();
        assert_eq!(err, Error::StoreUnavailable { store: StoreKind::Vector });
        let err = adapter.write_one(WriteRecord::new("x", Record::new())).await.unwrap_err();
        assert_eq!(err, Error::StoreUnavailable { store: StoreKind::Vector });
    }

    #[tokio::test]
    async fn revision_conflict_detected() {
        let adapter = FakeAdapter::new(StoreKind::Document);
        let outcome = adapter
            .write_one(WriteRecord::new("docs", Record::new()).with_id("d1"))
            .await
            .unwrap();
        let mut stale = WriteRecord::new("docs", Record::new()).with_id("d1");
        stale.parent_revision = Some("stale-revision".into());
        let err = adapter.write_one(stale).await.unwrap_err();
        assert!(matches!(err, Error::Conflict { .. }));
        assert!(outcome.revision.is_some());
    }

    #[tokio::test]
    async fn graph_edge_lifecycle() {
        let adapter = FakeAdapter::new(StoreKind::Graph);
        let a = adapter.create_node("Doc", Record::new()).await.unwrap();
        let b = adapter.create_node("Doc", Record::new()).await.unwrap();
        let edge = adapter.create_edge(&a, &b, "REFERS_TO", Record::new()).await.unwrap();
        adapter.update_edge_weight(&edge, 0.8).await.unwrap();
        let hits = adapter.traverse(&a, "").await.unwrap();
        assert_eq!(hits.len(), 1);
        adapter.soft_delete_edge(&edge).await.unwrap();
        let hits = adapter.traverse(&a, "").await.unwrap();
        assert!(hits.is_empty());
    }
}
