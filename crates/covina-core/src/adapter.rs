//! The common store adapter contract plus the additive capability traits
//! (`VectorCapable`, `GraphCapable`, `DocumentCapable`, `RelationalCapable`).
//!
//! The distributor and SAGA step executors depend only on these traits,
//! never on a concrete adapter type — new store kinds plug in by
//! implementing [`StoreAdapter`] and whichever capability traits apply.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::target::StoreKind;

/// A heterogeneous field map, as stored by or read from an adapter.
pub type Record = HashMap<String, Value>;

/// Result of a health check: whether the store answered, and how long it
/// took.
#[derive(Debug, Clone, Copy)]
pub struct HealthStatus {
    /// Whether the store is currently reachable and authenticated.
    pub healthy: bool,
    /// Round-trip latency of the check.
    pub latency: Duration,
}

/// A single record to write, addressed by an optional caller-supplied id
/// (adapters that assign their own ids ignore it) and a store-native
/// location (table/collection/index).
#[derive(Debug, Clone)]
pub struct WriteRecord {
    /// Caller-supplied id, if the caller wants to control it.
    pub id: Option<String>,
    /// Store-native location to write into.
    pub location: String,
    /// The record's fields.
    pub fields: Record,
    /// For document stores: the parent revision the caller last observed,
    /// used for conflict detection. Ignored by adapters that don't support
    /// revisions.
    pub parent_revision: Option<String>,
}

impl WriteRecord {
    /// Construct a write with no caller-supplied id and no revision check.
    pub fn new(location: impl Into<String>, fields: Record) -> Self {
        Self {
            id: None,
            location: location.into(),
            fields,
            parent_revision: None,
        }
    }

    /// Set a caller-supplied id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// The outcome of a successful write: the id the store assigned (or
/// confirmed) plus an optional store-native revision/version token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOutcome {
    /// The record's id in the target store.
    pub id: String,
    /// Store-native revision or version token, if the store has one.
    pub revision: Option<String>,
}

/// The contract every store adapter implements, independent of which
/// concrete store backs it.
///
/// `not_found` is not an error: `read_one` returns `Ok(None)` for an absent
/// record. Every write is timestamped by the adapter's own wall clock —
/// implementations must not trust a caller-supplied timestamp for
/// ordering.
#[async_trait]
pub trait StoreAdapter: Send + Sync {
    /// Which store kind this adapter mediates.
    fn store_kind(&self) -> StoreKind;

    /// Establish the adapter's connection/session.
    async fn connect(&self) -> Result<HealthStatus>;

    /// Release the adapter's connection/session.
    async fn disconnect(&self) -> Result<()>;

    /// Check whether the store is currently reachable.
    async fn health_check(&self) -> Result<HealthStatus>;

    /// Write a single record. Returns `Err(Error::Conflict { .. })` per the
    /// adapter's duplicate-id policy (see module docs on each adapter
    /// crate).
    async fn write_one(&self, record: WriteRecord) -> Result<WriteOutcome>;

    /// Write many records as a store-native batch. Returns one outcome per
    /// input, in input order. An adapter must not abort the whole batch on
    /// one item's `bad_request` when the backing store supports partial
    /// acceptance; adapters that can only do all-or-nothing batches fall
    /// back to per-item calls.
    async fn write_batch(&self, records: Vec<WriteRecord>) -> Result<Vec<Result<WriteOutcome>>>;

    /// Read a single record by id. `Ok(None)` means absent, not an error.
    async fn read_one(&self, location: &str, id: &str) -> Result<Option<Record>>;

    /// Read many records by id. Absent ids are simply omitted from the
    /// returned map.
    async fn read_batch(&self, location: &str, ids: &[String]) -> Result<HashMap<String, Record>>;

    /// Check existence of many ids without fetching their bodies.
    async fn exists_batch(&self, location: &str, ids: &[String]) -> Result<HashMap<String, bool>>;

    /// Delete a record by id. Returns whether a record was actually
    /// removed.
    async fn delete(&self, location: &str, id: &str) -> Result<bool>;

    /// Execute a store-native query expression, returning matching records.
    async fn query_native(&self, query: &str) -> Result<Vec<Record>>;
}

/// A vector returned by a nearest-neighbor search, sorted ascending by
/// distance by the adapter.
#[derive(Debug, Clone)]
pub struct NeighborMatch {
    /// The matched record's id.
    pub id: String,
    /// The matched record's stored metadata.
    pub metadata: Record,
    /// Distance to the query vector (lower is closer).
    pub distance: f32,
}

/// Capability implemented only by the vector store adapter.
#[async_trait]
pub trait VectorCapable: StoreAdapter {
    /// Create the named collection if it doesn't already exist. Must be
    /// idempotent.
    async fn ensure_collection(&self, collection: &str, dimension: usize) -> Result<()>;

    /// Generate an embedding for raw text, for callers that don't supply
    /// one themselves.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Nearest-neighbor search, sorted ascending by distance.
    async fn nearest_neighbors(
        &self,
        collection: &str,
        vector: &[f32],
        top_k: usize,
        filter: Option<&Record>,
    ) -> Result<Vec<NeighborMatch>>;
}

/// Capability implemented only by the graph store adapter.
#[async_trait]
pub trait GraphCapable: StoreAdapter {
    /// Create a node with the given label and properties, returning its id.
    async fn create_node(&self, label: &str, properties: Record) -> Result<String>;

    /// Create an edge between two existing nodes, returning the edge id.
    async fn create_edge(
        &self,
        from_id: &str,
        to_id: &str,
        edge_type: &str,
        properties: Record,
    ) -> Result<String>;

    /// Update an edge's weight, preserving prior weights in its history.
    async fn update_edge_weight(&self, edge_id: &str, weight: f64) -> Result<()>;

    /// Flag an edge inactive without removing it.
    async fn soft_delete_edge(&self, edge_id: &str) -> Result<()>;

    /// Clear the inactive flag set by `soft_delete_edge`.
    async fn restore_edge(&self, edge_id: &str) -> Result<()>;

    /// Run a store-native traversal query starting at `start_id`.
    async fn traverse(&self, start_id: &str, query: &str) -> Result<Vec<Record>>;
}

/// Capability implemented only by the document store adapter.
#[async_trait]
pub trait DocumentCapable: StoreAdapter {
    /// Read a record along with its current revision token.
    async fn read_with_revision(
        &self,
        location: &str,
        id: &str,
    ) -> Result<Option<(Record, String)>>;
}

/// Capability implemented only by the relational store adapter.
#[async_trait]
pub trait RelationalCapable: StoreAdapter {
    /// Batch read by primary key using a native `IN (...)` clause.
    async fn read_in(&self, table: &str, ids: &[String]) -> Result<HashMap<String, Record>>;

    /// Run an arbitrary parameterized query.
    async fn query_parameterized(&self, sql: &str, params: &[Value]) -> Result<Vec<Record>>;
}
