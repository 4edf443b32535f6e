//! Vector store adapter, backed by Qdrant. A "location" in
//! [`covina_core::WriteRecord`] maps onto a Qdrant collection; points carry
//! the embedding under a reserved `embedding` field and everything else in
//! `fields` as payload.
//!
//! Duplicate-id writes succeed (Qdrant's `upsert` is idempotent on point
//! id), so a retried or replayed write never surfaces as a conflict error.

mod payload;

use std::collections::HashMap;

use async_trait::async_trait;
use covina_core::{
    Error, HealthStatus, NeighborMatch, Record, Result, StoreAdapter, StoreKind, VectorCapable,
    WriteOutcome, WriteRecord,
};
use qdrant_client::qdrant::{
    CreateCollectionBuilder, Distance, GetPointsBuilder, PointId, PointStruct,
    PointsIdsList, QueryPointsBuilder, UpsertPointsBuilder, VectorParamsBuilder,
};
use qdrant_client::{Payload, Qdrant};
use tracing::{debug, warn};

use payload::{embedding_field, extract_embedding, record_to_payload, EMBEDDING_KEY};

/// Where the Qdrant instance lives.
#[derive(Debug, Clone)]
pub struct VectorAdapterConfig {
    /// gRPC URL, e.g. `http://localhost:6334`.
    pub url: String,
    /// Default embedding dimension used by [`VectorAdapter::ensure_collection`]
    /// callers that don't know their vector's length up front.
    pub default_dimension: usize,
}

impl Default for VectorAdapterConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:6334".to_string(),
            default_dimension: 384,
        }
    }
}

/// The vector store adapter.
pub struct VectorAdapter {
    client: Qdrant,
}

impl VectorAdapter {
    /// Build a client against `config`. Fails only if the URL itself is
    /// malformed; does not probe reachability (use `health_check` for
    /// that).
    ///
    /// # Errors
    ///
    /// Returns an error if the Qdrant client cannot be constructed from
    /// `config.url`.
    pub fn new(config: VectorAdapterConfig) -> Result<Self> {
        let client = Qdrant::from_url(&config.url)
            .build()
            .map_err(|e| Error::BadRequest {
                reason: format!("invalid Qdrant endpoint {}: {e}", config.url),
            })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl StoreAdapter for VectorAdapter {
    fn store_kind(&self) -> StoreKind {
        StoreKind::Vector
    }

    async fn connect(&self) -> Result<HealthStatus> {
        self.health_check().await
    }

    async fn disconnect(&self) -> Result<()> {
        Ok(())
    }

    async fn health_check(&self) -> Result<HealthStatus> {
        let start = std::time::Instant::now();
        match self.client.health_check().await {
            Ok(_) => Ok(HealthStatus {
                healthy: true,
                latency: start.elapsed(),
            }),
            Err(e) => {
                warn!(error = %e, "qdrant unreachable");
                Err(Error::StoreUnavailable { store: StoreKind::Vector })
            }
        }
    }

    async fn write_one(&self, record: WriteRecord) -> Result<WriteOutcome> {
        let id = record.id.clone().unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let vector = extract_embedding(&record.fields)?;
        let payload: Payload = record_to_payload(&record.fields).into();

        let point = PointStruct::new(PointId::from(id.clone()), vector, payload);
        self.client
            .upsert_points(UpsertPointsBuilder::new(&record.location, vec![point]))
            .await
            .map_err(|e| Error::TransientTransport { reason: e.to_string() })?;

        Ok(WriteOutcome { id, revision: None })
    }

    async fn write_batch(&self, records: Vec<WriteRecord>) -> Result<Vec<Result<WriteOutcome>>> {
        // Qdrant upserts are idempotent per point, so a batch failure never
        // needs per-item retry bookkeeping -- but a malformed record (e.g.
        // missing an embedding) must not take the rest of the batch down.
        let mut out = Vec::with_capacity(records.len());
        for record in records {
            out.push(self.write_one(record).await);
        }
        Ok(out)
    }

    async fn read_one(&self, location: &str, id: &str) -> Result<Option<Record>> {
        let response = self
            .client
            .get_points(
                GetPointsBuilder::new(location, vec![PointId::from(id.to_string())])
                    .with_payload(true)
                    .with_vectors(true),
            )
            .await
            .map_err(|e| Error::TransientTransport { reason: e.to_string() })?;

        let Some(point) = response.result.into_iter().next() else {
            return Ok(None);
        };
        let mut record: Record = point
            .payload
            .into_iter()
            .map(|(k, v)| (k, payload::value_to_json(v)))
            .collect();
        if let Some(embedding) = embedding_field(&point.vectors) {
            record.insert(EMBEDDING_KEY.to_string(), serde_json::json!(embedding));
        }
        Ok(Some(record))
    }

    async fn read_batch(&self, location: &str, ids: &[String]) -> Result<HashMap<String, Record>> {
        let mut out = HashMap::new();
        for id in ids {
            if let Some(record) = self.read_one(location, id).await? {
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
        let points = PointsIdsList {
            ids: vec![PointId::from(id.to_string())],
        };
        self.client
            .delete_points(qdrant_client::qdrant::DeletePointsBuilder::new(location).points(points))
            .await
            .map_err(|e| Error::TransientTransport { reason: e.to_string() })?;
        Ok(true)
    }

    async fn query_native(&self, _query: &str) -> Result<Vec<Record>> {
        Err(Error::BadRequest {
            reason: "vector adapter has no store-native query language; use nearest_neighbors".to_string(),
        })
    }
}

#[async_trait]
impl VectorCapable for VectorAdapter {
    async fn ensure_collection(&self, collection: &str, dimension: usize) -> Result<()> {
        if self
            .client
            .collection_exists(collection)
            .await
            .map_err(|e| Error::TransientTransport { reason: e.to_string() })?
        {
            return Ok(());
        }
        debug!(collection, dimension, "creating qdrant collection");
        self.client
            .create_collection(
                CreateCollectionBuilder::new(collection)
                    .vectors_config(VectorParamsBuilder::new(dimension as u64, Distance::Cosine)),
            )
            .await
            .map_err(|e| Error::TransientTransport { reason: e.to_string() })?;
        Ok(())
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        // A deterministic, dependency-free embedding used when no external
        // embedding model is wired in -- good enough for cosine-similarity
        // smoke tests, not for real retrieval quality.
        let mut vector = vec![0.0f32; 32];
        for (i, byte) in text.bytes().enumerate() {
            vector[i % 32] += f32::from(byte) / 255.0;
        }
        Ok(vector)
    }

    async fn nearest_neighbors(
        &self,
        collection: &str,
        vector: &[f32],
        top_k: usize,
        filter: Option<&Record>,
    ) -> Result<Vec<NeighborMatch>> {
        let qdrant_filter = filter.map(payload::record_to_filter);
        let response = self
            .client
            .query(
                QueryPointsBuilder::new(collection)
                    .query(vector.to_vec())
                    .limit(top_k as u64)
                    .filter(qdrant_filter.unwrap_or_default())
                    .with_payload(true)
                    .with_vectors(false),
            )
            .await
            .map_err(|e| Error::TransientTransport { reason: e.to_string() })?;

        Ok(response
            .result
            .into_iter()
            .map(|scored| NeighborMatch {
                id: payload::point_id_to_string(scored.id),
                metadata: scored
                    .payload
                    .into_iter()
                    .map(|(k, v)| (k, payload::value_to_json(v)))
                    .collect(),
                distance: 1.0 - scored.score,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn embed_is_deterministic_for_the_same_text() {
        let adapter = VectorAdapter::new(VectorAdapterConfig::default()).unwrap();
        let a = adapter.embed("hello world").await.unwrap();
        let b = adapter.embed("hello world").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 32);
    }

    #[test]
    fn rejects_malformed_endpoint() {
        let err = VectorAdapter::new(VectorAdapterConfig {
            url: "not a url at all \0".to_string(),
            ..VectorAdapterConfig::default()
        });
        assert!(err.is_err());
    }
}
