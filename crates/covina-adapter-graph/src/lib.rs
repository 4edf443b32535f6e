//! Graph store adapter, backed by Neo4j. Nodes are addressed by a
//! `location` (node label) plus an `id` property this adapter manages
//! itself, since Neo4j's internal node ids are not stable across a
//! database compaction. Edges carry their own `id` property plus an
//! `active` flag and a `weight_history` list, so
//! [`GraphCapable::soft_delete_edge`] and
//! [`GraphCapable::update_edge_weight`] never need to touch the node rows.

mod cypher;

use std::collections::HashMap;

use async_trait::async_trait;
use covina_core::{
    Error, GraphCapable, HealthStatus, Record, Result, StoreAdapter, StoreKind, WriteOutcome,
    WriteRecord,
};
use neo4rs::{Graph, Query};
use tracing::warn;

use cypher::{decode_fields, encode_fields, record_from_columns};

/// Where the Neo4j instance lives.
#[derive(Debug, Clone)]
pub struct GraphAdapterConfig {
    /// Bolt URI, e.g. `bolt://localhost:7687`.
    pub uri: String,
    /// Authentication username.
    pub user: String,
    /// Authentication password.
    pub password: String,
}

/// The graph store adapter.
pub struct GraphAdapter {
    graph: Graph,
}

impl GraphAdapter {
    /// Connect to Neo4j.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver cannot establish a session.
    pub async fn connect_to(config: GraphAdapterConfig) -> Result<Self> {
        let graph = Graph::new(&config.uri, &config.user, &config.password)
            .await
            .map_err(|e| Error::TransientTransport {
                reason: format!("failed to connect to Neo4j: {e}"),
            })?;
        Ok(Self { graph })
    }

    async fn run(&self, query: Query) -> Result<()> {
        self.graph
            .run(query)
            .await
            .map_err(|e| Error::TransientTransport { reason: e.to_string() })
    }

    async fn first_row(&self, query: Query) -> Result<Option<neo4rs::Row>> {
        let mut stream = self
            .graph
            .execute(query)
            .await
            .map_err(|e| Error::TransientTransport { reason: e.to_string() })?;
        stream
            .next()
            .await
            .map_err(|e| Error::TransientTransport { reason: e.to_string() })
    }
}

#[async_trait]
impl StoreAdapter for GraphAdapter {
    fn store_kind(&self) -> StoreKind {
        StoreKind::Graph
    }

    async fn connect(&self) -> Result<HealthStatus> {
        self.health_check().await
    }

    async fn disconnect(&self) -> Result<()> {
        Ok(())
    }

    async fn health_check(&self) -> Result<HealthStatus> {
        let start = std::time::Instant::now();
        match self.graph.execute(Query::new("RETURN 1".to_string())).await {
            Ok(_) => Ok(HealthStatus {
                healthy: true,
                latency: start.elapsed(),
            }),
            Err(e) => {
                warn!(error = %e, "neo4j unreachable");
                Err(Error::StoreUnavailable { store: StoreKind::Graph })
            }
        }
    }

    async fn write_one(&self, record: WriteRecord) -> Result<WriteOutcome> {
        // A record carrying string `source_id`/`target_id` fields is a
        // relation instance, not a bare entity: persist it as an edge
        // between those two nodes instead of a disconnected node, so
        // `GraphCapable::traverse` can actually reach it.
        let source_id = record.fields.get("source_id").and_then(|v| v.as_str()).map(str::to_string);
        let target_id = record.fields.get("target_id").and_then(|v| v.as_str()).map(str::to_string);
        if let (Some(source_id), Some(target_id)) = (source_id, target_id) {
            let edge_type = record
                .fields
                .get("relation_type")
                .and_then(|v| v.as_str())
                .unwrap_or(&record.location)
                .to_string();
            let id = self
                .create_edge(&source_id, &target_id, &edge_type, record.fields)
                .await?;
            return Ok(WriteOutcome { id, revision: None });
        }

        let id = self.create_node(&record.location, record.fields).await?;
        Ok(WriteOutcome { id, revision: None })
    }

    async fn write_batch(&self, records: Vec<WriteRecord>) -> Result<Vec<Result<WriteOutcome>>> {
        let mut out = Vec::with_capacity(records.len());
        for record in records {
            out.push(self.write_one(record).await);
        }
        Ok(out)
    }

    async fn read_one(&self, location: &str, id: &str) -> Result<Option<Record>> {
        let cypher = format!("MATCH (n:{location} {{id: $id}}) RETURN n.id AS id, n.fields AS fields");
        let row = self
            .first_row(Query::new(cypher).param("id", id.to_string()))
            .await?;
        Ok(row.and_then(|row| {
            let id: String = row.get("id").ok()?;
            let fields: String = row.get("fields").unwrap_or_default();
            Some(record_from_columns(&id, &fields))
        }))
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
        let cypher =
            format!("MATCH (n:{location} {{id: $id}}) DETACH DELETE n RETURN count(n) AS deleted");
        let row = self
            .first_row(Query::new(cypher).param("id", id.to_string()))
            .await?;
        Ok(row.and_then(|r| r.get::<i64>("deleted").ok()).unwrap_or(0) > 0)
    }

    async fn query_native(&self, query: &str) -> Result<Vec<Record>> {
        let mut stream = self
            .graph
            .execute(Query::new(query.to_string()))
            .await
            .map_err(|e| Error::TransientTransport { reason: e.to_string() })?;
        let mut rows = Vec::new();
        while let Some(row) = stream
            .next()
            .await
            .map_err(|e| Error::TransientTransport { reason: e.to_string() })?
        {
            if let (Ok(id), Ok(fields)) = (row.get::<String>("id"), row.get::<String>("fields")) {
                rows.push(record_from_columns(&id, &fields));
            }
        }
        Ok(rows)
    }
}

#[async_trait]
impl GraphCapable for GraphAdapter {
    async fn create_node(&self, label: &str, properties: Record) -> Result<String> {
        let id = uuid::Uuid::new_v4().to_string();
        let cypher = format!("CREATE (n:{label} {{id: $id, fields: $fields}}) RETURN n.id");
        self.run(
            Query::new(cypher)
                .param("id", id.clone())
                .param("fields", encode_fields(&properties)),
        )
        .await?;
        Ok(id)
    }

    async fn create_edge(
        &self,
        from_id: &str,
        to_id: &str,
        edge_type: &str,
        properties: Record,
    ) -> Result<String> {
        let id = uuid::Uuid::new_v4().to_string();
        let cypher = format!(
            "MATCH (a {{id: $from_id}}), (b {{id: $to_id}}) \
             CREATE (a)-[r:{edge_type} {{id: $id, active: true, weight_history: [], fields: $fields}}]->(b) \
             RETURN r.id"
        );
        self.run(
            Query::new(cypher)
                .param("from_id", from_id.to_string())
                .param("to_id", to_id.to_string())
                .param("id", id.clone())
                .param("fields", encode_fields(&properties)),
        )
        .await?;
        Ok(id)
    }

    async fn update_edge_weight(&self, edge_id: &str, weight: f64) -> Result<()> {
        let cypher = "MATCH ()-[r {id: $id}]->() \
                       SET r.weight_history = coalesce(r.weight_history, []) + [coalesce(r.weight, 0.0)], \
                           r.weight = $weight \
                       RETURN r.id";
        self.run(
            Query::new(cypher.to_string())
                .param("id", edge_id.to_string())
                .param("weight", weight),
        )
        .await
    }

    async fn soft_delete_edge(&self, edge_id: &str) -> Result<()> {
        let cypher = "MATCH ()-[r {id: $id}]->() SET r.active = false RETURN r.id";
        self.run(Query::new(cypher.to_string()).param("id", edge_id.to_string())).await
    }

    async fn restore_edge(&self, edge_id: &str) -> Result<()> {
        let cypher = "MATCH ()-[r {id: $id}]->() SET r.active = true RETURN r.id";
        self.run(Query::new(cypher.to_string()).param("id", edge_id.to_string())).await
    }

    async fn traverse(&self, start_id: &str, query: &str) -> Result<Vec<Record>> {
        let cypher = if query.trim().is_empty() {
            "MATCH (a {id: $start_id})-[r {active: true}]->(b) \
             RETURN b.id AS id, b.fields AS fields, type(r) AS edge_type, r.id AS edge_id"
                .to_string()
        } else {
            query.to_string()
        };
        let mut stream = self
            .graph
            .execute(Query::new(cypher).param("start_id", start_id.to_string()))
            .await
            .map_err(|e| Error::TransientTransport { reason: e.to_string() })?;

        let mut out = Vec::new();
        while let Some(row) = stream
            .next()
            .await
            .map_err(|e| Error::TransientTransport { reason: e.to_string() })?
        {
            let Ok(id) = row.get::<String>("id") else { continue };
            let fields: String = row.get("fields").unwrap_or_default();
            let mut record = record_from_columns(&id, &fields);
            if let Ok(edge_type) = row.get::<String>("edge_type") {
                record.insert("edge_type".to_string(), serde_json::json!(edge_type));
            }
            if let Ok(edge_id) = row.get::<String>("edge_id") {
                record.insert("edge_id".to_string(), serde_json::json!(edge_id));
            }
            out.push(record);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_fields_survives_an_empty_blob() {
        assert!(decode_fields("").is_empty());
    }
}
