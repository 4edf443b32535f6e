//! Wires one [`Accumulator`] per op-kind (write, read, exists) to a single
//! adapter, exposing the `submit_write`/`submit_read`/`submit_exists`/
//! `flush`/`stop` contract.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use covina_core::{Record, Result, StoreAdapter, WriteOutcome, WriteRecord};

use crate::accumulator::{Accumulator, RetryConfig};
use crate::adaptive::SizingConfig;

/// Per-op-kind sizing plus the shared retry/coalescing knobs for one
/// adapter's batch engine.
#[derive(Debug, Clone)]
pub struct BatchEngineConfig {
    /// Sizing for `write_batch` dispatches.
    pub write: SizingConfig,
    /// Sizing for `read_batch` dispatches.
    pub read: SizingConfig,
    /// Sizing for `exists_batch` dispatches.
    pub exists: SizingConfig,
    /// Retry policy shared by all three accumulators.
    pub retry: RetryConfig,
    /// Maximum time an item waits before its accumulator dispatches.
    pub coalesce_delay: Duration,
}

impl Default for BatchEngineConfig {
    fn default() -> Self {
        Self {
            write: SizingConfig::default(),
            read: SizingConfig::default(),
            exists: SizingConfig::default(),
            retry: RetryConfig::default(),
            coalesce_delay: Duration::from_millis(5),
        }
    }
}

/// Coalesces single-item reads, writes, and existence checks against one
/// adapter into store-native batch calls.
pub struct BatchEngine<A: StoreAdapter + 'static> {
    adapter: Arc<A>,
    write: Accumulator<WriteRecord, WriteOutcome>,
    read: Accumulator<(String, String), Option<Record>>,
    exists: Accumulator<(String, String), bool>,
}

impl<A: StoreAdapter + 'static> BatchEngine<A> {
    /// Build a batch engine in front of `adapter`. `label` identifies this
    /// engine's accumulators in logs.
    pub fn new(adapter: Arc<A>, label: impl Into<String>, config: BatchEngineConfig) -> Self {
        let label = label.into();

        let write_adapter = adapter.clone();
        let write = Accumulator::spawn(
            format!("{label}.write"),
            config.write,
            config.retry.clone(),
            config.coalesce_delay,
            Arc::new(move |records: Vec<WriteRecord>| {
                let adapter = write_adapter.clone();
                Box::pin(async move { adapter.write_batch(records).await })
            }),
        );

        let read_adapter = adapter.clone();
        let read = Accumulator::spawn(
            format!("{label}.read"),
            config.read,
            config.retry.clone(),
            config.coalesce_delay,
            Arc::new(move |keys: Vec<(String, String)>| {
                let adapter = read_adapter.clone();
                Box::pin(async move { dispatch_reads(adapter.as_ref(), keys).await })
            }),
        );

        let exists_adapter = adapter.clone();
        let exists = Accumulator::spawn(
            format!("{label}.exists"),
            config.exists,
            config.retry,
            config.coalesce_delay,
            Arc::new(move |keys: Vec<(String, String)>| {
                let adapter = exists_adapter.clone();
                Box::pin(async move { dispatch_exists(adapter.as_ref(), keys).await })
            }),
        );

        Self {
            adapter,
            write,
            read,
            exists,
        }
    }

    /// Submit a single write; resolves once its accumulator dispatches.
    pub async fn submit_write(&self, record: WriteRecord) -> Result<WriteOutcome> {
        self.write.submit(record).await
    }

    /// Submit a single read by `(location, id)`. `Ok(None)` means absent.
    pub async fn submit_read(
        &self,
        location: impl Into<String>,
        id: impl Into<String>,
    ) -> Result<Option<Record>> {
        self.read.submit((location.into(), id.into())).await
    }

    /// Submit a single existence check by `(location, id)`.
    pub async fn submit_exists(
        &self,
        location: impl Into<String>,
        id: impl Into<String>,
    ) -> Result<bool> {
        self.exists.submit((location.into(), id.into())).await
    }

    /// Force dispatch of every non-empty accumulator.
    pub async fn flush(&self) {
        self.write.flush().await;
        self.read.flush().await;
        self.exists.flush().await;
    }

    /// Flush, then reject further submissions with `Error::Cancelled`.
    pub async fn stop(&self) {
        self.write.stop().await;
        self.read.stop().await;
        self.exists.stop().await;
    }

    /// The adapter this engine batches calls against.
    #[must_use]
    pub fn adapter(&self) -> &Arc<A> {
        &self.adapter
    }
}

async fn dispatch_reads<A: StoreAdapter + ?Sized>(
    adapter: &A,
    keys: Vec<(String, String)>,
) -> Result<Vec<Result<Option<Record>>>> {
    let mut by_location: HashMap<String, Vec<String>> = HashMap::new();
    for (location, id) in &keys {
        by_location.entry(location.clone()).or_default().push(id.clone());
    }

    let mut found: HashMap<(String, String), Record> = HashMap::new();
    for (location, ids) in by_location {
        let batch = adapter.read_batch(&location, &ids).await?;
        for (id, record) in batch {
            found.insert((location.clone(), id), record);
        }
    }

    Ok(keys
        .into_iter()
        .map(|key| Ok(found.get(&key).cloned()))
        .collect())
}

async fn dispatch_exists<A: StoreAdapter + ?Sized>(
    adapter: &A,
    keys: Vec<(String, String)>,
) -> Result<Vec<Result<bool>>> {
    let mut by_location: HashMap<String, Vec<String>> = HashMap::new();
    for (location, id) in &keys {
        by_location.entry(location.clone()).or_default().push(id.clone());
    }

    let mut found: HashMap<(String, String), bool> = HashMap::new();
    for (location, ids) in by_location {
        let batch = adapter.exists_batch(&location, &ids).await?;
        for (id, exists) in batch {
            found.insert((location.clone(), id), exists);
        }
    }

    Ok(keys
        .into_iter()
        .map(|key| Ok(found.get(&key).copied().unwrap_or(false)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use covina_test_support::FakeAdapter;
    use covina_core::StoreKind;

    #[tokio::test]
    async fn write_then_read_round_trips_through_batching() {
        let adapter = Arc::new(FakeAdapter::new(StoreKind::Relational));
        let engine = BatchEngine::new(adapter, "relational", BatchEngineConfig::default());

        let mut fields = Record::new();
        fields.insert("name".into(), serde_json::json!("alice"));
        let outcome = engine
            .submit_write(WriteRecord::new("users", fields).with_id("u1"))
            .await
            .unwrap();
        assert_eq!(outcome.id, "u1");

        let read = engine.submit_read("users", "u1").await.unwrap();
        assert!(read.is_some());

        let exists = engine.submit_exists("users", "u1").await.unwrap();
        assert!(exists);

        let missing = engine.submit_exists("users", "ghost").await.unwrap();
        assert!(!missing);

        engine.stop().await;
    }

    #[tokio::test]
    async fn concurrent_writes_coalesce_into_one_batch() {
        let adapter = Arc::new(FakeAdapter::new(StoreKind::Document));
        let mut config = BatchEngineConfig::default();
        config.write.initial_size = 8;
        config.coalesce_delay = Duration::from_secs(5);
        let engine = Arc::new(BatchEngine::new(adapter, "document", config));

        let mut futs = Vec::new();
        for i in 0..8 {
            let engine = engine.clone();
            futs.push(tokio::spawn(async move {
                engine
                    .submit_write(WriteRecord::new("docs", Record::new()).with_id(format!("d{i}")))
                    .await
            }));
        }
        for fut in futs {
            fut.await.unwrap().unwrap();
        }
        engine.stop().await;
    }
}
