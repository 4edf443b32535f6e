//! Distribution targets, priorities, and the content categories a
//! [`crate::payload::ProcessorResult`] is split into.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The four backing store kinds the coordinator mediates between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StoreKind {
    /// The relational store (SQL).
    Relational,
    /// The document store (revisioned, schema-flexible).
    Document,
    /// The vector store (similarity search).
    Vector,
    /// The graph store (nodes, edges, traversal).
    Graph,
}

impl StoreKind {
    /// All four store kinds, in a fixed, stable order.
    pub const ALL: [StoreKind; 4] = [
        StoreKind::Relational,
        StoreKind::Document,
        StoreKind::Vector,
        StoreKind::Graph,
    ];
}

/// Relative urgency of a distribution target. At least one `Critical` target
/// per write must succeed for the write to be considered a success.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DistributionPriority {
    /// Optional storage; failing is not reported as an error.
    Low,
    /// Should be stored; failure is reported but does not fail the write.
    Medium,
    /// Should be stored; contributes to `success` but a miss is non-fatal.
    High,
    /// Must be stored: at least one critical target per write must succeed.
    Critical,
}

/// The content categories a processor result may contribute to. See the
/// routing table in `covina-distributor` for which stores each one targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContentCategory {
    /// The canonical cross-reference row for a document.
    MasterRegistry,
    /// The raw processor result, for audit/replay.
    ProcessorResults,
    /// Extracted text / structured content.
    DocumentContent,
    /// Dense vector embeddings.
    VectorEmbeddings,
    /// Relation instances detected in the content.
    Relationships,
    /// Geospatial coordinates and spatial metadata.
    GeospatialData,
    /// Enrichment metadata that doesn't belong in the master registry.
    MetadataEnrichment,
    /// Append-only event log entries.
    EventStore,
}

/// A `(store-kind, storage-location, priority, content-category)` tuple
/// with optional fallback store kinds and a processor-affinity weight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributionTarget {
    /// Which store kind this target writes to.
    pub store_kind: StoreKind,
    /// Store-native location (table, collection, or index name).
    pub location: String,
    /// Execution/read-authority priority.
    pub priority: DistributionPriority,
    /// Which content category this target serves.
    pub content_category: ContentCategory,
    /// How well-suited this processor's output is for this target, in
    /// `[0, 1]`. Used to order targets of equal priority.
    pub processor_affinity: f64,
    /// Store kinds to try, in order, if `store_kind` is unreachable.
    pub fallback: Vec<StoreKind>,
}

impl DistributionTarget {
    /// Build a fallback target with the discounted affinity the original
    /// distributor applied (`affinity * 0.7`) when a fallback store is used
    /// in place of the primary one.
    #[must_use]
    pub fn as_fallback(&self, fallback_store: StoreKind) -> DistributionTarget {
        DistributionTarget {
            store_kind: fallback_store,
            location: format!("fallback_{}", self.location),
            priority: self.priority,
            content_category: self.content_category,
            processor_affinity: self.processor_affinity * 0.7,
            fallback: Vec::new(),
        }
    }
}

/// A mapping from content category to an ordered list of distribution
/// targets, produced by the distributor and consumed by the SAGA
/// orchestrator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DistributionPlan {
    categories: HashMap<ContentCategory, Vec<DistributionTarget>>,
}

impl DistributionPlan {
    /// An empty plan.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert the (already-ordered) target list for a category.
    pub fn insert(&mut self, category: ContentCategory, targets: Vec<DistributionTarget>) {
        self.categories.insert(category, targets);
    }

    /// Targets planned for a category, if any.
    #[must_use]
    pub fn targets(&self, category: ContentCategory) -> Option<&[DistributionTarget]> {
        self.categories.get(&category).map(Vec::as_slice)
    }

    /// All categories covered by this plan.
    pub fn categories(&self) -> impl Iterator<Item = ContentCategory> + '_ {
        self.categories.keys().copied()
    }

    /// All `(category, targets)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&ContentCategory, &Vec<DistributionTarget>)> {
        self.categories.iter()
    }

    /// True if no category in this plan carries a target with
    /// [`DistributionPriority::Critical`].
    #[must_use]
    pub fn has_any_critical_target(&self) -> bool {
        self.categories
            .values()
            .any(|targets| targets.iter().any(|t| t.priority == DistributionPriority::Critical))
    }

    /// Whether the plan has no categories at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}
