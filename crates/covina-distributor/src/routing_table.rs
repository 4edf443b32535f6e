//! The authoritative content-category routing table. This is the sole
//! source of truth for which store(s) a category prefers and what it falls
//! back to — the distributor never hard-codes a processor-kind conditional
//! that duplicates it.

use std::collections::HashMap;
use std::sync::OnceLock;

use covina_core::{ContentCategory, DistributionPriority, DistributionTarget, StoreKind};

fn target(
    store_kind: StoreKind,
    location: &str,
    priority: DistributionPriority,
    category: ContentCategory,
    affinity: f64,
    fallback: Vec<StoreKind>,
) -> DistributionTarget {
    DistributionTarget {
        store_kind,
        location: location.to_string(),
        priority,
        content_category: category,
        processor_affinity: affinity,
        fallback,
    }
}

fn build() -> HashMap<ContentCategory, Vec<DistributionTarget>> {
    use ContentCategory::{
        DocumentContent, EventStore, GeospatialData, MasterRegistry, MetadataEnrichment,
        ProcessorResults, Relationships, VectorEmbeddings,
    };
    use DistributionPriority::{Critical, High, Medium};
    use StoreKind::{Document, Graph, Relational, Vector};

    let mut table = HashMap::new();

    table.insert(
        MasterRegistry,
        vec![target(
            Relational,
            "master_documents",
            Critical,
            MasterRegistry,
            1.0,
            vec![Document],
        )],
    );

    table.insert(
        ProcessorResults,
        vec![target(
            Relational,
            "processor_results",
            Critical,
            ProcessorResults,
            1.0,
            vec![Document],
        )],
    );

    table.insert(
        DocumentContent,
        vec![
            target(
                Document,
                "processed_documents",
                High,
                DocumentContent,
                1.0,
                vec![Relational],
            ),
            target(
                Relational,
                "document_content",
                Medium,
                DocumentContent,
                0.7,
                vec![],
            ),
        ],
    );

    table.insert(
        VectorEmbeddings,
        vec![
            target(
                Vector,
                "document_embeddings",
                High,
                VectorEmbeddings,
                1.0,
                vec![Relational],
            ),
            target(
                Relational,
                "vector_embeddings",
                Medium,
                VectorEmbeddings,
                0.6,
                vec![],
            ),
        ],
    );

    table.insert(
        Relationships,
        vec![
            target(Graph, "Document", High, Relationships, 1.0, vec![Relational]),
            target(
                Relational,
                "cross_references",
                High,
                Relationships,
                0.8,
                vec![],
            ),
        ],
    );

    table.insert(
        GeospatialData,
        vec![
            target(
                Graph,
                "SpatialDocument",
                High,
                GeospatialData,
                0.9,
                vec![Relational],
            ),
            target(
                Relational,
                "spatial_data",
                High,
                GeospatialData,
                0.9,
                vec![],
            ),
        ],
    );

    table.insert(
        MetadataEnrichment,
        vec![
            target(
                Document,
                "metadata_enrichment",
                Medium,
                MetadataEnrichment,
                0.9,
                vec![Relational],
            ),
            target(
                Relational,
                "enrichment_data",
                Medium,
                MetadataEnrichment,
                0.7,
                vec![],
            ),
        ],
    );

    table.insert(
        EventStore,
        vec![
            target(Document, "document_events", High, EventStore, 1.0, vec![Relational]),
            target(Relational, "event_log", Medium, EventStore, 0.6, vec![]),
        ],
    );

    table
}

/// The static routing table, built once and shared for the process lifetime.
pub fn routing_table() -> &'static HashMap<ContentCategory, Vec<DistributionTarget>> {
    static TABLE: OnceLock<HashMap<ContentCategory, Vec<DistributionTarget>>> = OnceLock::new();
    TABLE.get_or_init(build)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_category_has_at_least_one_target() {
        let table = routing_table();
        for category in [
            ContentCategory::MasterRegistry,
            ContentCategory::ProcessorResults,
            ContentCategory::DocumentContent,
            ContentCategory::VectorEmbeddings,
            ContentCategory::Relationships,
            ContentCategory::GeospatialData,
            ContentCategory::MetadataEnrichment,
            ContentCategory::EventStore,
        ] {
            assert!(!table.get(&category).unwrap().is_empty());
        }
    }

    #[test]
    fn master_registry_and_processor_results_are_critical() {
        let table = routing_table();
        assert_eq!(
            table[&ContentCategory::MasterRegistry][0].priority,
            DistributionPriority::Critical
        );
        assert_eq!(
            table[&ContentCategory::ProcessorResults][0].priority,
            DistributionPriority::Critical
        );
    }

    #[test]
    fn every_critical_target_has_a_non_empty_fallback_chain() {
        let table = routing_table();
        for targets in table.values() {
            for target in targets {
                if target.priority == DistributionPriority::Critical {
                    assert!(
                        !target.fallback.is_empty(),
                        "{:?} is critical but has no fallback chain",
                        target.content_category
                    );
                }
            }
        }
    }
}
