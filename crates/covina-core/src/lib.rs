//! Shared data model, error taxonomy, and capability traits for the
//! polyglot persistence coordinator.
//!
//! Every other `covina-*` crate depends on this one and nothing else in
//! the workspace; it carries no I/O of its own.

pub mod adapter;
pub mod error;
pub mod payload;
pub mod target;

pub use adapter::{
    DocumentCapable, GraphCapable, HealthStatus, NeighborMatch, Record, RelationalCapable,
    StoreAdapter, VectorCapable, WriteOutcome, WriteRecord,
};
pub use error::{Error, Result};
pub use payload::{
    ArchivePayload, AudioVideoPayload, CommonFields, DetectedRelation, EmailPayload,
    GenericPayload, GeoCoordinates, GeospatialPayload, ImagePayload, OfficeDocPayload,
    PdfPayload, ProcessorError, ProcessorKind, ProcessorPayload, ProcessorResult, TextPayload,
    WebPayload,
};
pub use target::{
    ContentCategory, DistributionPlan, DistributionPriority, DistributionTarget, StoreKind,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_kind_all_has_four_members() {
        assert_eq!(StoreKind::ALL.len(), 4);
    }

    #[test]
    fn critical_outranks_low() {
        assert!(DistributionPriority::Critical > DistributionPriority::Low);
    }

    #[test]
    fn only_transient_transport_is_retryable() {
        assert!(Error::TransientTransport {
            reason: "x".into()
        }
        .is_retryable());
        assert!(!Error::BadRequest {
            reason: "x".into()
        }
        .is_retryable());
    }

    #[test]
    fn processor_result_clamps_confidence() {
        let result = ProcessorResult::new(
            "proc-1",
            "doc-1",
            ProcessorPayload::Generic(GenericPayload::default()),
            1.5,
            std::time::Duration::from_millis(10),
        );
        assert_eq!(result.confidence, 1.0);
    }

    #[test]
    fn distribution_plan_tracks_critical_targets() {
        let mut plan = DistributionPlan::new();
        assert!(plan.is_empty());
        plan.insert(
            ContentCategory::MasterRegistry,
            vec![DistributionTarget {
                store_kind: StoreKind::Relational,
                location: "documents".into(),
                priority: DistributionPriority::Critical,
                content_category: ContentCategory::MasterRegistry,
                processor_affinity: 1.0,
                fallback: vec![StoreKind::Document],
            }],
        );
        assert!(plan.has_any_critical_target());
    }

    #[test]
    fn fallback_target_discounts_affinity() {
        let primary = DistributionTarget {
            store_kind: StoreKind::Vector,
            location: "embeddings".into(),
            priority: DistributionPriority::High,
            content_category: ContentCategory::VectorEmbeddings,
            processor_affinity: 1.0,
            fallback: vec![StoreKind::Document],
        };
        let fallback = primary.as_fallback(StoreKind::Document);
        assert_eq!(fallback.store_kind, StoreKind::Document);
        assert!((fallback.processor_affinity - 0.7).abs() < f64::EPSILON);
        assert_eq!(fallback.location, "fallback_embeddings");
    }
}
