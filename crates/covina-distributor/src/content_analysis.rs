//! Determines which content categories a processor result contributes to,
//! by matching on the payload variant instead of probing an untyped map.

use covina_core::{ContentCategory, ProcessorPayload};

/// The categories `payload` should be distributed to, in the order they
/// should be planned. `MasterRegistry`, `ProcessorResults`, and
/// `EventStore` are always present: every result gets a registry row, an
/// audit row, and an event-log entry regardless of its kind.
#[must_use]
pub fn categories_for(payload: &ProcessorPayload) -> Vec<ContentCategory> {
    let mut categories = vec![ContentCategory::MasterRegistry, ContentCategory::ProcessorResults];

    match payload {
        ProcessorPayload::Text(p) => {
            categories.push(ContentCategory::DocumentContent);
            if p.embedding.is_some() {
                categories.push(ContentCategory::VectorEmbeddings);
            }
            if !p.relations.is_empty() {
                categories.push(ContentCategory::Relationships);
            }
        }
        ProcessorPayload::Image(p) => {
            categories.push(ContentCategory::DocumentContent);
            categories.push(ContentCategory::MetadataEnrichment);
            if p.embedding.is_some() {
                categories.push(ContentCategory::VectorEmbeddings);
            }
        }
        ProcessorPayload::Geospatial(_) => {
            categories.push(ContentCategory::GeospatialData);
            categories.push(ContentCategory::Relationships);
        }
        ProcessorPayload::AudioVideo(p) => {
            categories.push(ContentCategory::DocumentContent);
            if p.embedding.is_some() {
                categories.push(ContentCategory::VectorEmbeddings);
            }
        }
        ProcessorPayload::OfficeDoc(p) => {
            categories.push(ContentCategory::DocumentContent);
            if !p.relations.is_empty() {
                categories.push(ContentCategory::Relationships);
            }
            if !p.structured_extract.is_empty() {
                categories.push(ContentCategory::MetadataEnrichment);
            }
        }
        ProcessorPayload::Email(p) => {
            categories.push(ContentCategory::DocumentContent);
            if !p.relations.is_empty() {
                categories.push(ContentCategory::Relationships);
            }
            if !p.headers.is_empty() {
                categories.push(ContentCategory::MetadataEnrichment);
            }
        }
        ProcessorPayload::Pdf(p) => {
            categories.push(ContentCategory::DocumentContent);
            if p.embedding.is_some() {
                categories.push(ContentCategory::VectorEmbeddings);
            }
            if !p.relations.is_empty() {
                categories.push(ContentCategory::Relationships);
            }
        }
        ProcessorPayload::Web(p) => {
            categories.push(ContentCategory::DocumentContent);
            if p.embedding.is_some() {
                categories.push(ContentCategory::VectorEmbeddings);
            }
        }
        ProcessorPayload::Archive(_) => {
            categories.push(ContentCategory::MetadataEnrichment);
        }
        ProcessorPayload::Generic(_) => {}
    }

    categories.push(ContentCategory::EventStore);
    categories.dedup();
    categories
}

#[cfg(test)]
mod tests {
    use super::*;
    use covina_core::{CommonFields, GeospatialPayload, TextPayload};

    #[test]
    fn plain_text_without_embedding_skips_vector_category() {
        let payload = ProcessorPayload::Text(TextPayload {
            text_content: "hello".into(),
            embedding: None,
            relations: vec![],
            common: CommonFields::default(),
        });
        let categories = categories_for(&payload);
        assert!(categories.contains(&ContentCategory::DocumentContent));
        assert!(!categories.contains(&ContentCategory::VectorEmbeddings));
    }

    #[test]
    fn text_with_embedding_adds_vector_category() {
        let payload = ProcessorPayload::Text(TextPayload {
            text_content: "hello".into(),
            embedding: Some(vec![0.1, 0.2]),
            relations: vec![],
            common: CommonFields::default(),
        });
        let categories = categories_for(&payload);
        assert!(categories.contains(&ContentCategory::VectorEmbeddings));
    }

    #[test]
    fn geospatial_always_adds_relationships_and_spatial() {
        let payload = ProcessorPayload::Geospatial(GeospatialPayload {
            coordinates: None,
            coordinate_system: "WGS84".into(),
            relations: vec![],
            common: CommonFields::default(),
        });
        let categories = categories_for(&payload);
        assert!(categories.contains(&ContentCategory::GeospatialData));
        assert!(categories.contains(&ContentCategory::Relationships));
    }

    #[test]
    fn every_payload_kind_gets_registry_results_and_event_store() {
        let payload = ProcessorPayload::Generic(covina_core::GenericPayload::default());
        let categories = categories_for(&payload);
        assert!(categories.contains(&ContentCategory::MasterRegistry));
        assert!(categories.contains(&ContentCategory::ProcessorResults));
        assert!(categories.contains(&ContentCategory::EventStore));
    }
}
