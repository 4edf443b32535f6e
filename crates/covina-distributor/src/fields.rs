//! Builds the per-category field map a SAGA step writes, keeping the
//! persisted row shape store-agnostic.

use covina_core::{ContentCategory, ProcessorPayload, ProcessorResult, Record};
use covina_saga::{DOC_ID_KEY, LOCATION_KEY};

/// Build the `Record` a step targeting `category` should write for `result`,
/// addressed at `location`. The reserved `__location`/`__doc_id` keys are
/// stripped by [`covina_saga::AdapterExecutor`] before the adapter sees the
/// record.
#[must_use]
pub fn build_fields(result: &ProcessorResult, category: ContentCategory, location: &str) -> Record {
    let mut fields = Record::new();
    fields.insert(LOCATION_KEY.into(), serde_json::json!(location));

    match category {
        ContentCategory::MasterRegistry => {
            fields.insert(DOC_ID_KEY.into(), serde_json::json!(result.document_id.clone()));
            fields.insert("document_id".into(), serde_json::json!(result.document_id));
            fields.insert(
                "processor_kind".into(),
                serde_json::json!(format!("{:?}", result.processor_kind())),
            );
            fields.insert("created_at".into(), serde_json::json!(chrono::Utc::now().to_rfc3339()));
        }
        ContentCategory::ProcessorResults => {
            fields.insert("document_id".into(), serde_json::json!(result.document_id));
            fields.insert(
                "processor_kind".into(),
                serde_json::json!(format!("{:?}", result.processor_kind())),
            );
            fields.insert(
                "payload".into(),
                serde_json::to_value(&result.payload).unwrap_or(serde_json::Value::Null),
            );
            fields.insert("confidence".into(), serde_json::json!(result.confidence));
            fields.insert(
                "duration_ms".into(),
                serde_json::json!(result.duration.as_millis() as u64),
            );
            if let Some(err) = &result.error {
                fields.insert("error".into(), serde_json::json!(err.message));
            }
        }
        ContentCategory::DocumentContent => {
            fields.insert("document_id".into(), serde_json::json!(result.document_id));
            if let Some(text) = result.payload.text_content() {
                fields.insert("text_content".into(), serde_json::json!(text));
            }
        }
        ContentCategory::VectorEmbeddings => {
            fields.insert("parent_document_id".into(), serde_json::json!(result.document_id));
            if let Some(embedding) = result.payload.embedding() {
                fields.insert("vector".into(), serde_json::json!(embedding));
                fields.insert("dimension".into(), serde_json::json!(embedding.len()));
            }
        }
        ContentCategory::Relationships => {
            fields.insert("source_id".into(), serde_json::json!(result.document_id));
            let relations: Vec<_> = result
                .payload
                .relations()
                .iter()
                .map(|r| {
                    serde_json::json!({
                        "relation_type": r.relation_type,
                        "target_id": r.target_id,
                        "properties": r.properties,
                    })
                })
                .collect();
            fields.insert("relations".into(), serde_json::json!(relations));
        }
        ContentCategory::GeospatialData => {
            fields.insert("document_id".into(), serde_json::json!(result.document_id));
            if let Some(coords) = result.payload.coordinates() {
                fields.insert("latitude".into(), serde_json::json!(coords.latitude));
                fields.insert("longitude".into(), serde_json::json!(coords.longitude));
            }
            if let ProcessorPayload::Geospatial(p) = &result.payload {
                fields.insert("coordinate_system".into(), serde_json::json!(p.coordinate_system));
            }
        }
        ContentCategory::MetadataEnrichment => {
            fields.insert("document_id".into(), serde_json::json!(result.document_id));
            fields.insert("metadata".into(), serde_json::json!(result.payload.metadata()));
        }
        ContentCategory::EventStore => {
            fields.insert("document_id".into(), serde_json::json!(result.document_id));
            fields.insert(
                "event_kind".into(),
                serde_json::json!(format!("{:?}_processed", result.processor_kind())),
            );
            fields.insert(
                "payload".into(),
                serde_json::to_value(&result.payload).unwrap_or(serde_json::Value::Null),
            );
        }
    }

    fields
}
